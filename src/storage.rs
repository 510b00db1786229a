//! 存储抽象层
//!
//! 定义熔断器状态存储接口和基本实现。
//!
//! 熔断器自身不持有可变状态，所有字段都按 `(名称, 字段)` 存放在存储中，
//! 多个熔断器实例（可以位于不同进程）共享同一名称即共享同一份失败历史。
//! 并发正确性只依赖 [`StateStorage::inc`] 的原子性。

use crate::constants::{FIELD_FAILURES, FIELD_LAST_FAILURE_AT, FIELD_STATE};
use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// 熔断器持久化字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// 状态（`"closed"` / `"open"`）
    State,
    /// 连续失败次数
    Failures,
    /// 最后一次真实失败的时间（Unix毫秒）
    LastFailureAt,
}

impl Field {
    /// 所有字段
    pub const ALL: [Field; 3] = [Field::State, Field::Failures, Field::LastFailureAt];

    /// 存储中使用的字段名
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::State => FIELD_STATE,
            Field::Failures => FIELD_FAILURES,
            Field::LastFailureAt => FIELD_LAST_FAILURE_AT,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 状态存储接口
///
/// 写入 `Value::Null` 表示清除该字段，读取时返回 `None`。
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// 读取字段当前值，无副作用
    async fn get(&self, name: &str, field: Field) -> Result<Option<Value>, StorageError>;

    /// 无条件写入字段，返回写入的值
    async fn put(&self, name: &str, field: Field, value: Value) -> Result<Value, StorageError>;

    /// 原子递增整数字段（不存在时视为0），返回递增后的值
    async fn inc(&self, name: &str, field: Field) -> Result<i64, StorageError>;
}

/// 将存储值解释为整数
///
/// 共享后端可能把计数器保存为字符串，这里同时接受数字和数字字符串。
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 基础存储
///
/// 不对应任何真实存储，所有操作都返回 [`StorageError::Unimplemented`]。
/// 用作占位，提示调用方必须提供具体实现。
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedStorage;

#[async_trait]
impl StateStorage for UnimplementedStorage {
    async fn get(&self, _name: &str, _field: Field) -> Result<Option<Value>, StorageError> {
        Err(StorageError::Unimplemented("get"))
    }

    async fn put(&self, _name: &str, _field: Field, _value: Value) -> Result<Value, StorageError> {
        Err(StorageError::Unimplemented("put"))
    }

    async fn inc(&self, _name: &str, _field: Field) -> Result<i64, StorageError> {
        Err(StorageError::Unimplemented("inc"))
    }
}

/// 内存存储实现
///
/// 克隆得到的实例共享同一份数据。
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<DashMap<(String, Field), Value>>,
}

impl MemoryStorage {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// 当前保存的字段数
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 清空所有熔断器的状态
    pub fn clear(&self) {
        self.data.clear();
    }
}

#[async_trait]
impl StateStorage for MemoryStorage {
    async fn get(&self, name: &str, field: Field) -> Result<Option<Value>, StorageError> {
        let result = self
            .data
            .get(&(name.to_string(), field))
            .map(|entry| entry.value().clone());
        trace!("GET name={}, field={}, result={:?}", name, field, result);
        Ok(result)
    }

    async fn put(&self, name: &str, field: Field, value: Value) -> Result<Value, StorageError> {
        let key = (name.to_string(), field);
        if value.is_null() {
            self.data.remove(&key);
        } else {
            self.data.insert(key, value.clone());
        }
        trace!("PUT name={}, field={}, value={:?}", name, field, value);
        Ok(value)
    }

    async fn inc(&self, name: &str, field: Field) -> Result<i64, StorageError> {
        // entry 持有分片写锁，读-改-写在锁内完成
        let mut entry = self
            .data
            .entry((name.to_string(), field))
            .or_insert_with(|| Value::from(0));

        let current = value_as_i64(entry.value()).ok_or_else(|| {
            StorageError::InvalidValue(format!(
                "{}:{} 不是整数: {}",
                name,
                field,
                entry.value()
            ))
        })?;
        let next = current.checked_add(1).ok_or_else(|| {
            StorageError::InvalidValue(format!("{}:{} 递增溢出: {}", name, field, current))
        })?;
        *entry.value_mut() = Value::from(next);

        trace!("INC name={}, field={}, result={}", name, field, next);
        Ok(next)
    }
}
