//! 熔断器实现
//!
//! 提供基于共享存储的熔断器（Fuse），支持快速失败和冷却后自动恢复。
//!
//! # 特性
//!
//! - **两状态**: Closed（关闭）、Open（打开）
//! - **自动熔断**: 连续失败次数达到阈值自动熔断，并触发熔断通知
//! - **自动恢复**: 距最后一次真实失败超过冷却时间后，下一次调用时自动关闭
//! - **共享状态**: 熔断器本身无状态，同名的多个实例通过存储共享失败历史
//! - **执行超时**: 可选的单次执行超时，超时按普通失败计数
//!
//! # 状态转换
//! ```text
//! Closed → Open: 失败后 failures >= allowed_failures
//! Open → Closed: now - last_failure_at > cool_off_period（在 wrap 内惰性检查）
//! * → Closed: reset()
//! ```

use crate::clock::{Clock, SystemClock};
use crate::config::{FuseConfig, FuseSettings};
use crate::constants::{DEFAULT_BREAK_HANDLER_TIMEOUT_SECS, MAX_FUSE_NAME_LENGTH};
use crate::error::{ConfigError, FuseError, FuseState, FuseStats, StorageError};
use crate::handlers::BreakDispatcher;
use crate::storage::{value_as_i64, Field, StateStorage};
use parking_lot::RwLock;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 熔断器
///
/// 克隆得到的实例共享配置和 `break_handler_timeout`。
#[derive(Clone)]
pub struct Fuse {
    inner: Arc<FuseInner>,
}

struct FuseInner {
    /// 名称（存储中的键）
    name: String,
    /// 状态存储
    storage: Arc<dyn StateStorage>,
    /// 配置
    config: FuseConfig,
    /// 时间源
    clock: Arc<dyn Clock>,
    /// 单个熔断处理器的最长执行时间
    break_handler_timeout: RwLock<Duration>,
    /// 熔断通知分发器
    dispatcher: BreakDispatcher,
}

/// 熔断器构建器
pub struct FuseBuilder {
    name: Option<String>,
    storage: Option<Arc<dyn StateStorage>>,
    config: Option<FuseConfig>,
    clock: Option<Arc<dyn Clock>>,
    break_handler_timeout: Duration,
}

impl Default for FuseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FuseBuilder {
    /// 创建空的构建器
    pub fn new() -> Self {
        Self {
            name: None,
            storage: None,
            config: None,
            clock: None,
            break_handler_timeout: Duration::from_secs(DEFAULT_BREAK_HANDLER_TIMEOUT_SECS),
        }
    }

    /// 设置名称
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 设置状态存储
    pub fn storage(mut self, storage: Arc<dyn StateStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// 设置配置
    pub fn config(mut self, config: FuseConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 设置时间源（默认系统时钟）
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 设置单个熔断处理器的超时
    pub fn break_handler_timeout(mut self, timeout: Duration) -> Self {
        self.break_handler_timeout = timeout;
        self
    }

    /// 校验并构建熔断器
    pub fn build(self) -> Result<Fuse, ConfigError> {
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::MissingName)?;
        if name.len() > MAX_FUSE_NAME_LENGTH {
            return Err(ConfigError::NameTooLong {
                len: name.len(),
                max: MAX_FUSE_NAME_LENGTH,
            });
        }
        let storage = self.storage.ok_or(ConfigError::MissingStorage)?;
        let config = self.config.ok_or(ConfigError::MissingConfig)?;
        config.validate()?;

        info!(
            "创建熔断器: name={}, allowed_failures={}, cool_off_period={:?}, timeout={:?}",
            name,
            config.allowed_failures,
            config.cool_off_period,
            config.effective_timeout()
        );

        Ok(Fuse {
            inner: Arc::new(FuseInner {
                name,
                storage,
                config,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                break_handler_timeout: RwLock::new(self.break_handler_timeout),
                dispatcher: BreakDispatcher,
            }),
        })
    }
}

impl Fuse {
    /// 创建构建器
    pub fn builder(name: impl Into<String>) -> FuseBuilder {
        FuseBuilder::new().name(name)
    }

    /// 创建新的熔断器
    ///
    /// # 示例
    /// ```rust
    /// use fuseguard::config::FuseConfig;
    /// use fuseguard::fuse::Fuse;
    /// use fuseguard::storage::MemoryStorage;
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let config = FuseConfig::new(3, Duration::from_secs(60));
    /// let fuse = Fuse::new("payments", Arc::new(MemoryStorage::new()), config).unwrap();
    /// assert_eq!(fuse.name(), "payments");
    /// ```
    pub fn new(
        name: impl Into<String>,
        storage: Arc<dyn StateStorage>,
        config: FuseConfig,
    ) -> Result<Self, ConfigError> {
        Self::builder(name).storage(storage).config(config).build()
    }

    /// 根据声明式配置创建熔断器
    pub fn from_settings(
        name: impl Into<String>,
        storage: Arc<dyn StateStorage>,
        settings: FuseSettings,
    ) -> Result<Self, ConfigError> {
        let mut builder = Self::builder(name).storage(storage);
        if let Some(timeout) = settings.break_handler_timeout()? {
            builder = builder.break_handler_timeout(timeout);
        }
        builder.config(settings.into_config()?).build()
    }

    /// 执行操作，自动处理熔断逻辑
    ///
    /// # 返回
    /// - `Ok(T)`: 操作成功
    /// - `Err(FuseError::FastFailure)`: 熔断器打开，操作未执行
    /// - `Err(FuseError::Operation(e))`: 操作返回的原始错误
    /// - `Err(FuseError::Timeout(_))`: 操作超时
    /// - `Err(FuseError::Storage(_))`: 状态存储出错
    ///
    /// # 示例
    /// ```rust
    /// use fuseguard::config::FuseConfig;
    /// use fuseguard::fuse::Fuse;
    /// use fuseguard::storage::MemoryStorage;
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let config = FuseConfig::new(3, Duration::from_secs(60));
    /// let fuse = Fuse::new("payments", Arc::new(MemoryStorage::new()), config).unwrap();
    ///
    /// let result = fuse
    ///     .wrap(|| async { Ok::<u32, std::io::Error>(42) })
    ///     .await;
    /// assert_eq!(result.unwrap(), 42);
    /// # }
    /// ```
    pub async fn wrap<F, Fut, T, E>(&self, operation: F) -> Result<T, FuseError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.is_open().await? {
            self.close_if_cooled_off().await?;
        }
        // 重新读取：其他实例可能在此期间改变了状态
        if self.is_open().await? {
            debug!("熔断器打开，快速失败: name={}", self.inner.name);
            return Err(FuseError::FastFailure);
        }

        let result = match self.inner.config.effective_timeout() {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(result) => result.map_err(FuseError::Operation),
                Err(_) => {
                    warn!("操作执行超时: name={}, timeout={:?}", self.inner.name, limit);
                    Err(FuseError::Timeout(limit))
                }
            },
            None => operation().await.map_err(FuseError::Operation),
        };

        match result {
            Ok(value) => {
                self.put(Field::Failures, Value::from(0)).await?;
                trace!("操作成功: name={}", self.inner.name);
                Ok(value)
            }
            Err(e) => {
                self.record_failure().await?;
                Err(e)
            }
        }
    }

    /// 检查熔断器是否打开（纯读取，不做冷却检查）
    pub async fn is_open(&self) -> Result<bool, StorageError> {
        Ok(self.state().await? == FuseState::Open)
    }

    /// 获取当前状态
    pub async fn state(&self) -> Result<FuseState, StorageError> {
        let state = match self.get(Field::State).await? {
            Some(Value::String(state)) => FuseState::from_stored(&state),
            _ => FuseState::Closed,
        };
        Ok(state)
    }

    /// 当前连续失败次数
    pub async fn failures(&self) -> Result<u64, StorageError> {
        let failures = self
            .get(Field::Failures)
            .await?
            .as_ref()
            .and_then(value_as_i64)
            .unwrap_or(0);
        Ok(u64::try_from(failures).unwrap_or(0))
    }

    /// 最后一次真实失败的时间
    pub async fn last_failure_at(
        &self,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>, StorageError> {
        Ok(self
            .last_failure_millis()
            .await?
            .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis))
    }

    /// 重置熔断器到关闭状态
    pub async fn reset(&self) -> Result<(), StorageError> {
        info!("重置熔断器: name={}", self.inner.name);
        self.put(Field::State, Value::from(FuseState::Closed.as_str()))
            .await?;
        self.put(Field::Failures, Value::from(0)).await?;
        self.put(Field::LastFailureAt, Value::Null).await?;
        Ok(())
    }

    /// 获取统计信息
    pub async fn stats(&self) -> Result<FuseStats, StorageError> {
        Ok(FuseStats {
            name: self.inner.name.clone(),
            state: self.state().await?,
            failures: self.failures().await?,
            last_failure_at: self.last_failure_at().await?,
        })
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 获取配置
    pub fn config(&self) -> &FuseConfig {
        &self.inner.config
    }

    /// 单个熔断处理器的超时
    pub fn break_handler_timeout(&self) -> Duration {
        *self.inner.break_handler_timeout.read()
    }

    /// 修改单个熔断处理器的超时
    pub fn set_break_handler_timeout(&self, timeout: Duration) {
        *self.inner.break_handler_timeout.write() = timeout;
    }

    /// 两个句柄是否指向同一个熔断器实例
    pub fn ptr_eq(&self, other: &Fuse) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 冷却时间已过则关闭熔断器
    ///
    /// 使用严格大于：恰好等于冷却时间时保持打开。
    /// 没有记录失败时间时视为已冷却。
    async fn close_if_cooled_off(&self) -> Result<bool, StorageError> {
        let now = self.inner.clock.now_millis();
        let last_failure = self.last_failure_millis().await?.unwrap_or(0);
        let cool_off = i64::try_from(self.inner.config.cool_off_period.as_millis())
            .unwrap_or(i64::MAX);

        if now.saturating_sub(last_failure) <= cool_off {
            return Ok(false);
        }

        self.put(Field::State, Value::from(FuseState::Closed.as_str()))
            .await?;
        self.put(Field::Failures, Value::from(0)).await?;

        info!("熔断器状态变更: Open -> Closed (name={})", self.inner.name);
        Ok(true)
    }

    /// 记录一次真实失败，达到阈值时打开熔断器
    async fn record_failure(&self) -> Result<(), StorageError> {
        let now = self.inner.clock.now_millis();
        self.put(Field::LastFailureAt, Value::from(now)).await?;

        let failures = self.inc(Field::Failures).await?;
        let allowed = i64::try_from(self.inner.config.allowed_failures).unwrap_or(i64::MAX);

        if failures >= allowed {
            self.open(failures).await?;
        } else {
            trace!(
                "操作失败: name={}, failures={}/{}",
                self.inner.name,
                failures,
                allowed
            );
        }
        Ok(())
    }

    /// 切换到打开状态
    async fn open(&self, failures: i64) -> Result<(), StorageError> {
        let was_open = self.is_open().await?;
        self.put(Field::State, Value::from(FuseState::Open.as_str()))
            .await?;

        // 并发调用方已打开时不重复通知
        if was_open {
            return Ok(());
        }

        warn!(
            "熔断器状态变更: Closed -> Open (name={}, failures={})",
            self.inner.name, failures
        );

        let handlers = &self.inner.config.on_break;
        if !handlers.is_empty() {
            let report = self
                .inner
                .dispatcher
                .dispatch(self, handlers, self.break_handler_timeout())
                .await;
            debug!("熔断通知完成: name={}, report={:?}", self.inner.name, report);
        }
        Ok(())
    }

    async fn last_failure_millis(&self) -> Result<Option<i64>, StorageError> {
        Ok(self
            .get(Field::LastFailureAt)
            .await?
            .as_ref()
            .and_then(value_as_i64))
    }

    async fn get(&self, field: Field) -> Result<Option<Value>, StorageError> {
        self.inner.storage.get(&self.inner.name, field).await
    }

    async fn put(&self, field: Field, value: Value) -> Result<Value, StorageError> {
        self.inner.storage.put(&self.inner.name, field, value).await
    }

    async fn inc(&self, field: Field) -> Result<i64, StorageError> {
        self.inner.storage.inc(&self.inner.name, field).await
    }
}

impl std::fmt::Debug for Fuse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fuse")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("break_handler_timeout", &self.break_handler_timeout())
            .finish()
    }
}
