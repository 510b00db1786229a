//! Redis状态存储
//!
//! 实现基于Redis的熔断器状态存储，多个进程共享同一份失败历史。
//!
//! # 特性
//!
//! - **连接管理**: 使用ConnectionManager管理连接
//! - **重试机制**: 指数退避重试，连接错误时自动重连
//! - **原子递增**: `inc` 使用 `HINCRBY`，在服务端原子完成
//!
//! # 数据布局
//!
//! 每个熔断器一个哈希 `<prefix>:<name>`，字段为 `state` / `failures` / `last_failure_at`，
//! 值为JSON文本（整数直接以数字保存，便于 `HINCRBY`）。

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, IntoConnectionInfo};
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::constants::DEFAULT_KEY_PREFIX;
use crate::error::StorageError;
use crate::storage::{Field, StateStorage};

/// 最大键总长度
const MAX_KEY_LENGTH: usize = 1024;

/// 验证完整键
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::QueryError("键不能为空".to_string()));
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(StorageError::QueryError(format!(
            "键长度超过限制（最大 {} 字符）",
            MAX_KEY_LENGTH
        )));
    }

    Ok(())
}

/// 命令尚未发出时产生的错误
///
/// 只有 [`RedisStorage::connection`] 返回 `ConnectionError`，命令执行阶段的错误一律映射为
/// `QueryError`，此时无法判断服务端是否已执行。
fn is_unsent_error(error: &StorageError) -> bool {
    matches!(error, StorageError::ConnectionError(_))
}

/// 解析Redis中保存的字段值
///
/// 非JSON文本（例如由其他工具写入的裸字符串）按字符串处理。
fn decode_value(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

/// Redis配置
#[derive(Clone)]
pub struct RedisConfig {
    /// Redis连接URL
    pub url: String,
    /// 数据库索引
    pub db: i64,
    /// 密码（使用 Secret 包装以防止意外泄露）
    pub password: Option<Secret<String>>,
    /// 最大重试次数
    pub max_retries: u32,
    /// 重试初始退避时间
    pub retry_initial_backoff: Duration,
    /// 键前缀
    pub key_prefix: String,
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &self.url)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("max_retries", &self.max_retries)
            .field("retry_initial_backoff", &self.retry_initial_backoff)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            db: 0,
            password: None,
            max_retries: 3,
            retry_initial_backoff: Duration::from_millis(100),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl RedisConfig {
    /// 创建新的Redis配置
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 设置数据库索引
    pub fn db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// 设置密码
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Secret::new(password.into()));
        self
    }

    /// 设置最大重试次数
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// 设置重试初始退避时间
    pub fn retry_initial_backoff(mut self, backoff: Duration) -> Self {
        self.retry_initial_backoff = backoff;
        self
    }

    /// 设置键前缀
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

/// Redis存储实现
#[derive(Clone)]
pub struct RedisStorage {
    /// 连接管理器
    conn_manager: Arc<Mutex<Option<ConnectionManager>>>,
    /// 配置
    config: RedisConfig,
}

impl RedisStorage {
    /// 创建新的Redis存储并建立连接
    pub async fn new(config: RedisConfig) -> Result<Self, StorageError> {
        info!("创建Redis存储, URL: {}", config.url);

        let storage = Self {
            conn_manager: Arc::new(Mutex::new(None)),
            config,
        };
        storage.connect().await?;

        info!("Redis存储创建成功");
        Ok(storage)
    }

    /// 获取配置
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// 检查Redis连接
    pub async fn ping(&self) -> Result<(), StorageError> {
        self.execute_with_retry(|| async {
            let mut conn = self.connection().await?;
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    error!("Redis PING失败: {}", e);
                    StorageError::QueryError(format!("PING失败: {}", e))
                })?;
            Ok(())
        })
        .await
    }

    /// 熔断器对应的哈希键
    pub fn fuse_key(&self, name: &str) -> Result<String, StorageError> {
        let key = format!("{}:{}", self.config.key_prefix, name);
        validate_key(&key)?;
        Ok(key)
    }

    /// 建立连接
    async fn connect(&self) -> Result<(), StorageError> {
        debug!("建立Redis连接");

        let mut info = self.config.url.as_str().into_connection_info().map_err(|e| {
            error!("解析Redis URL失败: {}", e);
            StorageError::ConnectionError(format!("解析Redis URL失败: {}", e))
        })?;
        info.redis.db = self.config.db;
        if let Some(password) = &self.config.password {
            info.redis.password = Some(password.expose_secret().clone());
        }

        let client = Client::open(info).map_err(|e| {
            error!("创建Redis客户端失败: {}", e);
            StorageError::ConnectionError(format!("创建Redis客户端失败: {}", e))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("创建Redis连接管理器失败: {}", e);
            StorageError::ConnectionError(format!("创建Redis连接管理器失败: {}", e))
        })?;

        *self.conn_manager.lock().await = Some(conn_manager);

        info!("Redis连接建立成功");
        Ok(())
    }

    /// 重新连接
    async fn reconnect(&self) -> Result<(), StorageError> {
        debug!("尝试重新连接Redis");
        *self.conn_manager.lock().await = None;
        self.connect().await
    }

    /// 取出一个连接句柄
    async fn connection(&self) -> Result<ConnectionManager, StorageError> {
        let conn_manager = self.conn_manager.lock().await;
        conn_manager
            .as_ref()
            .cloned()
            .ok_or_else(|| StorageError::ConnectionError("连接未初始化".to_string()))
    }

    /// 带重试的执行，任何错误都会重试（仅用于幂等命令）
    async fn execute_with_retry<F, Fut, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, StorageError>>,
    {
        self.execute_with_retry_if(f, |_| true).await
    }

    /// 带重试的执行，只有 `retryable` 返回 true 的错误才会重试
    async fn execute_with_retry_if<F, Fut, T, P>(
        &self,
        f: F,
        retryable: P,
    ) -> Result<T, StorageError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, StorageError>>,
        P: Fn(&StorageError) -> bool,
    {
        let mut last_error = None;
        let mut backoff = self.config.retry_initial_backoff;

        for attempt in 0..=self.config.max_retries {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("重试成功，尝试次数: {}", attempt);
                    }
                    return Ok(result);
                }
                Err(e) if !retryable(&e) => {
                    debug!("错误不可重试: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    last_error = Some(e.clone());

                    if attempt < self.config.max_retries {
                        warn!(
                            "操作失败，将在 {:?} 后重试 (尝试 {}/{}): {}",
                            backoff,
                            attempt + 1,
                            self.config.max_retries,
                            e
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = backoff.mul_f32(2.0); // 指数退避

                        if matches!(e, StorageError::ConnectionError(_)) {
                            if let Err(reconnect_err) = self.reconnect().await {
                                error!("重新连接失败: {}", reconnect_err);
                            }
                        }
                    }
                }
            }
        }

        error!("操作失败，已达最大重试次数: {:?}", last_error);
        Err(last_error.unwrap_or(StorageError::TimeoutError("操作超时".to_string())))
    }
}

#[async_trait]
impl StateStorage for RedisStorage {
    async fn get(&self, name: &str, field: Field) -> Result<Option<Value>, StorageError> {
        let key = self.fuse_key(name)?;

        self.execute_with_retry(|| async {
            let mut conn = self.connection().await?;
            let raw: Option<String> = conn.hget(&key, field.as_str()).await.map_err(|e| {
                error!("Redis HGET失败: {}", e);
                StorageError::QueryError(format!("HGET失败: {}", e))
            })?;

            trace!("HGET key={}, field={}, result={:?}", key, field, raw);
            Ok(raw.map(decode_value))
        })
        .await
    }

    async fn put(&self, name: &str, field: Field, value: Value) -> Result<Value, StorageError> {
        let key = self.fuse_key(name)?;

        self.execute_with_retry(|| async {
            let mut conn = self.connection().await?;

            if value.is_null() {
                let _: () = conn.hdel(&key, field.as_str()).await.map_err(|e| {
                    error!("Redis HDEL失败: {}", e);
                    StorageError::QueryError(format!("HDEL失败: {}", e))
                })?;
            } else {
                let _: () = conn
                    .hset(&key, field.as_str(), value.to_string())
                    .await
                    .map_err(|e| {
                        error!("Redis HSET失败: {}", e);
                        StorageError::QueryError(format!("HSET失败: {}", e))
                    })?;
            }

            trace!("HSET key={}, field={}, value={}", key, field, value);
            Ok(value.clone())
        })
        .await
    }

    async fn inc(&self, name: &str, field: Field) -> Result<i64, StorageError> {
        let key = self.fuse_key(name)?;

        // HINCRBY 不是幂等的：服务端可能已执行而只是响应丢失，
        // 因此只在命令发出前（取连接失败）重试
        self.execute_with_retry_if(
            || async {
                let mut conn = self.connection().await?;
                let result: i64 = conn.hincr(&key, field.as_str(), 1).await.map_err(|e| {
                    error!("Redis HINCRBY失败: {}", e);
                    StorageError::QueryError(format!("HINCRBY失败: {}", e))
                })?;

                trace!("HINCRBY key={}, field={}, result={}", key, field, result);
                Ok(result)
            },
            is_unsent_error,
        )
        .await
    }
}
