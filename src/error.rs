//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。

use std::time::Duration;
use thiserror::Error;

/// 熔断器执行错误
///
/// `E` 为被保护操作自身的错误类型，原样透传给调用方。
#[derive(Error, Debug)]
pub enum FuseError<E> {
    /// 熔断器已打开，操作未执行（不计入失败次数）
    #[error("熔断器已打开，快速失败")]
    FastFailure,

    /// 被保护操作返回的原始错误
    #[error("{0}")]
    Operation(E),

    /// 被保护操作执行超时（与普通失败同等计数）
    #[error("操作执行超时: {0:?}")]
    Timeout(Duration),

    /// 存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
}

impl<E> FuseError<E> {
    /// 是否为快速失败
    pub fn is_fast_failure(&self) -> bool {
        matches!(self, FuseError::FastFailure)
    }

    /// 是否为执行超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, FuseError::Timeout(_))
    }

    /// 取出操作自身的错误
    pub fn into_operation(self) -> Option<E> {
        match self {
            FuseError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// 存储错误
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// 未实现（基础存储的所有操作都返回此错误）
    #[error("未实现的存储操作: {0}")]
    Unimplemented(&'static str),

    /// 连接错误
    #[error("连接错误: {0}")]
    ConnectionError(String),

    /// 查询错误
    #[error("查询错误: {0}")]
    QueryError(String),

    /// 存储的值类型不符
    #[error("无效的存储值: {0}")]
    InvalidValue(String),

    /// 超时错误
    #[error("超时错误: {0}")]
    TimeoutError(String),
}

/// 配置错误
///
/// 构造熔断器或解析配置时同步返回，不会延迟到首次调用。
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 未指定名称
    #[error("必须指定熔断器名称")]
    MissingName,

    /// 名称过长
    #[error("熔断器名称过长（最大 {max} 字符）: {len}")]
    NameTooLong { len: usize, max: usize },

    /// 未指定存储
    #[error("必须指定状态存储")]
    MissingStorage,

    /// 未指定配置
    #[error("必须指定熔断器配置")]
    MissingConfig,

    /// 允许失败次数无效
    #[error("允许失败次数必须大于0")]
    InvalidAllowedFailures,

    /// 冷却时间无效
    #[error("冷却时间必须大于0")]
    InvalidCoolOffPeriod,

    /// 时长字段无效
    #[error("无效的时长 {field}: {value}")]
    InvalidDuration { field: &'static str, value: f64 },

    /// 配置解析错误
    #[error("配置解析错误: {0}")]
    Parse(String),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuseState {
    /// 关闭状态（正常）
    #[default]
    Closed,
    /// 打开状态（熔断）
    Open,
}

impl FuseState {
    /// 存储中使用的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            FuseState::Closed => "closed",
            FuseState::Open => "open",
        }
    }

    /// 从存储值解析，无法识别的值按关闭处理
    pub fn from_stored(value: &str) -> Self {
        match value {
            "open" => FuseState::Open,
            _ => FuseState::Closed,
        }
    }
}

/// 熔断器统计信息
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FuseStats {
    /// 熔断器名称
    pub name: String,
    /// 当前状态
    pub state: FuseState,
    /// 连续失败次数
    pub failures: u64,
    /// 最后失败时间
    pub last_failure_at: Option<chrono::DateTime<chrono::Utc>>,
}
