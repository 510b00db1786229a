//! 配置模块
//!
//! 定义熔断器的配置结构。
//!
//! - [`FuseConfig`]: 运行时配置，可以携带自定义回调，构造后不可变
//! - [`FuseSettings`]: 声明式配置，可从 YAML / TOML / JSON 加载，时长以秒表示

use crate::error::ConfigError;
use crate::handlers::BreakHandler;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 熔断器配置
#[derive(Debug, Clone)]
pub struct FuseConfig {
    /// 允许的连续失败次数（达到此值时熔断）
    pub allowed_failures: u64,
    /// 冷却时间（最后一次失败后经过此时间才会尝试恢复）
    pub cool_off_period: Duration,
    /// 单次执行的超时时间（`None` 或 0 表示不限制）
    pub timeout: Option<Duration>,
    /// 熔断时依次调用的处理器
    pub on_break: Vec<BreakHandler>,
}

impl FuseConfig {
    /// 创建新的熔断器配置
    pub fn new(allowed_failures: u64, cool_off_period: Duration) -> Self {
        Self {
            allowed_failures,
            cool_off_period,
            timeout: None,
            on_break: Vec::new(),
        }
    }

    /// 设置执行超时
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 设置熔断处理器（替换已有的）
    pub fn on_break<I>(mut self, handlers: I) -> Self
    where
        I: IntoIterator<Item = BreakHandler>,
    {
        self.on_break = handlers.into_iter().collect();
        self
    }

    /// 追加一个熔断处理器
    pub fn add_break_handler(mut self, handler: BreakHandler) -> Self {
        self.on_break.push(handler);
        self
    }

    /// 实际生效的超时，0 视为不限制
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_failures == 0 {
            return Err(ConfigError::InvalidAllowedFailures);
        }
        if self.cool_off_period.is_zero() {
            return Err(ConfigError::InvalidCoolOffPeriod);
        }
        Ok(())
    }
}

/// 声明式熔断器配置
///
/// ```yaml
/// allowed_failures: 3
/// cool_off_period: 60
/// timeout: 0.5
/// on_break: [log]
/// break_handler_timeout: 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuseSettings {
    /// 允许的连续失败次数
    pub allowed_failures: u64,
    /// 冷却时间（秒）
    pub cool_off_period: f64,
    /// 执行超时（秒），缺省或 <=0 表示不限制
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    /// 标准处理器名称列表
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_break: Vec<String>,
    /// 单个处理器的超时（秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_handler_timeout: Option<f64>,
}

impl FuseSettings {
    /// 从YAML解析
    pub fn from_yaml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// 从TOML解析
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// 从JSON解析
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    /// 从文件加载，按扩展名选择格式
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(ConfigError::Parse(format!(
                "不支持的配置文件格式: {:?}",
                other
            ))),
        }
    }

    /// 单个处理器的超时
    pub fn break_handler_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.break_handler_timeout
            .map(|secs| secs_to_duration("break_handler_timeout", secs))
            .transpose()
    }

    /// 转换为运行时配置（同时校验）
    pub fn into_config(self) -> Result<FuseConfig, ConfigError> {
        let cool_off_period = secs_to_duration("cool_off_period", self.cool_off_period)?;

        let timeout = match self.timeout {
            Some(secs) if secs.is_finite() && secs <= 0.0 => None,
            Some(secs) => Some(secs_to_duration("timeout", secs)?),
            None => None,
        };

        let config = FuseConfig {
            allowed_failures: self.allowed_failures,
            cool_off_period,
            timeout,
            on_break: self.on_break.into_iter().map(BreakHandler::Named).collect(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// 负数、非有限值以及超出 `Duration` 表示范围的秒数都视为无效
fn secs_to_duration(field: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| ConfigError::InvalidDuration { field, value: secs })
}
