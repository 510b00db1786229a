//! 日志初始化
//!
//! 熔断器内部只使用 `tracing` 宏输出事件，是否输出以及输出到哪里由调用方决定。
//! 启用 `telemetry` 特性后可用 [`init_tracing`] 安装一个格式化输出的订阅者。

use tracing::info;
use tracing_subscriber::EnvFilter;

/// 默认过滤规则
pub const DEFAULT_LOG_FILTER: &str = "fuseguard=info";

/// 安装全局 fmt 订阅者
///
/// 优先使用 `RUST_LOG` 环境变量，未设置时使用 `default_filter`。
///
/// # 返回
/// - `Ok(())`: 初始化成功
/// - `Err(_)`: 过滤规则无效或已存在全局订阅者
///
/// # 示例
/// ```rust
/// use fuseguard::telemetry::{init_tracing, DEFAULT_LOG_FILTER};
///
/// let _ = init_tracing(DEFAULT_LOG_FILTER);
/// ```
pub fn init_tracing(default_filter: &str) -> Result<(), String> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| format!("无效的日志过滤规则 {}: {}", default_filter, e))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| format!("初始化日志订阅者失败: {}", e))?;

    info!("日志系统初始化完成");
    Ok(())
}
