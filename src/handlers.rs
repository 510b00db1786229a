//! 熔断通知
//!
//! 熔断器从关闭变为打开时，按配置顺序依次调用熔断处理器。
//!
//! # 特性
//!
//! - **标准处理器**: 通过名称引用，注册表在首次使用时构建且不可修改
//! - **自定义处理器**: 直接传入接收 [`Fuse`] 的异步回调
//! - **超时隔离**: 每个处理器的执行时间受 `break_handler_timeout` 限制
//! - **失败隔离**: 处理器的错误、panic、超时都会被记录并丢弃，不影响熔断器状态和调用方

use crate::constants::{HANDLER_LOG, HANDLER_WARN};
use crate::fuse::Fuse;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// 处理器返回的 Future
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// 处理器回调
pub type HandlerFn = Arc<dyn Fn(Fuse) -> HandlerFuture + Send + Sync>;

/// 标准处理器
pub type StandardHandler = fn(Fuse) -> HandlerFuture;

/// 熔断处理器
#[derive(Clone)]
pub enum BreakHandler {
    /// 标准处理器名称
    Named(String),
    /// 自定义回调
    Custom(HandlerFn),
}

impl BreakHandler {
    /// 引用标准处理器
    pub fn named(name: impl Into<String>) -> Self {
        BreakHandler::Named(name.into())
    }

    /// 自定义异步处理器
    ///
    /// `break_handler_timeout` 只能在处理器的 `.await` 点上生效。
    /// 在异步块内同步阻塞线程（例如 `std::thread::sleep` 或阻塞I/O）的处理器无法被中断，
    /// 这类工作应放入 `tokio::task::spawn_blocking` 再 `.await`。
    ///
    /// # 示例
    /// ```rust
    /// use fuseguard::handlers::BreakHandler;
    ///
    /// let handler = BreakHandler::custom(|fuse| async move {
    ///     println!("{} 已熔断", fuse.name());
    ///     Ok(())
    /// });
    /// ```
    pub fn custom<F, Fut>(handler: F) -> Self
    where
        F: Fn(Fuse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        BreakHandler::Custom(Arc::new(move |fuse| handler(fuse).boxed()))
    }

    /// 解析为可调用的回调，未知名称返回 `None`
    fn resolve(&self) -> Option<HandlerFn> {
        match self {
            BreakHandler::Named(name) => {
                let handler: HandlerFn = Arc::new(standard_handler(name)?);
                Some(handler)
            }
            BreakHandler::Custom(handler) => Some(handler.clone()),
        }
    }

    /// 用于日志的描述
    fn label(&self) -> &str {
        match self {
            BreakHandler::Named(name) => name,
            BreakHandler::Custom(_) => "<custom>",
        }
    }
}

impl std::fmt::Debug for BreakHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakHandler::Named(name) => f.debug_tuple("Named").field(name).finish(),
            BreakHandler::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl From<&str> for BreakHandler {
    fn from(name: &str) -> Self {
        BreakHandler::named(name)
    }
}

impl From<String> for BreakHandler {
    fn from(name: String) -> Self {
        BreakHandler::Named(name)
    }
}

fn log_handler(fuse: Fuse) -> HandlerFuture {
    async move {
        error!(fuse = %fuse.name(), "Fuse '{}' has broken", fuse.name());
        Ok(())
    }
    .boxed()
}

fn warn_handler(fuse: Fuse) -> HandlerFuture {
    async move {
        warn!(fuse = %fuse.name(), "Fuse '{}' has broken", fuse.name());
        Ok(())
    }
    .boxed()
}

lazy_static::lazy_static! {
    /// 标准处理器注册表
    static ref STANDARD_HANDLERS: HashMap<&'static str, StandardHandler> = {
        let mut handlers: HashMap<&'static str, StandardHandler> = HashMap::new();
        handlers.insert(HANDLER_LOG, log_handler);
        handlers.insert(HANDLER_WARN, warn_handler);
        handlers
    };
}

/// 按名称查找标准处理器
pub fn standard_handler(name: &str) -> Option<StandardHandler> {
    STANDARD_HANDLERS.get(name).copied()
}

/// 所有标准处理器名称（已排序）
pub fn standard_handler_names() -> Vec<&'static str> {
    let mut names: Vec<_> = STANDARD_HANDLERS.keys().copied().collect();
    names.sort_unstable();
    names
}

/// 一次通知的执行结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// 正常完成的处理器数
    pub completed: usize,
    /// 返回错误或panic的处理器数
    pub failed: usize,
    /// 超时被放弃的处理器数
    pub timed_out: usize,
    /// 名称无法解析而跳过的处理器数
    pub skipped: usize,
}

/// 熔断通知分发器
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakDispatcher;

impl BreakDispatcher {
    /// 依次执行处理器
    ///
    /// 每个处理器最多执行 `timeout`，超时后其 Future 被丢弃，随后继续下一个。
    pub async fn dispatch(
        &self,
        fuse: &Fuse,
        handlers: &[BreakHandler],
        timeout: Duration,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for handler in handlers {
            let Some(callback) = handler.resolve() else {
                debug!("未知的熔断处理器，已跳过: {}", handler.label());
                report.skipped += 1;
                continue;
            };

            let target = fuse.clone();
            let call = AssertUnwindSafe(async move { callback(target).await }).catch_unwind();

            match tokio::time::timeout(timeout, call).await {
                Ok(Ok(Ok(()))) => report.completed += 1,
                Ok(Ok(Err(e))) => {
                    warn!(
                        "熔断处理器执行失败: fuse={}, handler={}, error={}",
                        fuse.name(),
                        handler.label(),
                        e
                    );
                    report.failed += 1;
                }
                Ok(Err(_)) => {
                    warn!(
                        "熔断处理器发生panic: fuse={}, handler={}",
                        fuse.name(),
                        handler.label()
                    );
                    report.failed += 1;
                }
                Err(_) => {
                    warn!(
                        "熔断处理器执行超时: fuse={}, handler={}, timeout={:?}",
                        fuse.name(),
                        handler.label(),
                        timeout
                    );
                    report.timed_out += 1;
                }
            }
        }

        report
    }
}
