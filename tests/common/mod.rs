//! 测试通用工具模块
//!
//! 提供测试中常用的工具函数和辅助结构。

#![allow(dead_code)]

use fuseguard::{
    clock::ManualClock,
    config::FuseConfig,
    error::FuseError,
    fuse::Fuse,
    handlers::BreakHandler,
    storage::{MemoryStorage, StateStorage},
};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 测试用熔断器名称
pub const FUSE_NAME: &str = "name";

/// 创建测试用的内存存储
pub fn create_memory_storage() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new())
}

/// 默认配置：失败1次即熔断，冷却60秒
pub fn default_config() -> FuseConfig {
    FuseConfig::new(1, Duration::from_secs(60))
}

/// 使用手动时钟创建熔断器
pub fn create_fuse(
    storage: Arc<dyn StateStorage>,
    config: FuseConfig,
    clock: Arc<ManualClock>,
) -> Fuse {
    Fuse::builder(FUSE_NAME)
        .storage(storage)
        .config(config)
        .clock(clock)
        .build()
        .unwrap()
}

/// 创建基于内存存储和手动时钟的熔断器
pub fn memory_fuse(config: FuseConfig) -> (Fuse, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let fuse = create_fuse(create_memory_storage(), config, clock.clone());
    (fuse, clock)
}

/// 执行一次失败的操作
pub async fn do_failure(fuse: &Fuse) -> FuseError<io::Error> {
    fuse.wrap(|| async {
        Err::<(), _>(io::Error::new(io::ErrorKind::Other, "Exceptional code"))
    })
    .await
    .unwrap_err()
}

/// 执行一次成功的操作
pub async fn do_success(fuse: &Fuse) -> Result<(), FuseError<io::Error>> {
    fuse.wrap(|| async { Ok::<(), io::Error>(()) }).await
}

/// 计数处理器
pub fn counting_handler(calls: Arc<AtomicUsize>) -> BreakHandler {
    BreakHandler::custom(move |_fuse| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// 执行超过 `delay` 后才计数的处理器
pub fn slow_handler(calls: Arc<AtomicUsize>, delay: Duration) -> BreakHandler {
    BreakHandler::custom(move |_fuse| {
        let calls = calls.clone();
        async move {
            tokio::time::sleep(delay).await;
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// 总是失败的处理器
pub fn failing_handler() -> BreakHandler {
    BreakHandler::custom(|_fuse| async { Err(anyhow::anyhow!("Handling error")) })
}

/// 收集日志输出的缓冲区
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<parking_lot::Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 安装线程局部的日志订阅者，返回缓冲区和守卫
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
