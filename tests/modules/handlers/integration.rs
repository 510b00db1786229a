//! 熔断通知集成测试
//!
//! 测试熔断时处理器的调用、隔离和超时

use crate::common::*;
use fuseguard::handlers::BreakHandler;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 单个处理器收到熔断器实例
#[tokio::test]
async fn test_single_handler_receives_fuse() {
    let seen = Arc::new(parking_lot::Mutex::new(None));
    let captured = seen.clone();
    let handler = BreakHandler::custom(move |fuse| {
        let captured = captured.clone();
        async move {
            *captured.lock() = Some(fuse);
            Ok(())
        }
    });
    let (fuse, _clock) = memory_fuse(default_config().on_break(vec![handler]));

    do_failure(&fuse).await;

    let received = seen.lock().take().expect("处理器应被调用");
    assert!(received.ptr_eq(&fuse));
}

/// 标准 log 处理器输出包含名称的日志
#[tokio::test]
async fn test_standard_log_handler() {
    let (logs, _guard) = capture_logs();
    let (fuse, _clock) = memory_fuse(default_config().on_break(vec![BreakHandler::named("log")]));

    do_failure(&fuse).await;

    let output = logs.contents();
    assert!(output.contains("Fuse 'name' has broken"), "{}", output);
    assert!(output.contains("ERROR"), "{}", output);
}

/// 所有处理器都被调用
#[tokio::test]
async fn test_all_handlers_called() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = counting_handler(calls.clone());
    let (fuse, _clock) = memory_fuse(default_config().on_break(vec![handler.clone(), handler]));

    do_failure(&fuse).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// 处理器失败被忽略，不影响熔断器状态
#[tokio::test]
async fn test_handler_failures_ignored() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (fuse, _clock) = memory_fuse(
        default_config().on_break(vec![failing_handler(), counting_handler(calls.clone())]),
    );

    let error = do_failure(&fuse).await;

    assert!(error.into_operation().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(fuse.is_open().await.unwrap());
    assert_eq!(fuse.failures().await.unwrap(), 1);
}

/// 超时的处理器被中断，后续处理器继续执行
#[tokio::test]
async fn test_long_handlers_interrupted() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (fuse, _clock) = memory_fuse(default_config().on_break(vec![
        slow_handler(calls.clone(), Duration::from_secs(10)),
        counting_handler(calls.clone()),
    ]));
    fuse.set_break_handler_timeout(Duration::from_millis(100));

    let started = std::time::Instant::now();
    do_failure(&fuse).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// 未知名称被静默忽略
#[tokio::test]
async fn test_unknown_handler_names_dropped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (fuse, _clock) = memory_fuse(default_config().on_break(vec![
        BreakHandler::named("rails_log"),
        counting_handler(calls.clone()),
    ]));

    do_failure(&fuse).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(fuse.is_open().await.unwrap());
}
