//! 端到端测试：熔断器完整生命周期
//!
//! 测试场景：
//! 1. 正常调用，失败计数被清零
//! 2. 一次失败后熔断，处理器被通知
//! 3. 熔断期间调用被快速拒绝，被包装的操作不会执行
//! 4. 冷却期过后的首次调用关闭熔断器
//! 5. 手动重置

use crate::common::*;
use fuseguard::error::FuseState;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_fuse_lifecycle() {
    let notified = Arc::new(AtomicUsize::new(0));
    let (fuse, clock) =
        memory_fuse(default_config().on_break(vec![counting_handler(notified.clone())]));

    // 1. 正常调用
    assert!(do_success(&fuse).await.is_ok());
    assert_eq!(fuse.failures().await.unwrap(), 0);
    assert_eq!(fuse.state().await.unwrap(), FuseState::Closed);

    // 2. 失败后熔断
    let error = do_failure(&fuse).await;
    assert_eq!(error.to_string(), "Exceptional code");
    assert!(fuse.is_open().await.unwrap());
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    // 3. 快速失败，操作不执行
    let executed = Arc::new(AtomicUsize::new(0));
    let counter = executed.clone();
    let result = fuse
        .wrap(|| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), io::Error>(())
        })
        .await;
    assert!(result.unwrap_err().is_fast_failure());
    assert_eq!(executed.load(Ordering::SeqCst), 0);

    // 冷却期内仍然拒绝
    clock.advance(Duration::from_secs(30));
    assert!(do_success(&fuse).await.unwrap_err().is_fast_failure());
    // 快速失败不算作失败，也不重复通知
    assert_eq!(fuse.failures().await.unwrap(), 1);
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    // 4. 冷却期后恢复
    clock.advance(Duration::from_secs(31));
    assert!(do_success(&fuse).await.is_ok());
    assert!(!fuse.is_open().await.unwrap());
    assert_eq!(fuse.failures().await.unwrap(), 0);

    // 5. 再次熔断后手动重置
    do_failure(&fuse).await;
    assert!(fuse.is_open().await.unwrap());
    assert_eq!(notified.load(Ordering::SeqCst), 2);

    fuse.reset().await.unwrap();
    let stats = fuse.stats().await.unwrap();
    assert_eq!(stats.state, FuseState::Closed);
    assert_eq!(stats.failures, 0);
    assert!(stats.last_failure_at.is_none());
    assert!(do_success(&fuse).await.is_ok());
}

/// 多个进程（此处用多个实例模拟）通过共享存储协同熔断
#[tokio::test]
async fn test_shared_storage_across_instances() {
    use fuseguard::clock::ManualClock;

    let storage = create_memory_storage();
    let clock = Arc::new(ManualClock::starting_now());
    let config = fuseguard::config::FuseConfig::new(3, Duration::from_secs(60));
    let first = create_fuse(storage.clone(), config.clone(), clock.clone());
    let second = create_fuse(storage.clone(), config, clock.clone());

    do_failure(&first).await;
    do_failure(&second).await;
    do_failure(&first).await;

    assert!(second.is_open().await.unwrap());
    assert!(do_success(&second).await.unwrap_err().is_fast_failure());

    clock.advance(Duration::from_secs(61));
    assert!(do_success(&second).await.is_ok());
    assert!(!first.is_open().await.unwrap());
}
