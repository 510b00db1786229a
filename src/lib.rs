//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! fuseguard - Storage-backed circuit breaker
//!
//! Protects callers from repeatedly invoking a failing operation. A [`Fuse`] counts
//! consecutive failures of a named resource, trips to fail-fast once the threshold is
//! reached, and closes again after a cool-off period. All breaker state lives in a
//! pluggable [`StateStorage`], so fuses with the same name share one failure history,
//! even across processes.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use fuseguard::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`Fuse`] - The breaker state machine
//! - [`FuseConfig`] / [`FuseSettings`] - Runtime and declarative configuration
//! - [`BreakHandler`] - Notifications fired when a fuse breaks
//! - [`FuseError`] - Error returned by [`Fuse::wrap`]
//!
//! ## Storage
//!
//! - [`MemoryStorage`] - In-process reference backend
//! - `RedisStorage` - Shared backend (requires `redis` feature)
//!
//! # Examples
//!
//! ```rust
//! use fuseguard::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     // 失败1次即熔断，60秒后尝试恢复
//!     let config = FuseConfig::new(1, Duration::from_secs(60))
//!         .add_break_handler(BreakHandler::named("log"));
//!     let fuse = Fuse::new("payments", Arc::new(MemoryStorage::new()), config).unwrap();
//!
//!     let result = fuse.wrap(|| async { Err::<(), _>("gateway down") }).await;
//!     assert!(matches!(result, Err(FuseError::Operation("gateway down"))));
//!
//!     // 熔断器已打开，操作不再执行
//!     let result = fuse.wrap(|| async { Ok::<(), &str>(()) }).await;
//!     assert!(result.unwrap_err().is_fast_failure());
//! }
//! ```
//!
//! # Features
//!
//! - **Shared state**: failure counters live in storage, keyed by fuse name
//! - **Lazy recovery**: cool-off is checked on the next call, no background tasks
//! - **Bounded execution**: optional per-call timeout, counted as a failure
//! - **Isolated notifications**: break handlers are time-bounded and never affect the caller

pub mod prelude;

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod fuse;
pub mod handlers;
#[cfg(feature = "redis")]
pub mod redis_storage;
pub mod storage;
#[cfg(feature = "telemetry")]
pub mod telemetry;

// 重新导出常用类型
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FuseConfig, FuseSettings};
pub use error::{ConfigError, FuseError, FuseState, FuseStats, StorageError};
pub use fuse::{Fuse, FuseBuilder};
pub use handlers::{
    standard_handler, standard_handler_names, BreakDispatcher, BreakHandler, DispatchReport,
};
#[cfg(feature = "redis")]
pub use redis_storage::{RedisConfig, RedisStorage};
pub use storage::{Field, MemoryStorage, StateStorage, UnimplementedStorage};
#[cfg(feature = "telemetry")]
pub use telemetry::init_tracing;
