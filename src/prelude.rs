//! Prelude module - Commonly used types for quick imports
//!
//! This module re-exports the most commonly used types from fuseguard,
//! allowing users to import them with a single `use fuseguard::prelude::*;`
//! statement instead of importing each type individually.

// Core types - always available
pub use crate::config::{FuseConfig, FuseSettings};
pub use crate::error::{FuseError, FuseState};
pub use crate::fuse::Fuse;
pub use crate::handlers::BreakHandler;

// Storage
pub use crate::storage::{MemoryStorage, StateStorage};

// Feature-gated exports
#[cfg(feature = "redis")]
pub use crate::redis_storage::{RedisConfig, RedisStorage};
