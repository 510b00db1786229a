//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for fuseguard.
//!
//! This module provides well-documented constants used throughout the library.
//! All magic numbers are defined here with their purpose and usage context.

// ============================================================================
// Fuse Constants
// ============================================================================

/// Default maximum execution time for a single break handler (5 seconds).
///
/// Each `on_break` handler is abandoned once it runs longer than this.
/// Adjustable per fuse via [`Fuse::set_break_handler_timeout()`].
///
/// [`Fuse::set_break_handler_timeout()`]: crate::fuse::Fuse::set_break_handler_timeout
pub const DEFAULT_BREAK_HANDLER_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Storage Constants
// ============================================================================

/// Field holding the fuse state (`"closed"` / `"open"`).
pub const FIELD_STATE: &str = "state";

/// Field holding the consecutive failure counter.
pub const FIELD_FAILURES: &str = "failures";

/// Field holding the Unix timestamp (milliseconds) of the last real failure.
pub const FIELD_LAST_FAILURE_AT: &str = "last_failure_at";

/// Default key prefix used by shared backends.
///
/// Redis stores one hash per fuse at `<prefix>:<name>`.
pub const DEFAULT_KEY_PREFIX: &str = "fuse";

/// Maximum fuse name length (255 characters).
///
/// Shared backends embed the name in keys, so it is bounded.
pub const MAX_FUSE_NAME_LENGTH: usize = 255;

// ============================================================================
// Standard Handler Names
// ============================================================================

/// Standard handler logging the break at `error` level.
pub const HANDLER_LOG: &str = "log";

/// Standard handler logging the break at `warn` level.
pub const HANDLER_WARN: &str = "warn";
