//! # optron-shared
//!
//! Foundational types used by every optron crate:
//!
//! - the structured error envelope and its classification
//! - bounded numeric wrappers for validated configuration
//! - the cancellation token every background task stops on
//!
//! This crate only depends on external crates.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod errors;
pub mod invariants;

pub use errors::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata, is_transient_io};
pub use invariants::{BoundedU32, BoundedU64, BoundsError};
pub use tokio_util::sync::CancellationToken;

/// Shared result type used across the workspace.
pub type Result<T, E = ErrorEnvelope> = std::result::Result<T, E>;

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
