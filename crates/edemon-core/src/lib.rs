//! # edemon-core - Core Types
//!
//! Foundation crate for Emulator Demon. Provides error handling, logging setup
//! and the [`Deadline`] countdown used to bound every wait on an external
//! process or device.
//!
//! This crate has **zero internal dependencies**.
//!
//! ## Public API
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum with a `fatal` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ### Deadlines (`deadline`)
//! - [`Deadline`] - Countdown with remaining/elapsed queries
//! - [`TimeUnit`] - Deadline granularity (sub-second units are rejected)
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use edemon_core::prelude::*;
//! ```

pub mod deadline;
pub mod error;
pub mod logging;

/// Prelude for common imports used throughout all Emulator Demon crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use deadline::{Deadline, TimeUnit};
pub use error::{Error, Result, ResultExt};
