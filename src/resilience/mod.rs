//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to origin:
//!     → timeouts.rs (bounded connect)
//!     → interception starts → timeouts.rs (per-operation read/write deadline)
//!     → failure is fatal for the connection; nothing is retried
//! ```
//!
//! # Design Decisions
//! - Every origin call made on the client's behalf has a deadline
//! - No retries: a replay that fails leaves the origin in an unknown state

pub mod timeouts;

pub use timeouts::IoTimeout;
