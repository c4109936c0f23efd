//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! relay sessions produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!     → spans.rs (connection and request spans with correlation IDs)
//!
//! Consumers:
//!     → stdout (plain or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every request carries a UUID `request_id` inside its connection's span
//! - Metrics are cheap (atomic increments), and free when no recorder is installed

pub mod logging;
pub mod metrics;
pub mod spans;
