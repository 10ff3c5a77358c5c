//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! transport / compose / api produce:
//!     → tracing events (structured fields: tag, command, unit, address)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, text or JSON)
//!     → whatever `metrics` recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a metrics exporter itself
//! - Logging setup is opt-in and tolerates an already-installed subscriber

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
