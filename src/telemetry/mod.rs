//! Telemetry Module
//!
//! History persistence, the background collector and its metrics.

pub mod collector;
pub mod metrics;
pub mod store;

pub use collector::*;
pub use metrics::*;
pub use store::*;
