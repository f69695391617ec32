//! SMART Report Handling
//!
//! Decoding of smartctl JSON output, normalization into telemetry
//! snapshots, and health scoring.

pub mod health;
pub mod normalizer;
pub mod report;

pub use health::*;
pub use normalizer::*;
pub use report::*;
