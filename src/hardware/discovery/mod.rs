//! Device Discovery Module
//!
//! Finds SMART-capable devices and reads their telemetry through smartctl,
//! including bridge-hint fallback for USB enclosures.

pub mod metadata;
pub mod process;
pub mod prober;
pub mod reader;
pub mod scanner;

pub use metadata::*;
pub use process::*;
pub use prober::*;
pub use reader::*;
pub use scanner::*;
