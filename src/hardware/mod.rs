//! Hardware Module
//!
//! Provides device discovery, smartctl report decoding, normalization and
//! health scoring.

pub mod discovery;
pub mod smart;

pub use discovery::*;
pub use smart::*;
