//! API Module
//!
//! REST API over the health monitor service, and the server that hosts it.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
