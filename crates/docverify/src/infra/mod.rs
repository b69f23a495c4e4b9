//! Infrastructure adapters for config, logging, and the compiler service.

pub mod compiler;
pub mod config;
pub mod logging;
