//! # Crossvisor Common
//!
//! Shared utilities for the Crossvisor components.
//!
//! ## Logging
//!
//! ```rust
//! use crossvisor_common::init_logging;
//!
//! init_logging("info").unwrap();
//! ```

pub mod logging;

pub use logging::{init_logging, init_logging_json};
