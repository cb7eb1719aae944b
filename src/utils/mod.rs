//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `msgrelay` application.
//!
//! It centralizes the classified error type shared by the store and broker
//! clients, the logging bootstrap, and the signal handler used by the binary.

pub mod error;
pub mod logging;
pub mod shutdown;

pub use error::{Error, ErrorKind, Result};
