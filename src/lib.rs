//! # msgrelay
//!
//! `msgrelay` accepts short text messages over HTTP, stores each one durably,
//! and relays it through a message broker to an asynchronous worker that marks
//! it processed.
//!
//! ## Core Modules
//!
//! - `broker`: producer/consumer facets over a named channel, with an
//!   in-process backend and an optional Kafka backend.
//! - `config`: layered configuration (file, then `MSGRELAY__*` environment).
//! - `persistence`: the record store contract and its sled and in-memory
//!   backends.
//! - `relay`: the submit path and the consume loop with bounded retry.
//! - `transport`: the HTTP API.
//! - `utils`: the classified error type, logging and signal handling.
//! - `validation`: content and id checks applied at the boundary.

pub mod broker;
pub mod config;
pub mod persistence;
pub mod relay;
pub mod transport;
pub mod utils;
pub mod validation;
