//! The `transport` module is the request boundary: an HTTP API in front of
//! the relay.
//!
//! It validates content and ids before calling the core, shapes JSON, and
//! turns classified errors into status codes. Routes:
//!
//! - `POST /messages` submit a message
//! - `GET /messages`, `GET /messages/{id}` read records
//! - `PUT /messages/{id}/process` mark a message processed
//! - `GET /statistics` processed / unprocessed counts
//! - `GET /health` liveness

pub mod http;
pub mod message;

pub use http::{AppState, router, start_http_server};

#[cfg(test)]
mod tests;
