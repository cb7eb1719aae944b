//! The `relay` module is the delivery pipeline between the record store and
//! the broker.
//!
//! - [`MessageService`]: the synchronous path. `submit` stores a record and
//!   publishes its envelope; the rest are direct store operations.
//! - [`RelayWorker`]: the asynchronous path. Pulls envelopes and marks their
//!   records processed under a [`RetryPolicy`].
//!
//! Both share the same store and broker handles; neither adds locking of its
//! own.

pub mod retry;
pub mod service;
pub mod worker;

pub use retry::{ApplyOutcome, RetryPolicy, apply_with_retry};
pub use service::{MessageService, SubmitError};
pub use worker::{READ_FAILURE_PAUSE, RelayReport, RelayWorker};
