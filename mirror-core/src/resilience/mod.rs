//! Retry policy for transient exchange failures.
//!
//! The executor's dispatcher consults [`ExponentialBackoff`] whenever an
//! [`crate::core::ExecutionError`] classifies as transient; permanent
//! errors skip straight to being dropped and logged.

pub mod backoff;

pub use backoff::{BackoffConfig, ExponentialBackoff};
