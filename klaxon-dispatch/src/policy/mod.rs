//! Dispatch policies.

mod backoff;
mod deadline;
mod retry;

pub use backoff::calculate_backoff;
pub use deadline::{deadline_after, overruns};
pub use retry::RetryPolicy;
