//! Background tasks.
//!
//! Each task accepts a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! for graceful shutdown.

pub mod job_poll;
pub mod price_poll;
