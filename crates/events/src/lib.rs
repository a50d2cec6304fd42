//! Event bus and periodic refresh infrastructure.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`SchedulerEvent`]: job lifecycle event envelope.
//! - [`RefreshHandle`]: cancelable periodic refresh publishing through a
//!   `watch` channel.

pub mod bus;
pub mod refresh;

pub use bus::{EventBus, SchedulerEvent};
pub use refresh::RefreshHandle;
