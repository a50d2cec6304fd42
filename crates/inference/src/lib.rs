//! Clients for the services a scheduler depends on but does not own.
//!
//! Each collaborator sits behind an async trait so the server and tests can
//! swap implementations:
//!
//! - [`PredictionService`]: runtime/power/cost prediction for a model run.
//! - [`PriceSource`]: electricity price lookup and forecast.
//! - [`ExecutionBackend`]: runs the actual inference for a job.
//!
//! The HTTP implementations bound every call with a timeout. The helpers in
//! [`fallback`] turn upstream failures into the documented defaults.

pub mod api;
pub mod execution;
pub mod fallback;
pub mod prediction;
pub mod price;

pub use api::InferenceApiError;
pub use execution::{
    ExecutionBackend, ExecutionError, ExecutionOutcome, ExecutionRequest, HttpExecutionBackend,
};
pub use prediction::{HttpPredictionService, PredictionRequest, PredictionService};
pub use price::{HttpPriceSource, PriceSource};
