//! Job execution engine.
//!
//! [`runner::JobRunner`] drives one job through its lifecycle against the
//! execution backend; [`dispatcher::DueJobDispatcher`] starts every pending
//! job whose scheduled time has arrived.

pub mod dispatcher;
pub mod runner;
