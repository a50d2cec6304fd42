//! Domain logic for scheduling inference jobs against an electricity price
//! forecast.
//!
//! Everything in this crate is pure: no network, no database, no clocks
//! except where a caller passes one in. The `db`, `inference` and `api`
//! crates build on these types.

pub mod accuracy;
pub mod error;
pub mod estimation;
pub mod prediction;
pub mod pricing;
pub mod scheduling;
pub mod types;
