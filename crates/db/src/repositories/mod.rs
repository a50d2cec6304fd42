//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async SQL methods
//! that accept `&PgPool` as the first argument.

pub mod job_repo;
