//! Small helpers shared by the ETL crates: environment lookups and the
//! configuration error they produce.

pub mod config;
pub mod env;
