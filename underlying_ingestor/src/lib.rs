//! Vendor side of the underlying-info ETL.
//!
//! - [`models`] holds the vendor-agnostic tabular result ([`models::RowSet`]).
//! - [`providers`] defines the [`providers::DataProvider`] trait and the
//!   IVolatility REST implementation.

pub mod models;
pub mod providers;
