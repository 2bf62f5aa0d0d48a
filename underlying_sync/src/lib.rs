//! Daily replace-load of the vendor's equities underlying reference table.
//!
//! The flow is fetch ([`underlying_ingestor`]), [`normalize`], then a single
//! transactional delete-and-insert through a [`db::ReferenceStore`], driven
//! by [`pipeline::Pipeline`].

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod pipeline;
