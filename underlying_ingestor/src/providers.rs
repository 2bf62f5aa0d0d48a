//! Provider abstraction for the underlying-info dataset.
//!
//! This module defines the [`DataProvider`] trait, the single seam between the
//! ETL pipeline and a market-data vendor. The production implementation is
//! [`ivol_rest::IvolProvider`]; tests substitute their own.
//!
//! The trait is async and object safe, so callers can hold a
//! `Box<dyn DataProvider>` and pick the vendor at runtime.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use underlying_ingestor::models::{RowSet, UnderlyingInfoParams};
//! use underlying_ingestor::providers::{DataProvider, ProviderError};
//!
//! struct EmptyProvider;
//!
//! #[async_trait]
//! impl DataProvider for EmptyProvider {
//!     async fn fetch_underlying_info(
//!         &self,
//!         _params: &UnderlyingInfoParams,
//!     ) -> Result<RowSet, ProviderError> {
//!         Ok(RowSet::new())
//!     }
//! }
//! ```

pub mod ivol_rest;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::{RowSet, UnderlyingInfoParams};

/// Fetches the underlying-info snapshot from a market data vendor.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches every record the vendor publishes for `params.date`.
    ///
    /// An empty [`RowSet`] is a valid answer (no data for that date), not an
    /// error.
    async fn fetch_underlying_info(
        &self,
        params: &UnderlyingInfoParams,
    ) -> Result<RowSet, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// The API key was empty.
    #[snafu(display("API key is empty"))]
    EmptyApiKey { backtrace: Backtrace },

    /// The configured base URL does not parse.
    #[snafu(display("Invalid base URL {url:?}: {message}"))]
    InvalidBaseUrl {
        url: String,
        message: String,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `DataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The vendor answered with an error status or an error payload.
    #[snafu(display("API error (HTTP {status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The payload could not be turned into a row set.
    #[snafu(display("Malformed response: {message}"))]
    Decode {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}
