//! IVolatility REST API (`restapi.ivolatility.com`).

pub mod params;
pub mod provider;
pub mod response;

pub use provider::IvolProvider;
