//! Facility data source boundary.
//!
//! A source answers `GET <endpoint>` with an array of raw records. The HTTP
//! implementation is [`HttpSource`]; tests substitute in-process fakes.

mod http;

use std::future::Future;
use thiserror::Error;

use crate::models::RawRecord;

pub use http::{parse_payload, HttpSource};

/// Why a dataset could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed payload from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

/// Fetches the raw record array behind an endpoint
pub trait DatasetSource: Send + Sync {
    fn fetch(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<Vec<RawRecord>, FetchError>> + Send;
}
