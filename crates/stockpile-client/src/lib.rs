//! Stockpile Client - outbound service clients
//!
//! Async traits for the three external collaborators (bare-metal
//! inventory, image catalog, node command surface) plus their HTTP
//! implementations. Retrying transient failures is this crate's concern;
//! the director never retries a call itself.

pub mod catalog;
pub mod command;
pub mod inventory;
pub mod retry;

pub use catalog::{CatalogClient, HttpCatalogClient};
pub use command::{HttpNodeCommandClient, NodeCommandClient};
pub use inventory::{HttpInventoryClient, InventoryClient};
pub use retry::{RetryPolicy, call_with_retries};

use stockpile_common::Error;

/// Default timeout for a single outbound HTTP request
pub(crate) const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Build the shared HTTP client used by all service clients
pub(crate) fn build_http_client() -> stockpile_common::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::configuration(format!("cannot build HTTP client: {e}")))
}

/// Map a reqwest failure onto the common error taxonomy
pub(crate) fn transient_http_error(service: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::transient_fetch(service, err.to_string())
    }
}

/// Normalize a configured base URL (no trailing slash)
pub(crate) fn normalize_endpoint(endpoint: impl Into<String>) -> String {
    endpoint.into().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("http://a:1/v1/"), "http://a:1/v1");
        assert_eq!(normalize_endpoint("http://a:1/v1"), "http://a:1/v1");
    }
}
