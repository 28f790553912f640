//! Bare-metal inventory service client

use crate::{build_http_client, normalize_endpoint, transient_http_error};
use async_trait::async_trait;
use stockpile_common::{NodeListResponse, NodeRecord, Result};

/// Client for the bare-metal inventory service
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Fetch the detailed record of every node in the fleet
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>>;
}

/// HTTP implementation against `GET {api_endpoint}/nodes/detail`
pub struct HttpInventoryClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpInventoryClient {
    /// Create a client for the given base endpoint
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            endpoint: normalize_endpoint(endpoint),
        })
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>> {
        let url = format!("{}/nodes/detail", self.endpoint);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transient_http_error("inventory", &e))?
            .error_for_status()
            .map_err(|e| transient_http_error("inventory", &e))?;

        let body: NodeListResponse = response
            .json()
            .await
            .map_err(|e| transient_http_error("inventory", &e))?;
        Ok(body.nodes)
    }
}
