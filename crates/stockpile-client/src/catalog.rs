//! Image catalog service client

use crate::{build_http_client, normalize_endpoint, transient_http_error};
use async_trait::async_trait;
use stockpile_common::{ImageListResponse, ImageRecord, Result};

/// Client for the image catalog service
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch every image currently offered by the catalog
    async fn list_images(&self) -> Result<Vec<ImageRecord>>;
}

/// HTTP implementation against `GET {api_endpoint}/images`
pub struct HttpCatalogClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpCatalogClient {
    /// Create a client for the given base endpoint
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            endpoint: normalize_endpoint(endpoint),
        })
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let url = format!("{}/images", self.endpoint);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transient_http_error("catalog", &e))?
            .error_for_status()
            .map_err(|e| transient_http_error("catalog", &e))?;

        let body: ImageListResponse = response
            .json()
            .await
            .map_err(|e| transient_http_error("catalog", &e))?;
        Ok(body.images)
    }
}
