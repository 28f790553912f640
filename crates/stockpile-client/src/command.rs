//! Node command client
//!
//! Issues the actual cache/eject command against the inventory service's
//! node resource by patching `driver_info/cache_image_id`. This client
//! owns the retry policy; callers see one `Result` per command.

use crate::retry::{RetryPolicy, call_with_retries};
use crate::{build_http_client, normalize_endpoint};
use async_trait::async_trait;
use serde_json::{Value, json};
use stockpile_common::{DirectiveKind, Error, ImageId, NodeUuid, Result};

/// Client that executes cache/eject commands on hardware
#[async_trait]
pub trait NodeCommandClient: Send + Sync {
    /// Stage `image` on `node`
    async fn cache_image(&self, node: &NodeUuid, image: &ImageId) -> Result<()>;

    /// Remove the staged image from `node`
    async fn eject_image(&self, node: &NodeUuid) -> Result<()>;
}

/// HTTP implementation against `PATCH {api_endpoint}/nodes/{uuid}`
pub struct HttpNodeCommandClient {
    http: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl HttpNodeCommandClient {
    /// Create a client for the given base endpoint and retry policy
    pub fn new(endpoint: impl Into<String>, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            endpoint: normalize_endpoint(endpoint),
            retry,
        })
    }

    async fn patch_node(&self, kind: DirectiveKind, node: &NodeUuid, body: Value) -> Result<()> {
        let url = format!("{}/nodes/{}", self.endpoint, node);
        let operation = format!("{kind} node {node}");

        call_with_retries(&operation, &self.retry, || {
            // The request builder owns its client handle, so each attempt
            // gets a fresh request without borrowing from the closure.
            let request = self.http.patch(&url).json(&body);
            let node = node.clone();
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| dispatch_error(kind, &node, &e.to_string()))?;
                response
                    .error_for_status()
                    .map_err(|e| dispatch_error(kind, &node, &e.to_string()))?;
                Ok(())
            }
        })
        .await
    }
}

#[async_trait]
impl NodeCommandClient for HttpNodeCommandClient {
    async fn cache_image(&self, node: &NodeUuid, image: &ImageId) -> Result<()> {
        self.patch_node(DirectiveKind::Cache, node, cache_patch_body(image))
            .await
    }

    async fn eject_image(&self, node: &NodeUuid) -> Result<()> {
        self.patch_node(DirectiveKind::Eject, node, eject_patch_body())
            .await
    }
}

fn dispatch_error(kind: DirectiveKind, node: &NodeUuid, reason: &str) -> Error {
    Error::DirectiveDispatch {
        kind,
        node: node.clone(),
        reason: reason.to_string(),
    }
}

fn cache_patch_body(image: &ImageId) -> Value {
    json!([{
        "op": "add",
        "path": "/driver_info/cache_image_id",
        "value": image.as_str(),
    }])
}

fn eject_patch_body() -> Value {
    json!([{
        "op": "remove",
        "path": "/driver_info/cache_image_id",
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_patch_body() {
        let body = cache_patch_body(&ImageId::new("img-42"));
        assert_eq!(body[0]["op"], "add");
        assert_eq!(body[0]["path"], "/driver_info/cache_image_id");
        assert_eq!(body[0]["value"], "img-42");
    }

    #[test]
    fn test_eject_patch_body() {
        let body = eject_patch_body();
        assert_eq!(body[0]["op"], "remove");
        assert_eq!(body[0]["path"], "/driver_info/cache_image_id");
        assert!(body[0].get("value").is_none());
    }
}
