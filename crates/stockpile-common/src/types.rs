//! Core type definitions for Stockpile
//!
//! This module defines the fundamental types used throughout the system:
//! identifiers, provision states, directives, and the wire records returned
//! by the inventory and image catalog services.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a bare-metal node, as reported by the inventory
/// service.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct NodeUuid(String);

impl NodeUuid {
    /// Create a new node identifier
    #[must_use]
    pub fn new(uuid: impl Into<String>) -> Self {
        Self(uuid.into())
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NodeUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeUuid({})", self.0)
    }
}

impl From<&str> for NodeUuid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for an operating-system image in the catalog
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct ImageId(String);

impl ImageId {
    /// Create a new image identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageId({})", self.0)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Provision state of a bare-metal node
///
/// Unknown states are preserved verbatim rather than rejected: the
/// inventory service grows new states faster than its consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProvisionState {
    /// Idle and ready for caching or provisioning
    Available,
    /// Provisioned to an end user
    Active,
    /// Being wiped between tenants
    Cleaning,
    /// Deployment in progress
    Deploying,
    /// Enrolled but not yet available
    Enroll,
    /// Any state this build does not recognize
    Other(String),
}

impl ProvisionState {
    /// Parse a provision state string from the inventory service
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "available" => Self::Available,
            "active" => Self::Active,
            "cleaning" => Self::Cleaning,
            "deploying" => Self::Deploying,
            "enroll" => Self::Enroll,
            other => Self::Other(other.to_string()),
        }
    }

    /// Get the wire representation of this state
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "available",
            Self::Active => "active",
            Self::Cleaning => "cleaning",
            Self::Deploying => "deploying",
            Self::Enroll => "enroll",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The two kinds of directive the strategy engine can emit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// Stage an image on an idle node
    Cache,
    /// Remove a staged image from a node
    Eject,
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Eject => write!(f, "eject"),
        }
    }
}

/// An instruction from the strategy engine to the hardware-management layer
///
/// Directives are produced fresh each cycle and consumed once; they are
/// never persisted. A lost directive is re-derived on the next cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Stage `image` on `node`
    Cache { node: NodeUuid, image: ImageId },
    /// Remove the staged image from `node`
    Eject { node: NodeUuid },
}

impl Directive {
    /// Get the kind of this directive
    #[must_use]
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Self::Cache { .. } => DirectiveKind::Cache,
            Self::Eject { .. } => DirectiveKind::Eject,
        }
    }

    /// Get the node this directive targets
    #[must_use]
    pub fn node(&self) -> &NodeUuid {
        match self {
            Self::Cache { node, .. } | Self::Eject { node } => node,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache { node, image } => write!(f, "cache image {image} on node {node}"),
            Self::Eject { node } => write!(f, "eject cached image from node {node}"),
        }
    }
}

// ── Wire records ──────────────────────────────────────────────────────────────

/// Raw node record from `GET nodes/detail`
///
/// Every field is optional at the wire level; the snapshot builder decides
/// which absences make a record malformed.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub provision_state: Option<String>,
    /// Present when the node is provisioned to an end user
    #[serde(default)]
    pub instance_uuid: Option<String>,
    #[serde(default)]
    pub extra: NodeExtra,
    #[serde(default)]
    pub driver_info: DriverInfo,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Operator-defined extra fields on a node record
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct NodeExtra {
    #[serde(default)]
    pub flavor: Option<String>,
}

/// Driver-specific fields on a node record
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DriverInfo {
    /// Image currently staged on the node, if any
    #[serde(default)]
    pub cache_image_id: Option<String>,
}

/// Response envelope for `GET nodes/detail`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NodeListResponse {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
}

/// Raw image record from `GET images`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ImageRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Response envelope for `GET images`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ImageListResponse {
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_state_parse() {
        assert_eq!(ProvisionState::parse("available"), ProvisionState::Available);
        assert_eq!(ProvisionState::parse("active"), ProvisionState::Active);
        assert_eq!(
            ProvisionState::parse("wait call-back"),
            ProvisionState::Other("wait call-back".to_string())
        );
        assert_eq!(ProvisionState::parse("cleaning").as_str(), "cleaning");
    }

    #[test]
    fn test_directive_accessors() {
        let cache = Directive::Cache {
            node: NodeUuid::new("n1"),
            image: ImageId::new("img1"),
        };
        let eject = Directive::Eject {
            node: NodeUuid::new("n2"),
        };

        assert_eq!(cache.kind(), DirectiveKind::Cache);
        assert_eq!(eject.kind(), DirectiveKind::Eject);
        assert_eq!(cache.node().as_str(), "n1");
        assert_eq!(eject.node().as_str(), "n2");
        assert_eq!(cache.to_string(), "cache image img1 on node n1");
    }

    #[test]
    fn test_node_record_deserialization() {
        let raw = r#"{
            "uuid": "5a8ad6a0-1d32-4b7a-ae84-f1a31e1c06c5",
            "provision_state": "available",
            "extra": {"flavor": "onmetal-io1"},
            "driver_info": {"cache_image_id": "img-42"},
            "updated_at": "2015-08-01T10:00:00+00:00"
        }"#;
        let record: NodeRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.uuid.as_deref(), Some("5a8ad6a0-1d32-4b7a-ae84-f1a31e1c06c5"));
        assert_eq!(record.provision_state.as_deref(), Some("available"));
        assert_eq!(record.extra.flavor.as_deref(), Some("onmetal-io1"));
        assert_eq!(record.driver_info.cache_image_id.as_deref(), Some("img-42"));
        assert!(record.instance_uuid.is_none());
    }

    #[test]
    fn test_node_record_missing_fields() {
        // A record with nothing but a uuid still deserializes; validity is
        // the snapshot builder's call, not the wire layer's.
        let record: NodeRecord = serde_json::from_str(r#"{"uuid": "abc"}"#).unwrap();
        assert_eq!(record.uuid.as_deref(), Some("abc"));
        assert!(record.provision_state.is_none());
        assert!(record.extra.flavor.is_none());
        assert!(record.driver_info.cache_image_id.is_none());
    }

    #[test]
    fn test_image_list_deserialization() {
        let raw = r#"{"images": [{"id": "img-1", "name": "Ubuntu 24.04"}, {"name": "orphan"}]}"#;
        let response: ImageListResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.images.len(), 2);
        assert_eq!(response.images[0].id.as_deref(), Some("img-1"));
        assert!(response.images[1].id.is_none());
    }
}
