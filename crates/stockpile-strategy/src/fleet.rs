//! Point-in-time view of the bare-metal fleet
//!
//! An [`InventorySnapshot`] is built once per poll from the raw records the
//! inventory service returned, then read without locking by everything
//! downstream. It is never mutated; the next poll publishes a fresh one.

use stockpile_common::{ImageId, NodeRecord, NodeUuid, ProvisionState};
use tracing::warn;

/// A single bare-metal node, normalized from its wire record
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Node unique identifier
    pub uuid: NodeUuid,
    /// Hardware flavor class, if the operator tagged one
    pub flavor: Option<String>,
    /// Provision state reported by the inventory service
    pub provision_state: ProvisionState,
    /// Present when the node is provisioned to an end user
    pub instance_uuid: Option<String>,
    /// Image currently staged on the node, if any
    pub cached_image: Option<ImageId>,
    /// Last-modified timestamp of the inventory record (ISO-8601)
    pub updated_at: Option<String>,
}

impl Node {
    /// Whether this node is provisioned to an end user
    ///
    /// Provisioned nodes are never caching or ejection targets.
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.instance_uuid.is_some() || self.provision_state == ProvisionState::Active
    }

    /// Whether an image is currently staged on this node
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cached_image.is_some()
    }

    /// Normalize a wire record, rejecting records without the fields the
    /// strategy cannot work without
    fn from_record(record: NodeRecord) -> Option<Self> {
        let Some(uuid) = record.uuid else {
            warn!("Skipping inventory record without a uuid");
            return None;
        };
        let Some(provision_state) = record.provision_state else {
            warn!("Skipping inventory record {uuid} without a provision_state");
            return None;
        };

        Some(Self {
            uuid: NodeUuid::new(uuid),
            flavor: record.extra.flavor,
            provision_state: ProvisionState::parse(&provision_state),
            instance_uuid: record.instance_uuid,
            cached_image: record.driver_info.cache_image_id.map(ImageId::new),
            updated_at: record.updated_at,
        })
    }
}

/// Immutable view of the fleet, built from one inventory poll
#[derive(Clone, Debug, Default)]
pub struct InventorySnapshot {
    nodes: Vec<Node>,
    skipped: usize,
}

impl InventorySnapshot {
    /// Build a snapshot from already-normalized nodes
    #[must_use]
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes, skipped: 0 }
    }

    /// Build a snapshot from raw inventory records
    ///
    /// Malformed records (missing `uuid` or `provision_state`) are skipped
    /// and counted; one bad record never fails the poll.
    #[must_use]
    pub fn from_records(records: Vec<NodeRecord>) -> Self {
        let total = records.len();
        let nodes: Vec<Node> = records.into_iter().filter_map(Node::from_record).collect();
        let skipped = total - nodes.len();
        Self { nodes, skipped }
    }

    /// All nodes in the snapshot, provisioned or not
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Nodes that are candidates for caching decisions
    pub fn eligible_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.is_provisioned())
    }

    /// Number of eligible nodes currently holding a cached image
    #[must_use]
    pub fn cached_eligible_count(&self) -> usize {
        self.eligible_nodes().filter(|n| n.is_cached()).count()
    }

    /// Total node count
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot holds no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of malformed records skipped while building this snapshot
    #[must_use]
    pub fn skipped_records(&self) -> usize {
        self.skipped
    }
}
