//! Point-in-time view of the image catalog
//!
//! A [`CatalogSnapshot`] joins one catalog poll with the statically
//! configured per-image weights. Same lifecycle discipline as the fleet
//! snapshot: built once per poll, read-only, replaced wholesale.

use std::collections::{BTreeMap, HashMap};
use stockpile_common::{ImageId, ImageRecord};
use tracing::warn;

/// An operating-system image with its configured selection weight
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    /// Catalog identifier
    pub id: ImageId,
    /// Human-readable name; weights are keyed by this
    pub name: String,
    /// Selection weight; 0 means never select
    pub weight: u32,
}

/// Immutable id→image view, built from one catalog poll
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    images: BTreeMap<ImageId, Image>,
    skipped: usize,
}

impl CatalogSnapshot {
    /// Build a snapshot from raw catalog records and the configured weights
    ///
    /// Images absent from `weights` receive `default_weight`; with the
    /// default of 0 they are excluded from selection entirely. Records
    /// missing `id` or `name` are skipped and counted.
    #[must_use]
    pub fn from_records(
        records: Vec<ImageRecord>,
        weights: &HashMap<String, u32>,
        default_weight: u32,
    ) -> Self {
        let total = records.len();
        let mut images = BTreeMap::new();

        for record in records {
            let (Some(id), Some(name)) = (record.id, record.name) else {
                warn!("Skipping catalog record without an id or name");
                continue;
            };
            let weight = weights.get(&name).copied().unwrap_or(default_weight);
            let id = ImageId::new(id);
            images.insert(
                id.clone(),
                Image {
                    id,
                    name,
                    weight,
                },
            );
        }

        let skipped = total - images.len();
        Self { images, skipped }
    }

    /// Look up an image by id
    #[must_use]
    pub fn get(&self, id: &ImageId) -> Option<&Image> {
        self.images.get(id)
    }

    /// Whether the catalog still carries this image
    #[must_use]
    pub fn contains(&self, id: &ImageId) -> bool {
        self.images.contains_key(id)
    }

    /// Images with a weight greater than zero, in stable id order
    #[must_use]
    pub fn selectable_images(&self) -> Vec<&Image> {
        self.images.values().filter(|i| i.weight > 0).collect()
    }

    /// Total image count
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the catalog holds no images
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Number of malformed records skipped while building this snapshot
    #[must_use]
    pub fn skipped_records(&self) -> usize {
        self.skipped
    }
}
