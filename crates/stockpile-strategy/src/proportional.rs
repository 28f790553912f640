//! Proportional caching strategy
//!
//! Keeps a configured fraction of the eligible fleet pre-loaded with
//! images, balanced across the three flavor classes the fleet is
//! provisioned in.

use crate::catalog::{CatalogSnapshot, Image};
use crate::fleet::{InventorySnapshot, Node};
use crate::strategy::{Evaluation, Strategy};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use stockpile_common::config::{EjectionPolicy, StrategyConfig};
use stockpile_common::{Directive, Error, NodeUuid, Result};
use xxhash_rust::xxh64::xxh64;

/// The fleet is provisioned in lock-step triads of three flavor classes;
/// cache targets stay divisible by this so no class skews.
const FLAVOR_CLASSES: usize = 3;

/// Number of eligible nodes that should hold a cached image
///
/// Integer-divide by the triad size first, floor, then multiply back: the
/// result is always a multiple of three, so the cached set divides evenly
/// across flavor classes. Floor-then-multiply, never round-to-nearest.
#[must_use]
pub fn cache_target(eligible: usize, percentage: f64) -> usize {
    (((eligible / FLAVOR_CLASSES) as f64 * percentage).floor() as usize) * FLAVOR_CLASSES
}

/// Strategy that caches a fixed percentage of the eligible fleet
pub struct SimpleProportionalStrategy {
    percentage_to_cache: f64,
    ejection_policy: EjectionPolicy,
}

impl SimpleProportionalStrategy {
    /// Name this strategy registers under
    pub const NAME: &'static str = "simple_proportional";

    /// Create a strategy with an explicit percentage and ejection policy
    #[must_use]
    pub fn new(percentage_to_cache: f64, ejection_policy: EjectionPolicy) -> Self {
        Self {
            percentage_to_cache,
            ejection_policy,
        }
    }

    /// Create a strategy from validated configuration
    #[must_use]
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.percentage_to_cache, config.ejection_policy)
    }

    /// Order over-quota cached nodes so the first `excess` are ejected
    fn order_for_ejection(&self, cached: &mut [&Node], catalog: &CatalogSnapshot) {
        match self.ejection_policy {
            EjectionPolicy::OldestFirst => {
                // ISO-8601 timestamps order lexicographically; missing
                // timestamps sort first so untracked nodes are reclaimed
                // before freshly-touched ones.
                cached.sort_by(|a, b| {
                    a.updated_at
                        .cmp(&b.updated_at)
                        .then_with(|| a.uuid.cmp(&b.uuid))
                });
            }
            EjectionPolicy::LightestImageFirst => {
                cached.sort_by(|a, b| {
                    cached_weight(a, catalog)
                        .cmp(&cached_weight(b, catalog))
                        .then_with(|| a.uuid.cmp(&b.uuid))
                });
            }
        }
    }
}

impl Strategy for SimpleProportionalStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn evaluate(
        &self,
        inventory: &InventorySnapshot,
        catalog: &CatalogSnapshot,
    ) -> Result<Evaluation> {
        let selectable = catalog.selectable_images();
        if selectable.is_empty() {
            return Err(Error::InsufficientImages);
        }

        let eligible: Vec<&Node> = inventory.eligible_nodes().collect();
        let cached_total = eligible.iter().filter(|n| n.is_cached()).count();
        let target = cache_target(eligible.len(), self.percentage_to_cache);
        let quota = target / FLAVOR_CLASSES;

        let mut cache_directives = Vec::new();
        let mut eject_directives = Vec::new();

        // A cached image that vanished from the catalog is stale: eject it
        // now and treat the node as uncached for target arithmetic. The
        // node becomes a caching candidate again next cycle.
        let mut stale: HashSet<&NodeUuid> = HashSet::new();
        for node in &eligible {
            if let Some(image) = &node.cached_image
                && !catalog.contains(image)
            {
                eject_directives.push(Directive::Eject {
                    node: node.uuid.clone(),
                });
                stale.insert(&node.uuid);
            }
        }

        let mut by_flavor: BTreeMap<&str, Vec<&Node>> = BTreeMap::new();
        for node in &eligible {
            by_flavor
                .entry(node.flavor.as_deref().unwrap_or(""))
                .or_default()
                .push(node);
        }

        for nodes in by_flavor.values() {
            let mut cached: Vec<&Node> = nodes
                .iter()
                .copied()
                .filter(|n| n.is_cached() && !stale.contains(&n.uuid))
                .collect();
            let mut uncached: Vec<&Node> = nodes
                .iter()
                .copied()
                .filter(|n| !n.is_cached())
                .collect();

            match cached.len().cmp(&quota) {
                Ordering::Less => {
                    uncached.sort_by(|a, b| a.uuid.cmp(&b.uuid));
                    for node in uncached.into_iter().take(quota - cached.len()) {
                        if let Some(image) = pick_image(&node.uuid, &selectable) {
                            cache_directives.push(Directive::Cache {
                                node: node.uuid.clone(),
                                image: image.id.clone(),
                            });
                        }
                    }
                }
                Ordering::Greater => {
                    let excess = cached.len() - quota;
                    self.order_for_ejection(&mut cached, catalog);
                    for node in cached.into_iter().take(excess) {
                        eject_directives.push(Directive::Eject {
                            node: node.uuid.clone(),
                        });
                    }
                }
                Ordering::Equal => {}
            }
        }

        let mut directives = cache_directives;
        directives.extend(eject_directives);

        Ok(Evaluation {
            directives,
            eligible: eligible.len(),
            cached: cached_total,
            target,
        })
    }
}

/// Weight of the image a node currently caches; 0 when unknown
fn cached_weight(node: &Node, catalog: &CatalogSnapshot) -> u32 {
    node.cached_image
        .as_ref()
        .and_then(|id| catalog.get(id))
        .map_or(0, |i| i.weight)
}

/// Deterministic weighted image selection for one node
///
/// Straw-style draw: hash the (node, image) pair into (0, 1], take ln,
/// divide by weight; the longest straw wins. Per-node stable, and across
/// the fleet each image wins in proportion to its weight.
fn pick_image<'a>(node: &NodeUuid, images: &[&'a Image]) -> Option<&'a Image> {
    let node_hash = xxh64(node.as_str().as_bytes(), 0);
    images
        .iter()
        .copied()
        .max_by(|a, b| straw_draw(node_hash, a).total_cmp(&straw_draw(node_hash, b)))
}

fn straw_draw(node_hash: u64, image: &Image) -> f64 {
    let key = xxh64(image.id.as_str().as_bytes(), node_hash);
    let unit = (key as f64 + 1.0) / (u64::MAX as f64 + 2.0);
    unit.ln() / f64::from(image.weight)
}
