//! Strategy contract and registry
//!
//! Strategies are selected by name from configuration. Adding a strategy
//! means implementing [`Strategy`] and adding an arm to [`build_strategy`];
//! an unknown name is a fatal configuration error at startup.

use crate::catalog::CatalogSnapshot;
use crate::fleet::InventorySnapshot;
use crate::proportional::SimpleProportionalStrategy;
use stockpile_common::config::StrategyConfig;
use stockpile_common::{Directive, Error, Result};

/// Result of one strategy evaluation over a fixed snapshot pair
#[derive(Clone, Debug, Default)]
pub struct Evaluation {
    /// Cache directives first, then eject directives
    pub directives: Vec<Directive>,
    /// Non-provisioned nodes considered this cycle
    pub eligible: usize,
    /// Eligible nodes currently holding a cached image
    pub cached: usize,
    /// Cached-node count the strategy is steering toward
    pub target: usize,
}

impl Evaluation {
    /// Number of cache directives in this evaluation
    #[must_use]
    pub fn cache_count(&self) -> usize {
        self.directives
            .iter()
            .filter(|d| matches!(d, Directive::Cache { .. }))
            .count()
    }

    /// Number of eject directives in this evaluation
    #[must_use]
    pub fn eject_count(&self) -> usize {
        self.directives.len() - self.cache_count()
    }
}

/// A pluggable caching policy
///
/// Evaluation is pure: same snapshot pair in, same directives out. All I/O
/// stays in the director.
pub trait Strategy: Send + Sync {
    /// Registered name of this strategy
    fn name(&self) -> &'static str;

    /// Compute the directives that move the fleet toward the desired shape
    fn evaluate(
        &self,
        inventory: &InventorySnapshot,
        catalog: &CatalogSnapshot,
    ) -> Result<Evaluation>;
}

/// Build the strategy selected by configuration
pub fn build_strategy(config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    match config.name.as_str() {
        SimpleProportionalStrategy::NAME => {
            Ok(Box::new(SimpleProportionalStrategy::from_config(config)))
        }
        other => Err(Error::configuration(format!("unknown strategy: {other}"))),
    }
}
