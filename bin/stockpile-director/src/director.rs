//! The reconciliation control loop
//!
//! Two independent timers drive the director: the poll timer refreshes the
//! (inventory, catalog) snapshot pair, and the directive timer evaluates
//! the strategy against the latest pair and dispatches the survivors of
//! rate limiting. The snapshot pair is the only state shared between the
//! two paths; it is swapped wholesale, never mutated, so one cycle always
//! computes against a single coherent view.

use crate::rate_limit::DirectiveRateLimiter;
use crate::stats::DirectorStats;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use stockpile_client::{CatalogClient, InventoryClient, NodeCommandClient};
use stockpile_common::config::{Config, DirectorConfig};
use stockpile_common::Directive;
use stockpile_strategy::{CatalogSnapshot, Evaluation, InventorySnapshot, Strategy};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// One coherent (inventory, catalog) view, published atomically per poll
pub struct SnapshotPair {
    pub inventory: InventorySnapshot,
    pub catalog: CatalogSnapshot,
}

/// The control loop and everything it orchestrates
pub struct Director {
    config: DirectorConfig,
    image_weights: HashMap<String, u32>,
    default_image_weight: u32,
    strategy: Box<dyn Strategy>,
    inventory: Arc<dyn InventoryClient>,
    catalog: Arc<dyn CatalogClient>,
    commands: Arc<dyn NodeCommandClient>,
    limiter: DirectiveRateLimiter,
    stats: Arc<DirectorStats>,
    current: RwLock<Option<Arc<SnapshotPair>>>,
    dispatch_concurrency: usize,
}

impl Director {
    /// Wire up a director from validated configuration and its collaborators
    pub fn new(
        config: &Config,
        strategy: Box<dyn Strategy>,
        inventory: Arc<dyn InventoryClient>,
        catalog: Arc<dyn CatalogClient>,
        commands: Arc<dyn NodeCommandClient>,
        stats: Arc<DirectorStats>,
    ) -> Self {
        let limiter = DirectiveRateLimiter::from_config(&config.director);

        // Never hold more directives in flight than one period's budget.
        let period_budget = config
            .director
            .cache_directive_rate_limit
            .max(config.director.eject_directive_rate_limit)
            .max(1);
        let dispatch_concurrency = config
            .director
            .dispatch_concurrency
            .min(usize::try_from(period_budget).unwrap_or(usize::MAX))
            .max(1);

        Self {
            config: config.director.clone(),
            image_weights: config.strategy.image_weights.clone(),
            default_image_weight: config.strategy.default_image_weight,
            strategy,
            inventory,
            catalog,
            commands,
            limiter,
            stats,
            current: RwLock::new(None),
            dispatch_concurrency,
        }
    }

    /// Latest fully-fetched snapshot pair, if any poll has succeeded
    pub fn current_snapshots(&self) -> Option<Arc<SnapshotPair>> {
        self.current.read().clone()
    }

    /// Fetch both services once and publish a fresh snapshot pair
    ///
    /// A failed fetch aborts only this poll; the previous pair stays
    /// current and the next tick retries.
    pub async fn poll_once(&self) {
        let fetched = tokio::try_join!(self.inventory.list_nodes(), self.catalog.list_images());
        match fetched {
            Ok((nodes, images)) => {
                let inventory = InventorySnapshot::from_records(nodes);
                let catalog = CatalogSnapshot::from_records(
                    images,
                    &self.image_weights,
                    self.default_image_weight,
                );
                let skipped = inventory.skipped_records() + catalog.skipped_records();
                if skipped > 0 {
                    self.stats.add_malformed_records(skipped as u64);
                }
                debug!(
                    "Polled {} nodes and {} images",
                    inventory.len(),
                    catalog.len()
                );
                *self.current.write() = Some(Arc::new(SnapshotPair { inventory, catalog }));
                self.stats.record_poll_success();
            }
            Err(e) => {
                warn!("Poll failed, keeping previous snapshots: {e}");
                self.stats.record_poll_failure();
            }
        }
    }

    /// Run one strategy evaluation and dispatch the surviving directives
    pub async fn run_directives_once(&self) {
        let Some(pair) = self.current_snapshots() else {
            debug!("No snapshot pair yet; skipping directive cycle");
            return;
        };

        let evaluation = match self.strategy.evaluate(&pair.inventory, &pair.catalog) {
            Ok(eval) => {
                self.stats.set_fleet_gauges(
                    eval.eligible as u64,
                    eval.cached as u64,
                    eval.target as u64,
                );
                eval
            }
            Err(e) => {
                warn!(
                    "Strategy '{}' produced no directives: {e}",
                    self.strategy.name()
                );
                self.stats.record_strategy_error();
                Evaluation::default()
            }
        };

        info!(
            "Got {} cache directives from the strategy",
            evaluation.cache_count()
        );
        if evaluation.eject_count() > 0 {
            info!(
                "Got {} eject directives from the strategy",
                evaluation.eject_count()
            );
        }

        let admitted: Vec<Directive> = evaluation
            .directives
            .into_iter()
            .filter(|directive| {
                if self.limiter.allow(directive.kind()) {
                    true
                } else {
                    self.stats.record_rate_limited(directive.kind());
                    debug!("Rate limit dropped '{directive}'; eligible again next cycle");
                    false
                }
            })
            .collect();

        if self.config.dry_run {
            for directive in &admitted {
                info!("Dry run: would execute '{directive}'");
                self.stats.record_dry_run_skip();
            }
        } else {
            futures::stream::iter(admitted)
                .for_each_concurrent(self.dispatch_concurrency, |directive| async move {
                    self.dispatch(directive).await;
                })
                .await;
        }

        if self.config.log_statistics {
            info!("Statistics: {}", self.stats.snapshot().summary());
        }
    }

    async fn dispatch(&self, directive: Directive) {
        let result = match &directive {
            Directive::Cache { node, image } => self.commands.cache_image(node, image).await,
            Directive::Eject { node } => self.commands.eject_image(node).await,
        };
        match result {
            Ok(()) => {
                self.stats.record_dispatch_success(directive.kind());
                debug!("Dispatched '{directive}'");
            }
            Err(e) => {
                self.stats.record_dispatch_failure(directive.kind());
                warn!("Dispatch failed: {e}");
            }
        }
    }

    /// Run both timer loops until shutdown
    ///
    /// A cycle in progress when shutdown arrives completes (or fails)
    /// cleanly before the loop exits; nothing is persisted, so restart
    /// re-derives desired state from live inventory.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let poll = tokio::spawn(Self::poll_loop(self.clone(), shutdown.clone()));
        let directives = tokio::spawn(Self::directive_loop(self.clone(), shutdown));
        let _ = tokio::join!(poll, directives);
    }

    async fn poll_loop(this: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(this.config.poll_spacing());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => this.poll_once().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Poll loop stopped");
    }

    async fn directive_loop(this: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(this.config.directive_spacing());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => this.run_directives_once().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Directive loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use stockpile_common::{
        DirectiveKind, DriverInfo, Error, ImageId, ImageRecord, NodeExtra, NodeRecord, NodeUuid,
        Result,
    };
    use stockpile_strategy::build_strategy;

    struct StaticInventory {
        records: Vec<NodeRecord>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl InventoryClient for StaticInventory {
        async fn list_nodes(&self) -> Result<Vec<NodeRecord>> {
            if self.fail.load(Ordering::SeqCst) {
                Err(Error::transient_fetch("inventory", "connection refused"))
            } else {
                Ok(self.records.clone())
            }
        }
    }

    struct StaticCatalog {
        records: Vec<ImageRecord>,
    }

    #[async_trait]
    impl CatalogClient for StaticCatalog {
        async fn list_images(&self) -> Result<Vec<ImageRecord>> {
            Ok(self.records.clone())
        }
    }

    #[derive(Default)]
    struct RecordingCommands {
        cached: Mutex<Vec<(String, String)>>,
        ejected: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl NodeCommandClient for RecordingCommands {
        async fn cache_image(&self, node: &NodeUuid, image: &ImageId) -> Result<()> {
            if self.fail {
                return Err(Error::DirectiveDispatch {
                    kind: DirectiveKind::Cache,
                    node: node.clone(),
                    reason: "hardware said no".into(),
                });
            }
            self.cached
                .lock()
                .push((node.as_str().to_string(), image.as_str().to_string()));
            Ok(())
        }

        async fn eject_image(&self, node: &NodeUuid) -> Result<()> {
            if self.fail {
                return Err(Error::DirectiveDispatch {
                    kind: DirectiveKind::Eject,
                    node: node.clone(),
                    reason: "hardware said no".into(),
                });
            }
            self.ejected.lock().push(node.as_str().to_string());
            Ok(())
        }
    }

    fn node_record(uuid: &str, flavor: &str, provisioned: bool) -> NodeRecord {
        NodeRecord {
            uuid: Some(uuid.to_string()),
            provision_state: Some(if provisioned { "active" } else { "available" }.to_string()),
            instance_uuid: provisioned.then(|| format!("instance-{uuid}")),
            extra: NodeExtra {
                flavor: Some(flavor.to_string()),
            },
            driver_info: DriverInfo::default(),
            updated_at: None,
        }
    }

    fn triad_records(per_flavor: usize) -> Vec<NodeRecord> {
        let mut records = Vec::new();
        for flavor in ["compute1", "io1", "memory1"] {
            for i in 0..per_flavor {
                records.push(node_record(&format!("{flavor}-{i:03}"), flavor, false));
            }
        }
        records
    }

    fn image_records() -> Vec<ImageRecord> {
        vec![ImageRecord {
            id: Some("img-1".to_string()),
            name: Some("Ubuntu 24.04".to_string()),
        }]
    }

    fn test_config(percentage: f64, dry_run: bool, rate_limit: u64) -> Config {
        let mut config = Config::default();
        config.director.dry_run = dry_run;
        config.director.cache_directive_rate_limit = rate_limit;
        config.director.eject_directive_rate_limit = rate_limit;
        config.strategy.percentage_to_cache = percentage;
        config.strategy.image_weights = HashMap::from([("Ubuntu 24.04".to_string(), 80)]);
        config
    }

    struct Harness {
        director: Director,
        inventory: Arc<StaticInventory>,
        commands: Arc<RecordingCommands>,
        stats: Arc<DirectorStats>,
    }

    fn harness(
        config: Config,
        nodes: Vec<NodeRecord>,
        commands: RecordingCommands,
    ) -> Harness {
        let inventory = Arc::new(StaticInventory {
            records: nodes,
            fail: AtomicBool::new(false),
        });
        let catalog = Arc::new(StaticCatalog {
            records: image_records(),
        });
        let commands = Arc::new(commands);
        let stats = Arc::new(DirectorStats::default());
        let strategy = build_strategy(&config.strategy).unwrap();
        let director = Director::new(
            &config,
            strategy,
            inventory.clone(),
            catalog,
            commands.clone(),
            stats.clone(),
        );
        Harness {
            director,
            inventory,
            commands,
            stats,
        }
    }

    #[tokio::test]
    async fn test_one_cycle_caches_thirty_percent() {
        let h = harness(
            test_config(0.3, false, 1000),
            triad_records(100),
            RecordingCommands::default(),
        );

        h.director.poll_once().await;
        h.director.run_directives_once().await;

        let cached = h.commands.cached.lock();
        assert_eq!(cached.len(), 90);
        assert!(h.commands.ejected.lock().is_empty());
        assert!(cached.iter().all(|(_, image)| image == "img-1"));

        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.cache_success, 90);
        assert_eq!(snapshot.cache_target, 90);
        assert_eq!(snapshot.eligible_nodes, 300);
    }

    #[tokio::test]
    async fn test_dry_run_never_touches_hardware() {
        let h = harness(
            test_config(0.3, true, 1000),
            triad_records(100),
            RecordingCommands::default(),
        );

        h.director.poll_once().await;
        h.director.run_directives_once().await;

        assert!(h.commands.cached.lock().is_empty());
        assert!(h.commands.ejected.lock().is_empty());

        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.dry_run_skipped, 90);
        assert_eq!(snapshot.cache_success, 0);
    }

    #[tokio::test]
    async fn test_provisioned_nodes_are_never_dispatched() {
        let mut records = triad_records(10);
        for flavor in ["compute1", "io1", "memory1"] {
            records.push(node_record(&format!("{flavor}-busy"), flavor, true));
        }
        let h = harness(
            test_config(1.0, false, 1000),
            records,
            RecordingCommands::default(),
        );

        h.director.poll_once().await;
        h.director.run_directives_once().await;

        let cached = h.commands.cached.lock();
        assert_eq!(cached.len(), 30);
        assert!(cached.iter().all(|(node, _)| !node.ends_with("-busy")));
    }

    #[tokio::test]
    async fn test_rate_limit_caps_dispatch_per_cycle() {
        let h = harness(
            test_config(0.3, false, 10),
            triad_records(100),
            RecordingCommands::default(),
        );

        h.director.poll_once().await;
        h.director.run_directives_once().await;

        assert_eq!(h.commands.cached.lock().len(), 10);
        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.cache_success, 10);
        assert_eq!(snapshot.rate_limited_cache, 80);
    }

    #[tokio::test]
    async fn test_poll_failure_keeps_previous_snapshots() {
        let h = harness(
            test_config(0.3, false, 1000),
            triad_records(100),
            RecordingCommands::default(),
        );

        h.director.poll_once().await;
        assert!(h.director.current_snapshots().is_some());

        h.inventory.fail.store(true, Ordering::SeqCst);
        h.director.poll_once().await;

        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.poll_success, 1);
        assert_eq!(snapshot.poll_failure, 1);
        // The cycle still runs against the retained pair.
        h.director.run_directives_once().await;
        assert_eq!(h.commands.cached.lock().len(), 90);
    }

    #[tokio::test]
    async fn test_no_snapshot_means_no_dispatch() {
        let h = harness(
            test_config(0.3, false, 1000),
            triad_records(100),
            RecordingCommands::default(),
        );

        // Directive cycle before any poll has landed.
        h.director.run_directives_once().await;
        assert!(h.commands.cached.lock().is_empty());
        assert_eq!(h.stats.snapshot().cache_success, 0);
    }

    #[tokio::test]
    async fn test_dispatch_failures_are_counted_not_fatal() {
        let h = harness(
            test_config(0.3, false, 1000),
            triad_records(100),
            RecordingCommands {
                fail: true,
                ..RecordingCommands::default()
            },
        );

        h.director.poll_once().await;
        h.director.run_directives_once().await;

        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.cache_failure, 90);
        assert_eq!(snapshot.cache_success, 0);
    }

    #[tokio::test]
    async fn test_second_cycle_is_idempotent_once_fleet_matches_target() {
        // Simulate the fleet after the first cycle landed: 30 of each
        // flavor already cached.
        let mut records = triad_records(100);
        for record in records.iter_mut() {
            let uuid = record.uuid.clone().unwrap_or_default();
            let index: usize = uuid
                .rsplit('-')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            if index < 30 {
                record.driver_info.cache_image_id = Some("img-1".to_string());
            }
        }
        let h = harness(test_config(0.3, false, 1000), records, RecordingCommands::default());

        h.director.poll_once().await;
        h.director.run_directives_once().await;

        assert!(h.commands.cached.lock().is_empty());
        assert!(h.commands.ejected.lock().is_empty());
        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.cached_nodes, 90);
        assert_eq!(snapshot.cache_target, 90);
    }

    #[tokio::test]
    async fn test_malformed_records_counted_not_fatal() {
        let mut records = triad_records(3);
        records.push(NodeRecord::default());
        let h = harness(
            test_config(1.0, false, 1000),
            records,
            RecordingCommands::default(),
        );

        h.director.poll_once().await;
        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.poll_success, 1);
        assert_eq!(snapshot.malformed_records, 1);
    }
}
