//! Reconciler coordinator.
//!
//! Wires the notifier graph to the debouncer, gates the first `reconcile()`
//! on a multi-source readiness barrier, and drives the
//! snapshot -> calculate -> publish cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::info_span;

use crate::cache::{Ec2InventoryCache, NodeCache, PricingCache, ReservationCache};
use crate::calculator::{CalculationInput, Calculator};
use crate::config::CorePlaneConfig;
use crate::debounce::Debouncer;
use crate::metrics::MetricPublisher;
use crate::types::OS_LINUX;

/// One-shot signal per upstream data source: on-demand pricing, RI/SP, EC2
/// inventory, SP rates, spot pricing.
pub struct ReadinessSender(oneshot::Sender<()>);

impl ReadinessSender {
    /// Signal that this source completed its first successful population.
    /// A second call is a no-op (the channel is already consumed).
    pub fn signal_ready(self) {
        let _ = self.0.send(());
    }
}

pub struct Coordinator {
    pricing: Arc<PricingCache>,
    inventory: Arc<Ec2InventoryCache>,
    reservations: Arc<ReservationCache>,
    nodes: Arc<NodeCache>,
    calculator: Arc<dyn Calculator>,
    metrics: Arc<MetricPublisher>,
    debouncer: Arc<Debouncer>,
    initialized: Arc<AtomicBool>,
    config: CorePlaneConfig,
}

impl Coordinator {
    /// Builds the coordinator and registers a notifier on every domain cache
    /// that triggers the shared debouncer. The debouncer's own callback is
    /// wired to `reconcile()` via the `Arc<Self>` handed back to the caller.
    /// `cfg.debounce_interval` sets the debouncer's coalescing window; the
    /// per-source `*_max_age` fields drive the freshness gauges published on
    /// every reconcile cycle.
    pub fn new(
        pricing: Arc<PricingCache>,
        inventory: Arc<Ec2InventoryCache>,
        reservations: Arc<ReservationCache>,
        nodes: Arc<NodeCache>,
        calculator: Arc<dyn Calculator>,
        metrics: Arc<MetricPublisher>,
        config: CorePlaneConfig,
    ) -> Arc<Self> {
        let initialized = Arc::new(AtomicBool::new(false));
        let debounce_interval = config.debounce_interval;

        // The debouncer's callback needs a handle to `self`, but `self`
        // doesn't exist until the debouncer does. Break the cycle with a
        // `OnceLock` the constructor fills in once the `Arc<Coordinator>` is
        // built — the callback just skips firing on the (at most
        // single-digit-millisecond) window before that happens.
        let self_cell: Arc<std::sync::OnceLock<Arc<Coordinator>>> = Arc::new(std::sync::OnceLock::new());
        let cell_for_callback = self_cell.clone();
        let debouncer = Arc::new(Debouncer::new(debounce_interval, move || {
            if let Some(coordinator) = cell_for_callback.get().cloned() {
                tokio::spawn(async move {
                    coordinator.reconcile().await;
                });
            }
        }));

        let coordinator = Arc::new(Self {
            pricing: pricing.clone(),
            inventory: inventory.clone(),
            reservations: reservations.clone(),
            nodes: nodes.clone(),
            calculator,
            metrics,
            debouncer: debouncer.clone(),
            initialized,
            config,
        });
        let _ = self_cell.set(coordinator.clone());

        let d1 = debouncer.clone();
        pricing.register_notifier(move || d1.trigger());
        let d2 = debouncer.clone();
        inventory.register_notifier(move || d2.trigger());
        let d3 = debouncer.clone();
        reservations.register_notifier(move || d3.trigger());
        let d4 = debouncer.clone();
        nodes.register_notifier(move || d4.trigger());

        coordinator
    }

    /// Launches a startup task that waits on every readiness channel; when
    /// all have closed, flips `initialized` and runs the first `reconcile()`
    /// explicitly, rather than waiting for a debounced trigger that may never
    /// come if no source writes again after its initial population.
    pub fn spawn_readiness_barrier(self: &Arc<Self>, receivers: Vec<oneshot::Receiver<()>>) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            for rx in receivers {
                let _ = rx.await;
            }
            coordinator.initialized.store(true, Ordering::SeqCst);
            coordinator.reconcile().await;
        });
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// No-op until the readiness barrier has closed — prevents debouncer
    /// firings during partial startup from publishing incomplete metrics.
    pub async fn reconcile(&self) {
        if !self.initialized.load(Ordering::SeqCst) {
            return;
        }

        let instances = self.inventory.get_running_instances();
        let reserved_instances = self.reservations.get_all_reserved_instances();
        let savings_plans = self.reservations.get_all_savings_plans();

        let _span = info_span!(
            "reconcile",
            instances = instances.len(),
            ris = reserved_instances.len(),
            sps = savings_plans.len()
        )
        .entered();

        let on_demand_prices: HashMap<String, f64> = self
            .pricing
            .get_on_demand_prices_for_instances(
                &instances
                    .iter()
                    .map(|i| crate::cache::InstanceTypeRegion {
                        instance_type: &i.instance_type,
                        region: &i.region,
                    })
                    .collect::<Vec<_>>(),
                OS_LINUX,
            );
        let spot_prices = self.pricing.get_all_spot_prices();

        let node_names: HashMap<String, String> = instances
            .iter()
            .filter_map(|i| {
                let (name, ok) = self.nodes.get_node_name_for_instance(&i.instance_id);
                if ok {
                    Some((i.instance_id.clone(), name.unwrap()))
                } else {
                    None
                }
            })
            .collect();

        let input = CalculationInput {
            instances,
            reserved_instances,
            savings_plans,
            on_demand_prices,
            spot_prices,
            node_names,
        };

        let result = self.calculator.calculate(&input);
        self.metrics.publish_calculation(&result);

        self.metrics.set_controller_running(true);
        self.metrics.update_ec2_instance_metrics(&input.instances);
        self.metrics
            .update_reserved_instance_metrics(&input.reserved_instances);
        self.metrics
            .update_savings_plans_inventory_metrics(&input.savings_plans);
        self.publish_freshness();
    }

    /// Publishes one freshness pair (`data_freshness_seconds`,
    /// `data_last_success`) per upstream source, using each cache's own
    /// staleness tracking against the configured max-age thresholds.
    fn publish_freshness(&self) {
        let cfg = &self.config;

        let sources: [(&str, std::time::Duration, bool); 5] = [
            (
                "on_demand_pricing",
                self.pricing.on_demand_age(),
                !self.pricing.on_demand_is_stale(cfg.on_demand_max_age),
            ),
            (
                "sp_rates",
                self.pricing.sp_rate_age(),
                !self.pricing.sp_rate_is_stale(cfg.sp_rate_max_age),
            ),
            (
                "spot_pricing",
                self.pricing.spot_age(),
                !self.pricing.spot_is_stale(cfg.spot_price_max_age),
            ),
            (
                "ec2_inventory",
                self.inventory.substrate().age(),
                !self.inventory.substrate().is_stale(cfg.inventory_max_age),
            ),
            (
                "ri_sp",
                self.reservations.substrate().age(),
                !self.reservations.substrate().is_stale(cfg.ri_sp_max_age),
            ),
        ];

        for (source, age, fresh) in sources {
            self.metrics.set_data_freshness_seconds(source, age);
            self.metrics.set_data_last_success(source, fresh);
        }
    }
}

/// Build one readiness channel pair per upstream source name.
pub fn build_readiness_channels(sources: &[&str]) -> (HashMap<String, ReadinessSender>, Vec<oneshot::Receiver<()>>) {
    let mut senders = HashMap::new();
    let mut receivers = Vec::new();
    for source in sources {
        let (tx, rx) = oneshot::channel();
        senders.insert(source.to_string(), ReadinessSender(tx));
        receivers.push(rx);
    }
    (senders, receivers)
}
