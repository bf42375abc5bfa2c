//! End-to-end notifier -> debounce -> reconcile -> publish chain.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lumina_cost_plane::cache::{Ec2InventoryCache, NodeCache, PricingCache, ReservationCache};
use lumina_cost_plane::reconcile::{build_readiness_channels, Coordinator};
use lumina_cost_plane::types::{Instance, InstanceState, Tenancy};
use lumina_cost_plane::{CorePlaneConfig, DefaultCalculator, MetricPublisher};
use prometheus::Registry;
use std::collections::HashMap;

fn sample_instance(id: &str) -> Instance {
    Instance {
        instance_id: id.to_string(),
        instance_type: "m5.xlarge".to_string(),
        region: "us-west-2".to_string(),
        availability_zone: "us-west-2a".to_string(),
        account_id: "111".to_string(),
        account_name: "acct".to_string(),
        state: InstanceState::Running,
        platform: "".to_string(),
        tenancy: Tenancy::Default,
        tags: HashMap::new(),
        launch_time: Utc::now(),
    }
}

#[tokio::test]
async fn write_notify_debounce_reconcile_publish_cycle() {
    let registry = Registry::new();
    let config = CorePlaneConfig {
        debounce_interval: Duration::from_millis(30),
        metrics_namespace: "chain_test".to_string(),
        ..CorePlaneConfig::default()
    };
    let metrics = Arc::new(MetricPublisher::new(&registry, &config).unwrap());

    let pricing = Arc::new(PricingCache::new());
    let inventory = Arc::new(Ec2InventoryCache::new());
    let reservations = Arc::new(ReservationCache::new());
    let nodes = Arc::new(NodeCache::new());

    let mut prices = HashMap::new();
    prices.insert("us-west-2:m5.xlarge:linux".to_string(), 0.192);
    pricing.set_on_demand_prices(prices);

    let coordinator = Coordinator::new(
        pricing.clone(),
        inventory.clone(),
        reservations.clone(),
        nodes.clone(),
        Arc::new(DefaultCalculator),
        metrics.clone(),
        config,
    );

    // Before the readiness barrier closes, writes fire the debouncer but
    // reconcile stays a no-op.
    inventory.set_instances("111", "us-west-2", vec![sample_instance("i-a")]);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!coordinator.is_initialized());

    let (senders, receivers) = build_readiness_channels(&[
        "on_demand_pricing",
        "ri_sp",
        "ec2_inventory",
        "sp_rates",
        "spot_pricing",
    ]);
    coordinator.spawn_readiness_barrier(receivers);
    for (_, sender) in senders {
        sender.signal_ready();
    }

    // The explicit initial reconcile runs as soon as the barrier closes.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(coordinator.is_initialized());

    let families = registry.gather();
    let cost_family = families
        .iter()
        .find(|f| f.get_name() == "ec2_instance_hourly_cost")
        .expect("cost metric family registered");
    assert_eq!(cost_family.get_metric().len(), 1);
    assert_eq!(cost_family.get_metric()[0].get_gauge().value(), 0.192);

    // A subsequent write triggers a debounced reconcile too.
    inventory.set_instances("111", "us-west-2", vec![]);
    tokio::time::sleep(Duration::from_millis(60)).await;

    let families = registry.gather();
    let cost_family = families
        .iter()
        .find(|f| f.get_name() == "ec2_instance_hourly_cost")
        .unwrap();
    assert!(cost_family.get_metric().is_empty());
}
