//! Metric publisher.
//!
//! Every publication follows reset-then-set: `Reset()` every vector metric
//! touched by the cycle, then `.with_label_values(...).set(...)` per entity.
//! Grounded in `cowprotocol-services`'s `orderbook/src/metrics.rs` — the
//! teacher hand-rolls its own metrics and never imports `prometheus`.

use std::collections::HashMap;
use std::time::Duration;

use prometheus::{GaugeVec, IntGaugeVec, Opts, Registry};
use tracing::info_span;

use crate::calculator::CalculationResult;
use crate::config::CorePlaneConfig;
use crate::types::{Instance, InstanceState, ReservedInstance, SavingsPlan, SavingsPlanType};

fn normalize_sp_type(raw: SavingsPlanType) -> &'static str {
    match raw {
        SavingsPlanType::Ec2Instance => "ec2_instance",
        SavingsPlanType::Compute => "compute",
    }
}

fn instance_family(instance_type: &str) -> &str {
    instance_type.split('.').next().unwrap_or(instance_type)
}

pub struct MetricPublisher {
    controller_running: IntGaugeVec,
    account_validation_status: IntGaugeVec,
    account_validation_last_success_timestamp: GaugeVec,
    account_validation_duration_seconds: GaugeVec,
    data_freshness_seconds: GaugeVec,
    data_last_success: IntGaugeVec,

    ec2_instance: IntGaugeVec,
    ec2_instance_count: IntGaugeVec,
    ec2_instance_hourly_cost: GaugeVec,
    ec2_reserved_instance: IntGaugeVec,
    ec2_reserved_instance_count: IntGaugeVec,

    savings_plan_hourly_commitment: GaugeVec,
    savings_plan_remaining_hours: GaugeVec,
    savings_plan_current_utilization_rate: GaugeVec,
    savings_plan_remaining_capacity: GaugeVec,
    savings_plan_utilization_percent: GaugeVec,
}

impl MetricPublisher {
    /// Registers every family on `registry`, prefixed by `cfg.metrics_namespace`
    /// — keeps a test registry from colliding with a production one sharing the
    /// same process.
    pub fn new(registry: &Registry, cfg: &CorePlaneConfig) -> Result<Self, prometheus::Error> {
        let namespace = cfg.metrics_namespace.as_str();
        let ns = |name: &str| format!("{namespace}_{name}");

        let publisher = Self {
            controller_running: register_int_gauge_vec(registry, &ns("controller_running"), &[])?,
            account_validation_status: register_int_gauge_vec(
                registry,
                &ns("account_validation_status"),
                &["account_id"],
            )?,
            account_validation_last_success_timestamp: register_gauge_vec(
                registry,
                &ns("account_validation_last_success_timestamp"),
                &["account_id"],
            )?,
            account_validation_duration_seconds: register_gauge_vec(
                registry,
                &ns("account_validation_duration_seconds"),
                &["account_id"],
            )?,
            data_freshness_seconds: register_gauge_vec(registry, &ns("data_freshness_seconds"), &["source"])?,
            data_last_success: register_int_gauge_vec(registry, &ns("data_last_success"), &["source"])?,

            ec2_instance: register_int_gauge_vec(
                registry,
                "ec2_instance",
                &["instance_id", "account_id", "region", "instance_type"],
            )?,
            ec2_instance_count: register_int_gauge_vec(
                registry,
                "ec2_instance_count",
                &["account_id", "region", "instance_family"],
            )?,
            ec2_instance_hourly_cost: register_gauge_vec(
                registry,
                "ec2_instance_hourly_cost",
                &[
                    "instance_id",
                    "account_id",
                    "account_name",
                    "region",
                    "instance_type",
                    "cost_type",
                    "availability_zone",
                    "lifecycle",
                    "pricing_accuracy",
                    "node_name",
                ],
            )?,
            ec2_reserved_instance: register_int_gauge_vec(
                registry,
                "ec2_reserved_instance",
                &["reserved_instance_id", "account_id", "region", "instance_type"],
            )?,
            ec2_reserved_instance_count: register_int_gauge_vec(
                registry,
                "ec2_reserved_instance_count",
                &["account_id", "region", "instance_family"],
            )?,

            savings_plan_hourly_commitment: register_gauge_vec(
                registry,
                "savings_plan_hourly_commitment",
                &["savings_plan_arn", "account_id", "region", "instance_family"],
            )?,
            savings_plan_remaining_hours: register_gauge_vec(
                registry,
                "savings_plan_remaining_hours",
                &["savings_plan_arn", "account_id"],
            )?,
            savings_plan_current_utilization_rate: register_gauge_vec(
                registry,
                "savings_plan_current_utilization_rate",
                &["savings_plan_arn", "account_id", "account_name", "type"],
            )?,
            savings_plan_remaining_capacity: register_gauge_vec(
                registry,
                "savings_plan_remaining_capacity",
                &["savings_plan_arn", "account_id", "account_name", "type"],
            )?,
            savings_plan_utilization_percent: register_gauge_vec(
                registry,
                "savings_plan_utilization_percent",
                &["savings_plan_arn", "account_id", "account_name", "type"],
            )?,
        };
        Ok(publisher)
    }

    pub fn set_controller_running(&self, running: bool) {
        self.controller_running.with_label_values(&[]).set(running as i64);
    }

    pub fn set_data_freshness_seconds(&self, source: &str, age: Duration) {
        self.data_freshness_seconds
            .with_label_values(&[source])
            .set(age.as_secs_f64());
    }

    pub fn set_data_last_success(&self, source: &str, success: bool) {
        self.data_last_success.with_label_values(&[source]).set(success as i64);
    }

    /// Publish per-instance costs and SP utilization for one reconcile
    /// cycle. Reset-then-set.
    pub fn publish_calculation(&self, result: &CalculationResult) {
        let _span = info_span!(
            "publish_calculation",
            instances = result.instance_costs.len(),
            savings_plans = result.savings_plan_utilization.len()
        )
        .entered();

        self.ec2_instance_hourly_cost.reset();
        for cost in result.instance_costs.values() {
            self.ec2_instance_hourly_cost
                .with_label_values(&[
                    &cost.instance_id,
                    &cost.account_id,
                    &cost.account_name,
                    &cost.region,
                    &cost.instance_type,
                    cost.coverage_type.as_str(),
                    &cost.availability_zone,
                    &cost.lifecycle,
                    &cost.pricing_accuracy,
                    cost.node_name.as_deref().unwrap_or(""),
                ])
                .set(cost.effective_cost);
        }

        self.savings_plan_current_utilization_rate.reset();
        self.savings_plan_remaining_capacity.reset();
        self.savings_plan_utilization_percent.reset();
        for util in result.savings_plan_utilization.values() {
            let sp_type = normalize_sp_type(util.savings_plan_type);
            let labels = [
                util.savings_plan_arn.as_str(),
                util.account_id.as_str(),
                util.account_name.as_str(),
                sp_type,
            ];
            self.savings_plan_current_utilization_rate
                .with_label_values(&labels)
                .set(util.current_utilization_rate);
            self.savings_plan_remaining_capacity
                .with_label_values(&labels)
                .set(util.remaining_capacity);
            self.savings_plan_utilization_percent
                .with_label_values(&labels)
                .set(util.utilization_percent);
        }
    }

    /// `UpdateEC2InstanceMetrics`: reset-and-set, skipping non-running
    /// instances, normalizing empty platform to linux, aggregating counts by
    /// `instance_family = prefixBefore(".", instanceType)`.
    pub fn update_ec2_instance_metrics(&self, instances: &[Instance]) {
        self.ec2_instance.reset();
        self.ec2_instance_count.reset();

        let mut counts: HashMap<(String, String, String), i64> = HashMap::new();
        for instance in instances {
            if instance.state != InstanceState::Running {
                continue;
            }
            self.ec2_instance
                .with_label_values(&[
                    &instance.instance_id,
                    &instance.account_id,
                    &instance.region,
                    &instance.instance_type,
                ])
                .set(1);

            let key = (
                instance.account_id.clone(),
                instance.region.clone(),
                instance_family(&instance.instance_type).to_string(),
            );
            *counts.entry(key).or_insert(0) += 1;
        }
        for ((account_id, region, family), count) in counts {
            self.ec2_instance_count
                .with_label_values(&[&account_id, &region, &family])
                .set(count);
        }
    }

    /// `UpdateReservedInstanceMetrics`: skips non-`"active"` RIs.
    pub fn update_reserved_instance_metrics(&self, ris: &[ReservedInstance]) {
        self.ec2_reserved_instance.reset();
        self.ec2_reserved_instance_count.reset();

        let mut counts: HashMap<(String, String, String), i64> = HashMap::new();
        for ri in ris {
            if ri.state != "active" {
                continue;
            }
            self.ec2_reserved_instance
                .with_label_values(&[
                    &ri.reserved_instance_id,
                    &ri.account_id,
                    &ri.region,
                    &ri.instance_type,
                ])
                .set(ri.instance_count as i64);

            let key = (
                ri.account_id.clone(),
                ri.region.clone(),
                instance_family(&ri.instance_type).to_string(),
            );
            *counts.entry(key).or_insert(0) += ri.instance_count as i64;
        }
        for ((account_id, region, family), count) in counts {
            self.ec2_reserved_instance_count
                .with_label_values(&[&account_id, &region, &family])
                .set(count);
        }
    }

    /// `UpdateSavingsPlansInventoryMetrics`: skips non-`"active"` SPs.
    /// Compute SPs get `region="all", instance_family="all"`.
    pub fn update_savings_plans_inventory_metrics(&self, sps: &[SavingsPlan]) {
        self.savings_plan_hourly_commitment.reset();
        self.savings_plan_remaining_hours.reset();

        for sp in sps {
            if sp.state != "active" {
                continue;
            }
            let (region, family) = match sp.savings_plan_type {
                SavingsPlanType::Compute => ("all".to_string(), "all".to_string()),
                SavingsPlanType::Ec2Instance => (sp.region.clone(), sp.instance_family.clone()),
            };
            self.savings_plan_hourly_commitment
                .with_label_values(&[&sp.savings_plan_arn, &sp.account_id, &region, &family])
                .set(sp.commitment);

            let remaining_hours = sp.end.signed_duration_since(chrono::Utc::now()).num_seconds() as f64 / 3600.0;
            self.savings_plan_remaining_hours
                .with_label_values(&[&sp.savings_plan_arn, &sp.account_id])
                .set(remaining_hours.max(0.0));
        }
    }
}

fn register_gauge_vec(registry: &Registry, name: &str, labels: &[&str]) -> Result<GaugeVec, prometheus::Error> {
    let gauge = GaugeVec::new(Opts::new(name, name), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn register_int_gauge_vec(
    registry: &Registry,
    name: &str,
    labels: &[&str],
) -> Result<IntGaugeVec, prometheus::Error> {
    let gauge = IntGaugeVec::new(Opts::new(name, name), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{Calculator, DefaultCalculator};
    use crate::types::{CoverageType, InstanceCost, Tenancy};
    use std::collections::HashMap as Map;

    fn test_config(namespace: &str) -> CorePlaneConfig {
        CorePlaneConfig {
            metrics_namespace: namespace.to_string(),
            ..CorePlaneConfig::default()
        }
    }

    #[test]
    fn publish_then_reset_clears_stale_gauge() {
        let registry = Registry::new();
        let publisher = MetricPublisher::new(&registry, &test_config("test_lumina")).unwrap();

        let mut costs = Map::new();
        costs.insert(
            "i-a".to_string(),
            InstanceCost {
                instance_id: "i-a".to_string(),
                instance_type: "m5.xlarge".to_string(),
                region: "us-west-2".to_string(),
                account_id: "111".to_string(),
                account_name: "acct".to_string(),
                availability_zone: "us-west-2a".to_string(),
                effective_cost: 0.192,
                coverage_type: CoverageType::OnDemand,
                lifecycle: "running".to_string(),
                pricing_accuracy: "exact".to_string(),
                savings_plan_coverage: 0.0,
                node_name: None,
            },
        );
        let result = crate::calculator::CalculationResult {
            instance_costs: costs,
            savings_plan_utilization: Map::new(),
            total_estimated_cost: 0.192,
            total_shelf_price: 0.192,
            total_savings: 0.0,
            generated_at: chrono::Utc::now(),
        };
        publisher.publish_calculation(&result);

        let metric = publisher
            .ec2_instance_hourly_cost
            .with_label_values(&["i-a", "111", "acct", "us-west-2", "m5.xlarge", "on_demand", "us-west-2a", "running", "exact", ""]);
        assert_eq!(metric.get(), 0.192);

        let empty_result = crate::calculator::CalculationResult {
            instance_costs: Map::new(),
            savings_plan_utilization: Map::new(),
            total_estimated_cost: 0.0,
            total_shelf_price: 0.0,
            total_savings: 0.0,
            generated_at: chrono::Utc::now(),
        };
        publisher.publish_calculation(&empty_result);

        let reset_families = registry.gather();
        let family = reset_families
            .iter()
            .find(|f| f.get_name() == "ec2_instance_hourly_cost")
            .unwrap();
        assert!(family.get_metric().is_empty());
    }

    #[test]
    fn ec2_instance_metrics_skip_non_running() {
        let registry = Registry::new();
        let publisher = MetricPublisher::new(&registry, &test_config("test2_lumina")).unwrap();

        let mut stopped = sample_instance("i-a");
        stopped.state = InstanceState::Stopped;
        let running = sample_instance("i-b");
        publisher.update_ec2_instance_metrics(&[stopped, running]);

        let families = registry.gather();
        let family = families.iter().find(|f| f.get_name() == "ec2_instance").unwrap();
        assert_eq!(family.get_metric().len(), 1);
    }

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
            tags: Map::new(),
            launch_time: chrono::Utc::now(),
        }
    }

    #[test]
    fn default_calculator_smoke_with_publisher() {
        let input = crate::calculator::CalculationInput {
            instances: vec![],
            reserved_instances: vec![],
            savings_plans: vec![],
            on_demand_prices: Map::new(),
            spot_prices: Map::new(),
            node_names: Map::new(),
        };
        let result = DefaultCalculator.calculate(&input);
        assert!(result.instance_costs.is_empty());
    }
}
