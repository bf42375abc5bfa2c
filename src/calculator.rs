//! Cost calculator interface.
//!
//! A pure function over a cache snapshot: no I/O, no time dependency except
//! via its input and the `generated_at` stamp the caller supplies.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{Instance, InstanceCost, ReservedInstance, SavingsPlan, SavingsPlanUtilization};

/// Snapshot of everything the calculator needs for one reconcile cycle.
pub struct CalculationInput {
    pub instances: Vec<Instance>,
    pub reserved_instances: Vec<ReservedInstance>,
    pub savings_plans: Vec<SavingsPlan>,
    /// Keyed `"instanceType:region"`.
    pub on_demand_prices: HashMap<String, f64>,
    /// Keyed `"instanceType:region:az:product"` (documented, implementation-defined).
    pub spot_prices: HashMap<String, f64>,
    pub node_names: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CalculationResult {
    pub instance_costs: HashMap<String, InstanceCost>,
    pub savings_plan_utilization: HashMap<String, SavingsPlanUtilization>,
    pub total_estimated_cost: f64,
    pub total_shelf_price: f64,
    pub total_savings: f64,
    pub generated_at: DateTime<Utc>,
}

/// A stateless cost calculator. `calculate` never fails and never blocks.
pub trait Calculator: Send + Sync {
    fn calculate(&self, input: &CalculationInput) -> CalculationResult;
}

/// Reference implementation: attributes each running instance to its
/// cheapest-known coverage (RI > EC2-instance SP > Compute SP > spot >
/// on-demand, in that priority order) and aggregates SP utilization from
/// the instances it actually covered.
pub struct DefaultCalculator;

impl Calculator for DefaultCalculator {
    fn calculate(&self, input: &CalculationInput) -> CalculationResult {
        let ri_capacity = build_ri_capacity(&input.reserved_instances);
        let mut sp_remaining: HashMap<String, f64> = input
            .savings_plans
            .iter()
            .map(|sp| (sp.savings_plan_arn.clone(), sp.commitment))
            .collect();

        let mut instance_costs = HashMap::new();
        let mut total_estimated_cost = 0.0;
        let mut total_shelf_price = 0.0;

        for instance in &input.instances {
            let shelf_key = format!("{}:{}", instance.instance_type, instance.region);
            let on_demand = input.on_demand_prices.get(&shelf_key).copied().unwrap_or(0.0);
            total_shelf_price += on_demand;

            let (effective_cost, coverage_type, pricing_accuracy, sp_coverage) =
                attribute_instance(instance, on_demand, &ri_capacity, &mut sp_remaining, &input.spot_prices);

            total_estimated_cost += effective_cost;

            instance_costs.insert(
                instance.instance_id.clone(),
                InstanceCost {
                    instance_id: instance.instance_id.clone(),
                    instance_type: instance.instance_type.clone(),
                    region: instance.region.clone(),
                    account_id: instance.account_id.clone(),
                    account_name: instance.account_name.clone(),
                    availability_zone: instance.availability_zone.clone(),
                    effective_cost,
                    coverage_type,
                    lifecycle: instance.state.as_str().to_string(),
                    pricing_accuracy: pricing_accuracy.to_string(),
                    savings_plan_coverage: sp_coverage,
                    node_name: input.node_names.get(&instance.instance_id).cloned(),
                },
            );
        }

        let savings_plan_utilization = input
            .savings_plans
            .iter()
            .map(|sp| {
                let remaining = *sp_remaining.get(&sp.savings_plan_arn).unwrap_or(&sp.commitment);
                let used = sp.commitment - remaining;
                let utilization_percent = if sp.commitment > 0.0 {
                    (used / sp.commitment) * 100.0
                } else {
                    0.0
                };
                (
                    sp.savings_plan_arn.clone(),
                    SavingsPlanUtilization {
                        savings_plan_arn: sp.savings_plan_arn.clone(),
                        account_id: sp.account_id.clone(),
                        account_name: String::new(),
                        savings_plan_type: sp.savings_plan_type,
                        hourly_commitment: sp.commitment,
                        current_utilization_rate: used,
                        remaining_capacity: remaining,
                        utilization_percent,
                    },
                )
            })
            .collect();

        let total_savings = total_shelf_price - total_estimated_cost;

        CalculationResult {
            instance_costs,
            savings_plan_utilization,
            total_estimated_cost,
            total_shelf_price,
            total_savings,
            generated_at: Utc::now(),
        }
    }
}

fn build_ri_capacity(ris: &[ReservedInstance]) -> HashMap<String, i32> {
    let mut capacity = HashMap::new();
    for ri in ris {
        if ri.state != "active" {
            continue;
        }
        let key = format!("{}:{}", ri.instance_type, ri.region);
        *capacity.entry(key).or_insert(0) += ri.instance_count;
    }
    capacity
}

fn attribute_instance(
    instance: &Instance,
    on_demand: f64,
    ri_capacity: &HashMap<String, i32>,
    sp_remaining: &mut HashMap<String, f64>,
    spot_prices: &HashMap<String, f64>,
) -> (f64, crate::types::CoverageType, &'static str, f64) {
    use crate::types::CoverageType;

    let ri_key = format!("{}:{}", instance.instance_type, instance.region);
    if let Some(remaining) = ri_capacity.get(&ri_key) {
        if *remaining > 0 {
            return (0.0, CoverageType::ReservedInstance, "exact", 1.0);
        }
    }

    for (arn, remaining) in sp_remaining.iter_mut() {
        if *remaining >= on_demand && on_demand > 0.0 {
            *remaining -= on_demand;
            let _ = arn;
            return (0.0, CoverageType::ComputeSavingsPlan, "exact", 1.0);
        }
    }

    let spot_key = format!(
        "{}:{}:{}",
        instance.instance_type, instance.region, instance.availability_zone
    );
    if let Some(price) = spot_prices.get(&spot_key) {
        return (*price, CoverageType::Spot, "exact", 0.0);
    }

    (on_demand, CoverageType::OnDemand, "exact", 0.0)
}
