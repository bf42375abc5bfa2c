//! Shared domain entities for the cost data plane.
//!
//! These are plain data holders; none of them carry behavior beyond small
//! accessors. The caches in [`crate::cache`] own the concurrency and
//! lifecycle rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const OS_LINUX: &str = "linux";
pub const OS_WINDOWS: &str = "windows";

/// Sentinel stored for an SP rate that was queried and confirmed absent.
pub const SP_RATE_NOT_AVAILABLE: f64 = -1.0;

/// Normalize an OS / platform string down to one of the two sentinels.
/// Empty, "linux", or anything containing "linux"/"unix" (e.g.
/// `"Linux/UNIX"`) collapses to [`OS_LINUX`]; anything containing "windows"
/// collapses to [`OS_WINDOWS`]; everything else defaults to [`OS_LINUX`].
pub fn normalize_os(raw: &str) -> &'static str {
    let lower = raw.trim().to_lowercase();
    if lower.is_empty() || lower == OS_LINUX {
        return OS_LINUX;
    }
    if lower == OS_WINDOWS {
        return OS_WINDOWS;
    }
    if lower.contains("linux") || lower.contains("unix") {
        return OS_LINUX;
    }
    if lower.contains("windows") {
        return OS_WINDOWS;
    }
    OS_LINUX
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Running,
    Stopped,
    Terminated,
    Other,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Running => "running",
            InstanceState::Stopped => "stopped",
            InstanceState::Terminated => "terminated",
            InstanceState::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tenancy {
    Default,
    Dedicated,
    Host,
}

impl Default for Tenancy {
    fn default() -> Self {
        Tenancy::Default
    }
}

impl Tenancy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tenancy::Default => "default",
            Tenancy::Dedicated => "dedicated",
            Tenancy::Host => "host",
        }
    }
}

/// A running/stopped/terminated EC2 instance as reported by inventory polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub instance_type: String,
    pub region: String,
    pub availability_zone: String,
    pub account_id: String,
    pub account_name: String,
    pub state: InstanceState,
    /// `""`, `"linux"`, or `"windows"` — raw as reported, normalize on read.
    pub platform: String,
    pub tenancy: Tenancy,
    pub tags: HashMap<String, String>,
    pub launch_time: DateTime<Utc>,
}

/// An AWS Reserved Instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservedInstance {
    pub reserved_instance_id: String,
    pub instance_type: String,
    /// May be `"regional"` for regional (non-zonal) RIs.
    pub availability_zone: String,
    pub region: String,
    pub account_id: String,
    pub instance_count: i32,
    pub state: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SavingsPlanType {
    Ec2Instance,
    Compute,
}

impl SavingsPlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SavingsPlanType::Ec2Instance => "EC2Instance",
            SavingsPlanType::Compute => "Compute",
        }
    }
}

/// An AWS Savings Plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsPlan {
    pub savings_plan_arn: String,
    pub savings_plan_type: SavingsPlanType,
    pub state: String,
    /// Hourly commitment, in dollars.
    pub commitment: f64,
    /// `"all"` for Compute savings plans.
    pub region: String,
    /// Empty for Compute savings plans.
    pub instance_family: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub account_id: String,
}

/// A spot-market price observation, keyed by `(instance_type, az, product)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotPrice {
    pub instance_type: String,
    pub availability_zone: String,
    pub product_description: String,
    pub price: f64,
    /// When AWS reports the price was observed.
    pub timestamp: DateTime<Utc>,
    /// When this process fetched it.
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageType {
    ReservedInstance,
    Ec2InstanceSavingsPlan,
    ComputeSavingsPlan,
    Spot,
    OnDemand,
}

impl CoverageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageType::ReservedInstance => "reserved_instance",
            CoverageType::Ec2InstanceSavingsPlan => "ec2_instance_savings_plan",
            CoverageType::ComputeSavingsPlan => "compute_savings_plan",
            CoverageType::Spot => "spot",
            CoverageType::OnDemand => "on_demand",
        }
    }
}

/// Per-instance effective-cost result produced by the calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceCost {
    pub instance_id: String,
    pub instance_type: String,
    pub region: String,
    pub account_id: String,
    pub account_name: String,
    pub availability_zone: String,
    pub effective_cost: f64,
    pub coverage_type: CoverageType,
    pub lifecycle: String,
    pub pricing_accuracy: String,
    pub savings_plan_coverage: f64,
    pub node_name: Option<String>,
}

/// Per-SP utilization result produced by the calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsPlanUtilization {
    pub savings_plan_arn: String,
    pub account_id: String,
    pub account_name: String,
    pub savings_plan_type: SavingsPlanType,
    pub hourly_commitment: f64,
    pub current_utilization_rate: f64,
    /// May be negative when committed spend is over-utilized.
    pub remaining_capacity: f64,
    /// May exceed 100.
    pub utilization_percent: f64,
}

/// A Kubernetes node, correlated to an EC2 instance via its provider ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub provider_id: String,
    pub labels: HashMap<String, String>,
}
