//! Pricing cache — the dominant subsystem, by far the busiest of the
//! domain caches in call volume.
//!
//! Three independent sub-stores behind their own locks: on-demand prices,
//! Savings-Plan rates (with a sentinel "confirmed absent" marker and
//! incremental gap discovery), and spot prices (merged per-AZ/OS, with
//! delete support). Each sub-store tracks its own "populated" flag and its
//! own last-updated timestamp, distinct from any single cache-wide one — the
//! notifier registry, however, is shared: a write to any sub-store fires
//! every registered notifier.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::key::{build_key, parse_key_n, COLON, COMMA};
use crate::types::{normalize_os, SpotPrice, SP_RATE_NOT_AVAILABLE};

use super::substrate::Substrate;

/// `(instance_type, region)` — the shape pollers hand in for batched
/// on-demand lookups.
pub struct InstanceTypeRegion<'a> {
    pub instance_type: &'a str,
    pub region: &'a str,
}

fn normalize_product_description(raw: &str) -> String {
    let mut lower = raw.trim().to_lowercase();
    for suffix in [" (amazon vpc)", " (amazon)"] {
        if let Some(stripped) = lower.strip_suffix(suffix) {
            lower = stripped.to_string();
            break;
        }
    }
    lower
}

struct TimestampedFlag {
    populated: bool,
    updated_at: Option<DateTime<Utc>>,
}

impl TimestampedFlag {
    fn new() -> Self {
        Self {
            populated: false,
            updated_at: None,
        }
    }

    fn touch(&mut self, populated: bool) {
        self.populated = populated;
        self.updated_at = Some(Utc::now());
    }

    fn is_stale(&self, max_age: Duration) -> bool {
        if !self.populated {
            return true;
        }
        match self.updated_at {
            None => true,
            Some(t) => {
                let elapsed = Utc::now().signed_duration_since(t);
                elapsed.to_std().unwrap_or(Duration::ZERO) > max_age
            }
        }
    }

    fn age(&self) -> Duration {
        match self.updated_at {
            None => Duration::MAX,
            Some(t) => {
                let elapsed = Utc::now().signed_duration_since(t);
                elapsed.to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

pub struct PricingCache {
    on_demand: RwLock<HashMap<String, f64>>,
    on_demand_flag: RwLock<TimestampedFlag>,

    sp_rates: RwLock<HashMap<String, f64>>,
    sp_rates_flag: RwLock<TimestampedFlag>,

    spot_prices: RwLock<HashMap<String, SpotPrice>>,
    spot_flag: RwLock<TimestampedFlag>,

    substrate: Substrate,
}

impl Default for PricingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingCache {
    pub fn new() -> Self {
        Self {
            on_demand: RwLock::new(HashMap::new()),
            on_demand_flag: RwLock::new(TimestampedFlag::new()),
            sp_rates: RwLock::new(HashMap::new()),
            sp_rates_flag: RwLock::new(TimestampedFlag::new()),
            spot_prices: RwLock::new(HashMap::new()),
            spot_flag: RwLock::new(TimestampedFlag::new()),
            substrate: Substrate::new(),
        }
    }

    pub fn register_notifier<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.substrate.register_notifier(f);
    }

    pub fn substrate(&self) -> &Substrate {
        &self.substrate
    }

    // ---- on-demand ---------------------------------------------------

    /// Replace the on-demand price table wholesale.
    pub fn set_on_demand_prices(&self, prices: HashMap<String, f64>) {
        let len = prices.len();
        {
            let mut data = self.on_demand.write();
            data.clear();
            for (k, v) in prices {
                data.insert(k.trim().to_lowercase(), v);
            }
            self.on_demand_flag.write().touch(len > 0);
        }
        self.substrate.notify_update();
    }

    pub fn get_on_demand_price(&self, region: &str, instance_type: &str, os: &str) -> (f64, bool) {
        let key = build_key(COLON, &[region, instance_type, normalize_os(os)]);
        match self.on_demand.read().get(&key) {
            Some(price) => (*price, true),
            None => (0.0, false),
        }
    }

    /// Keyed `"instanceType:region"` (OS dropped); only present entries.
    pub fn get_on_demand_prices_for_instances(
        &self,
        instances: &[InstanceTypeRegion<'_>],
        os: &str,
    ) -> HashMap<String, f64> {
        let mut out = HashMap::new();
        for instance in instances {
            let (price, present) =
                self.get_on_demand_price(instance.region, instance.instance_type, os);
            if present {
                out.insert(
                    format!("{}:{}", instance.instance_type, instance.region),
                    price,
                );
            }
        }
        out
    }

    pub fn on_demand_is_stale(&self, max_age: Duration) -> bool {
        self.on_demand_flag.read().is_stale(max_age)
    }

    pub fn on_demand_age(&self) -> Duration {
        self.on_demand_flag.read().age()
    }

    // ---- SP rates ------------------------------------------------------

    /// Merge SP rates into the cache. Returns the count of keys that were
    /// newly inserted (not updates to an existing key).
    pub fn add_sp_rates(&self, rates: HashMap<String, f64>) -> usize {
        let mut inserted = 0usize;
        {
            let mut data = self.sp_rates.write();
            for (k, v) in rates {
                let key = k.trim().to_lowercase();
                if data.insert(key, v).is_none() {
                    inserted += 1;
                }
            }
            let populated = !data.is_empty();
            self.sp_rates_flag.write().touch(populated);
        }
        self.substrate.notify_update();
        inserted
    }

    pub fn get_sp_rate(
        &self,
        sp_arn: &str,
        instance_type: &str,
        region: &str,
        tenancy: &str,
        os: &str,
    ) -> (f64, bool) {
        let key = build_key(
            COMMA,
            &[sp_arn, instance_type, region, tenancy, normalize_os(os)],
        );
        match self.sp_rates.read().get(&key) {
            Some(rate) if *rate == SP_RATE_NOT_AVAILABLE => (0.0, false),
            Some(rate) => (*rate, true),
            None => (0.0, false),
        }
    }

    pub fn has_any_sp_rate(&self, sp_arn: &str) -> bool {
        let prefix = format!("{}{}", sp_arn.trim().to_lowercase(), COMMA);
        self.sp_rates.read().keys().any(|k| k.starts_with(&prefix))
    }

    /// Gap discovery: for each of the four input dimensions, return the
    /// (original-casing) values for which at least one Cartesian combination
    /// involving that value is absent from the cache for `sp_arn` (the
    /// sentinel counts as present).
    pub fn get_missing_sp_rates_for_instances(
        &self,
        sp_arn: &str,
        instance_types: &[&str],
        regions: &[&str],
        tenancies: &[&str],
        oses: &[&str],
    ) -> (Vec<String>, Vec<String>, Vec<String>, Vec<String>) {
        let prefix = format!("{}{}", sp_arn.trim().to_lowercase(), COMMA);
        let existing: HashSet<(String, String, String, String)> = {
            let data = self.sp_rates.read();
            data.keys()
                .filter(|k| k.starts_with(&prefix))
                .filter_map(|k| {
                    let (parts, ok) = parse_key_n(k, COMMA, 5);
                    if !ok {
                        return None;
                    }
                    Some((
                        parts[1].clone(),
                        parts[2].clone(),
                        parts[3].clone(),
                        parts[4].clone(),
                    ))
                })
                .collect()
        };

        let mut missing_types = HashSet::new();
        let mut missing_regions = HashSet::new();
        let mut missing_tenancies = HashSet::new();
        let mut missing_oses = HashSet::new();

        for it in instance_types {
            for reg in regions {
                for ten in tenancies {
                    for os in oses {
                        let tuple = (
                            it.trim().to_lowercase(),
                            reg.trim().to_lowercase(),
                            ten.trim().to_lowercase(),
                            normalize_os(os).to_string(),
                        );
                        if !existing.contains(&tuple) {
                            missing_types.insert(it.to_string());
                            missing_regions.insert(reg.to_string());
                            missing_tenancies.insert(ten.to_string());
                            missing_oses.insert(os.to_string());
                        }
                    }
                }
            }
        }

        (
            missing_types.into_iter().collect(),
            missing_regions.into_iter().collect(),
            missing_tenancies.into_iter().collect(),
            missing_oses.into_iter().collect(),
        )
    }

    pub fn get_all_sp_rates(&self) -> HashMap<String, f64> {
        self.sp_rates.read().clone()
    }

    pub fn sp_rate_is_stale(&self, max_age: Duration) -> bool {
        self.sp_rates_flag.read().is_stale(max_age)
    }

    pub fn sp_rate_age(&self) -> Duration {
        self.sp_rates_flag.read().age()
    }

    // ---- spot prices -----------------------------------------------------

    /// Merge spot prices. The canonical key is rebuilt from each value's own
    /// fields — the caller's map key is not trusted. Returns the count of
    /// newly inserted keys.
    pub fn insert_spot_prices(&self, prices: HashMap<String, SpotPrice>) -> usize {
        let mut inserted = 0usize;
        {
            let mut data = self.spot_prices.write();
            for (_, value) in prices {
                let key = build_key(
                    COLON,
                    &[
                        &value.instance_type,
                        &value.availability_zone,
                        &normalize_product_description(&value.product_description),
                    ],
                );
                if data.insert(key, value).is_none() {
                    inserted += 1;
                }
            }
            let populated = !data.is_empty();
            self.spot_flag.write().touch(populated);
        }
        self.substrate.notify_update();
        inserted
    }

    pub fn get_spot_price(
        &self,
        instance_type: &str,
        az: &str,
        product_description: &str,
    ) -> (f64, bool) {
        let key = build_key(
            COLON,
            &[
                instance_type,
                az,
                &normalize_product_description(product_description),
            ],
        );
        match self.spot_prices.read().get(&key) {
            Some(v) => (v.price, true),
            None => (0.0, false),
        }
    }

    /// Returns `true` iff a matching entry existed. Updates the populated
    /// flag but does not touch the sub-store timestamp.
    pub fn delete_spot_price(
        &self,
        instance_type: &str,
        az: &str,
        product_description: &str,
    ) -> bool {
        let key = build_key(
            COLON,
            &[
                instance_type,
                az,
                &normalize_product_description(product_description),
            ],
        );
        let existed = {
            let mut data = self.spot_prices.write();
            let existed = data.remove(&key).is_some();
            let populated = !data.is_empty();
            let mut flag = self.spot_flag.write();
            flag.populated = populated;
            existed
        };
        if existed {
            self.substrate.notify_update();
        }
        existed
    }

    pub fn get_all_spot_prices(&self) -> HashMap<String, f64> {
        self.spot_prices
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.price))
            .collect()
    }

    pub fn get_all_spot_prices_with_timestamps(&self) -> HashMap<String, SpotPrice> {
        self.spot_prices.read().clone()
    }

    pub fn spot_is_stale(&self, max_age: Duration) -> bool {
        self.spot_flag.read().is_stale(max_age)
    }

    pub fn spot_age(&self) -> Duration {
        self.spot_flag.read().age()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_spot(instance_type: &str, az: &str, product: &str, price: f64) -> SpotPrice {
        SpotPrice {
            instance_type: instance_type.to_string(),
            availability_zone: az.to_string(),
            product_description: product.to_string(),
            price,
            timestamp: Utc::now(),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn s1_os_normalization_scenario() {
        let cache = PricingCache::new();
        let mut prices = HashMap::new();
        prices.insert("us-west-2:m5.xlarge:linux".to_string(), 0.192);
        cache.set_on_demand_prices(prices);

        assert_eq!(
            cache.get_on_demand_price("us-west-2", "m5.xlarge", "Linux"),
            (0.192, true)
        );
        assert_eq!(
            cache.get_on_demand_price("us-west-2", "m5.xlarge", "LINUX"),
            (0.192, true)
        );
        assert_eq!(
            cache.get_on_demand_price("us-west-2", "m5.xlarge", "Linux/UNIX"),
            (0.192, true)
        );
    }

    #[tokio::test]
    async fn case_insensitive_on_demand_key_property() {
        let cache = PricingCache::new();
        let mut prices = HashMap::new();
        prices.insert("US-WEST-2:M5.XLARGE:LINUX".to_string(), 0.2);
        cache.set_on_demand_prices(prices);

        assert_eq!(
            cache.get_on_demand_price("us-west-2", "m5.xlarge", "linux"),
            cache.get_on_demand_price("US-WEST-2", "M5.XLARGE", "LINUX")
        );
    }

    #[tokio::test]
    async fn s2_spot_vpc_suffix_tolerance() {
        let cache = PricingCache::new();
        let mut prices = HashMap::new();
        prices.insert(
            "anything".to_string(),
            sample_spot("m5.xlarge", "us-west-2a", "Linux/UNIX (Amazon VPC)", 0.05),
        );
        cache.insert_spot_prices(prices);

        assert_eq!(
            cache.get_spot_price("m5.xlarge", "us-west-2a", "Linux/UNIX"),
            (0.05, true)
        );
    }

    #[tokio::test]
    async fn sp_rate_sentinel_is_opaque_but_counts_for_has_any() {
        let cache = PricingCache::new();
        let key = build_key(
            COMMA,
            &["arn1", "m5.xlarge", "us-west-2", "default", "linux"],
        );
        let mut rates = HashMap::new();
        rates.insert(key, SP_RATE_NOT_AVAILABLE);
        cache.add_sp_rates(rates);

        assert_eq!(
            cache.get_sp_rate("arn1", "m5.xlarge", "us-west-2", "default", "linux"),
            (0.0, false)
        );
        assert!(cache.has_any_sp_rate("arn1"));
    }

    #[tokio::test]
    async fn s4_gap_discovery_scenario() {
        let cache = PricingCache::new();
        let key = build_key(
            COMMA,
            &["arn1", "m5.xlarge", "us-west-2", "default", "linux"],
        );
        let mut rates = HashMap::new();
        rates.insert(key, 0.0537);
        cache.add_sp_rates(rates);

        let (missing_types, missing_regions, missing_tenancies, missing_os) = cache
            .get_missing_sp_rates_for_instances(
                "arn1",
                &["m5.xlarge"],
                &["us-west-2", "us-east-1"],
                &["default"],
                &["linux"],
            );

        assert_eq!(missing_types, vec!["m5.xlarge"]);
        assert_eq!(missing_regions, vec!["us-east-1"]);
        assert_eq!(missing_tenancies, vec!["default"]);
        assert_eq!(missing_os, vec!["linux"]);
    }

    #[tokio::test]
    async fn gap_discovery_empty_inputs_yield_empty_outputs() {
        let cache = PricingCache::new();
        let (a, b, c, d) =
            cache.get_missing_sp_rates_for_instances("arn1", &[], &["us-west-2"], &["default"], &["linux"]);
        assert!(a.is_empty() && b.is_empty() && c.is_empty() && d.is_empty());
    }

    #[tokio::test]
    async fn gap_discovery_finds_nothing_when_fully_covered() {
        let cache = PricingCache::new();
        let key = build_key(
            COMMA,
            &["arn1", "m5.xlarge", "us-west-2", "default", "linux"],
        );
        let mut rates = HashMap::new();
        rates.insert(key, 0.05);
        cache.add_sp_rates(rates);

        let (a, b, c, d) = cache.get_missing_sp_rates_for_instances(
            "arn1",
            &["m5.xlarge"],
            &["us-west-2"],
            &["default"],
            &["linux"],
        );
        assert!(a.is_empty() && b.is_empty() && c.is_empty() && d.is_empty());
    }

    #[tokio::test]
    async fn delete_spot_price_does_not_touch_timestamp_but_updates_flag() {
        let cache = PricingCache::new();
        let mut prices = HashMap::new();
        prices.insert("k".to_string(), sample_spot("m5.xlarge", "us-west-2a", "linux", 0.1));
        cache.insert_spot_prices(prices);

        assert!(cache.delete_spot_price("m5.xlarge", "us-west-2a", "linux"));
        assert!(!cache.delete_spot_price("m5.xlarge", "us-west-2a", "linux"));
        assert!(cache.spot_flag.read().populated == false);
    }

    #[tokio::test]
    async fn on_demand_stale_before_population() {
        let cache = PricingCache::new();
        assert!(cache.on_demand_is_stale(Duration::from_secs(1000)));
    }

    #[tokio::test]
    async fn copy_isolation_on_get_all() {
        let cache = PricingCache::new();
        let mut rates = HashMap::new();
        rates.insert("arn1,m5.xlarge,us-west-2,default,linux".to_string(), 0.05);
        cache.add_sp_rates(rates);

        let mut copy = cache.get_all_sp_rates();
        copy.insert("extra".to_string(), 1.0);

        assert_eq!(cache.get_all_sp_rates().len(), 1);
    }
}
