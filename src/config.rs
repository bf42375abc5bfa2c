//! Runtime configuration for the cost data plane.
//!
//! `env::var` lookups with documented fallbacks; loading never hard-fails,
//! an unparsable override just falls back to the default and logs a warning.

use std::env;
use std::time::Duration;
use tracing::warn;

/// Environment-driven knobs for the debouncer and per-cache staleness
/// thresholds. None of these affect correctness — only how aggressively the
/// coordinator recomputes and how soon `IsStale` starts returning `true`.
#[derive(Debug, Clone)]
pub struct CorePlaneConfig {
    pub debounce_interval: Duration,
    pub on_demand_max_age: Duration,
    pub sp_rate_max_age: Duration,
    pub spot_price_max_age: Duration,
    pub inventory_max_age: Duration,
    pub ri_sp_max_age: Duration,
    pub metrics_namespace: String,
}

impl Default for CorePlaneConfig {
    fn default() -> Self {
        Self {
            debounce_interval: Duration::from_secs(2),
            on_demand_max_age: Duration::from_secs(15 * 60),
            sp_rate_max_age: Duration::from_secs(15 * 60),
            spot_price_max_age: Duration::from_secs(15 * 60),
            inventory_max_age: Duration::from_secs(15 * 60),
            ri_sp_max_age: Duration::from_secs(15 * 60),
            metrics_namespace: "lumina".to_string(),
        }
    }
}

impl CorePlaneConfig {
    /// Load configuration from the environment, falling back to defaults for
    /// anything missing or unparsable. Never fails.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut cfg = Self::default();

        if let Some(ms) = parse_env_u64("LUMINA_DEBOUNCE_MS") {
            cfg.debounce_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_env_u64("LUMINA_ON_DEMAND_MAX_AGE_SECS") {
            cfg.on_demand_max_age = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env_u64("LUMINA_SP_RATE_MAX_AGE_SECS") {
            cfg.sp_rate_max_age = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env_u64("LUMINA_SPOT_PRICE_MAX_AGE_SECS") {
            cfg.spot_price_max_age = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env_u64("LUMINA_INVENTORY_MAX_AGE_SECS") {
            cfg.inventory_max_age = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env_u64("LUMINA_RI_SP_MAX_AGE_SECS") {
            cfg.ri_sp_max_age = Duration::from_secs(secs);
        }
        if let Ok(ns) = env::var("LUMINA_METRICS_NAMESPACE") {
            if !ns.is_empty() {
                cfg.metrics_namespace = ns;
            }
        }

        cfg
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    match env::var(key) {
        Ok(v) => match v.parse::<u64>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(key, value = %v, "ignoring unparsable env override, using default");
                None
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_total_and_reasonable() {
        let cfg = CorePlaneConfig::default();
        assert_eq!(cfg.debounce_interval, Duration::from_secs(2));
        assert_eq!(cfg.metrics_namespace, "lumina");
    }
}
