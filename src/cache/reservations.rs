//! RI/SP inventory cache.
//!
//! Nested `region -> account -> [ReservedInstance]`, flat `account ->
//! [SavingsPlan]`, and a domain-specific freshness map keyed
//! `lower("region:account:ri")` / `lower("account:sp")`.

use std::collections::HashMap;

use parking_lot::RwLock;

use chrono::{DateTime, Utc};

use crate::key::{build_key, COLON};
use crate::types::{ReservedInstance, SavingsPlan};

use super::substrate::Substrate;

#[derive(Debug, Default, Clone, Copy)]
pub struct ReservationStats {
    pub ri_count: usize,
    pub sp_count: usize,
    pub unique_regions: usize,
    pub unique_accounts: usize,
}

pub struct ReservationCache {
    ris: RwLock<HashMap<String, HashMap<String, Vec<ReservedInstance>>>>,
    sps: RwLock<HashMap<String, Vec<SavingsPlan>>>,
    freshness: RwLock<HashMap<String, DateTime<Utc>>>,
    substrate: Substrate,
}

impl Default for ReservationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationCache {
    pub fn new() -> Self {
        Self {
            ris: RwLock::new(HashMap::new()),
            sps: RwLock::new(HashMap::new()),
            freshness: RwLock::new(HashMap::new()),
            substrate: Substrate::new(),
        }
    }

    pub fn substrate(&self) -> &Substrate {
        &self.substrate
    }

    pub fn register_notifier<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.substrate.register_notifier(f);
    }

    pub fn update_reserved_instances(
        &self,
        region: &str,
        account_id: &str,
        ris: Vec<ReservedInstance>,
    ) {
        {
            let mut data = self.ris.write();
            data.entry(region.to_string())
                .or_default()
                .insert(account_id.to_string(), ris);

            let key = build_key(COLON, &[region, account_id, "ri"]);
            self.freshness.write().insert(key, Utc::now());
            self.substrate.mark_updated();
        }
        self.substrate.notify_update();
    }

    pub fn update_savings_plans(&self, account_id: &str, sps: Vec<SavingsPlan>) {
        {
            let mut data = self.sps.write();
            data.insert(account_id.to_string(), sps);

            let key = build_key(COLON, &[account_id, "sp"]);
            self.freshness.write().insert(key, Utc::now());
            self.substrate.mark_updated();
        }
        self.substrate.notify_update();
    }

    pub fn get_reserved_instances(&self, region: &str, account_id: &str) -> Vec<ReservedInstance> {
        self.ris
            .read()
            .get(region)
            .and_then(|by_account| by_account.get(account_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_all_reserved_instances(&self) -> Vec<ReservedInstance> {
        self.ris
            .read()
            .values()
            .flat_map(|by_account| by_account.values())
            .flatten()
            .cloned()
            .collect()
    }

    pub fn get_savings_plans(&self, account_id: &str) -> Vec<SavingsPlan> {
        self.sps.read().get(account_id).cloned().unwrap_or_default()
    }

    pub fn get_all_savings_plans(&self) -> Vec<SavingsPlan> {
        self.sps.read().values().flatten().cloned().collect()
    }

    pub fn get_stats(&self) -> ReservationStats {
        let ris = self.ris.read();
        let sps = self.sps.read();

        let ri_count: usize = ris.values().flat_map(|m| m.values()).map(|v| v.len()).sum();
        let sp_count: usize = sps.values().map(|v| v.len()).sum();
        let unique_regions = ris.keys().filter(|r| !ris[*r].is_empty()).count();
        let unique_accounts: std::collections::HashSet<&String> = ris
            .values()
            .flat_map(|m| m.keys())
            .chain(sps.keys())
            .collect();

        ReservationStats {
            ri_count,
            sp_count,
            unique_regions,
            unique_accounts: unique_accounts.len(),
        }
    }

    /// Zero if `key` has no recorded freshness stamp.
    pub fn get_freshness(&self, key: &str) -> Option<DateTime<Utc>> {
        self.freshness.read().get(key).copied()
    }
}
