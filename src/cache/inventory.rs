//! EC2 inventory cache.
//!
//! A flat `InstanceID -> Instance` map, logically partitioned by
//! `(account, region)`. `set_instances` atomically replaces a partition:
//! delete everything in that partition, insert the new set, advance the
//! timestamp, notify.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{Instance, InstanceState};

use super::substrate::Substrate;

pub struct Ec2InventoryCache {
    instances: RwLock<HashMap<String, Instance>>,
    substrate: Substrate,
}

impl Default for Ec2InventoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Ec2InventoryCache {
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
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

    /// Replace the partition for `(account_id, region)` with `new_instances`.
    /// An empty slice correctly empties the partition.
    pub fn set_instances(&self, account_id: &str, region: &str, new_instances: Vec<Instance>) {
        {
            let mut data = self.instances.write();
            data.retain(|_, inst| !(inst.account_id == account_id && inst.region == region));
            for inst in new_instances {
                data.insert(inst.instance_id.clone(), inst);
            }
            self.substrate.mark_updated();
        }
        self.substrate.notify_update();
    }

    pub fn get_instance(&self, instance_id: &str) -> (Option<Instance>, bool) {
        match self.instances.read().get(instance_id) {
            Some(inst) => (Some(inst.clone()), true),
            None => (None, false),
        }
    }

    pub fn get_instances_by_account(&self, account_id: &str) -> Vec<Instance> {
        self.instances
            .read()
            .values()
            .filter(|i| i.account_id == account_id)
            .cloned()
            .collect()
    }

    pub fn get_instances_by_region(&self, region: &str) -> Vec<Instance> {
        self.instances
            .read()
            .values()
            .filter(|i| i.region == region)
            .cloned()
            .collect()
    }

    pub fn get_all_instances(&self) -> Vec<Instance> {
        self.instances.read().values().cloned().collect()
    }

    pub fn get_running_instances(&self) -> Vec<Instance> {
        self.instances
            .read()
            .values()
            .filter(|i| i.state == InstanceState::Running)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        {
            let mut data = self.instances.write();
            data.clear();
            self.substrate.clear();
        }
        self.substrate.notify_update();
    }
}
