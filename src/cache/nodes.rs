//! Node-correlation cache.
//!
//! Maintains `instanceID -> nodeName` and `nodeName -> deepCopy(Node)`.
//! Unlike every other cache in this crate, `upsert_node` is fallible: a
//! malformed or nil input is a programming-surface error the caller must
//! see, not an absence to shrug off.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{NodeCacheError, NodeCacheResult};
use crate::types::Node;

use super::substrate::Substrate;

const PROVIDER_ID_PREFIX: &str = "aws://";
const INSTANCE_ID_PREFIX: &str = "i-";

/// Parse an AWS provider ID (`aws:///<zone>/i-<id>`) down to its instance id.
pub fn parse_provider_id(provider_id: &str) -> NodeCacheResult<String> {
    if provider_id.is_empty() {
        return Err(NodeCacheError::EmptyProviderId);
    }
    if !provider_id.starts_with(PROVIDER_ID_PREFIX) {
        let scheme = provider_id.split("://").next().unwrap_or(provider_id).to_string();
        return Err(NodeCacheError::UnsupportedProviderScheme { scheme });
    }
    let last = provider_id.rsplit('/').next().unwrap_or("");
    if last.is_empty() || !last.starts_with(INSTANCE_ID_PREFIX) {
        return Err(NodeCacheError::MalformedProviderId {
            provider_id: provider_id.to_string(),
        });
    }
    Ok(last.to_string())
}

pub struct NodeCache {
    instance_to_node: RwLock<HashMap<String, String>>,
    nodes: RwLock<HashMap<String, Node>>,
    substrate: Substrate,
}

impl Default for NodeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeCache {
    pub fn new() -> Self {
        Self {
            instance_to_node: RwLock::new(HashMap::new()),
            nodes: RwLock::new(HashMap::new()),
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

    pub fn upsert_node(&self, node: Option<Node>) -> NodeCacheResult<()> {
        let node = node.ok_or(NodeCacheError::NilNode)?;
        let instance_id = parse_provider_id(&node.provider_id)?;

        {
            let mut by_instance = self.instance_to_node.write();
            let mut by_name = self.nodes.write();
            by_instance.insert(instance_id, node.name.clone());
            by_name.insert(node.name.clone(), node);
            self.substrate.mark_updated();
        }
        self.substrate.notify_update();
        Ok(())
    }

    pub fn get_node_name_for_instance(&self, instance_id: &str) -> (Option<String>, bool) {
        match self.instance_to_node.read().get(instance_id) {
            Some(name) => (Some(name.clone()), true),
            None => (None, false),
        }
    }

    pub fn get_node(&self, name: &str) -> (Option<Node>, bool) {
        match self.nodes.read().get(name) {
            Some(node) => (Some(node.clone()), true),
            None => (None, false),
        }
    }

    /// Scans the forward map for a value equal to `name` and removes exactly
    /// one mapping — the first encountered. Nondeterministic under duplicate
    /// node names; this cache assumes node names are unique. Then removes the
    /// node object itself.
    pub fn delete_node(&self, name: &str) {
        {
            let mut by_instance = self.instance_to_node.write();
            if let Some(instance_id) = by_instance
                .iter()
                .find(|(_, n)| n.as_str() == name)
                .map(|(k, _)| k.clone())
            {
                by_instance.remove(&instance_id);
            }
            self.nodes.write().remove(name);
            self.substrate.mark_updated();
        }
        self.substrate.notify_update();
    }

    pub fn get_all_nodes(&self) -> Vec<Node> {
        self.nodes.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, provider_id: &str) -> Node {
        Node {
            name: name.to_string(),
            provider_id: provider_id.to_string(),
            labels: HashMap::new(),
        }
    }

    #[test]
    fn s7_provider_id_parse_scenario() {
        assert_eq!(
            parse_provider_id("aws:///us-west-2a/i-abc123def456").unwrap(),
            "i-abc123def456"
        );
        assert!(matches!(
            parse_provider_id("gce:///us-west-2a/i-abc"),
            Err(NodeCacheError::UnsupportedProviderScheme { .. })
        ));
        assert!(matches!(parse_provider_id(""), Err(NodeCacheError::EmptyProviderId)));
        assert!(matches!(
            parse_provider_id("aws:///us-west-2a/"),
            Err(NodeCacheError::MalformedProviderId { .. })
        ));
        assert!(matches!(
            parse_provider_id("aws:///us-west-2a/not-an-instance-id"),
            Err(NodeCacheError::MalformedProviderId { .. })
        ));
    }

    #[tokio::test]
    async fn upsert_node_rejects_nil() {
        let cache = NodeCache::new();
        assert_eq!(cache.upsert_node(None), Err(NodeCacheError::NilNode));
    }

    #[tokio::test]
    async fn upsert_node_rejects_malformed_provider_id() {
        let cache = NodeCache::new();
        let err = cache.upsert_node(Some(node("node-1", "bogus"))).unwrap_err();
        assert!(matches!(err, NodeCacheError::UnsupportedProviderScheme { .. }));
    }

    #[tokio::test]
    async fn upsert_then_lookup_both_directions() {
        let cache = NodeCache::new();
        cache
            .upsert_node(Some(node("node-1", "aws:///us-west-2a/i-abc123")))
            .unwrap();

        let (name, ok) = cache.get_node_name_for_instance("i-abc123");
        assert!(ok);
        assert_eq!(name.unwrap(), "node-1");

        let (got, ok) = cache.get_node("node-1");
        assert!(ok);
        assert_eq!(got.unwrap().provider_id, "aws:///us-west-2a/i-abc123");
    }

    #[tokio::test]
    async fn delete_node_removes_both_mappings() {
        let cache = NodeCache::new();
        cache
            .upsert_node(Some(node("node-1", "aws:///us-west-2a/i-abc123")))
            .unwrap();
        cache.delete_node("node-1");

        assert!(!cache.get_node_name_for_instance("i-abc123").1);
        assert!(!cache.get_node("node-1").1);
    }

    #[tokio::test]
    async fn reads_return_deep_copies() {
        let cache = NodeCache::new();
        cache
            .upsert_node(Some(node("node-1", "aws:///us-west-2a/i-abc123")))
            .unwrap();

        let (got, _) = cache.get_node("node-1");
        let mut mutated = got.unwrap();
        mutated.labels.insert("k".to_string(), "v".to_string());

        let (refetched, _) = cache.get_node("node-1");
        assert!(refetched.unwrap().labels.is_empty());
    }
}
