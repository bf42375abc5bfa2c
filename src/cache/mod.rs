//! The cost data plane's cache layer.
//!
//! Every domain cache embeds a [`substrate::Substrate`] by composition and
//! keeps its own data behind its own `parking_lot` lock. None of these types
//! talk to each other directly — the reconciler in [`crate::reconcile`] is
//! the only consumer that reads from more than one at a time.

pub mod inventory;
pub mod kv;
pub mod nodes;
pub mod pricing;
pub mod reservations;
pub mod substrate;

pub use inventory::Ec2InventoryCache;
pub use kv::KvCache;
pub use nodes::{parse_provider_id, NodeCache};
pub use pricing::{InstanceTypeRegion, PricingCache};
pub use reservations::{ReservationCache, ReservationStats};
pub use substrate::Substrate;
