//! lumina-cost-plane
//!
//! The in-memory data plane of an AWS cost-visibility service: concurrent,
//! thread-safe caches for EC2 inventory, Reserved Instances, Savings Plans,
//! and market prices; an update-notifier graph; a debouncer; a
//! multi-source readiness barrier; and a stateless cost calculator.
//!
//! AWS API clients, pollers, the HTTP metrics transport, and logging/RBAC
//! setup are external collaborators this crate does not own — see
//! [`reconcile::Coordinator`] for where they'd plug in.

pub mod cache;
pub mod calculator;
pub mod config;
pub mod debounce;
pub mod error;
pub mod key;
pub mod metrics;
pub mod reconcile;
pub mod types;

pub use cache::{Ec2InventoryCache, KvCache, NodeCache, PricingCache, ReservationCache, Substrate};
pub use calculator::{CalculationInput, CalculationResult, Calculator, DefaultCalculator};
pub use config::CorePlaneConfig;
pub use debounce::Debouncer;
pub use error::{NodeCacheError, NodeCacheResult};
pub use metrics::MetricPublisher;
pub use reconcile::Coordinator;
