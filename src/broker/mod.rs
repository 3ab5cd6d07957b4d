//! Cross-dashboard data exchange
//!
//! - `graph`: the static dependency graph and cascade order
//! - `store`: persistence behind the [`OutputStore`] trait
//! - `manager`: the [`SharedOutputBroker`] dashboards talk to

pub mod graph;
pub mod manager;
pub mod store;

pub use graph::{cascade_order, dependency_summary, dependents, EXECUTION_ORDER};
pub use manager::{SchemaReport, SharedOutputBroker};
pub use store::{ExportedRecord, JsonFileStore, MemoryStore, OutputStore, StoreSnapshot};
