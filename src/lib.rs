//! ExSim - shared outputs broker and market report mapper
//!
//! Seven role dashboards of the ExSim business simulation exchange their
//! results through one JSON store, in a fixed dependency order:
//!
//! ```text
//! CMO → Production → {Purchasing, CLO, CPO, ESG} → CFO
//! ```
//!
//! The CMO stage is fed by the simulator's market report, a single-sheet
//! export holding six labeled tables that this crate reconstructs and maps to
//! the 40-row MARKET_DATA layout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use exsim::broker::{JsonFileStore, SharedOutputBroker};
//! use exsim::market::{load_market_report, map_market_data, MappingOptions};
//! use exsim::types::Dashboard;
//!
//! let broker = SharedOutputBroker::open(Arc::new(JsonFileStore::new("shared_outputs.json")))?;
//! let upstream = broker.import_dependencies(Dashboard::Production);
//! println!("CMO published: {}", upstream.contains_key(&Dashboard::Cmo));
//!
//! let tables = load_market_report("Reports/market-report.xls")?;
//! let rows = map_market_data(&tables, &MappingOptions::default());
//! assert_eq!(rows.len(), 40);
//! # Ok::<(), exsim::error::ExsimError>(())
//! ```

pub mod api;
pub mod broker;
pub mod cascade;
pub mod cli;
pub mod config;
pub mod error;
pub mod excel;
pub mod market;
pub mod types;

// Re-export commonly used types
pub use broker::{JsonFileStore, SharedOutputBroker};
pub use error::{ExsimError, ExsimResult};
pub use market::{MarketTables, SectionExtractor};
pub use types::{Company, Dashboard, Outputs, Segment, Zone};
