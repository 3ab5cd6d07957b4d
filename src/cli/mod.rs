//! CLI command handlers

pub mod commands;

pub use commands::{
    cascade, clear, deps, export, graph, import, map_market, status, watch, MarketJob,
};
