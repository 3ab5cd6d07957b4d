//! ExSim API Server module
//!
//! HTTP REST API over the shared output broker.
//! Run with `exsim-server`.

pub mod handlers;
pub mod server;

pub use server::{build_router, run_api_server, ApiConfig, AppState};
