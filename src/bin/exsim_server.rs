//! ExSim API Server binary
//!
//! HTTP REST API over the shared outputs store.

use std::path::PathBuf;

use clap::Parser;
use exsim::api::{run_api_server, ApiConfig};
use exsim::config::DataPaths;

#[derive(Parser, Debug)]
#[command(name = "exsim-server")]
#[command(version)]
#[command(about = "ExSim API Server - HTTP access to the shared dashboard outputs")]
#[command(long_about = r#"
ExSim API Server - HTTP access to the shared dashboard outputs

Endpoints:
  - GET  /api/v1/status                   - Export status per dashboard
  - GET  /api/v1/graph                    - Dependency graph and cascade order
  - POST /api/v1/export                   - Publish a dashboard's outputs
  - GET  /api/v1/import/:dashboard        - Read a dashboard's outputs
  - GET  /api/v1/dependencies/:dashboard  - Outputs of its upstream dashboards
  - POST /api/v1/clear                    - Reset the store
  - POST /api/v1/market/map               - Market report to MARKET_DATA

Additional endpoints:
  - GET  /health                          - Health check
  - GET  /version                         - Server version info
  - GET  /                                - API documentation

Features:
  - CORS enabled for cross-origin requests
  - Graceful shutdown on SIGINT/SIGTERM
  - JSON response format with request IDs

Example usage:
  exsim-server                            # Start on localhost:8080
  exsim-server --host 0.0.0.0 --port 3000 --store /srv/exsim/shared_outputs.json

  curl -X POST http://localhost:8080/api/v1/export \
    -H "Content-Type: application/json" \
    -d '{"dashboard": "CMO", "outputs": {"marketing_spend": 50000}}'
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "EXSIM_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "EXSIM_PORT")]
    port: u16,

    /// Root directory; the store defaults to <root>/shared_outputs.json
    #[arg(long, env = "EXSIM_ROOT")]
    root: Option<PathBuf>,

    /// Shared outputs store path
    #[arg(long, env = "EXSIM_STORE")]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let paths = args.root.map(DataPaths::new).unwrap_or_default();
    let config = ApiConfig {
        host: args.host,
        port: args.port,
        store_path: args.store.unwrap_or_else(|| paths.shared_outputs_path()),
    };

    run_api_server(config).await
}
