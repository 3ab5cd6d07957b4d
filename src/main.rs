use clap::{Parser, Subcommand};
use exsim::cli::{self, MarketJob};
use exsim::config::DataPaths;
use exsim::error::ExsimResult;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exsim")]
#[command(about = "ExSim war room: shared dashboard outputs and market report mapping.")]
#[command(long_about = "ExSim - Shared outputs broker and market report mapper

Seven role dashboards (CMO, Production, Purchasing, CLO, CPO, ESG, CFO)
exchange their results through a single JSON store. Upstream dashboards
export, downstream dashboards import, in dependency order.

COMMANDS:
  status      - Show what each dashboard has published
  graph       - Show the dependency graph and cascade order
  export      - Publish a dashboard's outputs from a JSON file
  import      - Print a dashboard's published outputs
  deps        - Check which upstream outputs are available
  clear       - Reset the shared store
  map-market  - Market report to MARKET_DATA workbook
  cascade     - Regenerate dashboards in dependency order
  watch       - Re-map the market report whenever it changes

EXAMPLES:
  exsim status
  exsim export CMO cmo_outputs.json
  exsim map-market Reports/market-report.xls --publish
  exsim watch --period 8

Logging: set RUST_LOG (e.g. RUST_LOG=exsim=debug).")]
#[command(version)]
struct Cli {
    /// Root directory holding Reports/, data/ and dashboards_v2/
    #[arg(long, global = true, env = "EXSIM_ROOT")]
    root: Option<PathBuf>,

    /// Shared outputs store (default: <root>/shared_outputs.json)
    #[arg(long, global = true, env = "EXSIM_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the export status of every dashboard
    Status,

    /// Show the dashboard dependency graph
    Graph,

    #[command(long_about = "Publish a dashboard's outputs.

The file must hold a JSON object. It replaces the dashboard's previous
outputs entirely (no merge). Keys are compared against the dashboard's
documented schema; differences are reported but never rejected.

EXAMPLE:
  exsim export CMO cmo_outputs.json")]
    /// Publish a dashboard's outputs from a JSON file
    Export {
        /// Dashboard name (CMO, Production, Purchasing, CLO, CPO, ESG, CFO)
        dashboard: String,

        /// JSON file containing an object of outputs
        file: PathBuf,
    },

    /// Print a dashboard's published outputs as JSON
    Import {
        /// Dashboard name
        dashboard: String,
    },

    /// Show which upstream outputs a dashboard can use
    Deps {
        /// Dashboard name
        dashboard: String,
    },

    /// Remove every published output
    Clear,

    #[command(long_about = "Map the market report to a MARKET_DATA workbook.

Reads the six section tables of the market report (SpreadsheetML .xls or a
regular workbook) and writes 40 rows: 5 zones x 2 segments x 4 companies.

INPUT:
  Defaults to market-report.xls found in <root>/Reports, then <root>/data.

OUTPUT:
  Defaults to <root>/dashboards_v2/Demand_Planner_Filled.xlsx

EXAMPLE:
  exsim map-market Reports/market-report.xls -o planner.xlsx --period 8")]
    /// Map the market report to a MARKET_DATA workbook
    MapMarket {
        /// Market report (.xls SpreadsheetML or .xlsx)
        input: Option<PathBuf>,

        /// Output workbook path (.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Period written to every row
        #[arg(long, default_value_t = 7)]
        period: u32,

        /// Own company for the summary and published outputs
        #[arg(long, default_value = "A3")]
        company: String,

        /// Publish CMO pricing and market position to the shared store
        #[arg(long)]
        publish: bool,

        /// Show extraction details
        #[arg(short, long)]
        verbose: bool,
    },

    /// Regenerate dashboards in dependency order
    Cascade {
        /// Market report (.xls SpreadsheetML or .xlsx)
        input: Option<PathBuf>,

        /// Period written to every MARKET_DATA row
        #[arg(long, default_value_t = 7)]
        period: u32,

        /// Own company
        #[arg(long, default_value = "A3")]
        company: String,
    },

    /// Re-run map-market whenever the report changes
    Watch {
        /// Market report to watch
        input: Option<PathBuf>,

        /// Output workbook path (.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Period written to every row
        #[arg(long, default_value_t = 7)]
        period: u32,

        /// Own company
        #[arg(long, default_value = "A3")]
        company: String,

        /// Publish CMO outputs after every run
        #[arg(long)]
        publish: bool,

        /// Show extraction details
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("exsim=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExsimResult<()> {
    init_tracing();
    let cli = Cli::parse();

    let paths = cli.root.map(DataPaths::new).unwrap_or_default();
    let store = cli.store.unwrap_or_else(|| paths.shared_outputs_path());

    match cli.command {
        Commands::Status => cli::status(store),

        Commands::Graph => cli::graph(),

        Commands::Export { dashboard, file } => cli::export(store, dashboard, file),

        Commands::Import { dashboard } => cli::import(store, dashboard),

        Commands::Deps { dashboard } => cli::deps(store, dashboard),

        Commands::Clear => cli::clear(store),

        Commands::MapMarket {
            input,
            output,
            period,
            company,
            publish,
            verbose,
        } => {
            let job = MarketJob::resolve(
                &paths,
                input,
                output,
                period,
                &company,
                publish.then_some(store),
            )?;
            cli::map_market(job, verbose)
        }

        Commands::Cascade {
            input,
            period,
            company,
        } => {
            let job = MarketJob::resolve(&paths, input, None, period, &company, None)?;
            cli::cascade(job, &paths, store)
        }

        Commands::Watch {
            input,
            output,
            period,
            company,
            publish,
            verbose,
        } => {
            let job = MarketJob::resolve(
                &paths,
                input,
                output,
                period,
                &company,
                publish.then_some(store),
            )?;
            cli::watch(job, verbose)
        }
    }
}
