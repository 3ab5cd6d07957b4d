use crate::broker::{
    cascade_order, dependency_summary, dependents, JsonFileStore, SharedOutputBroker,
};
use crate::cascade::{CascadeRunner, MarketDataGenerator, StageStatus};
use crate::config::{DataPaths, MARKET_REPORT_FILE};
use crate::error::{ExsimError, ExsimResult};
use crate::excel::MarketDataExporter;
use crate::market::{
    load_market_report, map_market_data, CompanyMarketView, MappingOptions, MarketTables,
    SectionKind,
};
use crate::types::{Company, Dashboard, Outputs, Zone};
use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;

/// Default MARKET_DATA workbook name, under the output directory
pub const MARKET_DATA_OUTPUT_FILE: &str = "Demand_Planner_Filled.xlsx";

/// Format a number for display, removing unnecessary decimal places
fn format_number(n: f64) -> String {
    let rounded = (n * 1e6).round() / 1e6;
    format!("{:.6}", rounded)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn open_broker(store: &Path) -> ExsimResult<SharedOutputBroker> {
    SharedOutputBroker::open(Arc::new(JsonFileStore::new(store)))
}

fn parse_company(company: &str) -> ExsimResult<Company> {
    Company::parse(company).ok_or_else(|| {
        ExsimError::Validation(format!(
            "Unknown company '{}' (expected one of A1, A2, A3, A4)",
            company
        ))
    })
}

/// Execute the status command
pub fn status(store: PathBuf) -> ExsimResult<()> {
    println!("{}", "📡 ExSim - Shared Outputs".bold().green());
    println!("   Store: {}\n", store.display());

    let broker = open_broker(&store)?;
    for (dashboard, line) in broker.get_status() {
        let line = if line.starts_with("[OK]") {
            line.green()
        } else {
            line.dimmed()
        };
        println!("   {:<12} {}", dashboard.name().bold(), line);
    }
    println!();

    Ok(())
}

/// Execute the graph command
pub fn graph() -> ExsimResult<()> {
    println!("{}", "🔗 ExSim - Dashboard Dependency Graph".bold().green());
    println!();

    for line in dependency_summary() {
        println!("   {}", line);
    }
    println!();

    println!("{}", "Cascade order:".bold());
    for (idx, dashboard) in cascade_order()?.into_iter().enumerate() {
        let feeds = dependents(dashboard);
        if feeds.is_empty() {
            println!("   {}. {}", idx + 1, dashboard.name().bright_blue());
        } else {
            let names: Vec<&str> = feeds.iter().map(|d| d.name()).collect();
            println!(
                "   {}. {} → {}",
                idx + 1,
                dashboard.name().bright_blue(),
                names.join(", ")
            );
        }
    }
    println!();

    Ok(())
}

/// Read a JSON object of outputs from disk
fn read_outputs_file(file: &Path) -> ExsimResult<Outputs> {
    let content = fs::read_to_string(file).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExsimError::NotFound(file.display().to_string()),
        _ => ExsimError::Io(e),
    })?;
    match serde_json::from_str::<serde_json::Value>(&content)? {
        serde_json::Value::Object(outputs) => Ok(outputs),
        other => Err(ExsimError::Validation(format!(
            "{} must contain a JSON object, found {}",
            file.display(),
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Execute the export command
pub fn export(store: PathBuf, dashboard: String, file: PathBuf) -> ExsimResult<()> {
    println!("{}", "📤 ExSim - Export Outputs".bold().green());
    println!("   Dashboard: {}", dashboard.bright_blue());
    println!("   Input:     {}\n", file.display());

    let dashboard: Dashboard = dashboard.parse()?;
    let outputs = read_outputs_file(&file)?;
    let keys = outputs.len();

    let report = SharedOutputBroker::schema_report(dashboard, &outputs);
    if !report.missing.is_empty() {
        println!(
            "   {} {}",
            "⚠️  Missing expected keys:".yellow(),
            report.missing.join(", ")
        );
    }
    if !report.unexpected.is_empty() {
        println!(
            "   {} {}",
            "ℹ️  Extra keys:".cyan(),
            report.unexpected.join(", ")
        );
    }

    let broker = open_broker(&store)?;
    if !broker.export_outputs(dashboard, outputs) {
        return Err(ExsimError::Export(format!(
            "Could not write {} outputs to {}",
            dashboard,
            store.display()
        )));
    }

    println!(
        "{} {} keys from {}",
        "✅ Exported".bold().green(),
        keys,
        dashboard
    );
    Ok(())
}

/// Execute the import command
pub fn import(store: PathBuf, dashboard: String) -> ExsimResult<()> {
    let dashboard: Dashboard = dashboard.parse()?;
    let broker = open_broker(&store)?;

    match broker.import_data(dashboard) {
        Some(outputs) => {
            println!("{}", serde_json::to_string_pretty(&outputs)?);
        }
        None => {
            println!("{} {}", "[--] No data for".yellow(), dashboard);
        }
    }
    Ok(())
}

/// Execute the deps command
pub fn deps(store: PathBuf, dashboard: String) -> ExsimResult<()> {
    let dashboard: Dashboard = dashboard.parse()?;
    println!(
        "{} {}",
        "🔗 ExSim - Dependencies of".bold().green(),
        dashboard.name().bold()
    );
    println!();

    let declared = dashboard.dependencies();
    if declared.is_empty() {
        println!("   (no dependencies)\n");
        return Ok(());
    }

    let broker = open_broker(&store)?;
    let available = broker.import_dependencies(dashboard);
    for dep in declared {
        match available.get(dep) {
            Some(outputs) => println!(
                "   {} {:<12} {} keys",
                "✅".green(),
                dep.name(),
                outputs.len()
            ),
            None => println!("   {} {:<12} no data", "❌".red(), dep.name()),
        }
    }
    println!();

    Ok(())
}

/// Execute the clear command
pub fn clear(store: PathBuf) -> ExsimResult<()> {
    let broker = open_broker(&store)?;
    broker.clear()?;
    println!(
        "{} {}",
        "🧹 Cleared shared outputs in".bold().green(),
        store.display()
    );
    Ok(())
}

/// Settings for one market-report mapping run
#[derive(Debug, Clone)]
pub struct MarketJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: MappingOptions,
    pub company: Company,
    /// Also publish the CMO outputs to this store
    pub publish: Option<PathBuf>,
}

impl MarketJob {
    /// Resolve defaults against the data directories
    pub fn resolve(
        paths: &DataPaths,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
        period: u32,
        company: &str,
        publish: Option<PathBuf>,
    ) -> ExsimResult<Self> {
        let input = match input {
            Some(path) => path,
            None => paths.require(MARKET_REPORT_FILE)?,
        };
        let output = output.unwrap_or_else(|| paths.output_dir.join(MARKET_DATA_OUTPUT_FILE));
        Ok(Self {
            input,
            output,
            options: MappingOptions {
                period,
                ..MappingOptions::default()
            },
            company: parse_company(company)?,
            publish,
        })
    }
}

fn print_extraction_summary(tables: &MarketTables) {
    for kind in SectionKind::ALL {
        let table = tables.get(kind);
        let count = if table.is_empty() {
            "empty".yellow()
        } else {
            format!("{} values", table.len()).normal()
        };
        println!("   {:<22} {}", kind.key(), count);
    }
    println!();
}

fn print_company_view(view: &CompanyMarketView) {
    println!(
        "   {:<8} {:>10} {:>10} {:>12}",
        "Zone", "Share %", "Price", "Comp. Price"
    );
    for zone in Zone::ALL {
        if let Some(m) = view.zone(zone) {
            println!(
                "   {:<8} {:>10} {:>10} {:>12}",
                zone.name(),
                format_number(m.my_market_share),
                format_number(m.my_price),
                format_number(m.comp_avg_price)
            );
        }
    }
    println!();
}

/// Map a report to MARKET_DATA without console chrome; returns the row count
fn run_market_job(job: &MarketJob, verbose: bool) -> ExsimResult<usize> {
    let tables = load_market_report(&job.input)?;
    if verbose {
        print_extraction_summary(&tables);
    }

    let rows = map_market_data(&tables, &job.options);
    let count = rows.len();
    MarketDataExporter::new(rows).export(&job.output)?;

    if let Some(store) = &job.publish {
        let generator = MarketDataGenerator::new(tables).with_company(job.company);
        let broker = open_broker(store)?;
        if !broker.export_outputs(Dashboard::Cmo, generator.market_outputs()) {
            return Err(ExsimError::Export(format!(
                "Could not publish CMO outputs to {}",
                store.display()
            )));
        }
    }

    Ok(count)
}

/// Execute the map-market command
pub fn map_market(job: MarketJob, verbose: bool) -> ExsimResult<()> {
    println!("{}", "📊 ExSim - Market Report Mapping".bold().green());
    println!("   Input:   {}", job.input.display());
    println!("   Output:  {}", job.output.display());
    println!("   Period:  {}", job.options.period);
    println!("   Company: {}\n", job.company.name().bright_blue());

    if verbose {
        println!("{}", "📖 Reading market report...".cyan());
    }

    let tables = load_market_report(&job.input)?;
    print_extraction_summary(&tables);

    if tables.market_share_region.is_empty() {
        println!(
            "{}",
            "⚠️  No market share per region data found. Check the report layout.".yellow()
        );
    }

    print_company_view(&CompanyMarketView::build(&tables, job.company));

    let count = run_market_job(&job, false)?;

    println!("{}", "✅ Mapping Complete!".bold().green());
    println!("   {} MARKET_DATA rows → {}", count, job.output.display());
    if let Some(store) = &job.publish {
        println!("   CMO outputs published to {}", store.display());
    }
    println!();

    Ok(())
}

/// Execute the cascade command
pub fn cascade(job: MarketJob, paths: &DataPaths, store: PathBuf) -> ExsimResult<()> {
    println!("{}", "🌊 ExSim - Dashboard Cascade".bold().green());
    println!("   Report: {}", job.input.display());
    println!("   Output: {}", paths.output_dir.display());
    println!("   Store:  {}\n", store.display());

    let tables = load_market_report(&job.input)?;
    let generator = MarketDataGenerator::new(tables)
        .with_company(job.company)
        .with_options(job.options.clone());

    let broker = Arc::new(open_broker(&store)?);
    let report = CascadeRunner::new(broker)
        .register(Box::new(generator))
        .with_output_dir(&paths.output_dir)
        .run()?;

    for stage in &report.stages {
        match &stage.status {
            StageStatus::Completed {
                workbook,
                output_keys,
            } => {
                let target = workbook
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "no workbook".to_string());
                println!(
                    "   {} {:<12} {} keys, {}",
                    "✅".green(),
                    stage.dashboard.name(),
                    output_keys,
                    target
                );
            }
            StageStatus::Skipped => {
                println!(
                    "   {} {:<12} {}",
                    "⏭️ ".dimmed(),
                    stage.dashboard.name(),
                    "no generator".dimmed()
                );
            }
            StageStatus::Failed(msg) => {
                println!("   {} {:<12} {}", "❌".red(), stage.dashboard.name(), msg.red());
            }
        }
    }
    println!();

    if report.succeeded() {
        println!("{}", "✅ Cascade Complete!".bold().green());
        Ok(())
    } else {
        let failed: Vec<&str> = report.failed().map(|(d, _)| d.name()).collect();
        Err(ExsimError::Validation(format!(
            "Cascade failed for: {}",
            failed.join(", ")
        )))
    }
}

/// Execute the watch command
pub fn watch(job: MarketJob, verbose: bool) -> ExsimResult<()> {
    println!("{}", "👁️  ExSim - Watch Mode".bold().green());
    println!("   Watching: {}", job.input.display());
    println!("   Output:   {}", job.output.display());
    println!("   Press {} to stop\n", "Ctrl+C".bold().yellow());

    if !job.input.exists() {
        return Err(ExsimError::NotFound(job.input.display().to_string()));
    }

    let canonical_path = job.input.canonicalize()?;
    let parent_dir = canonical_path
        .parent()
        .ok_or_else(|| ExsimError::Validation("Cannot determine parent directory".to_string()))?;

    let (tx, rx) = channel();

    // Report exports arrive in several writes; wait for them to settle
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)
        .map_err(|e| ExsimError::Validation(format!("Failed to create file watcher: {}", e)))?;

    debouncer
        .watcher()
        .watch(parent_dir, RecursiveMode::NonRecursive)
        .map_err(|e| ExsimError::Validation(format!("Failed to watch directory: {}", e)))?;

    if verbose {
        println!(
            "   {} {}",
            "Watching directory:".cyan(),
            parent_dir.display()
        );
    }

    println!("{}", "🔄 Initial run...".cyan());
    run_watch_action(&job, verbose);
    println!();

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant = events.iter().any(|event| {
                    event.kind == DebouncedEventKind::Any
                        && (event.path.canonicalize().ok().as_ref() == Some(&canonical_path)
                            || event.path.file_name() == canonical_path.file_name())
                });

                if relevant {
                    println!(
                        "\n{} {}",
                        "🔄 Change detected at".cyan(),
                        chrono::Local::now().format("%H:%M:%S").to_string().cyan()
                    );
                    run_watch_action(&job, verbose);
                    println!();
                }
            }
            Ok(Err(error)) => {
                eprintln!("{} Watch error: {}", "❌".red(), error);
            }
            Err(e) => {
                eprintln!("{} Channel error: {}", "❌".red(), e);
                break;
            }
        }
    }

    Ok(())
}

fn run_watch_action(job: &MarketJob, verbose: bool) {
    match run_market_job(job, verbose) {
        Ok(count) => println!(
            "{} {} rows → {}",
            "✅ Mapped".bold().green(),
            count,
            job.output.display()
        ),
        Err(e) => println!("{} {}", "❌ Mapping failed:".bold().red(), e),
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
