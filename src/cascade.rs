//! Dashboard generation cascade
//!
//! Each dashboard is produced by a [`DashboardGenerator`]. The
//! [`CascadeRunner`] walks the dependency order, feeds every generator the
//! outputs its upstream dashboards published, writes the workbook and
//! publishes the new outputs for the stages that follow.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::broker::{cascade_order, SharedOutputBroker};
use crate::error::{ExsimError, ExsimResult};
use crate::excel::MarketDataExporter;
use crate::market::{map_market_data, CompanyMarketView, MappingOptions, MarketTables};
use crate::types::{Company, Dashboard, Outputs, Zone};

/// What a generator gets to work with
#[derive(Debug, Clone, Default)]
pub struct DashboardInputs {
    /// Outputs published by upstream dashboards (empty ones already dropped)
    pub upstream: BTreeMap<Dashboard, Outputs>,
    /// Dashboard-local inputs supplied by the caller
    pub local: Outputs,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedDashboard {
    /// `.xlsx` bytes; empty when the generator produces no workbook
    pub workbook: Vec<u8>,
    pub outputs: Outputs,
}

pub trait DashboardGenerator: Send + Sync {
    fn dashboard(&self) -> Dashboard;

    fn generate(
        &self,
        inputs: &DashboardInputs,
        overrides: Option<&Outputs>,
    ) -> ExsimResult<GeneratedDashboard>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Completed {
        workbook: Option<PathBuf>,
        output_keys: usize,
    },
    /// No generator registered for the dashboard
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub dashboard: Dashboard,
    pub status: StageStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeReport {
    pub stages: Vec<StageReport>,
}

impl CascadeReport {
    /// True when no stage failed
    pub fn succeeded(&self) -> bool {
        !self
            .stages
            .iter()
            .any(|s| matches!(s.status, StageStatus::Failed(_)))
    }

    pub fn completed(&self) -> impl Iterator<Item = Dashboard> + '_ {
        self.stages
            .iter()
            .filter(|s| matches!(s.status, StageStatus::Completed { .. }))
            .map(|s| s.dashboard)
    }

    pub fn failed(&self) -> impl Iterator<Item = (Dashboard, &str)> + '_ {
        self.stages.iter().filter_map(|s| match &s.status {
            StageStatus::Failed(msg) => Some((s.dashboard, msg.as_str())),
            _ => None,
        })
    }

    pub fn status(&self, dashboard: Dashboard) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|s| s.dashboard == dashboard)
            .map(|s| &s.status)
    }
}

pub struct CascadeRunner {
    broker: Arc<SharedOutputBroker>,
    generators: BTreeMap<Dashboard, Box<dyn DashboardGenerator>>,
    local_inputs: BTreeMap<Dashboard, Outputs>,
    overrides: BTreeMap<Dashboard, Outputs>,
    output_dir: Option<PathBuf>,
}

impl CascadeRunner {
    pub fn new(broker: Arc<SharedOutputBroker>) -> Self {
        Self {
            broker,
            generators: BTreeMap::new(),
            local_inputs: BTreeMap::new(),
            overrides: BTreeMap::new(),
            output_dir: None,
        }
    }

    /// Register a generator, replacing any earlier one for the same dashboard
    pub fn register(mut self, generator: Box<dyn DashboardGenerator>) -> Self {
        self.generators.insert(generator.dashboard(), generator);
        self
    }

    pub fn with_local_inputs(mut self, dashboard: Dashboard, inputs: Outputs) -> Self {
        self.local_inputs.insert(dashboard, inputs);
        self
    }

    pub fn with_overrides(mut self, dashboard: Dashboard, overrides: Outputs) -> Self {
        self.overrides.insert(dashboard, overrides);
        self
    }

    /// Write each stage's workbook to `<dir>/<Dashboard>_Dashboard.xlsx`
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Run every registered stage in cascade order.
    ///
    /// Only a broken dependency graph aborts the run; stage failures are
    /// recorded and the following stages still run with whatever upstream
    /// data exists.
    pub fn run(&self) -> ExsimResult<CascadeReport> {
        let mut report = CascadeReport::default();

        for dashboard in cascade_order()? {
            let status = match self.generators.get(&dashboard) {
                Some(generator) => self.run_stage(dashboard, generator.as_ref()),
                None => StageStatus::Skipped,
            };
            report.stages.push(StageReport { dashboard, status });
        }

        info!(
            "Cascade finished: {} completed, {} failed",
            report.completed().count(),
            report.failed().count()
        );
        Ok(report)
    }

    fn run_stage(&self, dashboard: Dashboard, generator: &dyn DashboardGenerator) -> StageStatus {
        let upstream = self.broker.import_dependencies(dashboard);
        for dep in dashboard.dependencies() {
            if !upstream.contains_key(dep) {
                debug!("{}: upstream {} has not published outputs", dashboard, dep);
            }
        }

        let inputs = DashboardInputs {
            upstream,
            local: self.local_inputs.get(&dashboard).cloned().unwrap_or_default(),
        };

        let generated = match generator.generate(&inputs, self.overrides.get(&dashboard)) {
            Ok(generated) => generated,
            Err(e) => {
                error!("{}: generation failed: {}", dashboard, e);
                return StageStatus::Failed(e.to_string());
            }
        };

        let workbook = match self.write_workbook(dashboard, &generated.workbook) {
            Ok(path) => path,
            Err(e) => {
                error!("{}: could not write workbook: {}", dashboard, e);
                return StageStatus::Failed(e.to_string());
            }
        };

        let output_keys = generated.outputs.len();
        if !self.broker.export_outputs(dashboard, generated.outputs) {
            return StageStatus::Failed(format!("{}: outputs were not published", dashboard));
        }

        info!("{}: completed ({} output keys)", dashboard, output_keys);
        StageStatus::Completed {
            workbook,
            output_keys,
        }
    }

    fn write_workbook(&self, dashboard: Dashboard, bytes: &[u8]) -> ExsimResult<Option<PathBuf>> {
        let Some(dir) = &self.output_dir else {
            return Ok(None);
        };
        if bytes.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}_Dashboard.xlsx", dashboard.name()));
        std::fs::write(&path, bytes)?;
        Ok(Some(path))
    }
}

/// CMO stage backed by the market report.
///
/// Produces the MARKET_DATA workbook and publishes the own company's
/// per-zone prices and market position.
pub struct MarketDataGenerator {
    tables: MarketTables,
    company: Company,
    options: MappingOptions,
}

impl MarketDataGenerator {
    pub fn new(tables: MarketTables) -> Self {
        Self {
            tables,
            company: Company::A3,
            options: MappingOptions::default(),
        }
    }

    pub fn with_company(mut self, company: Company) -> Self {
        self.company = company;
        self
    }

    pub fn with_options(mut self, options: MappingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn company(&self) -> Company {
        self.company
    }

    /// The outputs this stage publishes, before overrides
    pub fn market_outputs(&self) -> Outputs {
        let view = CompanyMarketView::build(&self.tables, self.company);

        let mut pricing = Outputs::new();
        let mut position = Outputs::new();
        for zone in Zone::ALL {
            let metrics = view.zone(zone).cloned().unwrap_or_default();
            pricing.insert(zone.name().to_string(), json!(metrics.my_price));
            position.insert(
                zone.name().to_string(),
                json!({
                    "market_share": metrics.my_market_share,
                    "my_price": metrics.my_price,
                    "comp_avg_price": metrics.comp_avg_price,
                    "awareness": metrics.my_awareness,
                }),
            );
        }

        let mut outputs = Outputs::new();
        outputs.insert("pricing".to_string(), Value::Object(pricing));
        outputs.insert("market_position".to_string(), Value::Object(position));
        outputs
    }
}

impl DashboardGenerator for MarketDataGenerator {
    fn dashboard(&self) -> Dashboard {
        Dashboard::Cmo
    }

    fn generate(
        &self,
        _inputs: &DashboardInputs,
        overrides: Option<&Outputs>,
    ) -> ExsimResult<GeneratedDashboard> {
        if self.tables.is_empty() {
            return Err(ExsimError::Validation(
                "market report produced no tables".to_string(),
            ));
        }

        let rows = map_market_data(&self.tables, &self.options);
        let workbook = MarketDataExporter::new(rows).to_bytes()?;

        let mut outputs = self.market_outputs();
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                outputs.insert(key.clone(), value.clone());
            }
        }

        Ok(GeneratedDashboard { workbook, outputs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryStore;

    struct StaticGenerator {
        dashboard: Dashboard,
        outputs: Outputs,
    }

    impl DashboardGenerator for StaticGenerator {
        fn dashboard(&self) -> Dashboard {
            self.dashboard
        }

        fn generate(
            &self,
            _inputs: &DashboardInputs,
            _overrides: Option<&Outputs>,
        ) -> ExsimResult<GeneratedDashboard> {
            Ok(GeneratedDashboard {
                workbook: Vec::new(),
                outputs: self.outputs.clone(),
            })
        }
    }

    fn broker() -> Arc<SharedOutputBroker> {
        Arc::new(SharedOutputBroker::open(Arc::new(MemoryStore::new())).unwrap())
    }

    fn tables() -> MarketTables {
        let mut tables = MarketTables::new();
        for (company, price) in Company::ALL.into_iter().zip([100.0, 110.0, 95.0, 0.0]) {
            tables.price.set(company, Zone::Center, price);
        }
        tables.market_share_region.set(Company::A3, Zone::Center, 37.8);
        tables
    }

    #[test]
    fn test_unregistered_stages_are_skipped() {
        let report = CascadeRunner::new(broker()).run().unwrap();
        assert_eq!(report.stages.len(), 7);
        assert!(report.succeeded());
        assert_eq!(report.completed().count(), 0);
        assert_eq!(report.status(Dashboard::Cfo), Some(&StageStatus::Skipped));
    }

    #[test]
    fn test_static_stage_publishes_outputs() {
        let broker = broker();
        let mut outputs = Outputs::new();
        outputs.insert("production_plan".to_string(), json!({"Center": 1000}));

        let report = CascadeRunner::new(broker.clone())
            .register(Box::new(StaticGenerator {
                dashboard: Dashboard::Production,
                outputs: outputs.clone(),
            }))
            .run()
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(broker.import_data(Dashboard::Production), Some(outputs));
    }

    /// Collects formatted log output
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_upstream_is_warned_once() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            CascadeRunner::new(broker())
                .register(Box::new(StaticGenerator {
                    dashboard: Dashboard::Production,
                    outputs: Outputs::new(),
                }))
                .run()
                .unwrap();
        });

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text.matches("CMO").count(), 1, "{}", text);
        assert!(text.contains("No data available from CMO"));
    }

    #[test]
    fn test_market_generator_outputs() {
        let generator = MarketDataGenerator::new(tables());
        let generated = generator
            .generate(&DashboardInputs::default(), None)
            .unwrap();

        assert!(generated.workbook.starts_with(b"PK"));
        assert_eq!(generated.outputs["pricing"]["Center"], json!(95.0));
        assert_eq!(generated.outputs["pricing"]["West"], json!(0.0));
        let center = &generated.outputs["market_position"]["Center"];
        assert_eq!(center["market_share"], json!(37.8));
        assert_eq!(center["comp_avg_price"], json!(105.0));
    }

    #[test]
    fn test_market_generator_overrides_replace_keys() {
        let mut overrides = Outputs::new();
        overrides.insert("pricing".to_string(), json!({"Center": 99}));
        overrides.insert("marketing_spend".to_string(), json!(12000));

        let generated = MarketDataGenerator::new(tables())
            .with_company(Company::A1)
            .generate(&DashboardInputs::default(), Some(&overrides))
            .unwrap();

        assert_eq!(generated.outputs["pricing"], json!({"Center": 99}));
        assert_eq!(generated.outputs["marketing_spend"], json!(12000));
        assert!(generated.outputs.contains_key("market_position"));
    }

    #[test]
    fn test_market_generator_rejects_empty_report() {
        let err = MarketDataGenerator::new(MarketTables::new())
            .generate(&DashboardInputs::default(), None)
            .unwrap_err();
        assert!(matches!(err, ExsimError::Validation(_)));
    }
}
