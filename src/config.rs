//! Data file locations
//!
//! Everything hangs off a single root directory: report inputs in
//! `Reports/` (primary) and `data/` (fallback), generated dashboards in
//! `dashboards_v2/`, and the shared store at `shared_outputs.json`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ExsimError, ExsimResult};

/// Environment variable naming the root directory
pub const ROOT_ENV: &str = "EXSIM_ROOT";
/// Environment variable overriding the shared store location
pub const STORE_ENV: &str = "EXSIM_STORE";

pub const SHARED_OUTPUTS_FILE: &str = "shared_outputs.json";
pub const MARKET_REPORT_FILE: &str = "market-report.xls";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub root: PathBuf,
    pub reports_dir: PathBuf,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new(".")
    }
}

impl DataPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            reports_dir: root.join("Reports"),
            data_dir: root.join("data"),
            output_dir: root.join("dashboards_v2"),
            root,
        }
    }

    /// Root from `EXSIM_ROOT`, falling back to the working directory
    pub fn from_env() -> Self {
        match std::env::var(ROOT_ENV) {
            Ok(root) if !root.trim().is_empty() => Self::new(root),
            _ => Self::default(),
        }
    }

    /// Locate `filename` in `Reports/`, then `data/`.
    pub fn find(&self, filename: &str) -> Option<PathBuf> {
        [&self.reports_dir, &self.data_dir]
            .into_iter()
            .map(|dir| dir.join(filename))
            .find(|candidate| {
                let found = candidate.is_file();
                debug!("Looking for {} -> {}", candidate.display(), found);
                found
            })
    }

    pub fn require(&self, filename: &str) -> ExsimResult<PathBuf> {
        self.find(filename).ok_or_else(|| {
            ExsimError::NotFound(format!(
                "{} (searched {} and {})",
                filename,
                self.reports_dir.display(),
                self.data_dir.display()
            ))
        })
    }

    pub fn shared_outputs_path(&self) -> PathBuf {
        self.root.join(SHARED_OUTPUTS_FILE)
    }

    /// Where a cascade stage writes its workbook
    pub fn dashboard_output_path(&self, dashboard_name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_Dashboard.xlsx", dashboard_name))
    }
}
