//! Shared output broker
//!
//! Each role dashboard publishes its results here and pulls the results of
//! the dashboards it declares as dependencies. The broker is advisory: the
//! Excel reports stay the source of truth, so every read degrades to "no data"
//! instead of failing.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::store::{now_iso8601, ExportedRecord, OutputStore, StoreSnapshot};
use crate::error::ExsimResult;
use crate::types::{Dashboard, Outputs};

/// Difference between published keys and a dashboard's documented schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

impl SchemaReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

pub struct SharedOutputBroker {
    store: Arc<dyn OutputStore>,
}

impl SharedOutputBroker {
    /// Open the broker, initialising an absent store with fresh metadata.
    ///
    /// Initialisation runs as a locked update, so a store another writer
    /// created in the meantime keeps its records.
    pub fn open(store: Arc<dyn OutputStore>) -> ExsimResult<Self> {
        if !store.exists() {
            store.update(&mut |snapshot| snapshot.initialize())?;
        }
        Ok(Self { store })
    }

    /// Publish outputs for a dashboard given by name.
    ///
    /// Unknown names are rejected with a warning and leave the store untouched.
    pub fn export(&self, dashboard_name: &str, outputs: Outputs) -> bool {
        match Dashboard::from_name(dashboard_name) {
            Some(dashboard) => self.export_outputs(dashboard, outputs),
            None => {
                warn!("Unknown dashboard '{}'", dashboard_name);
                false
            }
        }
    }

    /// Replace `dashboard`'s record with `outputs` (no merge).
    pub fn export_outputs(&self, dashboard: Dashboard, outputs: Outputs) -> bool {
        let report = Self::schema_report(dashboard, &outputs);
        if !report.is_clean() {
            info!(
                "{} outputs differ from schema (missing: {:?}, unexpected: {:?})",
                dashboard, report.missing, report.unexpected
            );
        }

        let key_count = outputs.len();
        let mut record = Some(ExportedRecord {
            timestamp: now_iso8601(),
            outputs,
        });

        let result = self.store.update(&mut |snapshot| {
            if let Some(record) = record.take() {
                snapshot.insert_record(dashboard.name(), record);
            }
        });

        match result {
            Ok(()) => {
                info!("[SHARED] Exported {} keys from {}", key_count, dashboard);
                true
            }
            Err(e) => {
                error!("[SHARED] Failed to export {}: {}", dashboard, e);
                false
            }
        }
    }

    /// Compare published keys with the dashboard's documented output schema.
    pub fn schema_report(dashboard: Dashboard, outputs: &Outputs) -> SchemaReport {
        let schema = dashboard.output_schema();
        SchemaReport {
            missing: schema
                .iter()
                .filter(|key| !outputs.contains_key(**key))
                .map(|key| key.to_string())
                .collect(),
            unexpected: outputs
                .keys()
                .filter(|key| !schema.contains(&key.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Latest outputs of `dashboard`, or `None` if it never exported.
    pub fn import_data(&self, dashboard: Dashboard) -> Option<Outputs> {
        self.store
            .load()
            .dashboards
            .remove(dashboard.name())
            .map(|record| record.outputs)
    }

    pub fn import_data_by_name(&self, dashboard_name: &str) -> Option<Outputs> {
        Dashboard::from_name(dashboard_name).and_then(|d| self.import_data(d))
    }

    /// Outputs of every declared dependency of `dashboard` that has data.
    pub fn import_dependencies(&self, dashboard: Dashboard) -> BTreeMap<Dashboard, Outputs> {
        let mut result = BTreeMap::new();

        for dep in dashboard.dependencies() {
            match self.import_data(*dep) {
                Some(outputs) if !outputs.is_empty() => {
                    result.insert(*dep, outputs);
                }
                _ => warn!("[SHARED] No data available from {}", dep),
            }
        }

        result
    }

    /// Drop every record and restamp the metadata.
    pub fn clear(&self) -> ExsimResult<()> {
        self.store.update(&mut |snapshot| {
            *snapshot = StoreSnapshot::fresh();
        })?;
        info!("[SHARED] Cleared all shared outputs");
        Ok(())
    }

    /// One status line per known dashboard.
    pub fn get_status(&self) -> BTreeMap<Dashboard, String> {
        let snapshot = self.store.load();

        Dashboard::ALL
            .into_iter()
            .map(|dashboard| {
                let line = match snapshot.record(dashboard.name()) {
                    Some(record) => {
                        let stamp: String = record.timestamp.chars().take(16).collect();
                        format!("[OK] {} keys @ {}", record.outputs.len(), stamp)
                    }
                    None => "[--] No data".to_string(),
                };
                (dashboard, line)
            })
            .collect()
    }

    /// Raw timestamp of the last export, if any.
    pub fn last_export(&self, dashboard: Dashboard) -> Option<String> {
        self.store
            .load()
            .record(dashboard.name())
            .map(|record| record.timestamp.clone())
    }
}
