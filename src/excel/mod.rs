//! Excel I/O for market reports
//!
//! - Import: SpreadsheetML or binary workbook → rows of cell text
//! - Export: MARKET_DATA rows → `.xlsx`

mod exporter;
mod importer;
pub mod spreadsheet_ml;

pub use exporter::{MarketDataExporter, MARKET_DATA_SHEET};
pub use importer::{read_report_rows, ReportFormat, ReportImporter};
