//! Market report importer - report file → rows → [`MarketTables`]

use std::io::Cursor;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use tracing::debug;

use super::spreadsheet_ml;
use crate::error::{ExsimError, ExsimResult};
use crate::market::{MarketTables, SectionExtractor};

/// Number of leading bytes inspected by [`ReportFormat::detect`]
const SNIFF_LEN: usize = 100;

/// Container format of a market report file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// XML Spreadsheet 2003, usually saved with an `.xls` extension
    SpreadsheetMl,
    /// Any workbook calamine understands (`.xlsx`, `.xlsb`, binary `.xls`, `.ods`)
    Workbook,
}

impl ReportFormat {
    /// Classify by content, never by extension.
    pub fn detect(bytes: &[u8]) -> Self {
        let head = &bytes[..bytes.len().min(SNIFF_LEN)];
        let head = String::from_utf8_lossy(head);
        // A UTF-8 BOM survives lossy decoding as U+FEFF
        let head = head.trim_start_matches('\u{feff}').trim();
        if head.starts_with("<?xml") {
            ReportFormat::SpreadsheetMl
        } else {
            ReportFormat::Workbook
        }
    }
}

/// Decode a report into its rows of cell text.
pub fn read_report_rows(bytes: &[u8]) -> ExsimResult<Vec<Vec<String>>> {
    match ReportFormat::detect(bytes) {
        ReportFormat::SpreadsheetMl => spreadsheet_ml::read_rows(bytes),
        ReportFormat::Workbook => read_workbook_rows(bytes),
    }
}

fn read_workbook_rows(bytes: &[u8]) -> ExsimResult<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ExsimError::Import(format!("Failed to open workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExsimError::MissingContainer("workbook has no sheets".to_string()))?
        .map_err(|e| ExsimError::Import(format!("Failed to read first sheet: {}", e)))?;

    Ok(range_to_rows(&range))
}

/// Render every cell as text, keeping absolute column positions.
fn range_to_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    // calamine trims leading empty columns; pad them back so column 0 is column A
    let leading_cols = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    range
        .rows()
        .map(|cells| {
            let mut row = vec![String::new(); leading_cols];
            row.extend(cells.iter().map(cell_text));
            row
        })
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

/// Reads a market report from disk and extracts its tables
pub struct ReportImporter {
    path: PathBuf,
    extractor: SectionExtractor,
}

impl ReportImporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            extractor: SectionExtractor::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: SectionExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_rows(&self) -> ExsimResult<Vec<Vec<String>>> {
        let bytes = std::fs::read(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExsimError::NotFound(self.path.display().to_string()),
            _ => ExsimError::Io(e),
        })?;
        debug!(
            "Read {} bytes from {} ({:?})",
            bytes.len(),
            self.path.display(),
            ReportFormat::detect(&bytes)
        );
        read_report_rows(&bytes)
    }

    pub fn import(&self) -> ExsimResult<MarketTables> {
        let rows = self.read_rows()?;
        Ok(self.extractor.extract(&rows))
    }
}
