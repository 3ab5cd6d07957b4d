//! MARKET_DATA workbook exporter

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::{ExsimError, ExsimResult};
use crate::market::{MarketDataRow, MARKET_DATA_COLUMNS};

/// Name of the single worksheet written by [`MarketDataExporter`]
pub const MARKET_DATA_SHEET: &str = "MARKET_DATA";

/// Writes MARKET_DATA rows as a one-sheet `.xlsx` workbook
pub struct MarketDataExporter {
    rows: Vec<MarketDataRow>,
}

impl MarketDataExporter {
    pub fn new(rows: Vec<MarketDataRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[MarketDataRow] {
        &self.rows
    }

    /// Export to an `.xlsx` file, creating parent directories as needed
    pub fn export(&self, output_path: &Path) -> ExsimResult<()> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut workbook = self.build_workbook()?;
        workbook.save(output_path).map_err(|e| {
            ExsimError::Export(format!(
                "Failed to save {}: {}",
                output_path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Serialise the workbook in memory
    pub fn to_bytes(&self) -> ExsimResult<Vec<u8>> {
        let mut workbook = self.build_workbook()?;
        Ok(workbook.save_to_buffer()?)
    }

    fn build_workbook(&self) -> ExsimResult<Workbook> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(MARKET_DATA_SHEET)?;
        self.write_sheet(worksheet)?;
        Ok(workbook)
    }

    fn write_sheet(&self, worksheet: &mut Worksheet) -> ExsimResult<()> {
        let header_format = Format::new().set_bold();

        for (col, name) in MARKET_DATA_COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *name, &header_format)?;
        }

        for (idx, row) in self.rows.iter().enumerate() {
            let excel_row = (idx + 1) as u32;
            worksheet.write_number(excel_row, 0, row.period as f64)?;
            worksheet.write_string(excel_row, 1, row.company.name())?;
            worksheet.write_string(excel_row, 2, row.region.name())?;
            worksheet.write_string(excel_row, 3, row.segment.name())?;
            worksheet.write_string(excel_row, 4, &row.run_type)?;
            for (offset, value) in row.metrics().into_iter().enumerate() {
                worksheet.write_number(excel_row, (5 + offset) as u16, value)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{map_market_data, MappingOptions, MarketTables};

    #[test]
    fn test_to_bytes_produces_xlsx() {
        let rows = map_market_data(&MarketTables::new(), &MappingOptions::default());
        let bytes = MarketDataExporter::new(rows).to_bytes().unwrap();
        // xlsx is a zip container
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_export_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboards_v2").join("market.xlsx");

        let rows = map_market_data(&MarketTables::new(), &MappingOptions::default());
        MarketDataExporter::new(rows).export(&path).unwrap();

        assert!(path.exists());
    }
}
