//! Market report extraction and MARKET_DATA mapping
//!
//! The simulator's market report is a single sheet holding six labeled
//! tables. [`SectionExtractor`] rebuilds them as [`MarketTables`];
//! [`map_market_data`] flattens those into the 40-row MARKET_DATA layout the
//! demand planner reads.

mod extractor;
mod mapper;
mod number;
mod section;
mod tables;

use std::path::Path;

pub use extractor::{ParserState, SectionExtractor};
pub use mapper::{
    map_market_data, CompanyMarketView, MappingOptions, MarketDataRow, SegmentMetrics,
    ZoneMetrics, MARKET_DATA_COLUMNS, MARKET_DATA_ROW_COUNT,
};
pub use number::parse_number_or_zero;
pub use section::{SectionKind, SectionSignatures, TableShape};
pub use tables::{MarketTables, SectionTable, SegmentTable, ZoneTable};

use crate::error::ExsimResult;
use crate::excel::{read_report_rows, ReportImporter};

/// Decode report bytes and extract the six tables with default signatures.
pub fn extract_market_report(bytes: &[u8]) -> ExsimResult<MarketTables> {
    let rows = read_report_rows(bytes)?;
    Ok(SectionExtractor::new().extract(&rows))
}

/// Read a report file and extract the six tables with default signatures.
pub fn load_market_report<P: AsRef<Path>>(path: P) -> ExsimResult<MarketTables> {
    ReportImporter::new(path).import()
}
