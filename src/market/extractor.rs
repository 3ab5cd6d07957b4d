//! Section-oriented table extractor
//!
//! Scans the rows of a market report once. Header rows switch the current
//! section; every other row is handed to the parser for that section's
//! shape. Malformed rows are skipped, never reported as errors.

use std::collections::HashMap;

use tracing::debug;

use super::number::parse_number_or_zero;
use super::section::{SectionKind, SectionSignatures, TableShape};
use super::tables::MarketTables;
use crate::types::{Company, Segment, Zone};

/// Mutable state of one parse.
///
/// The sticky zone is tracked per section so a zone remembered in one
/// segment table never leaks into another.
#[derive(Debug, Default)]
pub struct ParserState {
    pub current_section: Option<SectionKind>,
    sticky_zones: HashMap<SectionKind, Zone>,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sticky_zone(&self, kind: SectionKind) -> Option<Zone> {
        self.sticky_zones.get(&kind).copied()
    }

    fn remember_zone(&mut self, kind: SectionKind, zone: Zone) {
        self.sticky_zones.insert(kind, zone);
    }
}

/// Turns report rows into [`MarketTables`]
#[derive(Debug, Clone, Default)]
pub struct SectionExtractor {
    signatures: SectionSignatures,
}

impl SectionExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signatures(signatures: SectionSignatures) -> Self {
        Self { signatures }
    }

    pub fn signatures(&self) -> &SectionSignatures {
        &self.signatures
    }

    /// Extract all six tables from `rows` in a single pass.
    pub fn extract<I>(&self, rows: I) -> MarketTables
    where
        I: IntoIterator,
        I::Item: AsRef<[String]>,
    {
        let mut state = ParserState::new();
        let mut tables = MarketTables::new();

        for row in rows {
            self.feed(&mut state, &mut tables, row.as_ref());
        }

        debug!(
            "Extracted market tables: {}",
            SectionKind::ALL
                .iter()
                .map(|k| format!("{}={}", k, tables.get(*k).len()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        tables
    }

    /// Process a single row against the running state.
    pub fn feed(&self, state: &mut ParserState, tables: &mut MarketTables, row: &[String]) {
        if let Some(kind) = self.signatures.detect(row) {
            state.current_section = Some(kind);
            return;
        }

        let Some(kind) = state.current_section else {
            return;
        };

        match kind.shape() {
            TableShape::Zone => parse_zone_row(kind, row, tables),
            TableShape::Segment => parse_segment_row(kind, row, state, tables),
        }
    }
}

/// `Zone | A1 | A2 | A3 | A4`
fn parse_zone_row(kind: SectionKind, row: &[String], tables: &mut MarketTables) {
    let Some(zone) = row.first().and_then(|cell| Zone::parse(cell)) else {
        return;
    };
    if row.len() < 5 {
        return;
    }
    let Some(table) = tables.zone_table_mut(kind) else {
        return;
    };

    for (offset, company) in Company::ALL.into_iter().enumerate() {
        table.set(company, zone, parse_number_or_zero(&row[1 + offset]));
    }
}

/// `Zone | Segment | A1 | A2 | A3 | A4`
///
/// The zone usually appears only on the first row of its block. A blank
/// first cell reuses the section's sticky zone; so does a row whose zone
/// cell was dropped altogether (segment in the first cell).
fn parse_segment_row(
    kind: SectionKind,
    row: &[String],
    state: &mut ParserState,
    tables: &mut MarketTables,
) {
    let first = row.first().map(|c| c.trim()).unwrap_or("");

    let (zone, segment_idx) = if let Some(zone) = Zone::parse(first) {
        state.remember_zone(kind, zone);
        (zone, 1)
    } else if first.is_empty() {
        match state.sticky_zone(kind) {
            Some(zone) => (zone, 1),
            None => return,
        }
    } else if Segment::parse(first).is_some() {
        match state.sticky_zone(kind) {
            Some(zone) => (zone, 0),
            None => return,
        }
    } else {
        return;
    };

    let Some(segment) = row.get(segment_idx).and_then(|cell| Segment::parse(cell)) else {
        return;
    };
    let values_start = segment_idx + 1;
    if row.len() < values_start + Company::ALL.len() {
        return;
    }
    let Some(table) = tables.segment_table_mut(kind) else {
        return;
    };

    for (offset, company) in Company::ALL.into_iter().enumerate() {
        table.set(
            company,
            zone,
            segment,
            parse_number_or_zero(&row[values_start + offset]),
        );
    }
}
