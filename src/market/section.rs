//! Section kinds of the market report and their header signatures

use serde::{Deserialize, Serialize};
use std::fmt;

/// One labeled block of the market report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    MarketShareRegion,
    MarketShareSegment,
    Price,
    Awareness,
    Attractiveness,
    Salesforce,
}

/// Layout of the rows inside a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableShape {
    /// `Zone | A1 | A2 | A3 | A4`
    Zone,
    /// `Zone | Segment | A1 | A2 | A3 | A4`, zone often only on a block's first row
    Segment,
}

impl SectionKind {
    pub const ALL: [SectionKind; 6] = [
        SectionKind::MarketShareRegion,
        SectionKind::MarketShareSegment,
        SectionKind::Price,
        SectionKind::Awareness,
        SectionKind::Attractiveness,
        SectionKind::Salesforce,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SectionKind::MarketShareRegion => "market_share_region",
            SectionKind::MarketShareSegment => "market_share_segment",
            SectionKind::Price => "price",
            SectionKind::Awareness => "awareness",
            SectionKind::Attractiveness => "attractiveness",
            SectionKind::Salesforce => "salesforce",
        }
    }

    pub fn shape(self) -> TableShape {
        match self {
            SectionKind::MarketShareRegion | SectionKind::Price | SectionKind::Salesforce => {
                TableShape::Zone
            }
            SectionKind::MarketShareSegment
            | SectionKind::Awareness
            | SectionKind::Attractiveness => TableShape::Segment,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Header phrases that open each section.
///
/// Kept as configuration because upstream wording may drift between
/// simulation releases; the matching order in [`SectionSignatures::detect`]
/// is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSignatures {
    pub market_share_region: String,
    pub market_share_segment: String,
    /// Matched against the first cell only
    pub price: String,
    pub awareness: String,
    pub attractiveness: String,
    pub salesforce: String,
    /// Word whose presence disqualifies the region-share header
    pub segment_marker: String,
}

impl Default for SectionSignatures {
    fn default() -> Self {
        Self {
            market_share_region: "Market Share Per Region (%)".to_string(),
            market_share_segment: "Market Share Per Region Per Segment (%)".to_string(),
            price: "Price".to_string(),
            awareness: "Product Awareness Percentage Per Segment".to_string(),
            attractiveness: "Product attractiveness (Perceived)".to_string(),
            salesforce: "Evaluation of the Promotional Impact of Salesforce".to_string(),
            segment_marker: "Segment".to_string(),
        }
    }
}

impl SectionSignatures {
    /// Classify a row as a section header.
    ///
    /// The region-share phrase is tested first and must not be accompanied by
    /// the segment marker, since the segment-share header is a textual
    /// superset of it.
    pub fn detect(&self, row: &[String]) -> Option<SectionKind> {
        let full_row_text = row.join(" ");
        let full_row_text = full_row_text.trim();
        let first_cell = row.first().map(String::as_str).unwrap_or("");

        if full_row_text.contains(&self.market_share_region)
            && !full_row_text.contains(&self.segment_marker)
        {
            Some(SectionKind::MarketShareRegion)
        } else if full_row_text.contains(&self.market_share_segment) {
            Some(SectionKind::MarketShareSegment)
        } else if !row.is_empty()
            && (first_cell.trim().eq_ignore_ascii_case(&self.price)
                || first_cell.contains(&self.price))
        {
            Some(SectionKind::Price)
        } else if full_row_text.contains(&self.awareness) {
            Some(SectionKind::Awareness)
        } else if full_row_text.contains(&self.attractiveness) {
            Some(SectionKind::Attractiveness)
        } else if full_row_text.contains(&self.salesforce) {
            Some(SectionKind::Salesforce)
        } else {
            None
        }
    }
}
