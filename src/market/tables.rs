//! Section tables reconstructed from the market report

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::section::SectionKind;
use crate::types::{Company, Segment, Zone};

/// One scalar per company per zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneTable {
    values: BTreeMap<Company, BTreeMap<Zone, f64>>,
}

impl ZoneTable {
    pub fn set(&mut self, company: Company, zone: Zone, value: f64) {
        self.values.entry(company).or_default().insert(zone, value);
    }

    /// Value for the pair, `0.0` when absent
    pub fn get(&self, company: Company, zone: Zone) -> f64 {
        self.lookup(company, zone).unwrap_or(0.0)
    }

    pub fn lookup(&self, company: Company, zone: Zone) -> Option<f64> {
        self.values.get(&company)?.get(&zone).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of populated (company, zone) cells
    pub fn len(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.values().flat_map(|zones| zones.values().copied())
    }
}

/// One scalar per company per zone per segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentTable {
    values: BTreeMap<Company, BTreeMap<Zone, BTreeMap<Segment, f64>>>,
}

impl SegmentTable {
    pub fn set(&mut self, company: Company, zone: Zone, segment: Segment, value: f64) {
        self.values
            .entry(company)
            .or_default()
            .entry(zone)
            .or_default()
            .insert(segment, value);
    }

    /// Value for the triple, `0.0` when absent
    pub fn get(&self, company: Company, zone: Zone, segment: Segment) -> f64 {
        self.lookup(company, zone, segment).unwrap_or(0.0)
    }

    pub fn lookup(&self, company: Company, zone: Zone, segment: Segment) -> Option<f64> {
        self.values.get(&company)?.get(&zone)?.get(&segment).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of populated (company, zone, segment) cells
    pub fn len(&self) -> usize {
        self.values
            .values()
            .flat_map(|zones| zones.values())
            .map(BTreeMap::len)
            .sum()
    }
}

/// Borrowed view of one section's table
#[derive(Debug, Clone, Copy)]
pub enum SectionTable<'a> {
    Zone(&'a ZoneTable),
    Segment(&'a SegmentTable),
}

impl SectionTable<'_> {
    pub fn is_empty(&self) -> bool {
        match self {
            SectionTable::Zone(t) => t.is_empty(),
            SectionTable::Segment(t) => t.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SectionTable::Zone(t) => t.len(),
            SectionTable::Segment(t) => t.len(),
        }
    }
}

/// The six tables of a market report.
///
/// Serialises as `{section_key: {company: {zone: value | {segment: value}}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketTables {
    pub market_share_region: ZoneTable,
    pub market_share_segment: SegmentTable,
    pub price: ZoneTable,
    pub awareness: SegmentTable,
    pub attractiveness: SegmentTable,
    pub salesforce: ZoneTable,
}

impl MarketTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: SectionKind) -> SectionTable<'_> {
        match kind {
            SectionKind::MarketShareRegion => SectionTable::Zone(&self.market_share_region),
            SectionKind::MarketShareSegment => SectionTable::Segment(&self.market_share_segment),
            SectionKind::Price => SectionTable::Zone(&self.price),
            SectionKind::Awareness => SectionTable::Segment(&self.awareness),
            SectionKind::Attractiveness => SectionTable::Segment(&self.attractiveness),
            SectionKind::Salesforce => SectionTable::Zone(&self.salesforce),
        }
    }

    pub fn zone_table_mut(&mut self, kind: SectionKind) -> Option<&mut ZoneTable> {
        match kind {
            SectionKind::MarketShareRegion => Some(&mut self.market_share_region),
            SectionKind::Price => Some(&mut self.price),
            SectionKind::Salesforce => Some(&mut self.salesforce),
            SectionKind::MarketShareSegment
            | SectionKind::Awareness
            | SectionKind::Attractiveness => None,
        }
    }

    pub fn segment_table_mut(&mut self, kind: SectionKind) -> Option<&mut SegmentTable> {
        match kind {
            SectionKind::MarketShareSegment => Some(&mut self.market_share_segment),
            SectionKind::Awareness => Some(&mut self.awareness),
            SectionKind::Attractiveness => Some(&mut self.attractiveness),
            SectionKind::MarketShareRegion | SectionKind::Price | SectionKind::Salesforce => None,
        }
    }

    /// True when no section produced any value
    pub fn is_empty(&self) -> bool {
        SectionKind::ALL.iter().all(|kind| self.get(*kind).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zone_table_defaults_to_zero() {
        let mut table = ZoneTable::default();
        table.set(Company::A1, Zone::Center, 38.2);

        assert_eq!(table.get(Company::A1, Zone::Center), 38.2);
        assert_eq!(table.get(Company::A1, Zone::West), 0.0);
        assert_eq!(table.get(Company::A4, Zone::Center), 0.0);
        assert_eq!(table.lookup(Company::A4, Zone::Center), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_segment_table_defaults_to_zero() {
        let mut table = SegmentTable::default();
        table.set(Company::A3, Zone::North, Segment::Low, 22.0);

        assert_eq!(table.get(Company::A3, Zone::North, Segment::Low), 22.0);
        assert_eq!(table.get(Company::A3, Zone::North, Segment::High), 0.0);
        assert_eq!(table.get(Company::A2, Zone::North, Segment::Low), 0.0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_set_overwrites() {
        let mut table = ZoneTable::default();
        table.set(Company::A2, Zone::East, 1.0);
        table.set(Company::A2, Zone::East, 2.0);
        assert_eq!(table.get(Company::A2, Zone::East), 2.0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_access_by_kind() {
        let mut tables = MarketTables::new();
        assert!(tables.is_empty());
        assert!(tables.zone_table_mut(SectionKind::Awareness).is_none());
        assert!(tables.segment_table_mut(SectionKind::Price).is_none());

        tables
            .segment_table_mut(SectionKind::Awareness)
            .unwrap()
            .set(Company::A1, Zone::South, Segment::High, 60.71);

        assert!(!tables.is_empty());
        assert_eq!(tables.get(SectionKind::Awareness).len(), 1);
        assert!(tables.get(SectionKind::Attractiveness).is_empty());
    }

    #[test]
    fn test_serialises_as_nested_mappings() {
        let mut tables = MarketTables::new();
        tables.price.set(Company::A1, Zone::Center, 25.0);
        tables
            .market_share_segment
            .set(Company::A2, Zone::West, Segment::Low, 12.5);

        let value = serde_json::to_value(&tables).unwrap();
        assert_eq!(value["price"], json!({"A1": {"Center": 25.0}}));
        assert_eq!(
            value["market_share_segment"],
            json!({"A2": {"West": {"Low": 12.5}}})
        );
        assert_eq!(value["salesforce"], json!({}));
    }
}
