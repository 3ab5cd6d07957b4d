//! Flattening market tables into MARKET_DATA rows
//!
//! One row per (zone, segment, company), zone-major. Zone-level metrics are
//! broadcast to both segments of their zone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::tables::{MarketTables, SegmentTable, ZoneTable};
use crate::types::{Company, Segment, Zone};

/// Header of the MARKET_DATA sheet, in column order
pub const MARKET_DATA_COLUMNS: [&str; 11] = [
    "Period",
    "Company",
    "Region",
    "Segment",
    "Run Type",
    "Market Share Region %",
    "Market Share Segment %",
    "Price",
    "Awareness %",
    "Attractiveness %",
    "Salesforce Effectiveness %",
];

/// Number of rows a complete mapping produces
pub const MARKET_DATA_ROW_COUNT: usize = Zone::ALL.len() * Segment::ALL.len() * Company::ALL.len();

/// Options controlling the fixed columns of the mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingOptions {
    pub period: u32,
    pub run_type: String,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            period: 7,
            run_type: "Real".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataRow {
    pub period: u32,
    pub company: Company,
    pub region: Zone,
    pub segment: Segment,
    pub run_type: String,
    pub market_share_region: f64,
    pub market_share_segment: f64,
    pub price: f64,
    pub awareness: f64,
    pub attractiveness: f64,
    pub salesforce_effectiveness: f64,
}

impl MarketDataRow {
    /// The six metric columns, in sheet order
    pub fn metrics(&self) -> [f64; 6] {
        [
            self.market_share_region,
            self.market_share_segment,
            self.price,
            self.awareness,
            self.attractiveness,
            self.salesforce_effectiveness,
        ]
    }
}

/// Produce the 40 MARKET_DATA rows.
///
/// Missing table entries become `0.0`. An empty region-share table or an
/// all-zero salesforce column usually means the report layout changed, so
/// both are logged but do not fail the mapping.
pub fn map_market_data(tables: &MarketTables, options: &MappingOptions) -> Vec<MarketDataRow> {
    if tables.market_share_region.is_empty() {
        warn!("Market share per region table is empty; check the report layout");
    }

    let mut rows = Vec::with_capacity(MARKET_DATA_ROW_COUNT);
    for zone in Zone::ALL {
        for segment in Segment::ALL {
            for company in Company::ALL {
                rows.push(MarketDataRow {
                    period: options.period,
                    company,
                    region: zone,
                    segment,
                    run_type: options.run_type.clone(),
                    market_share_region: tables.market_share_region.get(company, zone),
                    market_share_segment: tables.market_share_segment.get(company, zone, segment),
                    price: tables.price.get(company, zone),
                    awareness: tables.awareness.get(company, zone, segment),
                    attractiveness: tables.attractiveness.get(company, zone, segment),
                    salesforce_effectiveness: tables.salesforce.get(company, zone),
                });
            }
        }
    }

    if rows.iter().all(|r| r.salesforce_effectiveness == 0.0) {
        warn!("All 'Salesforce Effectiveness %' values are 0; check the mapping");
    } else {
        info!("Mapped {} MARKET_DATA rows for period {}", rows.len(), options.period);
    }

    rows
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneMetrics {
    pub my_market_share: f64,
    pub my_price: f64,
    pub comp_avg_price: f64,
    /// First non-zero segment value for the zone
    pub my_awareness: f64,
    pub my_attractiveness: f64,
    pub comp_avg_awareness: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetrics {
    pub my_market_share: f64,
    pub my_awareness: f64,
    pub my_attractiveness: f64,
    pub my_price: f64,
    pub comp_avg_awareness: f64,
    pub comp_avg_price: f64,
}

/// One company's reading of the market report, as the CMO dashboard uses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyMarketView {
    pub company: Company,
    pub zones: BTreeMap<Zone, ZoneMetrics>,
    pub by_segment: BTreeMap<Segment, BTreeMap<Zone, SegmentMetrics>>,
}

impl CompanyMarketView {
    pub fn build(tables: &MarketTables, company: Company) -> Self {
        let competitors: Vec<Company> = Company::ALL
            .into_iter()
            .filter(|c| *c != company)
            .collect();

        let mut zones = BTreeMap::new();
        let mut by_segment: BTreeMap<Segment, BTreeMap<Zone, SegmentMetrics>> = BTreeMap::new();

        for zone in Zone::ALL {
            let my_price = tables.price.get(company, zone);
            let comp_avg_price = positive_mean(&tables.price, &competitors, zone);

            let mut zone_metrics = ZoneMetrics {
                my_market_share: tables.market_share_region.get(company, zone),
                my_price,
                comp_avg_price,
                ..ZoneMetrics::default()
            };

            for segment in Segment::ALL {
                let my_awareness = tables.awareness.get(company, zone, segment);
                let my_attractiveness = tables.attractiveness.get(company, zone, segment);
                let comp_avg_awareness =
                    positive_segment_mean(&tables.awareness, &competitors, zone, segment);

                if zone_metrics.my_awareness == 0.0 {
                    zone_metrics.my_awareness = my_awareness;
                }
                if zone_metrics.my_attractiveness == 0.0 {
                    zone_metrics.my_attractiveness = my_attractiveness;
                }
                if zone_metrics.comp_avg_awareness == 0.0 {
                    zone_metrics.comp_avg_awareness = comp_avg_awareness;
                }

                by_segment.entry(segment).or_default().insert(
                    zone,
                    SegmentMetrics {
                        my_market_share: tables.market_share_segment.get(company, zone, segment),
                        my_awareness,
                        my_attractiveness,
                        my_price,
                        comp_avg_awareness,
                        comp_avg_price,
                    },
                );
            }

            zones.insert(zone, zone_metrics);
        }

        Self {
            company,
            zones,
            by_segment,
        }
    }

    pub fn zone(&self, zone: Zone) -> Option<&ZoneMetrics> {
        self.zones.get(&zone)
    }

    pub fn segment(&self, segment: Segment, zone: Zone) -> Option<&SegmentMetrics> {
        self.by_segment.get(&segment)?.get(&zone)
    }
}

fn positive_mean(table: &ZoneTable, companies: &[Company], zone: Zone) -> f64 {
    mean_of_positive(companies.iter().map(|c| table.get(*c, zone)))
}

fn positive_segment_mean(
    table: &SegmentTable,
    companies: &[Company],
    zone: Zone,
    segment: Segment,
) -> f64 {
    mean_of_positive(companies.iter().map(|c| table.get(*c, zone, segment)))
}

/// Mean over strictly positive values, `0.0` when there are none
fn mean_of_positive(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| *v > 0.0)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
