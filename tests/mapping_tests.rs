//! MARKET_DATA mapping and workbook export tests

use std::path::PathBuf;

use calamine::{open_workbook_auto, Data, Reader};
use exsim::excel::{MarketDataExporter, MARKET_DATA_SHEET};
use exsim::market::{
    load_market_report, map_market_data, CompanyMarketView, MappingOptions, MarketTables,
    MARKET_DATA_COLUMNS, MARKET_DATA_ROW_COUNT,
};
use exsim::types::{Company, Segment, Zone};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn fixture_tables() -> MarketTables {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test-data")
        .join("market-report.xls");
    load_market_report(path).unwrap()
}

fn approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// ROW LAYOUT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_full_mapping_has_forty_rows_in_order() {
    let rows = map_market_data(&fixture_tables(), &MappingOptions::default());
    assert_eq!(rows.len(), MARKET_DATA_ROW_COUNT);
    assert_eq!(rows.len(), 40);

    let mut expected = Vec::new();
    for zone in Zone::ALL {
        for segment in Segment::ALL {
            for company in Company::ALL {
                expected.push((zone, segment, company));
            }
        }
    }
    let actual: Vec<_> = rows
        .iter()
        .map(|r| (r.region, r.segment, r.company))
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_fixed_columns_follow_options() {
    let options = MappingOptions {
        period: 9,
        run_type: "Test".to_string(),
    };
    let rows = map_market_data(&fixture_tables(), &options);
    assert!(rows.iter().all(|r| r.period == 9 && r.run_type == "Test"));
}

#[test]
fn test_zone_metrics_broadcast_to_both_segments() {
    let rows = map_market_data(&fixture_tables(), &MappingOptions::default());

    let center_a3: Vec<_> = rows
        .iter()
        .filter(|r| r.region == Zone::Center && r.company == Company::A3)
        .collect();
    assert_eq!(center_a3.len(), 2);
    for row in &center_a3 {
        assert_eq!(row.market_share_region, 37.8);
        assert_eq!(row.price, 520.0);
        assert_eq!(row.salesforce_effectiveness, 0.9);
    }

    let high = center_a3.iter().find(|r| r.segment == Segment::High).unwrap();
    let low = center_a3.iter().find(|r| r.segment == Segment::Low).unwrap();
    assert_eq!(high.market_share_segment, 22.0);
    assert_eq!(low.market_share_segment, 30.0);
    assert_eq!(high.awareness, 55.0);
    assert_eq!(low.awareness, 48.0);
    assert_eq!(high.attractiveness, 3.9);
    assert_eq!(low.attractiveness, 3.3);
}

#[test]
fn test_empty_tables_map_to_zero_rows() {
    let rows = map_market_data(&MarketTables::new(), &MappingOptions::default());
    assert_eq!(rows.len(), 40);
    assert!(rows.iter().all(|r| r.metrics() == [0.0; 6]));
}

// ═══════════════════════════════════════════════════════════════════════════
// COMPANY VIEW
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_company_view_competitor_averages() {
    let view = CompanyMarketView::build(&fixture_tables(), Company::A3);

    let center = view.zone(Zone::Center).unwrap();
    assert_eq!(center.my_market_share, 37.8);
    assert_eq!(center.my_price, 520.0);
    approx(center.comp_avg_price, 480.0);
    assert_eq!(center.my_awareness, 55.0);
    assert_eq!(center.my_attractiveness, 3.9);

    // The blank A4 price is left out of the average
    let south = view.zone(Zone::South).unwrap();
    approx(south.comp_avg_price, 530.0);

    // So is the "n/a" A4 awareness
    let center_low = view.segment(Segment::Low, Zone::Center).unwrap();
    approx(center_low.comp_avg_awareness, 47.5);
    assert_eq!(center_low.my_awareness, 48.0);
    assert_eq!(center_low.my_price, 520.0);
}

#[test]
fn test_company_view_for_every_company_covers_all_zones() {
    let tables = fixture_tables();
    for company in Company::ALL {
        let view = CompanyMarketView::build(&tables, company);
        assert_eq!(view.company, company);
        assert_eq!(view.zones.len(), 5);
        for segment in Segment::ALL {
            for zone in Zone::ALL {
                assert!(view.segment(segment, zone).is_some());
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// WORKBOOK EXPORT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_exported_workbook_reads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dashboards_v2").join("Demand_Planner_Filled.xlsx");
    let rows = map_market_data(&fixture_tables(), &MappingOptions::default());

    MarketDataExporter::new(rows.clone()).export(&path).unwrap();
    assert!(path.exists());

    let mut workbook = open_workbook_auto(&path).unwrap();
    assert_eq!(workbook.sheet_names(), vec![MARKET_DATA_SHEET.to_string()]);
    let range = workbook.worksheet_range(MARKET_DATA_SHEET).unwrap();

    let sheet: Vec<&[Data]> = range.rows().collect();
    assert_eq!(sheet.len(), 41);

    let header: Vec<String> = sheet[0].iter().map(|c| c.to_string()).collect();
    assert_eq!(header, MARKET_DATA_COLUMNS.to_vec());

    // Row for Center / High / A3
    let row = sheet[3];
    assert_eq!(row[0], Data::Float(7.0));
    assert_eq!(row[1], Data::String("A3".to_string()));
    assert_eq!(row[2], Data::String("Center".to_string()));
    assert_eq!(row[3], Data::String("High".to_string()));
    assert_eq!(row[4], Data::String("Real".to_string()));
    assert_eq!(row[5], Data::Float(37.8));
    assert_eq!(row[7], Data::Float(520.0));
    assert_eq!(row[10], Data::Float(0.9));
}

#[test]
fn test_in_memory_export_is_a_zip() {
    let rows = map_market_data(&fixture_tables(), &MappingOptions::default());
    let bytes = MarketDataExporter::new(rows).to_bytes().unwrap();
    assert!(bytes.starts_with(b"PK"));
}
