use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ExsimError;

/// Outputs a dashboard publishes to (or reads from) the shared broker.
pub type Outputs = serde_json::Map<String, serde_json::Value>;

//==============================================================================
// Dashboards (roles)
//==============================================================================

/// One of the seven role dashboards of the war room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dashboard {
    #[serde(rename = "CMO")]
    Cmo,
    #[serde(rename = "Production")]
    Production,
    #[serde(rename = "Purchasing")]
    Purchasing,
    #[serde(rename = "CLO")]
    Clo,
    #[serde(rename = "CPO")]
    Cpo,
    #[serde(rename = "ESG")]
    Esg,
    #[serde(rename = "CFO")]
    Cfo,
}

impl Dashboard {
    pub const ALL: [Dashboard; 7] = [
        Dashboard::Cmo,
        Dashboard::Production,
        Dashboard::Purchasing,
        Dashboard::Clo,
        Dashboard::Cpo,
        Dashboard::Esg,
        Dashboard::Cfo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dashboard::Cmo => "CMO",
            Dashboard::Production => "Production",
            Dashboard::Purchasing => "Purchasing",
            Dashboard::Clo => "CLO",
            Dashboard::Cpo => "CPO",
            Dashboard::Esg => "ESG",
            Dashboard::Cfo => "CFO",
        }
    }

    /// Look up a dashboard by its exact (case-sensitive) name.
    pub fn from_name(name: &str) -> Option<Dashboard> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }

    /// Upstream dashboards this one is allowed to read, in declaration order.
    ///
    /// demand -> production plan -> {materials, shipping, staffing, emissions} -> cash flow
    pub fn dependencies(self) -> &'static [Dashboard] {
        match self {
            Dashboard::Cmo => &[],
            Dashboard::Production => &[Dashboard::Cmo],
            Dashboard::Purchasing => &[Dashboard::Production],
            Dashboard::Clo => &[Dashboard::Production, Dashboard::Cmo],
            Dashboard::Cpo => &[Dashboard::Production],
            Dashboard::Esg => &[Dashboard::Production],
            Dashboard::Cfo => &[
                Dashboard::Cmo,
                Dashboard::Production,
                Dashboard::Purchasing,
                Dashboard::Clo,
                Dashboard::Cpo,
                Dashboard::Esg,
            ],
        }
    }

    /// Output keys a dashboard is expected to publish (documentation, not a contract).
    pub fn output_schema(self) -> &'static [&'static str] {
        match self {
            Dashboard::Cmo => &[
                "demand_forecast",
                "marketing_spend",
                "pricing",
                "innovation_costs",
            ],
            Dashboard::Production => &[
                "production_plan",
                "capacity_utilization",
                "overtime_hours",
                "unit_costs",
            ],
            Dashboard::Purchasing => &["material_orders", "supplier_spend", "lead_time_schedule"],
            Dashboard::Clo => &["shipping_schedule", "logistics_costs", "inventory_by_zone"],
            Dashboard::Cpo => &["workforce_headcount", "payroll_forecast", "hiring_costs"],
            Dashboard::Esg => &["co2_emissions", "abatement_investment", "tax_liability"],
            Dashboard::Cfo => &["cash_flow_projection", "debt_levels", "liquidity_status"],
        }
    }
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dashboard {
    type Err = ExsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dashboard::from_name(s).ok_or_else(|| {
            ExsimError::Validation(format!(
                "Unknown dashboard '{}' (expected one of: {})",
                s,
                Dashboard::ALL
                    .iter()
                    .map(|d| d.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }
}

//==============================================================================
// Market report dimensions
//==============================================================================

/// Competitor in the simulated market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Company {
    A1,
    A2,
    A3,
    A4,
}

impl Company {
    pub const ALL: [Company; 4] = [Company::A1, Company::A2, Company::A3, Company::A4];

    pub fn name(self) -> &'static str {
        match self {
            Company::A1 => "A1",
            Company::A2 => "A2",
            Company::A3 => "A3",
            Company::A4 => "A4",
        }
    }

    pub fn parse(text: &str) -> Option<Company> {
        let text = text.trim();
        Self::ALL.into_iter().find(|c| c.name() == text)
    }
}

/// Geographic market region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Zone {
    Center,
    West,
    North,
    East,
    South,
}

impl Zone {
    pub const ALL: [Zone; 5] = [Zone::Center, Zone::West, Zone::North, Zone::East, Zone::South];

    pub fn name(self) -> &'static str {
        match self {
            Zone::Center => "Center",
            Zone::West => "West",
            Zone::North => "North",
            Zone::East => "East",
            Zone::South => "South",
        }
    }

    /// Exact match on the trimmed cell text.
    pub fn parse(text: &str) -> Option<Zone> {
        let text = text.trim();
        Self::ALL.into_iter().find(|z| z.name() == text)
    }
}

/// Demand tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    High,
    Low,
}

impl Segment {
    pub const ALL: [Segment; 2] = [Segment::High, Segment::Low];

    pub fn name(self) -> &'static str {
        match self {
            Segment::High => "High",
            Segment::Low => "Low",
        }
    }

    pub fn parse(text: &str) -> Option<Segment> {
        let text = text.trim();
        Self::ALL.into_iter().find(|s| s.name() == text)
    }
}

macro_rules! display_by_name {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.name())
                }
            }
        )*
    };
}

display_by_name!(Company, Zone, Segment);
