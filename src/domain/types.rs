// ==========================================
// Talhão APEX - domain enumerations
// ==========================================
// Rotation, management label, stand kind, elevation class,
// genetic-material origin, decision classification, run status,
// and the region catalog (codes, long names, harvest/slope fronts)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Rotation
// ==========================================
// Regime marker `R` (reform origin) is a first rotation stand;
// anything else is treated as coppice (second rotation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    First,
    Second,
}

impl Rotation {
    pub fn number(&self) -> i64 {
        match self {
            Rotation::First => 1,
            Rotation::Second => 2,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

// ==========================================
// Management label (ManejoAPEX)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagementLabel {
    Reforma,
    Regeneracao,
}

impl ManagementLabel {
    /// Stored text
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagementLabel::Reforma => "Reforma",
            ManagementLabel::Regeneracao => "Regeneração",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "Reforma" => Some(ManagementLabel::Reforma),
            "Regeneração" | "Regeneracao" => Some(ManagementLabel::Regeneracao),
            _ => None,
        }
    }

    /// Label for a final reform area
    pub fn for_reform_area(area: f64) -> Self {
        if area > 0.0 {
            ManagementLabel::Reforma
        } else {
            ManagementLabel::Regeneracao
        }
    }

    pub fn i18n_key(&self) -> &'static str {
        match self {
            ManagementLabel::Reforma => "manejo.label.reforma",
            ManagementLabel::Regeneracao => "manejo.label.regeneracao",
        }
    }
}

impl fmt::Display for ManagementLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// Stand kind (t700)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandKind {
    Talhao,
    Remanescente,
}

impl StandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StandKind::Talhao => "Talhão",
            StandKind::Remanescente => "Remanescente",
        }
    }
}

impl fmt::Display for StandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// Elevation class (Elevacao.Elev)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElevationClass {
    /// RA
    High,
    /// RB ("Região Baixa")
    Low,
}

impl ElevationClass {
    pub const LOW_LABEL: &'static str = "Região Baixa";

    /// Classify an `Elev` cell (case-insensitive on the low-region label)
    pub fn from_label(label: &str) -> Self {
        if label.trim().to_lowercase() == Self::LOW_LABEL.to_lowercase() {
            ElevationClass::Low
        } else {
            ElevationClass::High
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ElevationClass::High => "RA",
            ElevationClass::Low => "RB",
        }
    }
}

// ==========================================
// Genetic material origin
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialOrigin {
    Clone,
    Semente,
}

/// Seed-propagated genetic material codes
pub const SEED_MATERIALS: [&str; 8] = [
    "SEM0001", "E-GRAND", "E-RESIN", "PINUS", "E-GLOBU", "E-UROPH", "E-TOREL", "E-SALIG",
];

impl MaterialOrigin {
    pub fn of(material: Option<&str>) -> Self {
        match material {
            Some(m) if SEED_MATERIALS.contains(&m.trim()) => MaterialOrigin::Semente,
            _ => MaterialOrigin::Clone,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialOrigin::Clone => "Clone",
            MaterialOrigin::Semente => "Semente",
        }
    }
}

// ==========================================
// Decision classification
// ==========================================
// Which rule of the decision tree claimed the stand's area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionClass {
    /// Rule 1: no regrowth volume or cost ratio above threshold
    Reform,
    /// Rule 2: no cost ratio
    NotEvaluated,
    /// Rule 3: regeneration kept
    Regeneration,
    /// Rule 4: below minimum stem count
    BelowMinStems,
    /// Rule 5: seed-origin material
    SeedOrigin,
    /// Rule 6: second rotation
    SecondRotation,
    /// Rule 7: zero regrowth factor for the material
    ZeroRegrowthFactor,
    /// Rule 8: older than 15 years
    OverAge,
    /// Rule 9: minimum production above Vol7
    BelowMinProduction,
}

impl DecisionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionClass::Reform => "REFORM",
            DecisionClass::NotEvaluated => "NOT_EVALUATED",
            DecisionClass::Regeneration => "REGENERATION",
            DecisionClass::BelowMinStems => "BELOW_MIN_STEMS",
            DecisionClass::SeedOrigin => "SEED_ORIGIN",
            DecisionClass::SecondRotation => "SECOND_ROTATION",
            DecisionClass::ZeroRegrowthFactor => "ZERO_REGROWTH_FACTOR",
            DecisionClass::OverAge => "OVER_AGE",
            DecisionClass::BelowMinProduction => "BELOW_MIN_PRODUCTION",
        }
    }
}

impl fmt::Display for DecisionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// Run status
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Completed,
    CompletedWithErrors,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
            RunStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(RunStatus::Running),
            "COMPLETED" => Some(RunStatus::Completed),
            "COMPLETED_WITH_ERRORS" => Some(RunStatus::CompletedWithErrors),
            "CANCELLED" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// Region catalog
// ==========================================

/// A region code with its reference-table column name and harvest front
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub code: &'static str,
    /// Column name used by CurvaProdutividade / CustosTransRod
    pub long_name: &'static str,
    /// Suffix of the CustosColheita<front> table
    pub harvest_front: &'static str,
}

pub const REGIONS: [Region; 8] = [
    Region { code: "SA", long_name: "Sabinopolis", harvest_front: "GN" },
    Region { code: "VI", long_name: "Virginopolis", harvest_front: "GN" },
    Region { code: "BO", long_name: "BeloOriente", harvest_front: "BO" },
    Region { code: "IP", long_name: "Ipaba", harvest_front: "BO" },
    Region { code: "PO", long_name: "Pompeu", harvest_front: "PO" },
    Region { code: "CO", long_name: "Cocais", harvest_front: "CO" },
    Region { code: "PI", long_name: "Piracicaba", harvest_front: "PI" },
    Region { code: "SB", long_name: "SantaBarbara", harvest_front: "SB" },
];

/// Look up a region by its two-letter code
pub fn region_by_code(code: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.code == code.trim())
}

/// Region columns of the silviculture schedule that receive land cost
pub const LAND_COST_REGIONS: [&str; 8] = ["BO", "IP", "PO", "CO", "PI", "SB", "SA", "VI"];

/// Slope-summary fronts and the region codes each one absorbs
pub const SLOPE_FRONTS: [(&str, &[&str]); 7] = [
    ("GN", &["SA", "VI"]),
    ("BO", &["BO", "IP"]),
    ("PO", &["PO"]),
    ("CO", &["CO"]),
    ("PI", &["PI"]),
    ("SB", &["SB"]),
    ("CNB", &["CNB"]),
];

/// Harvest cost tables, one per harvest front
pub const HARVEST_FRONTS: [&str; 6] = ["BO", "CO", "GN", "PO", "SB", "PI"];
