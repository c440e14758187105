// ==========================================
// Talhão APEX - stand code parsing
// ==========================================
// Fixed-offset fields of the stand code (1-based, SQLite SUBSTR rules):
//   region group 1..2, region 3..4, sub-region 5..6,
//   project 1..11, regime marker 12, lot 1..14
// plus the remnant ("t700") keys derived from the text after '-'.
// The offsets are a company convention and must not change.
// ==========================================

use crate::domain::types::{Rotation, StandKind};
use crate::store::expr::{sqlite_substr, Expr};
use serde::{Deserialize, Serialize};
use std::fmt;

/// (start, length) of each fixed field
pub const REGION_GROUP: (i64, i64) = (1, 2);
pub const REGION: (i64, i64) = (3, 2);
pub const SUB_REGION: (i64, i64) = (5, 2);
pub const PROJECT: (i64, i64) = (1, 11);
pub const REGIME_MARKER: (i64, i64) = (12, 1);
pub const LOT: (i64, i64) = (1, 14);

/// Regime marker of a reform-origin (first rotation) stand
pub const REFORM_MARKER: &str = "R";

/// Composite keys longer than this drop their trailing segment on resolution
pub const COMPOSITE_KEY_MAX_LEN: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StandCode(String);

impl StandCode {
    /// Offsets apply to the raw cell; surrounding whitespace shifts them
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn field(&self, (start, len): (i64, i64)) -> String {
        sqlite_substr(&self.0, start, Some(len))
    }

    fn char_len(&self) -> i64 {
        self.0.chars().count() as i64
    }

    /// 1-based position of the first '-', 0 when absent
    fn dash_position(&self) -> i64 {
        self.0
            .find('-')
            .map(|b| self.0[..b].chars().count() as i64 + 1)
            .unwrap_or(0)
    }

    pub fn region_group(&self) -> String {
        self.field(REGION_GROUP)
    }

    pub fn region(&self) -> String {
        self.field(REGION)
    }

    pub fn sub_region(&self) -> String {
        self.field(SUB_REGION)
    }

    pub fn project(&self) -> String {
        self.field(PROJECT)
    }

    pub fn regime_marker(&self) -> String {
        self.field(REGIME_MARKER)
    }

    pub fn lot(&self) -> String {
        self.field(LOT)
    }

    pub fn rotation(&self) -> Rotation {
        if self.regime_marker() == REFORM_MARKER {
            Rotation::First
        } else {
            Rotation::Second
        }
    }

    /// `ChaveSubRot`
    pub fn sub_rotation_key(&self) -> String {
        format!("{}{}", self.sub_region(), self.rotation().number())
    }

    // ===== t700 keys =====

    /// `cod_talhao`: text after the first '-' (the whole code when absent)
    pub fn talhao_code(&self) -> String {
        sqlite_substr(&self.0, self.dash_position() + 1, None)
    }

    /// `cod_chave`: project ∥ cod_talhao
    pub fn composite_key(&self) -> String {
        format!("{}{}", self.project(), self.talhao_code())
    }

    fn starts_with_seven_or_eight(&self) -> bool {
        matches!(self.talhao_code().chars().next(), Some('7') | Some('8'))
    }

    fn ends_with_remnant_suffix(&self) -> bool {
        matches!(self.0.chars().last(), Some('R') | Some('S'))
    }

    pub fn kind(&self) -> StandKind {
        if self.starts_with_seven_or_eight() || self.ends_with_remnant_suffix() {
            StandKind::Remanescente
        } else {
            StandKind::Talhao
        }
    }

    pub fn is_remnant(&self) -> bool {
        self.kind() == StandKind::Remanescente
    }

    /// `cod_chave_ref`: composite key of the canonical stand a remnant belongs to
    ///
    /// - 7/8 sub-code: insert a literal `0` after the project, dropping the
    ///   first sub-code digit (and the trailing segment on long keys)
    /// - R/S suffix: project ∥ sub-code without its last character
    pub fn reference_key(&self) -> Option<String> {
        let p = self.dash_position();
        let len = self.char_len();
        let project = self.project();
        if self.starts_with_seven_or_eight() {
            let tail = if self.composite_key().chars().count() <= COMPOSITE_KEY_MAX_LEN {
                sqlite_substr(&self.0, p + 2, None)
            } else {
                sqlite_substr(&self.0, p + 2, Some(len - p - 2))
            };
            Some(format!("{}0{}", project, tail))
        } else if self.ends_with_remnant_suffix() {
            Some(format!("{}{}", project, sqlite_substr(&self.0, p + 1, Some(len - p - 1))))
        } else {
            None
        }
    }

    // ===== expression builders over a code column =====

    pub fn region_expr(column: &str) -> Expr {
        Expr::col(column).substr(REGION.0, REGION.1)
    }

    pub fn sub_region_expr(column: &str) -> Expr {
        Expr::col(column).substr(SUB_REGION.0, SUB_REGION.1)
    }

    pub fn project_expr(column: &str) -> Expr {
        Expr::col(column).substr(PROJECT.0, PROJECT.1)
    }

    pub fn regime_marker_expr(column: &str) -> Expr {
        Expr::col(column).substr(REGIME_MARKER.0, REGIME_MARKER.1)
    }

    pub fn lot_expr(column: &str) -> Expr {
        Expr::col(column).substr(LOT.0, LOT.1)
    }

    /// 1 for a reform-origin code, 2 otherwise
    pub fn rotation_expr(column: &str) -> Expr {
        Expr::case(
            vec![(
                Self::regime_marker_expr(column).equals(Expr::lit(REFORM_MARKER)),
                Expr::lit(Rotation::First.number()),
            )],
            Some(Expr::lit(Rotation::Second.number())),
        )
    }

    /// `ChaveSubRot` from already-derived sub-region and rotation columns
    pub fn sub_rotation_key_expr(sub_region_column: &str, rotation_column: &str) -> Expr {
        Expr::concat(vec![Expr::col(sub_region_column), Expr::col(rotation_column)])
    }
}

impl fmt::Display for StandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StandCode {
    fn from(s: &str) -> Self {
        StandCode::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_fields() {
        let c = StandCode::new("11100112345R00");
        assert_eq!(c.region_group(), "11");
        assert_eq!(c.region(), "10");
        assert_eq!(c.sub_region(), "01");
        assert_eq!(c.project(), "11100112345");
        assert_eq!(c.regime_marker(), "R");
        assert_eq!(c.lot(), "11100112345R00");
        assert_eq!(c.rotation(), Rotation::First);
        assert_eq!(c.sub_rotation_key(), "011");
    }

    #[test]
    fn test_offsets_apply_to_untrimmed_code() {
        let c = StandCode::new(" 11100112345R00");
        assert_eq!(c.region_group(), " 1");
        assert_eq!(c.region(), "11");
        assert_eq!(c.project(), " 1110011234");
        assert_eq!(c.regime_marker(), "5");
    }

    #[test]
    fn test_coppice_rotation() {
        let c = StandCode::new("GNSABA12345T01");
        assert_eq!(c.region(), "SA");
        assert_eq!(c.sub_region(), "BA");
        assert_eq!(c.rotation(), Rotation::Second);
        assert_eq!(c.sub_rotation_key(), "BA2");
    }

    #[test]
    fn test_regular_stand_has_no_reference() {
        let c = StandCode::new("GNSACR12345-001");
        assert_eq!(c.talhao_code(), "001");
        assert_eq!(c.composite_key(), "GNSACR12345001");
        assert_eq!(c.kind(), StandKind::Talhao);
        assert_eq!(c.reference_key(), None);

        let no_dash = StandCode::new("11100112345R00");
        assert_eq!(no_dash.talhao_code(), "11100112345R00");
        assert!(!no_dash.is_remnant());
    }

    #[test]
    fn test_seven_eight_remnants() {
        let short = StandCode::new("GNSACR12345-701");
        assert!(short.is_remnant());
        assert_eq!(short.reference_key().as_deref(), Some("GNSACR12345001"));

        let long = StandCode::new("GNSACR12345-8012");
        assert_eq!(long.composite_key().len(), 15);
        assert_eq!(long.reference_key().as_deref(), Some("GNSACR12345001"));
    }

    #[test]
    fn test_suffix_remnants() {
        let r = StandCode::new("GNSACR12345-001R");
        assert_eq!(r.kind(), StandKind::Remanescente);
        assert_eq!(r.reference_key().as_deref(), Some("GNSACR12345001"));

        let s = StandCode::new("GNSACR12345-014S");
        assert_eq!(s.reference_key().as_deref(), Some("GNSACR12345014"));
    }
}
