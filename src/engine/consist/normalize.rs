// ==========================================
// Talhão APEX - reconciliation: key normalization
// ==========================================
// Derives the join keys every later stage relies on, straight from
// the stand codes (IFPC, IFC, Orcamento), plus the slope-class
// weights of ClassesInclinacao.
// ==========================================

use crate::domain::stand_code::StandCode;
use crate::store::{ColumnType, ColumnUpdate, Expr, StoreResult, TabularStore};
use tracing::info;

pub const IFPC: &str = "IFPC";
pub const IFC: &str = "IFC";
pub const ORCAMENTO: &str = "Orcamento";
pub const CLASSES_INCLINACAO: &str = "ClassesInclinacao";

/// Project, sub-region and region of a code column
fn location_updates(code_column: &str) -> Vec<ColumnUpdate> {
    vec![
        ColumnUpdate::new("Projeto", ColumnType::Text, StandCode::project_expr(code_column)),
        ColumnUpdate::new("SubRegiao", ColumnType::Text, StandCode::sub_region_expr(code_column)),
        ColumnUpdate::new("Regiao", ColumnType::Text, StandCode::region_expr(code_column)),
    ]
}

fn rotation_updates(code_column: &str) -> Vec<ColumnUpdate> {
    vec![
        ColumnUpdate::new("Rotacao", ColumnType::Integer, StandCode::rotation_expr(code_column)),
        ColumnUpdate::new(
            "ChaveSubRot",
            ColumnType::Text,
            StandCode::sub_rotation_key_expr("SubRegiao", "Rotacao"),
        ),
    ]
}

pub fn ifpc_updates() -> Vec<ColumnUpdate> {
    location_updates("Talhao")
}

pub fn ifc_updates() -> Vec<ColumnUpdate> {
    let mut updates = location_updates("Talhao");
    updates.push(ColumnUpdate::new("Lote", ColumnType::Text, StandCode::lot_expr("Talhao")));
    updates.extend(rotation_updates("Talhao"));
    updates.push(ColumnUpdate::new(
        "FustesPond",
        ColumnType::Real,
        Expr::col("Fustes") * Expr::col("Area"),
    ));
    updates.push(ColumnUpdate::new(
        "VTCCPond",
        ColumnType::Real,
        Expr::col("VTCC") * Expr::col("Area"),
    ));
    updates
}

pub fn orcamento_updates() -> Vec<ColumnUpdate> {
    let mut updates = location_updates("TalhaoAtual");
    updates.push(ColumnUpdate::new(
        "LoteAtual",
        ColumnType::Text,
        StandCode::lot_expr("TalhaoAtual"),
    ));
    updates.push(ColumnUpdate::new(
        "LoteAntigo",
        ColumnType::Text,
        StandCode::lot_expr("TalhaoReferencia"),
    ));
    updates.extend(rotation_updates("TalhaoAtual"));
    updates
}

pub fn slope_updates() -> Vec<ColumnUpdate> {
    vec![
        ColumnUpdate::new(
            "Pond0_28",
            ColumnType::Real,
            Expr::col("Area") * Expr::col("PCT0_28"),
        ),
        ColumnUpdate::new(
            "Pond29_Mais",
            ColumnType::Real,
            Expr::col("Area") * (Expr::col("PCT29_38") + Expr::col("PCT38_MAIS")),
        ),
    ]
}

/// Apply one normalization to a table
pub fn normalize(store: &TabularStore, table: &str, updates: &[ColumnUpdate]) -> StoreResult<usize> {
    let rows = store.declarative_update(table, updates)?;
    info!(table, rows, columns = updates.len(), "keys normalized");
    Ok(rows)
}
