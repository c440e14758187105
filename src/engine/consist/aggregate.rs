// ==========================================
// Talhão APEX - reconciliation: IFC aggregates
// ==========================================
// Area-weighted stems/volume and mean measurement date of IFC at
// three levels (lot, project, sub-region + rotation). Each table is
// rebuilt from scratch on every run.
// ==========================================

use crate::engine::consist::normalize::IFC;
use crate::store::Aggregation;

pub const IFC_LOTE: &str = "IFC_Lote";
pub const IFC_PROJETO: &str = "IFC_Projeto";
pub const IFC_SUBREGIAO: &str = "IFC_SubRegiao";

/// Mean measurement date alias shared by the three levels
pub const AGG_DATE: &str = "AGGDT";

fn level(output: &str, group_by: &str, prefix: &str) -> Aggregation {
    Aggregation {
        base: IFC.to_string(),
        output: output.to_string(),
        group_by: group_by.to_string(),
        measures: vec![
            ("FustesPond".to_string(), format!("{}_Fustes", prefix)),
            ("VTCCPond".to_string(), format!("{}_VTCC", prefix)),
        ],
        area_column: "Area".to_string(),
        date_column: "DT_Medicao".to_string(),
        date_alias: AGG_DATE.to_string(),
    }
}

pub fn lot_level() -> Aggregation {
    level(IFC_LOTE, "Lote", "AGGL")
}

pub fn project_level() -> Aggregation {
    level(IFC_PROJETO, "Projeto", "AGGP")
}

pub fn sub_region_level() -> Aggregation {
    level(IFC_SUBREGIAO, "ChaveSubRot", "AGGSR")
}
