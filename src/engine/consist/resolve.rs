// ==========================================
// Talhão APEX - reconciliation: budget resolution
// ==========================================
// Every budgeted stand (Orcamento.TalhaoAtual) is resolved against six
// sources, trying the current key first and the reference key second.
// apex_base_0 then takes volume, stems and measurement date from the
// most specific source that has them:
//   IFPC > IFC > IFC lot > IFC project > IFC sub-region
// ==========================================

use crate::engine::consist::aggregate::{AGG_DATE, IFC_LOTE, IFC_PROJETO, IFC_SUBREGIAO};
use crate::engine::consist::normalize::{IFC, IFPC, ORCAMENTO};
use crate::store::{ColumnDef, FallbackJoin, NullMerge, StoreResult, TabularStore};
use tracing::info;

pub const CADASTRO_FLORESTAL: &str = "CadastroFlorestal";
pub const APEX_BASE_0: &str = "apex_base_0";

/// Resolved tables, in build order
pub const TEMP_TABLES: [&str; 6] = [
    "Apex_temp_1",
    "Apex_temp_2",
    "Apex_temp_3",
    "Apex_temp_4",
    "Apex_temp_5",
    "Apex_temp_6",
];

/// Cadastral columns carried into the ledger
pub const CADASTRAL_COLUMNS: [&str; 10] = [
    "DCR_Projeto",
    "DT_Plantio",
    "ESP",
    "DCR_MatGen",
    "Area",
    "DIST_LP",
    "DIST_PFRod",
    "DIST_PFFer",
    "DIST_LFRod",
    "DIST_Total",
];

fn join(
    output: &str,
    joined: &str,
    columns: &[&str],
    primary_key: &str,
    fallback_key: &str,
    ref_key: &str,
) -> FallbackJoin {
    FallbackJoin {
        base: ORCAMENTO.to_string(),
        joined: joined.to_string(),
        output: output.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
        primary_key: primary_key.to_string(),
        fallback_key: fallback_key.to_string(),
        ref_key: ref_key.to_string(),
    }
}

/// The six resolution joins, in build order
pub fn temp_joins() -> Vec<FallbackJoin> {
    const STAND: [&str; 5] = ["Talhao", "DT_Medicao", "Area", "VTCC", "Fustes"];
    let mut cadastral = vec!["Talhao"];
    cadastral.extend(CADASTRAL_COLUMNS);

    vec![
        join(TEMP_TABLES[0], IFPC, &STAND, "TalhaoAtual", "TalhaoReferencia", "Talhao"),
        join(TEMP_TABLES[1], IFC, &STAND, "TalhaoAtual", "TalhaoReferencia", "Talhao"),
        join(
            TEMP_TABLES[2],
            IFC_LOTE,
            &["Lote", "AGGL_Fustes", "AGGL_VTCC", AGG_DATE],
            "LoteAtual",
            "LoteAntigo",
            "Lote",
        ),
        join(
            TEMP_TABLES[3],
            IFC_PROJETO,
            &["Projeto", "AGGP_Fustes", "AGGP_VTCC", AGG_DATE],
            "Projeto",
            "Projeto",
            "Projeto",
        ),
        join(
            TEMP_TABLES[4],
            IFC_SUBREGIAO,
            &["ChaveSubRot", "AGGSR_Fustes", "AGGSR_VTCC", AGG_DATE],
            "ChaveSubRot",
            "ChaveSubRot",
            "ChaveSubRot",
        ),
        join(
            TEMP_TABLES[5],
            CADASTRO_FLORESTAL,
            &cadastral,
            "TalhaoAtual",
            "TalhaoReferencia",
            "Talhao",
        ),
    ]
}

/// (temp table, [VTCC, Fustes, DT_Medicao] source columns) used to fill apex_base_0
fn base_sources() -> Vec<(&'static str, [String; 3])> {
    let cols = |joined: &str, vtcc: &str, fustes: &str, date: &str| {
        [
            format!("{}_{}", vtcc, joined),
            format!("{}_{}", fustes, joined),
            format!("{}_{}", date, joined),
        ]
    };
    vec![
        (TEMP_TABLES[0], cols(IFPC, "VTCC", "Fustes", "DT_Medicao")),
        (TEMP_TABLES[1], cols(IFC, "VTCC", "Fustes", "DT_Medicao")),
        (TEMP_TABLES[2], cols(IFC_LOTE, "AGGL_VTCC", "AGGL_Fustes", AGG_DATE)),
        (TEMP_TABLES[3], cols(IFC_PROJETO, "AGGP_VTCC", "AGGP_Fustes", AGG_DATE)),
        (TEMP_TABLES[4], cols(IFC_SUBREGIAO, "AGGSR_VTCC", "AGGSR_Fustes", AGG_DATE)),
    ]
}

const BASE_TARGETS: [&str; 3] = ["VTCC", "Fustes", "DT_Medicao"];

/// Build apex_base_0: seed from IFPC, then fill gaps source by source
pub fn build_base(store: &TabularStore) -> StoreResult<usize> {
    let sources = base_sources();
    let (seed_table, seed_cols) = &sources[0];

    store.recreate_table(
        APEX_BASE_0,
        &[
            ColumnDef::text("TalhaoAtual"),
            ColumnDef::real("VTCC"),
            ColumnDef::real("Fustes"),
            ColumnDef::date("DT_Medicao"),
        ],
        false,
    )?;

    let mut wanted = vec!["TalhaoAtual"];
    wanted.extend(seed_cols.iter().map(String::as_str));
    let seed = store.read_columns(seed_table, &wanted)?;
    let rows: Vec<_> = seed.rows.into_iter().map(|r| r.values).collect();
    let mut names = vec!["TalhaoAtual"];
    names.extend(BASE_TARGETS);
    let seeded = store.insert_rows(APEX_BASE_0, &names, &rows)?;

    let mut filled = 0;
    for (table, cols) in sources.iter().skip(1) {
        filled += store.conditional_merge(&NullMerge {
            target: APEX_BASE_0.to_string(),
            source: table.to_string(),
            target_key: "TalhaoAtual".to_string(),
            source_key: "TalhaoAtual".to_string(),
            columns: cols
                .iter()
                .zip(BASE_TARGETS)
                .map(|(s, t)| (s.clone(), t.to_string()))
                .collect(),
        })?;
    }
    info!(rows = seeded, filled, "apex_base_0 built");
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Dataset, LoadMode, Value};
    use tempfile::NamedTempFile;

    #[test]
    fn test_base_takes_most_specific_source_with_data() {
        let f = NamedTempFile::new().unwrap();
        let store = TabularStore::new(f.path().to_str().unwrap());

        // IFPC, IFC, lot, project, sub-region
        let vtcc = [None, None, Some(11.0), Some(22.0), Some(33.0)];
        let stems = [None, Some(900.0), Some(1.0), Some(2.0), Some(3.0)];
        let dates = [None, None, Some("2020-03-01"), Some("2019-03-01"), Some("2018-03-01")];
        for (i, (table, cols)) in base_sources().iter().enumerate() {
            let ds = Dataset::new(vec![
                ColumnDef::text("TalhaoAtual"),
                ColumnDef::real(&cols[0]),
                ColumnDef::real(&cols[1]),
                ColumnDef::date(&cols[2]),
            ])
            .with_rows(vec![vec![
                Value::from("11100112345R00"),
                vtcc[i].map_or(Value::Null, Value::Real),
                stems[i].map_or(Value::Null, Value::Real),
                dates[i].map_or(Value::Null, Value::from),
            ]]);
            store.bulk_load(table, &ds, LoadMode::Replace).unwrap();
        }

        assert_eq!(build_base(&store).unwrap(), 1);
        let base = store.read_table(APEX_BASE_0).unwrap();
        let row = base.row(0).unwrap();
        assert_eq!(row.f64("VTCC"), Some(11.0));
        assert_eq!(row.f64("Fustes"), Some(900.0));
        assert_eq!(row.text("DT_Medicao").as_deref(), Some("2020-03-01"));
    }

    #[test]
    fn test_join_aliases_follow_joined_table() {
        let joins = temp_joins();
        assert_eq!(joins.len(), 6);
        assert_eq!(joins[0].alias("VTCC"), "VTCC_IFPC");
        assert_eq!(joins[2].alias("AGGL_VTCC"), "AGGL_VTCC_IFC_Lote");
        assert_eq!(joins[4].alias(AGG_DATE), "AGGDT_IFC_SubRegiao");
        assert_eq!(joins[5].alias("DIST_Total"), "DIST_Total_CadastroFlorestal");
        assert_eq!(joins[3].primary_key, joins[3].fallback_key);
    }

    #[test]
    fn test_base_sources_match_join_aliases() {
        let joins = temp_joins();
        for (i, (table, cols)) in base_sources().iter().enumerate() {
            assert_eq!(*table, joins[i].output);
            let aliases: Vec<String> = joins[i].columns.iter().map(|c| joins[i].alias(c)).collect();
            for c in cols {
                assert!(aliases.contains(c), "{} not produced by {}", c, table);
            }
        }
    }
}
