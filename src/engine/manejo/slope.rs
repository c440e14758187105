// ==========================================
// Talhão APEX - evaluation: slope fronts and harvest weighting
// ==========================================
// ClassesInclinacaoResumo: per harvest front, the share of area on
// gentle slopes (PD, 0-28%) and steep slopes (GW_CE, above 28%).
// Each CustosColheita<front> table then gets POND, its two per-volume
// harvest costs weighted by that front's slope shares.
// ==========================================

use crate::domain::types::{HARVEST_FRONTS, SLOPE_FRONTS};
use crate::engine::consist::normalize::CLASSES_INCLINACAO;
use crate::engine::error::EngineResult;
use crate::engine::manejo::lookup::{div, reference_table, round_to, ColumnWriter, KeyIndex};
use crate::store::{ColumnDef, TabularStore, Value};
use tracing::{info, warn};

pub const SLOPE_SUMMARY_TABLE: &str = "ClassesInclinacaoResumo";
pub const HARVEST_TABLE_PREFIX: &str = "CustosColheita";

pub fn harvest_table(front: &str) -> String {
    format!("{}{}", HARVEST_TABLE_PREFIX, front)
}

fn sum_where(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Step 7: rebuild ClassesInclinacaoResumo
pub fn summarize_slope_fronts(store: &TabularStore) -> EngineResult<usize> {
    let classes = reference_table(store, CLASSES_INCLINACAO)?;

    let mut rows = Vec::with_capacity(SLOPE_FRONTS.len());
    for (front, regions) in SLOPE_FRONTS {
        let members: Vec<_> = classes
            .iter()
            .filter(|r| {
                r.text("REGIAO")
                    .map_or(false, |code| regions.contains(&code.trim()))
            })
            .collect();
        let area = sum_where(members.iter().map(|r| r.f64("Area")));
        let pd = div(sum_where(members.iter().map(|r| r.f64("Pond0_28"))), area);
        let gw = div(sum_where(members.iter().map(|r| r.f64("Pond29_Mais"))), area);
        let total = pd.zip(gw).map(|(p, g)| round_to(p + g, 4));
        rows.push(vec![
            Value::from(front),
            Value::from(area),
            Value::from(pd),
            Value::from(gw),
            Value::from(total),
        ]);
    }

    store.recreate_table(
        SLOPE_SUMMARY_TABLE,
        &[
            ColumnDef::text("FRENTE"),
            ColumnDef::real("AREA"),
            ColumnDef::real("PD"),
            ColumnDef::real("GW_CE"),
            ColumnDef::real("TOTAL"),
        ],
        true,
    )?;
    let written = store.insert_rows(
        SLOPE_SUMMARY_TABLE,
        &["FRENTE", "AREA", "PD", "GW_CE", "TOTAL"],
        &rows,
    )?;
    info!(table = SLOPE_SUMMARY_TABLE, fronts = written, "slope fronts summarized");
    Ok(written)
}

/// Step 8: POND = PD·front.PD + GW·front.GW_CE on every harvest cost table
///
/// Missing tables are skipped; NULL terms count as zero.
pub fn weight_harvest_costs(store: &TabularStore) -> EngineResult<usize> {
    let summary = reference_table(store, SLOPE_SUMMARY_TABLE)?;
    let fronts = KeyIndex::new(&summary, "FRENTE");

    let mut weighted = 0;
    for front in HARVEST_FRONTS {
        let table = harvest_table(front);
        if !store.table_exists(&table)? {
            warn!(table = %table, "harvest cost table missing, skipped");
            continue;
        }
        let share_pd = fronts.row_by_text(front).and_then(|r| r.f64("PD")).unwrap_or(0.0);
        let share_gw = fronts.row_by_text(front).and_then(|r| r.f64("GW_CE")).unwrap_or(0.0);

        let costs = store.read_table(&table)?;
        let mut writer = ColumnWriter::new(vec![ColumnDef::real("POND")]);
        for row in costs.iter() {
            let pd = row.f64("PD").map_or(0.0, |x| x * share_pd);
            let gw = row.f64("GW").map_or(0.0, |x| x * share_gw);
            writer.push(row.rowid(), vec![Value::Real(pd + gw)]);
        }
        weighted += writer.write(store, &table)?;
    }
    info!(rows = weighted, "harvest costs weighted");
    Ok(weighted)
}
