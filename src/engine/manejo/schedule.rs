// ==========================================
// Talhão APEX - evaluation: silviculture cost schedules
// ==========================================
// CustosSilvicultura_REF_REG is operator input: one row per year of a
// 14-year cycle, a year column `ANO`, then one cost column per region.
// CustosSilvicultura_REF_REF is derived from it (reform twice), gets
// land cost on the replant year, and both schedules are discounted
// and summarized per region:
//   r1 = first cycle (rows 1-7), r2 = second cycle, Total = r1 + r2
// ==========================================

use crate::domain::parameters::ManagementParameters;
use crate::domain::types::LAND_COST_REGIONS;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::manejo::lookup::{reference_table, ColumnWriter, KeyIndex};
use crate::engine::manejo::scenario::Scenario;
use crate::store::{ColumnDef, ColumnType, Dataset, LoadMode, Table, TabularStore, Value};
use tracing::info;

pub const YEAR_COLUMN: &str = "ANO";
pub const LAND_COST_TABLE: &str = "CustoTerra";

/// Rows of one cycle
pub const CYCLE_YEARS: usize = 7;

/// Row (1-based) of the reform schedule that carries land cost
pub const LAND_COST_ROW: i64 = 8;

fn require_schedule(store: &TabularStore, scenario: Scenario) -> EngineResult<Table> {
    let name = scenario.schedule_table();
    if !store.table_exists(&name)? {
        return Err(EngineError::MissingReference(name));
    }
    Ok(store.read_table(&name)?)
}

/// Position of the year column; region columns follow it
fn year_index(table: &Table) -> EngineResult<usize> {
    table
        .column_index(YEAR_COLUMN)
        .ok_or_else(|| EngineError::InvalidSchedule {
            table: table.name.clone(),
            message: format!("no {} column", YEAR_COLUMN),
        })
}

fn is_id(def: &ColumnDef, pk: Option<&str>) -> bool {
    def.name.eq_ignore_ascii_case("id") || pk.map_or(false, |k| def.name.eq_ignore_ascii_case(k))
}

/// Step 1: REF_REF = the first cycle of REF_REG, twice, with fresh ids
pub fn build_reform_schedule(store: &TabularStore) -> EngineResult<usize> {
    let source = require_schedule(store, Scenario::RefReg)?;
    let pk = store.integer_primary_key(&source.name)?;

    let keep: Vec<usize> = (0..source.columns.len())
        .filter(|&i| !is_id(&source.columns[i], pk.as_deref()))
        .collect();
    let defs: Vec<ColumnDef> = keep.iter().map(|&i| source.columns[i].clone()).collect();
    let first_cycle: Vec<Vec<Value>> = source
        .rows
        .iter()
        .take(CYCLE_YEARS)
        .map(|r| keep.iter().map(|&i| r.values[i].clone()).collect())
        .collect();
    let rows: Vec<Vec<Value>> = first_cycle.iter().chain(first_cycle.iter()).cloned().collect();

    let target = Scenario::RefRef.schedule_table();
    store.recreate_table(&target, &defs, true)?;
    let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    let inserted = store.insert_rows(&target, &names, &rows)?;
    info!(table = %target, rows = inserted, "reform schedule built");
    Ok(inserted)
}

/// Step 2: copy years from REF_REG by id, then add land cost on the replant year
pub fn align_reform_schedule(store: &TabularStore) -> EngineResult<usize> {
    let source = require_schedule(store, Scenario::RefReg)?;
    let target = require_schedule(store, Scenario::RefRef)?;
    year_index(&source)?;

    // REF_REG rows are matched on their id column, or on rowid when it has none
    let source_id = source
        .columns
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case("id"))
        .map(|c| c.name.clone());
    let by_id = source_id.as_deref().map(|c| KeyIndex::new(&source, c));

    let mut years = ColumnWriter::new(vec![ColumnDef::new(
        YEAR_COLUMN,
        target
            .column_index(YEAR_COLUMN)
            .map(|i| target.columns[i].column_type)
            .unwrap_or(ColumnType::Integer),
    )]);
    let mut aligned = 0;
    for row in target.iter() {
        let matched = match &by_id {
            Some(index) => index.row(&Value::Integer(row.rowid())),
            None => source.rows.iter().position(|r| r.rowid == row.rowid()).and_then(|i| source.row(i)),
        };
        if let Some(m) = matched {
            years.push(row.rowid(), vec![m.get(YEAR_COLUMN).clone()]);
            aligned += 1;
        }
    }
    years.write(store, &target.name)?;

    let land = reference_table(store, LAND_COST_TABLE)?;
    let land_by_region = KeyIndex::new(&land, "Regiao");
    let Some(replant) = target.rows.iter().position(|r| r.rowid == LAND_COST_ROW).and_then(|i| target.row(i)) else {
        info!(table = %target.name, aligned, "reform schedule aligned (no replant row)");
        return Ok(aligned);
    };

    let mut defs = Vec::new();
    let mut values = Vec::new();
    for region in LAND_COST_REGIONS {
        let Some(idx) = target.column_index(region) else { continue };
        let (Some(cell), Some(cost)) = (
            replant.f64(region),
            land_by_region.f64(&Value::from(region), "Custo"),
        ) else {
            continue;
        };
        defs.push(target.columns[idx].clone());
        values.push(Value::from(cell + cost));
    }
    if !defs.is_empty() {
        let mut overlay = ColumnWriter::new(defs);
        overlay.push(LAND_COST_ROW, values);
        overlay.write(store, &target.name)?;
    }
    info!(table = %target.name, aligned, "reform schedule aligned");
    Ok(aligned)
}

/// Steps 3-4: multiply every regional cost by 1/(1+juros)^ANO
pub fn discount_schedule(
    store: &TabularStore,
    scenario: Scenario,
    params: &ManagementParameters,
) -> EngineResult<usize> {
    let schedule = require_schedule(store, scenario)?;
    let year_idx = year_index(&schedule)?;
    let regions: Vec<usize> = (year_idx + 1..schedule.columns.len()).collect();

    let mut columns = vec![schedule.columns[year_idx].clone()];
    columns.extend(regions.iter().map(|&i| ColumnDef::real(schedule.columns[i].name.clone())));

    let mut dataset = Dataset::new(columns);
    for row in &schedule.rows {
        let year = &row.values[year_idx];
        let factor = year.as_f64().map(|y| params.discount_factor(y));
        let mut values = vec![year.clone()];
        values.extend(regions.iter().map(|&i| {
            let cost = row.values[i].as_f64();
            Value::from(cost.zip(factor).map(|(c, f)| c * f))
        }));
        dataset.push_row(values);
    }

    let output = scenario.present_value_table();
    let written = store.bulk_load(&output, &dataset, LoadMode::Replace)?;
    info!(table = %output, rows = written, interest_pct = params.interest_pct, "schedule discounted");
    Ok(written)
}

/// Steps 5-6: per-region cycle sums of the discounted schedule
pub fn summarize_present_value(store: &TabularStore, scenario: Scenario) -> EngineResult<usize> {
    let source = scenario.present_value_table();
    if !store.table_exists(&source)? {
        return Err(EngineError::MissingReference(source));
    }
    let vpl = store.read_table(&source)?;
    let year_idx = year_index(&vpl)?;

    let mut rows = Vec::new();
    for col in year_idx + 1..vpl.columns.len() {
        let (mut r1, mut r2) = (0.0, 0.0);
        for (i, row) in vpl.rows.iter().enumerate() {
            let Some(v) = row.values[col].as_f64() else { continue };
            if i < CYCLE_YEARS {
                r1 += v;
            } else {
                r2 += v;
            }
        }
        rows.push(vec![
            Value::from(vpl.columns[col].name.clone()),
            Value::Real(r1),
            Value::Real(r2),
            Value::Real(r1 + r2),
        ]);
    }

    let output = scenario.present_value_total_table();
    store.recreate_table(
        &output,
        &[
            ColumnDef::text("Regiao"),
            ColumnDef::real("r1"),
            ColumnDef::real("r2"),
            ColumnDef::real("Total"),
        ],
        true,
    )?;
    let written = store.insert_rows(&output, &["Regiao", "r1", "r2", "Total"], &rows)?;
    info!(table = %output, regions = written, "present value summarized");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn seed_schedule(store: &TabularStore) {
        let mut ds = Dataset::new(vec![
            ColumnDef::integer("id"),
            ColumnDef::text("Atividade"),
            ColumnDef::integer("ANO"),
            ColumnDef::real("BO"),
            ColumnDef::real("SA"),
        ]);
        for year in 0..14i64 {
            ds.push_row(vec![
                Value::Integer(year + 1),
                Value::from(format!("a{}", year)),
                Value::Integer(year),
                Value::Real(100.0 + year as f64),
                if year == 7 { Value::Null } else { Value::Real(10.0) },
            ]);
        }
        store
            .bulk_load("CustosSilvicultura_REF_REG", &ds, LoadMode::Replace)
            .unwrap();
        let land = Dataset::new(vec![ColumnDef::text("Regiao"), ColumnDef::real("Custo")])
            .with_rows(vec![
                vec![Value::from("BO"), Value::Real(1000.0)],
                vec![Value::from("SA"), Value::Real(500.0)],
            ]);
        store.bulk_load(LAND_COST_TABLE, &land, LoadMode::Replace).unwrap();
    }

    #[test]
    fn test_reform_schedule_repeats_first_cycle_and_adds_land_cost() {
        let f = NamedTempFile::new().unwrap();
        let store = TabularStore::new(f.path().to_str().unwrap());
        seed_schedule(&store);

        assert_eq!(build_reform_schedule(&store).unwrap(), 14);
        assert_eq!(align_reform_schedule(&store).unwrap(), 14);

        let t = store.read_table("CustosSilvicultura_REF_REF").unwrap();
        assert_eq!(t.len(), 14);
        let row1 = t.row(0).unwrap();
        let row8 = t.row(7).unwrap();
        assert_eq!(row1.text("Atividade"), row8.text("Atividade"));
        // years come from REF_REG by id, not from the repeated rows
        assert_eq!(row8.i64("ANO"), Some(7));
        assert_eq!(row8.f64("BO"), Some(1100.0));
        assert_eq!(row8.f64("SA"), Some(510.0));
        assert_eq!(t.row(8).unwrap().f64("BO"), Some(101.0));
    }

    #[test]
    fn test_present_value_at_zero_rate_equals_raw_sums() {
        let f = NamedTempFile::new().unwrap();
        let store = TabularStore::new(f.path().to_str().unwrap());
        seed_schedule(&store);
        let params = ManagementParameters {
            interest_pct: 0.0,
            ..Default::default()
        };

        discount_schedule(&store, Scenario::RefReg, &params).unwrap();
        summarize_present_value(&store, Scenario::RefReg).unwrap();

        let totals = store.read_table("CustosSilvicultura_REF_REG_VPL_Total").unwrap();
        let bo = totals.find_first("Regiao", &Value::from("BO")).unwrap();
        let raw: f64 = (0..14).map(|y| 100.0 + y as f64).sum();
        assert_eq!(bo.f64("Total"), Some(raw));
        assert_eq!(bo.f64("r1"), Some((0..7).map(|y| 100.0 + y as f64).sum()));

        // the NULL year-7 cell is skipped
        let sa = totals.find_first("Regiao", &Value::from("SA")).unwrap();
        assert_eq!(sa.f64("r2"), Some(60.0));
        assert_eq!(sa.f64("Total"), Some(130.0));
    }

    #[test]
    fn test_discount_factor_per_year() {
        let f = NamedTempFile::new().unwrap();
        let store = TabularStore::new(f.path().to_str().unwrap());
        seed_schedule(&store);
        let params = ManagementParameters::default();

        discount_schedule(&store, Scenario::RefReg, &params).unwrap();
        let vpl = store.read_table("CustosSilvicultura_REF_REG_VPL").unwrap();
        assert_eq!(vpl.column_names(), vec!["ANO", "BO", "SA"]);
        let y2 = vpl.row(2).unwrap().f64("BO").unwrap();
        assert!((y2 - 102.0 / 1.08f64.powi(2)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_schedule_is_reported() {
        let f = NamedTempFile::new().unwrap();
        let store = TabularStore::new(f.path().to_str().unwrap());
        assert!(matches!(
            build_reform_schedule(&store),
            Err(EngineError::MissingReference(_))
        ));
    }
}
