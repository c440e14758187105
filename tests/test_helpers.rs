// ==========================================
// Talhão APEX - integration test helpers
// ==========================================
// Temporary stores plus seeds for the inventory inputs, the stand
// ledger and every reference table the evaluation reads.
// The seeds key costs on region "10" (stand code positions 3-4 of
// 11100112345R00), a code outside the region catalog.
// ==========================================

#![allow(dead_code)]

use std::error::Error;
use talhao_apex::engine::consist::ledger::{ledger_columns, APEX_BASE_1};
use talhao_apex::store::{ColumnDef, Dataset, LoadMode, TabularStore, Value};
use tempfile::NamedTempFile;

pub const STAND_A: &str = "11100112345R00";
pub const STAND_B: &str = "11100112346R00";
pub const TEST_REGION: &str = "10";

/// Temporary store file (keep the NamedTempFile alive)
pub fn create_test_store() -> Result<(NamedTempFile, TabularStore), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("temp path is not UTF-8")?
        .to_string();
    Ok((temp_file, TabularStore::new(&db_path)))
}

fn load(store: &TabularStore, table: &str, columns: Vec<ColumnDef>, rows: Vec<Vec<Value>>) -> Result<(), Box<dyn Error>> {
    store.bulk_load(table, &Dataset::new(columns).with_rows(rows), LoadMode::Replace)?;
    Ok(())
}

fn real(x: f64) -> Value {
    Value::Real(x)
}

// ==========================================
// Inventory inputs (consist)
// ==========================================

/// Stand A measured in IFPC, stand B only in IFC, both budgeted
///
/// ClassesInclinacao is seeded with the reference tables.
pub fn seed_inventory(store: &TabularStore) -> Result<(), Box<dyn Error>> {
    let stand = || {
        vec![
            ColumnDef::text("Talhao"),
            ColumnDef::date("DT_Medicao"),
            ColumnDef::real("Area"),
            ColumnDef::real("VTCC"),
            ColumnDef::real("Fustes"),
        ]
    };
    load(
        store,
        "IFPC",
        stand(),
        vec![vec![
            Value::from(STAND_A),
            Value::from("2021-01-01"),
            real(10.0),
            real(300.0),
            real(1200.0),
        ]],
    )?;
    load(
        store,
        "IFC",
        stand(),
        vec![vec![
            Value::from(STAND_B),
            Value::from("2021-01-01"),
            real(5.0),
            real(50.0),
            real(1000.0),
        ]],
    )?;
    load(
        store,
        "Orcamento",
        vec![ColumnDef::text("TalhaoAtual"), ColumnDef::text("TalhaoReferencia")],
        vec![
            vec![Value::from(STAND_A), Value::from(STAND_A)],
            vec![Value::from(STAND_B), Value::from(STAND_B)],
        ],
    )?;

    let mut cadastral = vec![ColumnDef::text("Talhao"), ColumnDef::text("DCR_Projeto"), ColumnDef::date("DT_Plantio")];
    cadastral.extend([ColumnDef::text("ESP"), ColumnDef::text("DCR_MatGen"), ColumnDef::real("Area")]);
    cadastral.extend(["DIST_LP", "DIST_PFRod", "DIST_PFFer", "DIST_LFRod", "DIST_Total"].map(ColumnDef::real));
    let cadastro_row = |code: &str, area: f64| {
        vec![
            Value::from(code),
            Value::from("Fazenda Boa Vista"),
            Value::from("2015-01-01"),
            Value::from("3 X 2"),
            Value::from("CLONE-A"),
            real(area),
            real(10.0),
            real(40.0),
            real(0.0),
            real(50.0),
            real(50.0),
        ]
    };
    load(
        store,
        "CadastroFlorestal",
        cadastral,
        vec![cadastro_row(STAND_A, 10.0), cadastro_row(STAND_B, 5.0)],
    )
}

// ==========================================
// Stand ledger (manejo input)
// ==========================================

/// apex_base_1 with one stand; Idade is left for `compute_age`
pub fn seed_ledger(store: &TabularStore) -> Result<(), Box<dyn Error>> {
    let defs = ledger_columns();
    store.recreate_table(APEX_BASE_1, &defs, true)?;
    let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    let row: Vec<Value> = names
        .iter()
        .map(|name| match *name {
            "DCR_Projeto" => Value::from("Fazenda Boa Vista"),
            "Regiao" => Value::from(TEST_REGION),
            "Talhao" => Value::from(STAND_A),
            "Regime" => Value::from("R"),
            "Area" => real(10.0),
            "DT_Plantio" => Value::from("2015-01-01"),
            "DT_Medicao" => Value::from("2021-01-01"),
            "ESP" => Value::from("3 X 2"),
            "DCR_MatGen" => Value::from("CLONE-A"),
            "VTCC" => real(300.0),
            "Fustes" => real(1200.0),
            "DIST_LP" => real(10.0),
            "DIST_PFRod" => real(40.0),
            "DIST_PFFer" => real(0.0),
            "DIST_LFRod" => real(50.0),
            "DIST_Total" => real(50.0),
            _ => Value::Null,
        })
        .collect();
    store.insert_rows(APEX_BASE_1, &names, &[row])?;
    Ok(())
}

// ==========================================
// Reference tables (manejo)
// ==========================================

/// Every reference table of the evaluation, costs keyed on region "10"
pub fn seed_reference_tables(store: &TabularStore) -> Result<(), Box<dyn Error>> {
    // 14-year silviculture schedule: planting cost in year 0 of each cycle
    let schedule_rows = (0..14i64)
        .map(|i| {
            let year = i % 7;
            let cost = if year == 0 { 3000.0 } else { 200.0 };
            vec![Value::Integer(i), real(cost), real(cost)]
        })
        .collect();
    load(
        store,
        "CustosSilvicultura_REF_REG",
        vec![ColumnDef::integer("ANO"), ColumnDef::real(TEST_REGION), ColumnDef::real("BO")],
        schedule_rows,
    )?;
    load(
        store,
        "CustoTerra",
        vec![ColumnDef::text("Regiao"), ColumnDef::real("Custo")],
        vec![vec![Value::from("BO"), real(500.0)]],
    )?;
    load(
        store,
        "ClassesInclinacao",
        vec![
            ColumnDef::text("REGIAO"),
            ColumnDef::real("Area"),
            ColumnDef::real("PCT0_28"),
            ColumnDef::real("PCT29_38"),
            ColumnDef::real("PCT38_MAIS"),
            ColumnDef::real("Pond0_28"),
            ColumnDef::real("Pond29_Mais"),
        ],
        vec![vec![
            Value::from("BO"),
            real(100.0),
            real(0.6),
            real(0.3),
            real(0.1),
            real(60.0),
            real(40.0),
        ]],
    )?;
    load(
        store,
        "CustosColheitaBO",
        vec![ColumnDef::real("PROD"), ColumnDef::real("PD"), ColumnDef::real("GW")],
        vec![vec![real(0.0), real(30.0), real(45.0)], vec![real(200.0), real(25.0), real(38.0)]],
    )?;
    load(
        store,
        "CurvaProdutividade",
        vec![ColumnDef::real("Idade"), ColumnDef::real("BeloOriente")],
        vec![vec![real(6.0), real(115.0)]],
    )?;
    load(
        store,
        "IndiceBrotacao",
        vec![ColumnDef::real("Idade"), ColumnDef::real("Perda")],
        vec![vec![real(0.0), real(90.0)], vec![real(10.0), real(80.0)]],
    )?;
    load(
        store,
        "OutrosCustos",
        vec![
            ColumnDef::text("Regiao"),
            ColumnDef::real("ApoioColheita"),
            ColumnDef::real("EstInterna"),
            ColumnDef::real("ADM"),
            ColumnDef::real("Taxas"),
        ],
        vec![vec![Value::from(TEST_REGION), real(150.0), real(80.0), real(120.0), real(30.0)]],
    )?;
    load(
        store,
        "CustoEstExterna",
        vec![ColumnDef::text("Regiao"), ColumnDef::real("Custo")],
        vec![vec![Value::from(TEST_REGION), real(2.5)]],
    )?;
    load(
        store,
        "Elevacao",
        vec![ColumnDef::text("Regiao"), ColumnDef::text("Elev")],
        vec![vec![Value::from("BO"), Value::from("Região Baixa")]],
    )?;
    load(
        store,
        "RTMaterialGenetico",
        vec![
            ColumnDef::text("DCR_MatGen"),
            ColumnDef::real("RegBaixaEncosta"),
            ColumnDef::real("RegBaixaBaixada"),
            ColumnDef::real("RegAlta"),
        ],
        vec![vec![Value::from("CLONE-A"), real(1.0), real(1.0), real(1.0)]],
    )?;
    load(
        store,
        "ProdMin",
        vec![ColumnDef::text("Regiao"), ColumnDef::real("ProdMin")],
        vec![vec![Value::from("01"), real(100.0)]],
    )
}

/// Read one column of the first row of a table
pub fn first_value(store: &TabularStore, table: &str, column: &str) -> Result<Value, Box<dyn Error>> {
    let t = store.read_columns(table, &[column])?;
    let row = t.row(0).ok_or("table is empty")?;
    Ok(row.get(column).clone())
}
