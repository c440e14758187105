// ==========================================
// Evaluation pipeline integration tests
// ==========================================
// One stand, default parameters (juros 8%, no losses):
//   Talhao 11100112345R00, Regime R, Area 10,
//   planted 2015-01-01, measured 2021-01-01, VTCC 300, Fustes 1200
// ==========================================

mod test_helpers;

use talhao_apex::domain::types::RunStatus;
use talhao_apex::engine::consist::ledger::{compute_age, APEX_BASE_1};
use talhao_apex::engine::events::noop_sink;
use talhao_apex::engine::manejo::FINAL_LABEL_COLUMN;
use talhao_apex::engine::runner::{execute, PipelineKind, PipelineOutput};
use talhao_apex::engine::stage::{CancelToken, StageFailurePolicy};
use talhao_apex::engine::ManejoOutcome;
use talhao_apex::repository::{ParametersRepository, RunRegistryRepository};
use talhao_apex::{ManagementParameters, TabularStore, Value};
use test_helpers::*;

fn seeded_store() -> (tempfile::NamedTempFile, TabularStore) {
    let (file, store) = create_test_store().unwrap();
    seed_ledger(&store).unwrap();
    compute_age(&store).unwrap();
    seed_reference_tables(&store).unwrap();
    (file, store)
}

fn run_manejo(store: &TabularStore, remnants: bool) -> ManejoOutcome {
    let output = execute(
        store.clone(),
        PipelineKind::Manejo {
            remnant_reconciliation: remnants,
        },
        StageFailurePolicy::ContinueOnError,
        CancelToken::new(),
        noop_sink(),
    )
    .unwrap();
    match output {
        PipelineOutput::Manejo(outcome) => outcome,
        other => panic!("expected a manejo output, got {:?}", other.report()),
    }
}

fn value(store: &TabularStore, table: &str, column: &str) -> Value {
    first_value(store, table, column).unwrap()
}

#[test]
fn test_single_stand_evaluation() {
    let (_file, store) = seeded_store();
    let outcome = run_manejo(&store, false);

    assert!(outcome.report.is_success(), "failed stages: {:?}", outcome.report.failed);
    assert_eq!(outcome.report.total, 34);
    assert_eq!(outcome.run_number, 1);
    assert_eq!(outcome.result_table, "Apex_Manejo_1");
    assert_eq!(outcome.status, RunStatus::Completed);

    let table = outcome.result_table.as_str();
    let age = value(&store, table, "Idade").as_f64().unwrap();
    assert!((age - 6.0).abs() < 0.01, "age {}", age);

    // region 10 has no curve column: the default curve (130) applies
    assert_eq!(value(&store, table, "Curva").as_f64(), Some(130.0));
    let vol7 = value(&store, table, "Vol7").as_f64().unwrap();
    assert!((vol7 - 390.0).abs() < 1e-6);

    // sprouting 90%, no genetic loss, R2 100%
    let regrowth = value(&store, table, "Vol7_2ROT").as_f64().unwrap();
    assert!((regrowth - 351.0).abs() < 1e-6);
    assert_eq!(value(&store, table, "EspAB").as_f64(), Some(6.0));

    // region 10 has no harvest front, freight column or land cost:
    //   CustosPostoFabrica = (Total + fixed·(vpl7 + vpl14)) / D + external road
    let discount = |year: f64| 1.0 / 1.08f64.powf(year);
    let total: f64 = (0..14)
        .map(|i| {
            let cost = if i % 7 == 0 { 3000.0 } else { 200.0 };
            cost * discount(i as f64)
        })
        .sum();
    let (vpl7, vpl14) = (discount(7.0), discount(14.0));
    let fixed = 150.0 + 80.0 + 120.0 + 30.0;
    let delivered = |vol_rot: f64| (total + fixed * (vpl7 + vpl14)) / (vpl7 * 390.0 + vpl14 * vol_rot) + 2.5;
    let (regrow, reform) = (delivered(351.0), delivered(390.0));

    let close = |column: &str, expected: f64| {
        let actual = value(&store, table, column).as_f64().unwrap();
        assert!((actual - expected).abs() < 1e-9, "{}: {} vs {}", column, actual, expected);
    };
    close("CustosPostoFabrica_REF_REG", regrow);
    close("CustosPostoFabrica_REF_REF", reform);
    close("CustoMadAV", reform / regrow);

    // a second-rotation stand never stays in regeneration
    let label = value(&store, table, "ManejoAPEX").as_text().unwrap();
    assert_eq!(label, "Reforma");
    assert_eq!(value(&store, table, "AvFinalReforma").as_f64(), Some(10.0));
    assert_eq!(value(&store, table, FINAL_LABEL_COLUMN).as_text(), Some(label));
}

#[test]
fn test_area_identity_holds() {
    let (_file, store) = seeded_store();
    let outcome = run_manejo(&store, false);
    let t = store.read_table(&outcome.result_table).unwrap();
    for row in t.iter() {
        let area = row.f64("Area").unwrap_or(0.0);
        let reform = row.f64("AvFinalReforma").unwrap();
        let regen = row.f64("AvFinalRegeneracao").unwrap();
        let not_evaluated = row.f64("AvFinalNaoAvaliado").unwrap();
        assert!((reform + regen - (area - not_evaluated)).abs() < 1e-9);
    }
}

#[test]
fn test_reference_tables_rebuilt() {
    let (_file, store) = seeded_store();
    run_manejo(&store, false);

    let reform = store.read_table("CustosSilvicultura_REF_REF").unwrap();
    assert_eq!(reform.len(), 14);

    let totals = store.read_table("CustosSilvicultura_REF_REG_VPL_Total").unwrap();
    let row = totals.find_first("Regiao", &TEST_REGION.into()).unwrap();
    let (r1, r2, total) = (row.f64("r1").unwrap(), row.f64("r2").unwrap(), row.f64("Total").unwrap());
    assert!((r1 + r2 - total).abs() < 1e-9);
    assert!(r1 > r2);

    let summary = store.read_table("ClassesInclinacaoResumo").unwrap();
    assert_eq!(summary.len(), 7);
    let bo = summary.find_first("FRENTE", &"BO".into()).unwrap();
    assert_eq!(bo.f64("PD"), Some(0.6));
    assert_eq!(bo.f64("GW_CE"), Some(0.4));

    let harvest = store.read_table("CustosColheitaBO").unwrap();
    let pond = harvest.row(0).unwrap().f64("POND").unwrap();
    assert!((pond - (30.0 * 0.6 + 45.0 * 0.4)).abs() < 1e-9);
}

#[test]
fn test_runs_are_numbered_and_registered() {
    let (_file, store) = seeded_store();
    let first = run_manejo(&store, false);
    let second = run_manejo(&store, true);

    assert_eq!(first.run_number, 1);
    assert_eq!(second.run_number, 2);
    assert_eq!(second.report.total, 36);
    assert_eq!(second.remnant_table.as_deref(), Some("Manejo_Apex_t700_2"));
    assert!(store.table_exists("Manejo_Apex_t700_2").unwrap());
    assert!(store.table_exists("Apex_Manejo_1").unwrap());

    let registry = RunRegistryRepository::new(store.db_path()).unwrap();
    let runs = registry.list().unwrap();
    assert_eq!(runs.len(), 2);
    let second_record = registry.find(2).unwrap().unwrap();
    assert!(second_record.remnant_reconciliation);
    assert_eq!(second_record.status, RunStatus::Completed);
    assert!(second_record.finished_at.is_some());
}

#[test]
fn test_parameters_snapshot_per_run() {
    let (_file, store) = seeded_store();
    let params = ManagementParameters {
        interest_pct: 10.0,
        ..Default::default()
    };
    ParametersRepository::new(store.clone()).append(&params).unwrap();

    let outcome = run_manejo(&store, false);
    let record = RunRegistryRepository::new(store.db_path())
        .unwrap()
        .find(outcome.run_number)
        .unwrap()
        .unwrap();
    assert_eq!(record.parameters.interest_pct, 10.0);

    let history = store.read_table("ParametrosHistorico").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.row(0).unwrap().f64("Juros"), Some(10.0));
}

#[test]
fn test_missing_ledger_fails_stages_not_the_run() {
    let (_file, store) = create_test_store().unwrap();
    seed_reference_tables(&store).unwrap();
    assert!(!store.table_exists(APEX_BASE_1).unwrap());

    let outcome = run_manejo(&store, false);
    assert!(!outcome.report.is_success());
    assert_eq!(outcome.status, RunStatus::CompletedWithErrors);
    assert!(outcome
        .report
        .failed
        .iter()
        .any(|f| f.stage == "manejo.create_run_table"));
}
