// ==========================================
// Reconciliation pipeline integration tests
// ==========================================
// Inventory tables in, apex_base_1 and the validation counts out
// ==========================================

mod test_helpers;

use talhao_apex::domain::validation::AdjustmentCondition;
use talhao_apex::engine::consist::ledger::APEX_BASE_1;
use talhao_apex::engine::events::noop_sink;
use talhao_apex::engine::runner::{execute, PipelineKind, PipelineOutput};
use talhao_apex::engine::stage::{CancelToken, StageFailurePolicy};
use talhao_apex::engine::ConsistencyEngine;
use test_helpers::*;

fn run_consist(store: &talhao_apex::TabularStore) -> PipelineOutput {
    execute(
        store.clone(),
        PipelineKind::Consist,
        StageFailurePolicy::ContinueOnError,
        CancelToken::new(),
        noop_sink(),
    )
    .unwrap()
}

#[test]
fn test_consist_builds_ledger() {
    let (_file, store) = create_test_store().unwrap();
    seed_inventory(&store).unwrap();
    seed_reference_tables(&store).unwrap();

    let output = run_consist(&store);
    let report = output.report();
    assert!(report.is_success(), "failed stages: {:?}", report.failed);
    assert_eq!(report.total, 17);
    assert_eq!(report.completed, 17);

    let ledger = store.read_table(APEX_BASE_1).unwrap();
    assert_eq!(ledger.len(), 2);

    // stand A: measured in IFPC
    let a = ledger.find_first("Talhao", &STAND_A.into()).unwrap();
    assert_eq!(a.f64("VTCC"), Some(300.0));
    assert_eq!(a.f64("Fustes"), Some(1200.0));
    assert_eq!(a.text("Regiao").as_deref(), Some(TEST_REGION));
    assert_eq!(a.text("Regime").as_deref(), Some("R"));
    assert_eq!(a.f64("Area"), Some(10.0));
    assert_eq!(a.text("ESP").as_deref(), Some("3 X 2"));
    let age = a.f64("Idade").unwrap();
    assert!((age - 6.0).abs() < 0.01, "age {}", age);
    assert_eq!(a.f64("IdadeClasse"), Some(6.0));

    // stand B: only in IFC
    let b = ledger.find_first("Talhao", &STAND_B.into()).unwrap();
    assert_eq!(b.f64("VTCC"), Some(50.0));
    assert_eq!(b.f64("Area"), Some(5.0));
}

#[test]
fn test_consist_reports_adjustments() {
    let (_file, store) = create_test_store().unwrap();
    seed_inventory(&store).unwrap();
    seed_reference_tables(&store).unwrap();

    let PipelineOutput::Consist { adjustments, .. } = run_consist(&store) else {
        panic!("expected a consist output");
    };
    let adjustments = adjustments.unwrap();
    assert_eq!(adjustments.total_rows, 2);
    assert_eq!(adjustments.counts.len(), 10);
    assert_eq!(adjustments.count_of(AdjustmentCondition::VolumeLow), 1);
    assert_eq!(adjustments.count_of(AdjustmentCondition::VolumeHigh), 0);
    assert_eq!(adjustments.count_of(AdjustmentCondition::AgeMissing), 0);
    assert_eq!(adjustments.rows.len(), 1);
    assert_eq!(adjustments.columns[0], "id");
}

#[test]
fn test_corrections_and_deletions_recount() {
    let (_file, store) = create_test_store().unwrap();
    seed_inventory(&store).unwrap();
    seed_reference_tables(&store).unwrap();
    run_consist(&store);

    let engine = ConsistencyEngine::new(store.clone());
    let report = engine.validate().unwrap();
    let flagged = &report.rows[0];
    let id = flagged[0].as_i64().unwrap();

    // raise stand B's volume above the low threshold
    let mut correction: Vec<String> = flagged
        .iter()
        .map(|v| if v.is_null() { String::new() } else { v.to_string() })
        .collect();
    let vtcc = report.columns.iter().position(|c| c == "VTCC").unwrap();
    correction[vtcc] = "180".to_string();
    let report = engine.save_corrections(&[correction]).unwrap();
    assert_eq!(report.count_of(AdjustmentCondition::VolumeLow), 0);
    assert!(report.rows.is_empty());

    let report = engine.delete_rows(&[id]).unwrap();
    assert_eq!(report.total_rows, 1);
}

#[test]
fn test_consist_without_inputs_keeps_going() {
    let (_file, store) = create_test_store().unwrap();
    let output = run_consist(&store);
    let report = output.report();
    assert!(!report.is_success());
    assert!(!report.aborted);
    assert_eq!(report.total, 17);
    assert_eq!(report.completed + report.failed_count(), 17);
}
