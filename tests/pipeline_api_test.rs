// ==========================================
// API flow integration tests
// ==========================================
// CSV import -> consist -> corrections -> manejo -> regional reports,
// all through AppState as an operator shell would drive it
// ==========================================

mod test_helpers;

use std::path::Path;
use talhao_apex::api::ApiError;
use talhao_apex::app::AppState;
use talhao_apex::domain::validation::AdjustmentCondition;
use talhao_apex::engine::events::noop_sink;
use talhao_apex::engine::PipelineOutput;
use talhao_apex::importer::ImportRequest;
use talhao_apex::repository::RegionLevel;
use talhao_apex::{ManagementLabel, ManagementParameters};
use tempfile::TempDir;
use test_helpers::*;

fn write_csv(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

/// The inventory inputs as operator CSV exports
fn inventory_files(dir: &Path) -> Vec<ImportRequest> {
    let ifpc = write_csv(
        dir,
        "ifpc.csv",
        &format!("Talhao,DT_Medicao,Area,VTCC,Fustes\n{},2021-01-01,10,300,1200\n", STAND_A),
    );
    let ifc = write_csv(
        dir,
        "ifc.csv",
        &format!("Talhao,DT_Medicao,Area,VTCC,Fustes\n{},2021-01-01,5,50,1000\n", STAND_B),
    );
    let budget = write_csv(
        dir,
        "orcamento.csv",
        &format!(
            "TalhaoAtual,TalhaoReferencia\n{a},{a}\n{b},{b}\n",
            a = STAND_A,
            b = STAND_B
        ),
    );
    let header = "Talhao,DCR_Projeto,DT_Plantio,ESP,DCR_MatGen,Area,DIST_LP,DIST_PFRod,DIST_PFFer,DIST_LFRod,DIST_Total";
    let cadastro = write_csv(
        dir,
        "cadastro.csv",
        &format!(
            "{h}\n{a},Fazenda Boa Vista,2015-01-01,3 X 2,CLONE-A,10,10,40,0,50,50\n{b},Fazenda Boa Vista,2015-01-01,3 X 2,CLONE-A,5,10,40,0,50,50\n",
            h = header,
            a = STAND_A,
            b = STAND_B
        ),
    );
    vec![
        ImportRequest::new(ifpc, "IFPC"),
        ImportRequest::new(ifc, "IFC"),
        ImportRequest::new(budget, "Orcamento"),
        ImportRequest::new(cadastro, "CadastroFlorestal"),
    ]
}

async fn app_state() -> (tempfile::NamedTempFile, AppState) {
    let (file, store) = create_test_store().unwrap();
    let state = AppState::new(store.db_path().to_string()).await.unwrap();
    (file, state)
}

#[tokio::test]
async fn test_import_then_evaluate() {
    let (_file, state) = app_state().await;
    let dir = TempDir::new().unwrap();

    let results = state.import_api.import_files(inventory_files(dir.path())).await.unwrap();
    assert_eq!(results.len(), 4);
    for result in &results {
        assert!(result.is_ok(), "{:?}", result);
    }
    assert_eq!(results[3].as_ref().unwrap().rows, 2);
    seed_reference_tables(&state.store).unwrap();

    // reconciliation
    let output = state.manejo_api.run_consist(noop_sink()).await.unwrap();
    assert!(output.report().is_success(), "{:?}", output.report().failed);
    let report = state.consistency_api.validation_report().unwrap();
    assert_eq!(report.total_rows, 2);
    assert_eq!(report.count_of(AdjustmentCondition::VolumeLow), 1);

    // evaluation with remnant reconciliation
    let output = state.manejo_api.run_manejo(Some(true), noop_sink()).await.unwrap();
    let PipelineOutput::Manejo(outcome) = output else {
        panic!("expected a manejo output");
    };
    assert!(outcome.report.is_success(), "{:?}", outcome.report.failed);
    assert_eq!(outcome.report.total, 36);

    let runs = state.manejo_api.list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(state.manejo_api.get_run(1).unwrap().result_table, "Apex_Manejo_1");

    let by_label = state.manejo_api.area_by_label(1).unwrap();
    assert_eq!(by_label[0], (ManagementLabel::Reforma, 15.0));
    assert_eq!(by_label[1], (ManagementLabel::Regeneracao, 0.0));

    let regional = state.manejo_api.regional_area(1, RegionLevel::Region).unwrap();
    assert_eq!(regional.len(), 1);
    assert_eq!(regional[0].label, "Reforma");
    assert_eq!(regional[0].code, TEST_REGION);
    assert_eq!(regional[0].value, 15.0);
}

#[tokio::test]
async fn test_adjustment_rows_round_trip_through_corrections() {
    let (_file, state) = app_state().await;
    seed_inventory(&state.store).unwrap();
    seed_reference_tables(&state.store).unwrap();
    state.manejo_api.run_consist(noop_sink()).await.unwrap();

    let mut rows = state.consistency_api.adjustment_rows().unwrap();
    assert_eq!(rows.len(), 2);
    let b = rows.iter_mut().find(|r| r[1] == STAND_B).unwrap();
    b[5] = "210".to_string();
    let corrected = vec![b.clone()];
    let report = state.consistency_api.save_corrections(corrected).unwrap();
    assert_eq!(report.count_of(AdjustmentCondition::VolumeLow), 0);

    assert!(matches!(
        state.consistency_api.save_corrections(Vec::new()),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        state.consistency_api.delete_rows(Vec::new()),
        Err(ApiError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_parameters_and_missing_runs() {
    let (_file, state) = app_state().await;

    assert_eq!(
        state.manejo_api.latest_parameters().unwrap(),
        ManagementParameters::default()
    );
    let params = ManagementParameters {
        interest_pct: 6.0,
        ..Default::default()
    };
    state.manejo_api.save_parameters(&params).unwrap();
    assert_eq!(state.manejo_api.latest_parameters().unwrap().interest_pct, 6.0);

    let negative = ManagementParameters {
        interest_pct: -1.0,
        ..Default::default()
    };
    assert!(matches!(
        state.manejo_api.save_parameters(&negative),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(state.manejo_api.get_run(7), Err(ApiError::NotFound(_))));
    assert!(matches!(
        state.manejo_api.area_by_label(7),
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_import_rejects_bad_requests() {
    let (_file, state) = app_state().await;
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), "x.csv", "a,b\n1,2\n");

    assert!(matches!(
        state.import_api.import_file(ImportRequest::new(&path, " ")).await,
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        state.import_api.import_files(Vec::new()).await,
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        state.import_api.list_sheets("/nonexistent/apex.xlsx").await,
        Err(ApiError::NotFound(_))
    ));

    let preview = state.import_api.preview(&path, None, 10).await.unwrap();
    assert_eq!(preview.headers, vec!["a", "b"]);
    assert_eq!(preview.total_rows, 1);
}
