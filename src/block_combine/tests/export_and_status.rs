mod common;
use common::{A, B, C, D, abcd, codes, settings_for, setup_service};

use block_combine::catalog::ReloadOptions;
use block_combine::catalog::query::BlockSummary;
use block_combine::combine::{CancelToken, ComputeReport};
use block_combine::error::Error;
use block_combine::status::ComputationState;
use block_combine::{BlockCombine, Outcome, StatusCode};

fn computed() -> (common::TestDb, BlockCombine) {
    let (db, svc) = setup_service();
    svc.reload_catalog(abcd(), ReloadOptions::default()).unwrap();
    svc.import_working_set(&codes(&[A, B, C, D])).unwrap();
    svc.compute_top_combinations(Some(3), &CancelToken::new())
        .unwrap();
    (db, svc)
}

#[test]
fn three_results_export_three_artifacts() {
    let (db, svc) = computed();
    let stored = svc.load_results().unwrap();
    assert_eq!(stored.len(), 3);

    let written = svc.export_results(None).unwrap();
    let names: Vec<_> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["ZH1.blk", "ZH2.blk", "ZH3.blk"]);
    assert!(written.iter().all(|p| p.starts_with(db.export_dir())));

    for (path, result) in written.iter().zip(&stored) {
        let bytes = std::fs::read(path).unwrap();
        let (text, _, had_errors) = encoding_rs::GBK.decode(&bytes);
        assert!(!had_errors);
        let lines: Vec<&str> = text.lines().collect();

        let blocks: Vec<String> = result.blocks.iter().map(|b| format!("1{b}")).collect();
        assert_eq!(lines[..3], blocks[..]);

        let stocks = &lines[3..];
        assert_eq!(stocks.len() as u64, result.count);
        let mut sorted = stocks.to_vec();
        sorted.sort_unstable();
        assert_eq!(stocks, sorted.as_slice());
    }
}

#[test]
fn exporting_nothing_is_a_validation_error() {
    let (db, svc) = setup_service();
    let err = svc.export_results(Some(db.export_dir().as_path())).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(!db.export_dir().join("ZH1.blk").exists());
}

#[test]
fn status_reports_counts_and_last_computation() {
    let (db, svc) = setup_service();
    let fresh = svc.get_status().unwrap();
    assert_eq!(fresh.catalog.blocks, 0);
    assert_eq!(fresh.computation, ComputationState::Never);
    assert!(fresh.last_updated_at().is_none());
    drop(svc);

    let svc = BlockCombine::open(settings_for(&db)).unwrap();
    svc.reload_catalog(abcd(), ReloadOptions::default()).unwrap();
    svc.import_working_set(&codes(&[A, B, C, D])).unwrap();
    svc.compute_top_combinations(Some(2), &CancelToken::new())
        .unwrap();

    let status = svc.get_status().unwrap();
    assert_eq!(status.catalog.blocks, 4);
    assert_eq!(status.catalog.stocks, 4);
    assert_eq!(status.catalog.associations, 11);
    assert_eq!(status.working_set, 4);
    assert_eq!(status.results, 2);
    assert!(status.last_updated_at().is_some());
    let ComputationState::Succeeded { results, .. } = &status.computation else {
        panic!("unexpected state {:?}", status.computation);
    };
    assert_eq!(*results, 2);

    // state survives a restart
    drop(svc);
    let reopened = BlockCombine::open(settings_for(&db)).unwrap();
    assert_eq!(reopened.get_status().unwrap().computation, status.computation);
}

#[test]
fn outcomes_render_status_codes() {
    let (_db, svc) = setup_service();
    svc.reload_catalog(abcd(), ReloadOptions::default()).unwrap();

    let ok: Outcome<Vec<BlockSummary>> = Outcome::from(svc.list_blocks());
    assert_eq!(ok.status, StatusCode::Ok);
    assert_eq!(ok.code, 200);
    assert_eq!(ok.data.map(|b| b.len()), Some(4));

    let failed: Outcome<ComputeReport> = Outcome::from(svc.compute_top_combinations(None, &CancelToken::new()));
    assert_eq!(failed.status.as_u16(), 401);
    let json = serde_json::to_value(&failed).unwrap();
    assert_eq!(json["status"], "insufficient_blocks");
    assert_eq!(json["code"], 401);
    assert!(json["data"].is_null());
}

#[test]
fn re_export_leaves_only_current_ranks_on_disk() {
    let (db, svc) = setup_service();
    svc.reload_catalog(abcd(), ReloadOptions::default()).unwrap();
    svc.import_working_set(&codes(&[A, B, C, D])).unwrap();

    svc.compute_top_combinations(Some(4), &CancelToken::new())
        .unwrap();
    assert_eq!(svc.export_results(None).unwrap().len(), 4);

    svc.compute_top_combinations(Some(2), &CancelToken::new())
        .unwrap();
    let written = svc.export_results(None).unwrap();
    assert_eq!(written.len(), 2);

    let on_disk = std::fs::read_dir(db.export_dir()).unwrap().count();
    assert_eq!(on_disk, 2);
    assert!(!db.export_dir().join("ZH3.blk").exists());
}
