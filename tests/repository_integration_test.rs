// ==========================================
// Repository 层集成测试
// ==========================================
// 测试目标: SQLite 仓储读写 + 派生字段 + 端到端放行/计量流程
// ==========================================

mod helpers;

use helpers::test_data_builder::*;
use serde_json::json;
use std::collections::HashSet;
use steel_pm_engine::api::{BillingApi, FabricationApi};
use steel_pm_engine::config::{config_keys, ConfigManager, EngineConfigReader};
use steel_pm_engine::domain::billing::{InvoiceLine, SovPatch};
use steel_pm_engine::domain::drawing::DrawingMetadata;
use steel_pm_engine::domain::fabrication::PackagePatch;
use steel_pm_engine::domain::types::{
    DrawingStatus, InvoiceStatus, PackageStatus, PieceStatus, RfiStatus,
};
use steel_pm_engine::engine::{EngineStores, OptionalNotificationSink, RfiFailureMode};
use steel_pm_engine::logging;
use steel_pm_engine::repository::{
    BillingRepository, BillingStore, DrawingRepository, DrawingRfiReader, FabricationRepository,
    FabricationStore, RepositoryError,
};
use test_helpers::create_test_db;

#[tokio::test]
async fn test_drawing_repository_round_trips_metadata() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().unwrap();
    let repo = DrawingRepository::new(&db_path).unwrap();

    let mut ds = drawing("DS-1", DrawingStatus::Bfs);
    ds.due_date = chrono::NaiveDate::from_ymd_opt(2026, 3, 15);
    ds.metadata = Some(DrawingMetadata {
        version: 1,
        sheet_count: Some(12),
        revision: Some("C".to_string()),
        reviewer: None,
    });
    repo.upsert_drawing_set(&ds).unwrap();
    repo.upsert_rfi(&rfi("RFI-1", "DS-1", RfiStatus::Answered)).unwrap();

    let drawings = repo.list_drawing_sets(PROJECT_ID).await.unwrap();
    assert_eq!(drawings, vec![ds]);

    let rfis = repo.list_rfis(PROJECT_ID).await.unwrap();
    assert_eq!(rfis.len(), 1);
    assert_eq!(rfis[0].status, RfiStatus::Answered);
    assert!(repo.list_rfis("PRJ-OTHER").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fabrication_repository_patches() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let repo = FabricationRepository::new(&db_path).unwrap();

    let package = PackageBuilder::new("PKG-1")
        .drawings(&["DS-2", "DS-1"])
        .total_pieces(2)
        .build();
    repo.upsert_package(&package).unwrap();
    repo.upsert_piece(&PieceBuilder::new("PC-1", "PKG-1").weight(2.5).build())
        .unwrap();
    repo.upsert_piece(&PieceBuilder::new("PC-2", "PKG-1").on_hold(true).build())
        .unwrap();

    let loaded = repo.get_package("PKG-1").await.unwrap().unwrap();
    assert_eq!(loaded, package);
    assert_eq!(repo.list_pieces("PKG-1").await.unwrap().len(), 2);
    assert!(repo.get_piece("PC-2").await.unwrap().unwrap().on_hold);

    repo.update_package(
        "PKG-1",
        &PackagePatch {
            status: Some(PackageStatus::Released),
            bom_verified: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let loaded = repo.get_package("PKG-1").await.unwrap().unwrap();
    assert_eq!(loaded.status, PackageStatus::Released);
    assert!(!loaded.bom_verified);

    // 重新写入时替换图纸关联
    let relinked = PackageBuilder::new("PKG-1").drawings(&["DS-3"]).build();
    repo.upsert_package(&relinked).unwrap();
    let loaded = repo.get_package("PKG-1").await.unwrap().unwrap();
    assert_eq!(
        loaded.drawing_set_ids.into_iter().collect::<Vec<_>>(),
        vec!["DS-3".to_string()]
    );

    let err = repo
        .update_package("PKG-404", &PackagePatch::status(PackageStatus::Qc))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[tokio::test]
async fn test_billing_repository_derives_billed_to_date() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let repo = BillingRepository::new(&db_path).unwrap();

    repo.upsert_sov_item(&SovItemBuilder::new("S1").scheduled("5000").percent("80").build())
        .unwrap();
    repo.upsert_sov_item(&SovItemBuilder::new("S2").scheduled("1200.50").build())
        .unwrap();

    repo.upsert_invoice("INV-1", PROJECT_ID, InvoiceStatus::Approved).unwrap();
    repo.upsert_invoice("INV-2", PROJECT_ID, InvoiceStatus::Draft).unwrap();
    for (id, invoice, item, amount) in [
        ("L1", "INV-1", "S1", "1500.25"),
        ("L2", "INV-1", "S1", "500"),
        ("L3", "INV-2", "S2", "300"),
    ] {
        repo.insert_invoice_line(&InvoiceLine {
            id: id.to_string(),
            invoice_id: invoice.to_string(),
            sov_item_id: item.to_string(),
            invoice_status: InvoiceStatus::Draft,
            amount: dec(amount),
        })
        .unwrap();
    }

    let items = repo.list_sov_items(PROJECT_ID).await.unwrap();
    assert_eq!(items[0].id, "S1");
    assert_eq!(items[0].billed_to_date, dec("2000.25"));
    assert_eq!(items[1].billed_to_date, dec("0"));
    assert_eq!(items[1].scheduled_value, dec("1200.50"));

    // 发票状态来自发票抬头
    let lines = repo.list_invoice_lines(PROJECT_ID).await.unwrap();
    let locked: HashSet<_> = lines
        .iter()
        .filter(|l| l.locks_sov_item())
        .map(|l| l.sov_item_id.clone())
        .collect();
    assert_eq!(locked, ["S1".to_string()].into_iter().collect());

    repo.update_sov_item(
        "S2",
        &SovPatch {
            percent_complete: Some(dec("12.5")),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let items = repo.list_sov_items(PROJECT_ID).await.unwrap();
    assert_eq!(items[1].percent_complete, dec("12.5"));

    let err = repo
        .update_sov_item("S-404", &SovPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[test]
fn test_unopenable_database_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("missing").join("engine.db");
    let db_path = db_path.to_str().unwrap();

    assert!(matches!(
        DrawingRepository::new(db_path),
        Err(RepositoryError::DatabaseConnectionError(_))
    ));
    assert!(matches!(
        EngineStores::open_sqlite(db_path),
        Err(RepositoryError::DatabaseConnectionError(_))
    ));
}

#[tokio::test]
async fn test_shared_connection_end_to_end() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let (stores, conn) = EngineStores::open_sqlite(&db_path).unwrap();

    let drawings = DrawingRepository::from_connection(conn.clone());
    drawings.upsert_drawing_set(&drawing("DS-1", DrawingStatus::Fff)).unwrap();
    drawings.upsert_rfi(&rfi("RFI-1", "DS-1", RfiStatus::Pending)).unwrap();
    let fabrication = FabricationRepository::from_connection(conn.clone());
    fabrication
        .upsert_package(&PackageBuilder::new("PKG-1").drawings(&["DS-1"]).build())
        .unwrap();
    fabrication
        .upsert_piece(&PieceBuilder::new("PC-1", "PKG-1").build())
        .unwrap();
    let billing = BillingRepository::from_connection(conn.clone());
    billing
        .upsert_sov_item(&SovItemBuilder::new("S1").scheduled("5000").percent("20").build())
        .unwrap();

    let config = ConfigManager::from_connection(conn.clone()).unwrap();
    config
        .set_config_value(config_keys::RFI_FAILURE_MODE, "SUMMARY")
        .unwrap();
    assert_eq!(
        config.get_rfi_failure_mode().await.unwrap(),
        RfiFailureMode::Summary
    );

    let api = FabricationApi::from_config(stores.clone(), &config, OptionalNotificationSink::none())
        .await
        .unwrap();
    assert!(api.release_package(PROJECT_ID, "PKG-1").await.is_err());

    drawings.upsert_rfi(&rfi("RFI-1", "DS-1", RfiStatus::Closed)).unwrap();
    let view = api.release_package(PROJECT_ID, "PKG-1").await.unwrap();
    assert_eq!(view.package.status, PackageStatus::Released);

    let piece = api
        .advance_piece(PROJECT_ID, "PC-1", PieceStatus::Released)
        .await
        .unwrap();
    assert_eq!(piece.status, PieceStatus::Released);

    let billing_api = BillingApi::from_config(
        stores.billing.clone(),
        &config,
        OptionalNotificationSink::none(),
    )
    .await
    .unwrap();
    billing_api.load(PROJECT_ID).await.unwrap();
    let metrics = billing_api
        .update_line(PROJECT_ID, "S1", "percent_complete", &json!("80"))
        .await
        .unwrap();
    assert_eq!(metrics.earned, dec("4000"));
    assert_eq!(
        stores.billing.list_sov_items(PROJECT_ID).await.unwrap()[0].percent_complete,
        dec("80")
    );
}
