// ==========================================
// 计量编辑乐观更新 集成测试
// ==========================================
// 测试范围: BillingApi → ConcurrencyGuard → BillingStore
// ==========================================

mod helpers;

use helpers::memory_stores::{MemoryBilling, RecordingSink};
use helpers::mock_config::MockConfig;
use helpers::test_data_builder::*;
use serde_json::json;
use std::sync::Arc;
use steel_pm_engine::api::{ApiError, BillingApi};
use steel_pm_engine::domain::types::InvoiceStatus;
use steel_pm_engine::engine::{
    BillingLedger, NotificationSink, OptionalNotificationSink, RejectionReason,
};
use steel_pm_engine::repository::BillingStore;

fn billing_api(store: Arc<MemoryBilling>, sink: Arc<RecordingSink>) -> BillingApi {
    BillingApi::new(
        store as Arc<dyn BillingStore>,
        BillingLedger::default(),
        OptionalNotificationSink::new(Some(sink as Arc<dyn NotificationSink>)),
    )
}

fn two_lines() -> Vec<steel_pm_engine::SovItem> {
    vec![
        SovItemBuilder::new("S1").scheduled("5000").percent("20").build(),
        SovItemBuilder::new("S2").scheduled("2000").percent("50").build(),
    ]
}

#[tokio::test]
async fn test_confirmed_edit_updates_store_and_view() {
    let store = Arc::new(MemoryBilling::new(two_lines(), Vec::new()));
    let sink = Arc::new(RecordingSink::default());
    let api = billing_api(store.clone(), sink.clone());

    let summary = api.load(PROJECT_ID).await.unwrap();
    assert_eq!(summary.lines.len(), 2);
    assert_eq!(summary.total_earned, dec("2000"));

    let metrics = api
        .update_line(PROJECT_ID, "S1", "percent_complete", &json!("80"))
        .await
        .unwrap();

    assert_eq!(metrics.earned, dec("4000"));
    assert_eq!(store.item("S1").percent_complete, dec("80"));
    assert_eq!(api.summary().total_earned, dec("5000"));
    assert!(sink.kinds().is_empty());
}

#[tokio::test]
async fn test_failed_write_rolls_back_view_and_is_retryable() {
    let store = Arc::new(MemoryBilling::new(two_lines(), Vec::new()));
    let sink = Arc::new(RecordingSink::default());
    let api = billing_api(store.clone(), sink.clone());
    api.load(PROJECT_ID).await.unwrap();

    store.set_fail_writes(true);
    let err = api
        .update_line(PROJECT_ID, "S1", "percent_complete", &json!(80))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::StoreWriteFailed { rolled_back: true, .. }));
    assert!(err.is_retryable());
    assert_eq!(api.summary().total_earned, dec("2000"));
    assert!(!api.guard().is_in_flight("S1"));
    assert_eq!(sink.kinds(), vec!["BillingEditRolledBack".to_string()]);

    // 存储恢复后重试成功
    store.set_fail_writes(false);
    api.update_line(PROJECT_ID, "S1", "percent_complete", &json!(80))
        .await
        .unwrap();
    assert_eq!(store.item("S1").percent_complete, dec("80"));
}

#[tokio::test]
async fn test_invoice_approved_after_load_locks_the_line() {
    let store = Arc::new(MemoryBilling::new(
        vec![SovItemBuilder::new("S1").scheduled("5000").percent("80").build()],
        Vec::new(),
    ));
    let sink = Arc::new(RecordingSink::default());
    let api = billing_api(store.clone(), sink.clone());
    api.load(PROJECT_ID).await.unwrap();
    assert!(api.locked_item_ids().is_empty());

    store.add_invoice_line(invoice_line("L1", "S1", InvoiceStatus::Approved, "4000"));

    let err = api
        .update_line(PROJECT_ID, "S1", "percent_complete", &json!(60))
        .await
        .unwrap_err();
    match err {
        ApiError::EditRejected(RejectionReason::LockedDecrease { current, requested }) => {
            assert_eq!(current, dec("80"));
            assert_eq!(requested, dec("60"));
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!(api.locked_item_ids().contains("S1"));
    assert_eq!(store.write_count(), 0);
    assert_eq!(sink.kinds(), vec!["BillingEditRejected".to_string()]);

    let metrics = api
        .update_line(PROJECT_ID, "S1", "percent_complete", &json!(90))
        .await
        .unwrap();
    assert!(metrics.locked);
    assert_eq!(metrics.percent_complete, dec("90"));
}

#[tokio::test]
async fn test_malformed_input_is_rejected_without_write() {
    let store = Arc::new(MemoryBilling::new(two_lines(), Vec::new()));
    let sink = Arc::new(RecordingSink::default());
    let api = billing_api(store.clone(), sink);
    api.load(PROJECT_ID).await.unwrap();

    let err = api
        .update_line(PROJECT_ID, "S1", "percent_complete", &json!("eighty"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_RANGE");
    assert!(!err.is_retryable());

    let err = api
        .update_line(PROJECT_ID, "S1", "percent_complete", &json!(120))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_RANGE");

    let err = api
        .update_line(PROJECT_ID, "missing", "percent_complete", &json!(10))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_different_lines_commit_concurrently() {
    let store = Arc::new(MemoryBilling::new(two_lines(), Vec::new()));
    let api = billing_api(store.clone(), Arc::new(RecordingSink::default()));
    api.load(PROJECT_ID).await.unwrap();

    let pct = json!(40);
    let desc = json!("Misc metals");
    let (first, second) = futures::join!(
        api.update_line(PROJECT_ID, "S1", "percent_complete", &pct),
        api.update_line(PROJECT_ID, "S2", "description", &desc),
    );

    assert_eq!(first.unwrap().earned, dec("2000"));
    second.unwrap();
    assert_eq!(store.item("S2").description, "Misc metals");
    assert_eq!(store.write_count(), 2);
}

#[tokio::test]
async fn test_overbilling_on_load_publishes_notice() {
    let store = Arc::new(MemoryBilling::new(
        vec![SovItemBuilder::new("S1")
            .scheduled("1000")
            .percent("50")
            .billed("600")
            .build()],
        Vec::new(),
    ));
    let sink = Arc::new(RecordingSink::default());
    let api = billing_api(store, sink.clone());

    let summary = api.load(PROJECT_ID).await.unwrap();

    assert!(summary.has_overbilling);
    assert_eq!(summary.lines[0].to_bill, dec("-100"));
    assert_eq!(sink.kinds(), vec!["OverbillingDetected".to_string()]);
}

#[tokio::test]
async fn test_money_scale_comes_from_config() {
    let store = Arc::new(MemoryBilling::new(
        vec![SovItemBuilder::new("S1").scheduled("999.99").percent("33.3").build()],
        Vec::new(),
    ));
    let config = MockConfig {
        money_scale: 0,
        ..MockConfig::default()
    };
    let api = BillingApi::from_config(
        store as Arc<dyn BillingStore>,
        &config,
        OptionalNotificationSink::none(),
    )
    .await
    .unwrap();

    let summary = api.load(PROJECT_ID).await.unwrap();
    // 999.99 × 33.3% = 332.99667 → 333
    assert_eq!(summary.lines[0].earned, dec("333"));
}
