use std::sync::Arc;
use std::time::Duration;

use kakasaku::billing::{
    BillingAuditEvent, BillingStore, InMemoryBillingStore, PaymentStatus, ReconcileOutcome,
    Reconciler, RedirectParams,
};
use kakasaku::testing::{MockGateway, RecordingAuditLogger, fixtures};

const MONTHLY: i64 = 50_000;

async fn setup() -> (InMemoryBillingStore, MockGateway, Arc<RecordingAuditLogger>) {
    let store = InMemoryBillingStore::new();
    store
        .save_subscription(&fixtures::subscription("sub_1", "donor_1", MONTHLY, "1-2026"))
        .await
        .unwrap();
    store
        .insert_payment(&fixtures::pending_record("KKSK-1", "sub_1", &["1-2026", "2-2026"], MONTHLY))
        .await
        .unwrap();
    (store, MockGateway::new(), Arc::new(RecordingAuditLogger::new()))
}

async fn reconciled_events(audit: &RecordingAuditLogger) -> usize {
    audit
        .events()
        .await
        .iter()
        .filter(|e| matches!(e, BillingAuditEvent::PaymentReconciled { .. }))
        .count()
}

#[tokio::test]
async fn test_repeated_success_adds_months_once() {
    let (store, gateway, audit) = setup().await;
    gateway.set_status("KKSK-1", "2");
    let reconciler = Reconciler::new(store.clone(), gateway.clone()).with_audit_logger(audit.clone());

    for _ in 0..3 {
        let outcome = reconciler.refresh("KKSK-1").await.unwrap();
        assert_eq!(outcome.status(), Some(PaymentStatus::Success));
    }

    let paid: Vec<_> = store.paid_periods("sub_1").await.unwrap().into_iter().collect();
    assert_eq!(paid, fixtures::periods(&["1-2026", "2-2026"]));
    assert_eq!(gateway.inquiry_count(), 1);
    assert_eq!(reconciled_events(&audit).await, 1);
}

#[tokio::test]
async fn test_late_failure_hint_cannot_undo_success() {
    let (store, gateway, _audit) = setup().await;
    gateway.set_status("KKSK-1", "2");
    let reconciler = Reconciler::new(store.clone(), gateway.clone());
    reconciler.refresh("KKSK-1").await.unwrap();

    let params = RedirectParams {
        bill_no: Some("KKSK-1".to_string()),
        status: Some("8".to_string()),
        ..Default::default()
    };
    let outcome = reconciler.handle_redirect(&params).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::AlreadyFinal { status: PaymentStatus::Success });
    let record = store.get_payment("KKSK-1").await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Success);
}

#[tokio::test]
async fn test_concurrent_refreshes_transition_once() {
    let (store, gateway, audit) = setup().await;
    gateway.set_status("KKSK-1", "2");
    gateway.set_inquiry_delay(Duration::from_millis(50));
    let reconciler = Arc::new(
        Reconciler::new(store.clone(), gateway.clone()).with_audit_logger(audit.clone()),
    );

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.refresh("KKSK-1").await })
        })
        .collect();

    let mut transitioned = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if matches!(outcome, ReconcileOutcome::Transitioned { .. }) {
            transitioned += 1;
        }
    }

    assert_eq!(transitioned, 1);
    assert_eq!(reconciled_events(&audit).await, 1);
    let record = store.get_payment("KKSK-1").await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Success);
}

#[tokio::test]
async fn test_overlapping_bill_is_not_settled() {
    let (store, gateway, audit) = setup().await;
    store
        .insert_payment(&fixtures::pending_record("KKSK-2", "sub_1", &["1-2026"], MONTHLY))
        .await
        .unwrap();
    gateway.set_status("KKSK-1", "2");
    gateway.set_status("KKSK-2", "2");
    let reconciler = Reconciler::new(store.clone(), gateway.clone()).with_audit_logger(audit.clone());

    reconciler.refresh("KKSK-1").await.unwrap();
    let err = reconciler.refresh("KKSK-2").await.unwrap_err();

    assert!(err.to_string().contains("1-2026"));
    let record = store.get_payment("KKSK-2").await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    let conflicts = audit
        .events()
        .await
        .iter()
        .filter(|e| matches!(e, BillingAuditEvent::PeriodConflict { .. }))
        .count();
    assert_eq!(conflicts, 1);
}
