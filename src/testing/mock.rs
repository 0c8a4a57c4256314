//! In-process stand-ins for the payment gateway and audit sink.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::billing::{
    BillingAuditEvent, BillingAuditLogger, BillingError, BillingResult, InquiryResponse,
    PaymentGateway, PaymentRedirect, PaymentRequest,
};

/// Mock payment gateway.
///
/// Clones share state, so a test can keep a handle while the managers own
/// another. Bills without a configured status answer code `1` (in process).
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<MockGatewayState>,
}

#[derive(Default)]
struct MockGatewayState {
    statuses: RwLock<HashMap<String, String>>,
    requests: RwLock<Vec<PaymentRequest>>,
    last_inquiry_trx_id: RwLock<Option<String>>,
    inquiry_delay: RwLock<Duration>,
    fail_requests: AtomicBool,
    fail_inquiries: AtomicBool,
    inquiries: AtomicU64,
    trx_counter: AtomicU64,
}

impl MockGateway {
    /// Create a new mock gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Status code the gateway reports for `bill_no`.
    pub fn set_status(&self, bill_no: &str, code: &str) {
        self.state
            .statuses
            .write()
            .unwrap()
            .insert(bill_no.to_string(), code.to_string());
    }

    /// Reject every bill request.
    pub fn fail_requests(&self, fail: bool) {
        self.state.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Make every inquiry fail as if the gateway were unreachable.
    pub fn fail_inquiries(&self, fail: bool) {
        self.state.fail_inquiries.store(fail, Ordering::SeqCst);
    }

    /// Delay applied to inquiries started from now on.
    pub fn set_inquiry_delay(&self, delay: Duration) {
        *self.state.inquiry_delay.write().unwrap() = delay;
    }

    /// Bills accepted so far (for test assertions).
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.state.requests.read().unwrap().clone()
    }

    /// Number of inquiries made, failed ones included.
    pub fn inquiry_count(&self) -> u64 {
        self.state.inquiries.load(Ordering::SeqCst)
    }

    /// `trx_id` passed with the most recent inquiry.
    pub fn last_inquiry_trx_id(&self) -> Option<String> {
        self.state.last_inquiry_trx_id.read().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn request_payment(&self, request: &PaymentRequest) -> BillingResult<PaymentRedirect> {
        if self.state.fail_requests.load(Ordering::SeqCst) {
            return Err(BillingError::GatewayRequest {
                message: "Invalid merchant".to_string(),
                code: Some("99".to_string()),
                http_status: None,
            });
        }

        let trx_id = format!("TRX{:06}", self.state.trx_counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.state.requests.write().unwrap().push(request.clone());
        Ok(PaymentRedirect {
            redirect_url: format!("https://pay.mock/{}", request.bill_no),
            trx_id: Some(trx_id),
        })
    }

    async fn inquire(&self, bill_no: &str, trx_id: Option<&str>) -> BillingResult<InquiryResponse> {
        self.state.inquiries.fetch_add(1, Ordering::SeqCst);
        *self.state.last_inquiry_trx_id.write().unwrap() = trx_id.map(str::to_string);

        let delay = *self.state.inquiry_delay.read().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.state.fail_inquiries.load(Ordering::SeqCst) {
            return Err(BillingError::Reconciliation {
                bill_no: bill_no.to_string(),
                message: "connection refused".to_string(),
            });
        }

        let code = self
            .state
            .statuses
            .read()
            .unwrap()
            .get(bill_no)
            .cloned()
            .unwrap_or_else(|| "1".to_string());
        let bill_total = self
            .state
            .requests
            .read()
            .unwrap()
            .iter()
            .find(|r| r.bill_no == bill_no)
            .map(|r| r.amount);

        Ok(InquiryResponse {
            payment_status_code: code,
            bill_total,
            trx_id: trx_id.map(str::to_string),
        })
    }
}

/// Audit logger that keeps every event in memory.
#[derive(Default)]
pub struct RecordingAuditLogger {
    events: Mutex<Vec<BillingAuditEvent>>,
}

impl RecordingAuditLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far, oldest first.
    pub async fn events(&self) -> Vec<BillingAuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl BillingAuditLogger for RecordingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        self.events.lock().await.push(event);
    }
}
