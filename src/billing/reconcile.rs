//! Gateway reconciliation.
//!
//! Moves payment records from `Pending` to `Success` or `Failed` based on
//! what the gateway reports. A status inquiry is authoritative; the query
//! string on the payer's redirect is only a hint, used when the inquiry
//! cannot be made.
//!
//! Every transition goes through the store's compare-and-set, so repeated
//! or concurrent reconciliation of the same bill applies at most once, and
//! overlapping bills cannot both settle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use super::audit::{BillingAuditEvent, BillingAuditLogger, TracingAuditLogger};
use super::eligibility::is_contiguous_from;
use super::error::{BillingError, BillingResult};
use super::gateway::{PaymentGateway, RedirectParams};
use super::payment::{PaymentRecord, PaymentStatus};
use super::storage::BillingStore;

const LOG_TARGET: &str = "kakasaku::billing::reconcile";

/// What a status update was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileSource {
    /// A status inquiry answered by the gateway.
    Inquiry,
    /// The query string of the payer's redirect.
    Redirect,
}

impl ReconcileSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inquiry => "inquiry",
            Self::Redirect => "redirect",
        }
    }
}

/// Result of reconciling one bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The gateway has not settled the bill yet.
    Unchanged { status: PaymentStatus },
    /// The record moved to a terminal state.
    Transitioned {
        from: PaymentStatus,
        to: PaymentStatus,
        source: ReconcileSource,
    },
    /// The record was already terminal; nothing was asked or written.
    AlreadyFinal { status: PaymentStatus },
    /// A newer inquiry for the same bill started while this one was in
    /// flight; its answer was discarded.
    Superseded,
}

impl ReconcileOutcome {
    /// The record's status after reconciliation, when known.
    #[must_use]
    pub fn status(&self) -> Option<PaymentStatus> {
        match self {
            Self::Unchanged { status } | Self::AlreadyFinal { status } => Some(*status),
            Self::Transitioned { to, .. } => Some(*to),
            Self::Superseded => None,
        }
    }
}

/// Reconciles local payment records with the gateway.
pub struct Reconciler<S: BillingStore, G: PaymentGateway> {
    store: S,
    gateway: G,
    audit: Arc<dyn BillingAuditLogger>,
    trust_redirect_hint: bool,
    // Latest inquiry ticket per bill number.
    tickets: DashMap<String, u64>,
    next_ticket: AtomicU64,
}

impl<S: BillingStore, G: PaymentGateway> Reconciler<S, G> {
    /// Create a reconciler that trusts redirect hints when inquiries fail.
    #[must_use]
    pub fn new(store: S, gateway: G) -> Self {
        Self {
            store,
            gateway,
            audit: Arc::new(TracingAuditLogger),
            trust_redirect_hint: true,
            tickets: DashMap::new(),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Use a different audit logger.
    #[must_use]
    pub fn with_audit_logger(mut self, audit: Arc<dyn BillingAuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// Whether a redirect's `status` may settle a bill when the inquiry
    /// fails.
    #[must_use]
    pub fn trust_redirect_hint(mut self, trust: bool) -> Self {
        self.trust_redirect_hint = trust;
        self
    }

    async fn load(&self, bill_no: &str) -> BillingResult<PaymentRecord> {
        self.store
            .get_payment(bill_no)
            .await?
            .ok_or_else(|| BillingError::PaymentNotFound {
                bill_no: bill_no.to_string(),
            })
    }

    /// Ask the gateway for a bill's status and apply the answer.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Reconciliation`] if the gateway could not be
    /// reached; the record is left untouched.
    pub async fn refresh(&self, bill_no: &str) -> BillingResult<ReconcileOutcome> {
        let record = self.load(bill_no).await?;
        if record.status.is_terminal() {
            return Ok(ReconcileOutcome::AlreadyFinal { status: record.status });
        }
        let trx_id = record.trx_id.clone();
        self.inquire_and_apply(&record, trx_id.as_deref()).await
    }

    /// Handle the payer returning from the gateway.
    ///
    /// The bill is looked up by `bill_no` (or `bill_ref`) and an inquiry is
    /// made. If the inquiry fails, the redirect's `status` is applied
    /// instead, provided hints are trusted and the redirect's `bill_total`
    /// (when present) matches the record.
    pub async fn handle_redirect(&self, params: &RedirectParams) -> BillingResult<ReconcileOutcome> {
        let bill_no = params.bill_no()?;
        let record = self.load(bill_no).await?;
        if record.status.is_terminal() {
            return Ok(ReconcileOutcome::AlreadyFinal { status: record.status });
        }

        let trx_id = record.trx_id.clone().or_else(|| params.trx_id.clone());
        match self.inquire_and_apply(&record, trx_id.as_deref()).await {
            Err(e) if e.is_gateway_error() => {
                tracing::warn!(
                    target: LOG_TARGET,
                    bill_no = bill_no,
                    error = %e,
                    "Inquiry failed, falling back to redirect status"
                );
                self.apply_hint(&record, params).await
            }
            other => other,
        }
    }

    async fn apply_hint(
        &self,
        record: &PaymentRecord,
        params: &RedirectParams,
    ) -> BillingResult<ReconcileOutcome> {
        let hinted = params.hinted_status();
        let unchanged = Ok(ReconcileOutcome::Unchanged { status: record.status });

        if hinted == PaymentStatus::Pending {
            return unchanged;
        }
        if !self.trust_redirect_hint {
            tracing::info!(
                target: LOG_TARGET,
                bill_no = %record.bill_no,
                hinted = %hinted,
                "Ignoring redirect status, hints are not trusted"
            );
            return unchanged;
        }
        if let Some(total) = params.bill_total() {
            if total != record.total_amount {
                tracing::warn!(
                    target: LOG_TARGET,
                    bill_no = %record.bill_no,
                    redirect_total = total,
                    record_total = record.total_amount,
                    "Redirect bill_total does not match record, ignoring hint"
                );
                return unchanged;
            }
        }

        self.apply(record, hinted, params.trx_id.as_deref(), ReconcileSource::Redirect)
            .await
    }

    async fn inquire_and_apply(
        &self,
        record: &PaymentRecord,
        trx_id: Option<&str>,
    ) -> BillingResult<ReconcileOutcome> {
        let ticket = self.take_ticket(&record.bill_no);
        let result = self.gateway.inquire(&record.bill_no, trx_id).await;

        let current = self.is_current(&record.bill_no, ticket);
        self.tickets.remove_if(&record.bill_no, |_, t| *t == ticket);

        let response = result.map_err(|e| match e {
            BillingError::Reconciliation { .. } => e,
            other => BillingError::Reconciliation {
                bill_no: record.bill_no.clone(),
                message: other.to_string(),
            },
        })?;

        if !current {
            tracing::debug!(
                target: LOG_TARGET,
                bill_no = %record.bill_no,
                ticket = ticket,
                "Discarding superseded inquiry response"
            );
            return Ok(ReconcileOutcome::Superseded);
        }

        let target = response.status().payment_status();
        tracing::debug!(
            target: LOG_TARGET,
            bill_no = %record.bill_no,
            code = %response.payment_status_code,
            status = %target,
            "Inquiry answered"
        );

        let trx_id = response.trx_id.as_deref().or(trx_id);
        self.apply(record, target, trx_id, ReconcileSource::Inquiry).await
    }

    fn take_ticket(&self, bill_no: &str) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        self.tickets.insert(bill_no.to_string(), ticket);
        ticket
    }

    fn is_current(&self, bill_no: &str, ticket: u64) -> bool {
        self.tickets.get(bill_no).is_some_and(|t| *t == ticket)
    }

    /// Apply a gateway-derived status to a pending record.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PeriodConflict`] when settling the record
    /// would pay for months another successful payment already covers. The
    /// store checks this in the same atomic step as the write, so two
    /// overlapping bills settled at once cannot both succeed. The record
    /// stays pending.
    pub async fn apply(
        &self,
        record: &PaymentRecord,
        target: PaymentStatus,
        trx_id: Option<&str>,
        source: ReconcileSource,
    ) -> BillingResult<ReconcileOutcome> {
        if target == PaymentStatus::Pending {
            return Ok(ReconcileOutcome::Unchanged { status: PaymentStatus::Pending });
        }

        let moved = match self
            .store
            .transition_payment(&record.bill_no, PaymentStatus::Pending, target, trx_id)
            .await
        {
            Ok(moved) => moved,
            Err(BillingError::PeriodConflict { bill_no, periods }) => {
                return Err(self.report_conflict(record, bill_no, periods).await);
            }
            Err(e) => return Err(e),
        };

        if !moved {
            let current = self.load(&record.bill_no).await?;
            return Ok(ReconcileOutcome::AlreadyFinal { status: current.status });
        }

        tracing::info!(
            target: LOG_TARGET,
            bill_no = %record.bill_no,
            subscription_id = %record.subscription_id,
            status = %target,
            source = source.as_str(),
            "Payment reconciled"
        );
        self.audit
            .log(BillingAuditEvent::PaymentReconciled {
                bill_no: record.bill_no.clone(),
                from: PaymentStatus::Pending,
                to: target,
                source: source.as_str(),
            })
            .await;

        if target == PaymentStatus::Success {
            self.warn_on_gap(record).await?;
        }

        Ok(ReconcileOutcome::Transitioned {
            from: PaymentStatus::Pending,
            to: target,
            source,
        })
    }

    async fn report_conflict(
        &self,
        record: &PaymentRecord,
        bill_no: String,
        periods: Vec<String>,
    ) -> BillingError {
        tracing::error!(
            target: LOG_TARGET,
            bill_no = %bill_no,
            subscription_id = %record.subscription_id,
            periods = %periods.join(", "),
            "Bill covers months that are already paid"
        );
        self.audit
            .log(BillingAuditEvent::PeriodConflict {
                subscription_id: record.subscription_id.clone(),
                bill_no: bill_no.clone(),
                periods: periods.clone(),
            })
            .await;
        BillingError::PeriodConflict { bill_no, periods }
    }

    /// Gateway confirmation is authoritative, so a gap after settling is
    /// logged rather than rejected.
    async fn warn_on_gap(&self, record: &PaymentRecord) -> BillingResult<()> {
        let Some(subscription) = self.store.get_subscription(&record.subscription_id).await? else {
            return Ok(());
        };
        let paid = self.store.paid_periods(&record.subscription_id).await?;
        if !is_contiguous_from(subscription.start_period(), paid) {
            tracing::warn!(
                target: LOG_TARGET,
                bill_no = %record.bill_no,
                subscription_id = %record.subscription_id,
                "Settling bill leaves a gap in paid months"
            );
        }
        Ok(())
    }
}
