//! Audit logging for billing operations.
//!
//! Every bill sent to the gateway and every status change it causes is
//! reported through a [`BillingAuditLogger`].

use std::fmt;

use async_trait::async_trait;

use super::payment::PaymentStatus;

/// Audit event types for billing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingAuditEvent {
    /// Subscription created.
    SubscriptionCreated {
        donor_id: String,
        subscription_id: String,
        package_id: String,
        monthly_amount: i64,
    },
    /// Bill composed from a selection.
    BillComposed {
        subscription_id: String,
        bill_no: String,
        months: usize,
        amount: i64,
    },
    /// Bill accepted by the gateway and stored as pending.
    PaymentRequested {
        subscription_id: String,
        bill_no: String,
        trx_id: Option<String>,
    },
    /// Payment status changed.
    PaymentReconciled {
        bill_no: String,
        from: PaymentStatus,
        to: PaymentStatus,
        source: &'static str,
    },
    /// Success rejected because the months were already paid.
    PeriodConflict {
        subscription_id: String,
        bill_no: String,
        periods: Vec<String>,
    },
}

impl fmt::Display for BillingAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriptionCreated { donor_id, subscription_id, package_id, monthly_amount } => {
                write!(f, "Subscription created: donor={}, sub={}, package={}, monthly={}", donor_id, subscription_id, package_id, monthly_amount)
            }
            Self::BillComposed { subscription_id, bill_no, months, amount } => {
                write!(f, "Bill composed: sub={}, bill={}, months={}, amount={}", subscription_id, bill_no, months, amount)
            }
            Self::PaymentRequested { subscription_id, bill_no, trx_id } => {
                write!(f, "Payment requested: sub={}, bill={}, trx={}", subscription_id, bill_no, trx_id.as_deref().unwrap_or("-"))
            }
            Self::PaymentReconciled { bill_no, from, to, source } => {
                write!(f, "Payment reconciled: bill={}, {} -> {}, source={}", bill_no, from, to, source)
            }
            Self::PeriodConflict { subscription_id, bill_no, periods } => {
                write!(f, "Period conflict: sub={}, bill={}, periods=[{}]", subscription_id, bill_no, periods.join(", "))
            }
        }
    }
}

/// Trait for audit logging backends.
///
/// Implementations should swallow their own failures; billing never waits
/// on audit delivery to decide an outcome.
#[async_trait]
pub trait BillingAuditLogger: Send + Sync {
    /// Log a billing audit event.
    async fn log(&self, event: BillingAuditEvent);
}

/// No-op audit logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

#[async_trait]
impl BillingAuditLogger for NoOpAuditLogger {
    async fn log(&self, _event: BillingAuditEvent) {}
}

/// Tracing-based audit logger.
///
/// Conflicts are logged at ERROR, everything else at INFO.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

#[async_trait]
impl BillingAuditLogger for TracingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        if matches!(event, BillingAuditEvent::PeriodConflict { .. }) {
            tracing::error!(
                target: "billing::audit",
                event_type = %event_kind(&event),
                "{}", event
            );
        } else {
            tracing::info!(
                target: "billing::audit",
                event_type = %event_kind(&event),
                "{}", event
            );
        }
    }
}

/// Get the event kind as a string for structured logging.
pub(crate) fn event_kind(event: &BillingAuditEvent) -> &'static str {
    match event {
        BillingAuditEvent::SubscriptionCreated { .. } => "subscription_created",
        BillingAuditEvent::BillComposed { .. } => "bill_composed",
        BillingAuditEvent::PaymentRequested { .. } => "payment_requested",
        BillingAuditEvent::PaymentReconciled { .. } => "payment_reconciled",
        BillingAuditEvent::PeriodConflict { .. } => "period_conflict",
    }
}
