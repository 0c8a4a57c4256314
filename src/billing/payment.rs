//! Payment records and their canonical status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bill::{BillRequest, parse_bill_reference};
use super::period::Period;

/// Local state of a payment.
///
/// Gateway codes and legacy status strings are mapped into this enum once,
/// at the reconciliation boundary; nothing downstream matches on raw
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Waiting for the gateway to confirm.
    Pending,
    /// Paid; the covered months count as settled.
    Success,
    /// Declined, expired or cancelled at the gateway. Kept for audit.
    Failed,
}

impl PaymentStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Success and Failed never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Map a status string written by older versions of the app.
    ///
    /// `settled`, `success` and `paid` all meant the payment went through.
    #[must_use]
    pub fn from_legacy(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "settled" | "success" | "paid" => Self::Success,
            "pending" => Self::Pending,
            _ => Self::Failed,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bill sent to the gateway and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub subscription_id: String,
    pub donor_id: String,
    pub bill_no: String,
    /// Display text, e.g. `Pay 2 months (3-2026, 4-2026)`.
    pub bill_reference: String,
    /// Months this bill pays for, ascending. Authoritative over the
    /// reference text.
    pub covered_periods: Vec<Period>,
    /// Total, in rupiah.
    pub total_amount: i64,
    pub status: PaymentStatus,
    /// Gateway transaction ID, once known.
    pub trx_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// A new pending record for a composed bill.
    #[must_use]
    pub fn pending(bill: &BillRequest, trx_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subscription_id: bill.subscription_id.clone(),
            donor_id: bill.donor_id.clone(),
            bill_no: bill.bill_no.clone(),
            bill_reference: bill.reference.clone(),
            covered_periods: bill.periods.clone(),
            total_amount: bill.amount,
            status: PaymentStatus::Pending,
            trx_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Months covered by this record.
    ///
    /// Falls back to parsing the reference for records written before the
    /// structured field existed; an unreadable reference covers nothing.
    #[must_use]
    pub fn covered(&self) -> Vec<Period> {
        if !self.covered_periods.is_empty() {
            return self.covered_periods.clone();
        }
        match parse_bill_reference(&self.bill_reference) {
            Ok(periods) => periods,
            Err(e) => {
                tracing::warn!(
                    target: "kakasaku::billing",
                    bill_no = %self.bill_no,
                    error = %e,
                    "Payment record has no readable month list"
                );
                Vec::new()
            }
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == PaymentStatus::Success
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }
}
