//! Turning a selection into a single payable bill.
//!
//! The bill reference (`Pay 2 months (3-2026, 4-2026)`) is shown to donors
//! and stored with the payment record. Older records only carry the
//! reference, so [`parse_bill_reference`] must keep reading what
//! [`bill_reference`] writes: months ascending, separated by `", "`.

use serde::Serialize;

use super::error::{BillingError, BillingResult};
use super::period::Period;
use super::selection::Selection;
use super::subscription::Subscription;

/// Bill number prefix for multi-month Kakasaku bills.
pub const DEFAULT_BILL_PREFIX: &str = "KKSK-MULTI";

/// Length of the random suffix appended to bill numbers.
const BILL_SUFFIX_LEN: usize = 6;

/// A composed bill, ready to be sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillRequest {
    /// Unique bill number in the gateway's namespace.
    pub bill_no: String,
    pub subscription_id: String,
    pub donor_id: String,
    /// Covered months, ascending.
    pub periods: Vec<Period>,
    /// Total due, in rupiah.
    pub amount: i64,
    /// Human-readable description of the covered months.
    pub reference: String,
}

impl BillRequest {
    /// Compose a bill with a freshly generated bill number.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::EmptySelection`] if nothing is selected.
    pub fn compose(selection: &Selection, subscription: &Subscription) -> BillingResult<Self> {
        Self::compose_with_prefix(selection, subscription, DEFAULT_BILL_PREFIX)
    }

    /// Compose a bill whose number starts with `prefix`.
    pub fn compose_with_prefix(
        selection: &Selection,
        subscription: &Subscription,
        prefix: &str,
    ) -> BillingResult<Self> {
        if selection.is_empty() {
            return Err(BillingError::EmptySelection);
        }

        let periods: Vec<Period> = selection.iter().collect();
        let amount = (periods.len() as i64)
            .checked_mul(subscription.monthly_amount)
            .ok_or_else(|| BillingError::Internal {
                message: "bill total overflows".to_string(),
            })?;

        Ok(Self {
            bill_no: generate_bill_no(prefix),
            subscription_id: subscription.id.clone(),
            donor_id: subscription.donor_id.clone(),
            reference: bill_reference(&periods),
            periods,
            amount,
        })
    }

    /// Number of months covered.
    #[must_use]
    pub fn months(&self) -> usize {
        self.periods.len()
    }
}

/// Format the reference text for a list of months.
///
/// Months are sorted ascending regardless of input order.
#[must_use]
pub fn bill_reference(periods: &[Period]) -> String {
    let mut sorted = periods.to_vec();
    sorted.sort();
    sorted.dedup();

    let joined = sorted
        .iter()
        .map(Period::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    format!("Pay {} months ({})", sorted.len(), joined)
}

/// Recover the covered months from a bill reference.
///
/// Reads the text between the first `(` and the following `)`. The
/// leading words are ignored, so references written in other languages
/// (`Bayar 2 bulan (1-2026, 2-2026)`) parse too.
///
/// # Errors
///
/// Returns [`BillingError::PeriodParse`] if there is no parenthesised list
/// or any entry is not a valid month.
pub fn parse_bill_reference(reference: &str) -> BillingResult<Vec<Period>> {
    let missing = || BillingError::PeriodParse {
        input: reference.to_string(),
        reason: "bill reference has no month list".to_string(),
    };

    let open = reference.find('(').ok_or_else(missing)?;
    let rest = &reference[open + 1..];
    let close = rest.find(')').ok_or_else(missing)?;
    let inner = rest[..close].trim();

    if inner.is_empty() {
        return Err(missing());
    }

    let mut periods = inner
        .split(',')
        .map(|part| part.trim().parse::<Period>())
        .collect::<BillingResult<Vec<_>>>()?;
    periods.sort();
    Ok(periods)
}

/// Generate a bill number: `{prefix}-{unix millis}-{random suffix}`.
#[must_use]
pub fn generate_bill_no(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
        .take(BILL_SUFFIX_LEN)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("{}-{}-{}", prefix, millis, suffix)
}
