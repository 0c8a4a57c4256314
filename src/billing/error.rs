//! Billing-specific error types.
//!
//! Every fallible billing operation returns [`BillingError`]. The variants
//! are granular so callers can tell a rejected selection apart from a
//! gateway outage, and they convert into [`crate::error::KakasakuError`]
//! for HTTP responses.

use std::fmt;

/// Result alias for billing operations.
pub type BillingResult<T> = std::result::Result<T, BillingError>;

/// Billing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    // Local validation errors
    /// A period string is not of the form `M-YYYY`.
    PeriodParse { input: String, reason: String },
    /// The requested selection would leave a gap between paid months.
    Sequencing { period: String, message: String },
    /// A bill was requested with nothing selected.
    EmptySelection,

    // Subscription errors
    /// No package exists with this ID.
    PackageNotFound { package_id: String },
    /// No subscription exists with this ID.
    NoSubscription { subscription_id: String },
    /// The subscription is no longer active.
    SubscriptionInactive { subscription_id: String },
    /// The donor already has an active subscription.
    SubscriptionExists { donor_id: String, subscription_id: String },

    // Payment record errors
    /// No payment record exists for the bill number.
    PaymentNotFound { bill_no: String },
    /// A payment record with this bill number already exists.
    DuplicateBill { bill_no: String },
    /// Settling the bill would pay for months that are already paid.
    PeriodConflict { bill_no: String, periods: Vec<String> },
    /// The gateway redirect is missing required parameters.
    InvalidRedirect { message: String },

    // Gateway errors
    /// Requesting a payment link from the gateway failed.
    GatewayRequest {
        message: String,
        code: Option<String>,
        http_status: Option<u16>,
    },
    /// Asking the gateway for a bill's status failed.
    Reconciliation { bill_no: String, message: String },

    // General errors
    /// The backing store failed.
    Storage { message: String },
    /// An unexpected internal error occurred.
    Internal { message: String },
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeriodParse { input, reason } => {
                write!(f, "Invalid billing period '{}': {}", input, reason)
            }
            Self::Sequencing { period, message } => {
                write!(f, "Cannot select {}: {}", period, message)
            }
            Self::EmptySelection => {
                write!(f, "Select at least one month to pay")
            }
            Self::PackageNotFound { package_id } => {
                write!(f, "Package not found: {}", package_id)
            }
            Self::NoSubscription { subscription_id } => {
                write!(f, "Subscription not found: {}", subscription_id)
            }
            Self::SubscriptionInactive { subscription_id } => {
                write!(f, "Subscription '{}' is not active", subscription_id)
            }
            Self::SubscriptionExists { donor_id, subscription_id } => {
                write!(
                    f,
                    "Donor '{}' already has an active subscription ({})",
                    donor_id, subscription_id
                )
            }
            Self::PaymentNotFound { bill_no } => {
                write!(f, "Payment not found for bill {}", bill_no)
            }
            Self::DuplicateBill { bill_no } => {
                write!(f, "Bill {} already exists", bill_no)
            }
            Self::PeriodConflict { bill_no, periods } => {
                write!(
                    f,
                    "Bill {} covers months that are already paid: {}",
                    bill_no,
                    periods.join(", ")
                )
            }
            Self::InvalidRedirect { message } => {
                write!(f, "Invalid payment redirect: {}", message)
            }
            Self::GatewayRequest { message, code, http_status } => {
                write!(f, "Payment gateway request failed: {}", message)?;
                if let Some(code) = code {
                    write!(f, " (code: {})", code)?;
                }
                if let Some(status) = http_status {
                    write!(f, " [HTTP {}]", status)?;
                }
                Ok(())
            }
            Self::Reconciliation { bill_no, message } => {
                write!(
                    f,
                    "Could not check payment status for bill {}: {}. Try refreshing again",
                    bill_no, message
                )
            }
            Self::Storage { message } => {
                write!(f, "Billing storage error: {}", message)
            }
            Self::Internal { message } => {
                write!(f, "Internal billing error: {}", message)
            }
        }
    }
}

impl std::error::Error for BillingError {}

impl BillingError {
    /// Check if this error was caused by the caller's input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::PeriodParse { .. }
                | Self::Sequencing { .. }
                | Self::EmptySelection
                | Self::PackageNotFound { .. }
                | Self::NoSubscription { .. }
                | Self::SubscriptionInactive { .. }
                | Self::SubscriptionExists { .. }
                | Self::PaymentNotFound { .. }
                | Self::DuplicateBill { .. }
                | Self::PeriodConflict { .. }
                | Self::InvalidRedirect { .. }
        )
    }

    /// Check if this error came from talking to the payment gateway.
    #[must_use]
    pub fn is_gateway_error(&self) -> bool {
        matches!(self, Self::GatewayRequest { .. } | Self::Reconciliation { .. })
    }

    /// Check if the same call may succeed when repeated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Reconciliation { .. } => true,
            // A reply carrying a gateway response code is a decision, not an outage.
            Self::GatewayRequest { code: Some(_), .. } => false,
            Self::GatewayRequest { http_status, .. } => {
                matches!(http_status, None | Some(408) | Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }
}
