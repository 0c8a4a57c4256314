//! Multi-month checkout.
//!
//! Turns the months a donor picked into one bill, gets a payment link from
//! the gateway and records the bill as pending.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::audit::{BillingAuditEvent, BillingAuditLogger, TracingAuditLogger};
use super::bill::{BillRequest, DEFAULT_BILL_PREFIX};
use super::eligibility::BillingCalendar;
use super::error::{BillingError, BillingResult};
use super::gateway::{Customer, PaymentGateway, PaymentRequest};
use super::payment::PaymentRecord;
use super::period::Period;
use super::selection::Selection;
use super::storage::BillingStore;

const LOG_TARGET: &str = "kakasaku::billing::checkout";

/// Checkout configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Prefix of generated bill numbers.
    pub bill_prefix: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            bill_prefix: DEFAULT_BILL_PREFIX.to_string(),
        }
    }
}

impl CheckoutConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bill number prefix.
    #[must_use]
    pub fn bill_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bill_prefix = prefix.into();
        self
    }
}

/// Months a donor wants to pay for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub subscription_id: String,
    pub periods: Vec<Period>,
    pub customer: Customer,
}

/// A bill accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub bill_no: String,
    /// Send the donor here to pay.
    pub redirect_url: String,
    pub amount: i64,
    pub reference: String,
    pub periods: Vec<Period>,
    pub trx_id: Option<String>,
}

/// Checkout operations.
pub struct CheckoutManager<S: BillingStore, G: PaymentGateway> {
    store: S,
    gateway: G,
    config: CheckoutConfig,
    audit: Arc<dyn BillingAuditLogger>,
}

impl<S: BillingStore, G: PaymentGateway> CheckoutManager<S, G> {
    /// Create a new checkout manager.
    #[must_use]
    pub fn new(store: S, gateway: G, config: CheckoutConfig) -> Self {
        Self {
            store,
            gateway,
            config,
            audit: Arc::new(TracingAuditLogger),
        }
    }

    /// Use a different audit logger.
    #[must_use]
    pub fn with_audit_logger(mut self, audit: Arc<dyn BillingAuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// Bill the requested months.
    ///
    /// The months are re-checked against the stored calendar, since the
    /// client's view may be stale. Nothing is stored unless the gateway
    /// accepts the bill.
    ///
    /// # Errors
    ///
    /// - [`BillingError::NoSubscription`] / [`BillingError::SubscriptionInactive`]
    /// - [`BillingError::Sequencing`] if the months are not payable in order
    /// - [`BillingError::EmptySelection`] if no months were given
    /// - [`BillingError::GatewayRequest`] if the gateway refused the bill
    pub async fn create_bill(&self, request: CheckoutRequest) -> BillingResult<CheckoutSession> {
        let subscription = self
            .store
            .get_subscription(&request.subscription_id)
            .await?
            .ok_or_else(|| BillingError::NoSubscription {
                subscription_id: request.subscription_id.clone(),
            })?;

        if !subscription.is_active() {
            return Err(BillingError::SubscriptionInactive {
                subscription_id: subscription.id,
            });
        }

        let paid = self.store.paid_periods(&subscription.id).await?;
        let calendar = BillingCalendar::new(subscription.start_period(), paid);
        let selection = Selection::from_periods(request.periods, &calendar)?;
        let bill = BillRequest::compose_with_prefix(&selection, &subscription, &self.config.bill_prefix)?;

        self.audit
            .log(BillingAuditEvent::BillComposed {
                subscription_id: subscription.id.clone(),
                bill_no: bill.bill_no.clone(),
                months: bill.months(),
                amount: bill.amount,
            })
            .await;

        let payment_request = PaymentRequest {
            bill_no: bill.bill_no.clone(),
            amount: bill.amount,
            description: bill.reference.clone(),
            customer: request.customer,
        };

        let redirect = match self.gateway.request_payment(&payment_request).await {
            Ok(redirect) => redirect,
            Err(e) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    bill_no = %bill.bill_no,
                    subscription_id = %subscription.id,
                    error = %e,
                    "Gateway refused bill"
                );
                return Err(e);
            }
        };

        let record = PaymentRecord::pending(&bill, redirect.trx_id.clone());
        self.store.insert_payment(&record).await?;

        self.audit
            .log(BillingAuditEvent::PaymentRequested {
                subscription_id: subscription.id.clone(),
                bill_no: bill.bill_no.clone(),
                trx_id: redirect.trx_id.clone(),
            })
            .await;

        Ok(CheckoutSession {
            bill_no: bill.bill_no,
            redirect_url: redirect.redirect_url,
            amount: bill.amount,
            reference: bill.reference,
            periods: bill.periods,
            trx_id: redirect.trx_id,
        })
    }
}
