//! Kakasaku recurring-donor billing.
//!
//! Donors subscribe to a monthly package and pay for one or more months at
//! a time through Faspay. Months must be paid in order: a month can only be
//! selected once the month before it is paid or selected.
//!
//! # Example
//!
//! ```rust,ignore
//! use kakasaku::billing::{
//!     BillingCalendar, CheckoutConfig, CheckoutManager, CheckoutRequest, FaspayClient,
//!     FaspayConfig, InMemoryBillingStore, Reconciler, Selection,
//! };
//!
//! let store = InMemoryBillingStore::new();
//! let faspay = FaspayClient::new(
//!     FaspayConfig::new("bot123", password, "31234")
//!         .inquiry_url("https://faspay.example/inquiry")
//!         .return_url("https://donasi.example/kakasaku/status"),
//! )?;
//!
//! // Build the selection the donor clicked through
//! let calendar = BillingCalendar::new(subscription.start_period(), paid);
//! let selection = Selection::new()
//!     .toggle("3-2026".parse()?, &calendar)
//!     .toggle("4-2026".parse()?, &calendar);
//!
//! // Bill it and send the donor to Faspay
//! let checkout = CheckoutManager::new(store.clone(), faspay.clone(), CheckoutConfig::new());
//! let session = checkout.create_bill(CheckoutRequest {
//!     subscription_id: subscription.id.clone(),
//!     periods: selection.iter().collect(),
//!     customer,
//! }).await?;
//!
//! // When the donor comes back
//! let reconciler = Reconciler::new(store, faspay);
//! reconciler.refresh(&session.bill_no).await?;
//! ```

pub mod audit;
pub mod bill;
pub mod checkout;
pub mod eligibility;
pub mod error;
pub mod faspay;
pub mod gateway;
pub mod payment;
pub mod period;
pub mod reconcile;
pub mod selection;
pub mod storage;
pub mod subscription;

// Period exports
pub use period::Period;

// Eligibility and selection exports
pub use eligibility::{BillingCalendar, MonthSlot, is_contiguous_from};
pub use selection::Selection;

// Bill exports
pub use bill::{BillRequest, DEFAULT_BILL_PREFIX, bill_reference, generate_bill_no, parse_bill_reference};

// Subscription exports
pub use subscription::{DonorSummary, Package, Subscription, SubscriptionManager, SubscriptionStatus};

// Payment exports
pub use payment::{PaymentRecord, PaymentStatus};

// Storage exports
pub use storage::{BillingStore, InMemoryBillingStore};

// Checkout exports
pub use checkout::{CheckoutConfig, CheckoutManager, CheckoutRequest, CheckoutSession};

// Gateway exports
pub use gateway::{
    Customer, GatewayStatus, InquiryResponse, PaymentGateway, PaymentRedirect, PaymentRequest,
    RedirectParams,
};
pub use faspay::{FaspayClient, FaspayConfig, inquiry_signature, payment_signature};

// Reconciliation exports
pub use reconcile::{ReconcileOutcome, ReconcileSource, Reconciler};

// Audit exports
pub use audit::{BillingAuditEvent, BillingAuditLogger, NoOpAuditLogger, TracingAuditLogger};

// Error exports
pub use error::{BillingError, BillingResult};
