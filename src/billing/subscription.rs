//! Recurring donor subscriptions.
//!
//! A donor holds at most one active subscription. Its monthly amount is
//! copied from the package at sign-up and never changes afterwards; there
//! is deliberately no operation to update it.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::audit::{BillingAuditEvent, BillingAuditLogger, TracingAuditLogger};
use super::eligibility::BillingCalendar;
use super::error::{BillingError, BillingResult};
use super::payment::PaymentRecord;
use super::period::Period;
use super::storage::BillingStore;

/// Number of recent payments shown on the donor dashboard.
const RECENT_PAYMENTS: usize = 4;

/// Subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
}

impl SubscriptionStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// A donation package donors can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub name: String,
    /// Monthly contribution, in rupiah.
    pub monthly_amount: i64,
}

/// A donor's recurring monthly commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub donor_id: String,
    pub package_id: String,
    /// Monthly contribution, in rupiah. Fixed at sign-up.
    pub monthly_amount: i64,
    /// The month of this date is the first payable month.
    pub start_date: NaiveDate,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// First payable month.
    #[must_use]
    pub fn start_period(&self) -> Period {
        Period::from_date(self.start_date)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }
}

/// Totals shown on the donor dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonorSummary {
    pub donor_id: String,
    /// The donor's active subscription, if any.
    pub subscription: Option<Subscription>,
    /// Next month due on the active subscription.
    pub next_due: Option<Period>,
    /// Number of payment records, whatever their status.
    pub total_transactions: usize,
    /// Sum of successful payments, in rupiah.
    pub total_donated: i64,
    /// Latest payments, newest first.
    pub recent_payments: Vec<PaymentRecord>,
}

/// Subscription management operations.
pub struct SubscriptionManager<S: BillingStore> {
    store: S,
    audit: Arc<dyn BillingAuditLogger>,
}

impl<S: BillingStore> SubscriptionManager<S> {
    /// Create a new subscription manager that audits through `tracing`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            audit: Arc::new(TracingAuditLogger),
        }
    }

    /// Use a different audit logger.
    #[must_use]
    pub fn with_audit_logger(mut self, audit: Arc<dyn BillingAuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// Packages on offer, cheapest first.
    pub async fn packages(&self) -> BillingResult<Vec<Package>> {
        self.store.list_packages().await
    }

    /// Start a subscription to a stored package.
    ///
    /// # Errors
    ///
    /// - [`BillingError::PackageNotFound`] if the package does not exist
    /// - [`BillingError::SubscriptionExists`] if the donor already has an
    ///   active subscription
    pub async fn subscribe_to_package(
        &self,
        donor_id: &str,
        package_id: &str,
        start_date: NaiveDate,
    ) -> BillingResult<Subscription> {
        let package = self
            .store
            .get_package(package_id)
            .await?
            .ok_or_else(|| BillingError::PackageNotFound {
                package_id: package_id.to_string(),
            })?;
        self.subscribe(donor_id, &package, start_date).await
    }

    /// Start a subscription for a donor.
    ///
    /// The existence check and insert happen atomically in the store, so
    /// concurrent sign-ups for one donor leave a single active
    /// subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::SubscriptionExists`] if the donor already has
    /// an active subscription.
    pub async fn subscribe(
        &self,
        donor_id: &str,
        package: &Package,
        start_date: NaiveDate,
    ) -> BillingResult<Subscription> {
        let subscription = Subscription {
            id: uuid::Uuid::new_v4().to_string(),
            donor_id: donor_id.to_string(),
            package_id: package.id.clone(),
            monthly_amount: package.monthly_amount,
            start_date,
            status: SubscriptionStatus::Active,
            created_at: Utc::now(),
        };
        self.store.create_subscription(&subscription).await?;

        self.audit
            .log(BillingAuditEvent::SubscriptionCreated {
                donor_id: donor_id.to_string(),
                subscription_id: subscription.id.clone(),
                package_id: package.id.clone(),
                monthly_amount: package.monthly_amount,
            })
            .await;

        Ok(subscription)
    }

    /// Get a subscription by ID.
    pub async fn get_subscription(&self, subscription_id: &str) -> BillingResult<Subscription> {
        self.store
            .get_subscription(subscription_id)
            .await?
            .ok_or_else(|| BillingError::NoSubscription {
                subscription_id: subscription_id.to_string(),
            })
    }

    /// Get the donor's active subscription, if any.
    pub async fn active_subscription(&self, donor_id: &str) -> BillingResult<Option<Subscription>> {
        self.store.find_active_subscription(donor_id).await
    }

    /// Mark a subscription inactive. Paid history is kept.
    pub async fn deactivate(&self, subscription_id: &str) -> BillingResult<Subscription> {
        let mut subscription = self.get_subscription(subscription_id).await?;
        if subscription.status == SubscriptionStatus::Inactive {
            return Ok(subscription);
        }
        subscription.status = SubscriptionStatus::Inactive;
        self.store.save_subscription(&subscription).await?;
        Ok(subscription)
    }

    /// Current billing calendar: start month plus every paid month.
    pub async fn calendar(&self, subscription_id: &str) -> BillingResult<BillingCalendar> {
        let subscription = self.get_subscription(subscription_id).await?;
        let paid = self.store.paid_periods(subscription_id).await?;
        Ok(BillingCalendar::new(subscription.start_period(), paid))
    }

    /// Every payment a donor has made, newest first.
    pub async fn payment_history(&self, donor_id: &str) -> BillingResult<Vec<PaymentRecord>> {
        self.store.list_donor_payments(donor_id).await
    }

    /// Dashboard totals for a donor.
    pub async fn summary(&self, donor_id: &str) -> BillingResult<DonorSummary> {
        let payments = self.store.list_donor_payments(donor_id).await?;
        let subscription = self.store.find_active_subscription(donor_id).await?;

        let next_due = match &subscription {
            Some(sub) => Some(self.calendar(&sub.id).await?.first_unpaid()),
            None => None,
        };

        let total_donated = payments
            .iter()
            .filter(|p| p.is_success())
            .map(|p| p.total_amount)
            .sum();

        Ok(DonorSummary {
            donor_id: donor_id.to_string(),
            subscription,
            next_due,
            total_transactions: payments.len(),
            total_donated,
            recent_payments: payments.into_iter().take(RECENT_PAYMENTS).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::payment::PaymentStatus;
    use crate::billing::storage::InMemoryBillingStore;
    use crate::testing::fixtures;

    fn package() -> Package {
        Package {
            id: "pkg_50k".to_string(),
            name: "Kakak Saku 50K".to_string(),
            monthly_amount: 50_000,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_copies_package_amount() {
        let manager = SubscriptionManager::new(InMemoryBillingStore::new());
        let sub = manager.subscribe("donor_1", &package(), date(2026, 2, 14)).await.unwrap();

        assert_eq!(sub.monthly_amount, 50_000);
        assert_eq!(sub.start_period().to_string(), "2-2026");
        assert!(sub.is_active());

        let loaded = manager.get_subscription(&sub.id).await.unwrap();
        assert_eq!(loaded, sub);
    }

    #[tokio::test]
    async fn test_one_active_subscription_per_donor() {
        let manager = SubscriptionManager::new(InMemoryBillingStore::new());
        let first = manager.subscribe("donor_1", &package(), date(2026, 2, 1)).await.unwrap();

        let err = manager
            .subscribe("donor_1", &package(), date(2026, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::SubscriptionExists { ref subscription_id, .. } if *subscription_id == first.id));

        manager.deactivate(&first.id).await.unwrap();
        assert!(manager.active_subscription("donor_1").await.unwrap().is_none());
        assert!(manager.subscribe("donor_1", &package(), date(2026, 3, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_subscribes_leave_one_active() {
        let manager = Arc::new(SubscriptionManager::new(InMemoryBillingStore::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.subscribe("donor_1", &package(), date(2026, 2, 1)).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(matches!(e, BillingError::SubscriptionExists { .. })),
            }
        }
        assert_eq!(created, 1);
        assert!(manager.active_subscription("donor_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_subscribe_to_stored_package() {
        let store = InMemoryBillingStore::new();
        store.save_package(&fixtures::package(100_000)).await.unwrap();
        store.save_package(&fixtures::package(25_000)).await.unwrap();
        let manager = SubscriptionManager::new(store);

        let amounts: Vec<i64> = manager.packages().await.unwrap().iter().map(|p| p.monthly_amount).collect();
        assert_eq!(amounts, [25_000, 100_000]);

        let sub = manager
            .subscribe_to_package("donor_1", "pkg_100000", date(2026, 4, 2))
            .await
            .unwrap();
        assert_eq!(sub.monthly_amount, 100_000);
        assert_eq!(sub.package_id, "pkg_100000");

        let err = manager
            .subscribe_to_package("donor_2", "pkg_missing", date(2026, 4, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::PackageNotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_missing_subscription() {
        let manager = SubscriptionManager::new(InMemoryBillingStore::new());
        let err = manager.get_subscription("nope").await.unwrap_err();
        assert!(matches!(err, BillingError::NoSubscription { .. }));
    }

    #[tokio::test]
    async fn test_calendar_reflects_successful_payments() {
        let store = InMemoryBillingStore::new();
        let sub = fixtures::subscription("sub_1", "donor_1", 50_000, "2-2026");
        store.save_subscription(&sub).await.unwrap();
        store
            .insert_payment(&fixtures::pending_record("KKSK-1", "sub_1", &["2-2026", "3-2026"], 50_000))
            .await
            .unwrap();
        store
            .transition_payment("KKSK-1", PaymentStatus::Pending, PaymentStatus::Success, None)
            .await
            .unwrap();

        let manager = SubscriptionManager::new(store);
        let calendar = manager.calendar("sub_1").await.unwrap();
        assert_eq!(calendar.start().to_string(), "2-2026");
        assert_eq!(calendar.paid().len(), 2);
        assert_eq!(calendar.first_unpaid().to_string(), "4-2026");
    }

    #[tokio::test]
    async fn test_summary_totals() {
        let store = InMemoryBillingStore::new();
        let sub = fixtures::subscription("sub_1", "donor_1", 50_000, "2-2026");
        store.save_subscription(&sub).await.unwrap();

        for (bill_no, months) in [("KKSK-1", vec!["2-2026", "3-2026"]), ("KKSK-2", vec!["4-2026"])] {
            store
                .insert_payment(&fixtures::pending_record(bill_no, "sub_1", &months, 50_000))
                .await
                .unwrap();
        }
        store
            .transition_payment("KKSK-1", PaymentStatus::Pending, PaymentStatus::Success, None)
            .await
            .unwrap();

        let manager = SubscriptionManager::new(store);
        let summary = manager.summary("donor_1").await.unwrap();
        assert_eq!(summary.total_transactions, 2);
        assert_eq!(summary.total_donated, 100_000);
        assert_eq!(summary.next_due.map(|p| p.to_string()).as_deref(), Some("4-2026"));
        assert_eq!(summary.recent_payments.len(), 2);

        let history = manager.payment_history("donor_1").await.unwrap();
        assert_eq!(history.len(), 2);

        let empty = manager.summary("donor_2").await.unwrap();
        assert_eq!(empty.total_transactions, 0);
        assert!(empty.subscription.is_none());
        assert!(empty.next_due.is_none());
    }
}
