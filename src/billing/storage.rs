//! Storage traits for billing data.
//!
//! Implement [`BillingStore`] to persist subscriptions and payment records
//! in your database. [`InMemoryBillingStore`] is provided for development
//! and tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::error::{BillingError, BillingResult};
use super::payment::{PaymentRecord, PaymentStatus};
use super::period::Period;
use super::subscription::{Package, Subscription, SubscriptionStatus};

/// Trait for storing billing data.
#[async_trait]
pub trait BillingStore: Send + Sync {
    // Subscriptions

    /// Get a subscription by ID.
    async fn get_subscription(&self, subscription_id: &str) -> BillingResult<Option<Subscription>>;

    /// Get the donor's active subscription, if any.
    async fn find_active_subscription(&self, donor_id: &str) -> BillingResult<Option<Subscription>>;

    /// Insert or replace a subscription.
    async fn save_subscription(&self, subscription: &Subscription) -> BillingResult<()>;

    /// Insert a new active subscription unless the donor already has one.
    ///
    /// Must be atomic: fails with [`BillingError::SubscriptionExists`]
    /// without writing if an active subscription exists for the donor.
    ///
    /// - **PostgreSQL**: a partial unique index on `donor_id WHERE status = 'active'`
    async fn create_subscription(&self, subscription: &Subscription) -> BillingResult<()>;

    // Packages

    /// All packages, cheapest first.
    async fn list_packages(&self) -> BillingResult<Vec<Package>>;

    /// Get a package by ID.
    async fn get_package(&self, package_id: &str) -> BillingResult<Option<Package>>;

    /// Insert or replace a package.
    async fn save_package(&self, package: &Package) -> BillingResult<()>;

    // Payments

    /// Insert a new payment record.
    ///
    /// Fails with [`BillingError::DuplicateBill`] if the bill number exists.
    async fn insert_payment(&self, record: &PaymentRecord) -> BillingResult<()>;

    /// Get a payment record by bill number.
    async fn get_payment(&self, bill_no: &str) -> BillingResult<Option<PaymentRecord>>;

    /// All payment records of a subscription, oldest first.
    async fn list_payments(&self, subscription_id: &str) -> BillingResult<Vec<PaymentRecord>>;

    /// All payment records of a donor, newest first.
    async fn list_donor_payments(&self, donor_id: &str) -> BillingResult<Vec<PaymentRecord>>;

    /// Move a payment from `from` to `to`, recording the gateway transaction
    /// ID when given.
    ///
    /// Must be atomic: returns `Ok(false)` without writing if the record is
    /// no longer in state `from`. A move to `Success` must also fail with
    /// [`BillingError::PeriodConflict`] when another successful payment of
    /// the same subscription already covers any of the record's months,
    /// checked in the same atomic step as the write.
    ///
    /// - **PostgreSQL**: one transaction that locks the subscription row
    ///   (`SELECT ... FOR UPDATE`), checks the covered months of its
    ///   successful payments, then runs
    ///   `UPDATE ... SET status = $to WHERE bill_no = $1 AND status = $from`
    async fn transition_payment(
        &self,
        bill_no: &str,
        from: PaymentStatus,
        to: PaymentStatus,
        trx_id: Option<&str>,
    ) -> BillingResult<bool>;

    /// Months covered by the subscription's successful payments.
    async fn paid_periods(&self, subscription_id: &str) -> BillingResult<BTreeSet<Period>> {
        let payments = self.list_payments(subscription_id).await?;
        Ok(payments
            .iter()
            .filter(|p| p.is_success())
            .flat_map(PaymentRecord::covered)
            .collect())
    }
}

/// In-memory billing store.
///
/// Cheap to clone; clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryBillingStore {
    inner: Arc<InMemoryData>,
}

#[derive(Default)]
struct InMemoryData {
    packages: RwLock<HashMap<String, Package>>,
    subscriptions: RwLock<HashMap<String, Subscription>>,
    // Keyed by bill number.
    payments: RwLock<HashMap<String, PaymentRecord>>,
}

impl InMemoryBillingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payment records.
    pub async fn payment_count(&self) -> usize {
        self.inner.payments.read().await.len()
    }
}

impl std::fmt::Debug for InMemoryBillingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBillingStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn get_subscription(&self, subscription_id: &str) -> BillingResult<Option<Subscription>> {
        Ok(self.inner.subscriptions.read().await.get(subscription_id).cloned())
    }

    async fn find_active_subscription(&self, donor_id: &str) -> BillingResult<Option<Subscription>> {
        Ok(self
            .inner
            .subscriptions
            .read()
            .await
            .values()
            .find(|s| s.donor_id == donor_id && s.status == SubscriptionStatus::Active)
            .cloned())
    }

    async fn save_subscription(&self, subscription: &Subscription) -> BillingResult<()> {
        self.inner
            .subscriptions
            .write()
            .await
            .insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn create_subscription(&self, subscription: &Subscription) -> BillingResult<()> {
        let mut subscriptions = self.inner.subscriptions.write().await;
        if let Some(existing) = subscriptions
            .values()
            .find(|s| s.donor_id == subscription.donor_id && s.status == SubscriptionStatus::Active)
        {
            return Err(BillingError::SubscriptionExists {
                donor_id: subscription.donor_id.clone(),
                subscription_id: existing.id.clone(),
            });
        }
        subscriptions.insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn list_packages(&self) -> BillingResult<Vec<Package>> {
        let mut packages: Vec<Package> = self.inner.packages.read().await.values().cloned().collect();
        packages.sort_by(|a, b| a.monthly_amount.cmp(&b.monthly_amount).then_with(|| a.id.cmp(&b.id)));
        Ok(packages)
    }

    async fn get_package(&self, package_id: &str) -> BillingResult<Option<Package>> {
        Ok(self.inner.packages.read().await.get(package_id).cloned())
    }

    async fn save_package(&self, package: &Package) -> BillingResult<()> {
        self.inner
            .packages
            .write()
            .await
            .insert(package.id.clone(), package.clone());
        Ok(())
    }

    async fn insert_payment(&self, record: &PaymentRecord) -> BillingResult<()> {
        let mut payments = self.inner.payments.write().await;
        if payments.contains_key(&record.bill_no) {
            return Err(BillingError::DuplicateBill {
                bill_no: record.bill_no.clone(),
            });
        }
        payments.insert(record.bill_no.clone(), record.clone());
        Ok(())
    }

    async fn get_payment(&self, bill_no: &str) -> BillingResult<Option<PaymentRecord>> {
        Ok(self.inner.payments.read().await.get(bill_no).cloned())
    }

    async fn list_payments(&self, subscription_id: &str) -> BillingResult<Vec<PaymentRecord>> {
        let mut records: Vec<PaymentRecord> = self
            .inner
            .payments
            .read()
            .await
            .values()
            .filter(|p| p.subscription_id == subscription_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.bill_no.cmp(&b.bill_no)));
        Ok(records)
    }

    async fn list_donor_payments(&self, donor_id: &str) -> BillingResult<Vec<PaymentRecord>> {
        let mut records: Vec<PaymentRecord> = self
            .inner
            .payments
            .read()
            .await
            .values()
            .filter(|p| p.donor_id == donor_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.bill_no.cmp(&a.bill_no)));
        Ok(records)
    }

    async fn transition_payment(
        &self,
        bill_no: &str,
        from: PaymentStatus,
        to: PaymentStatus,
        trx_id: Option<&str>,
    ) -> BillingResult<bool> {
        let mut payments = self.inner.payments.write().await;
        let (subscription_id, covered) = match payments.get(bill_no) {
            Some(record) if record.status != from => return Ok(false),
            Some(record) => (record.subscription_id.clone(), record.covered()),
            None => {
                return Err(BillingError::PaymentNotFound {
                    bill_no: bill_no.to_string(),
                });
            }
        };

        if to == PaymentStatus::Success {
            let paid_elsewhere: BTreeSet<Period> = payments
                .values()
                .filter(|p| p.subscription_id == subscription_id && p.bill_no != bill_no)
                .filter(|p| p.is_success())
                .flat_map(PaymentRecord::covered)
                .collect();
            let overlap: Vec<String> = covered
                .iter()
                .filter(|p| paid_elsewhere.contains(*p))
                .map(Period::to_string)
                .collect();
            if !overlap.is_empty() {
                return Err(BillingError::PeriodConflict {
                    bill_no: bill_no.to_string(),
                    periods: overlap,
                });
            }
        }

        let Some(record) = payments.get_mut(bill_no) else {
            return Ok(false);
        };

        record.status = to;
        if let Some(trx_id) = trx_id {
            record.trx_id = Some(trx_id.to_string());
        }
        record.updated_at = Utc::now();
        Ok(true)
    }
}
