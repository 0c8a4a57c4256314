use std::sync::Arc;

use crate::billing::{
    BillingAuditLogger, BillingStore, CheckoutManager, PaymentGateway, Reconciler,
    SubscriptionManager, TracingAuditLogger,
};
use crate::config::BillingConfig;

/// Shared handler state.
///
/// Managers sit behind `Arc`, so cloning the state per request is cheap and
/// the reconciler's inquiry tickets are shared by every request.
pub struct AppState<S: BillingStore, G: PaymentGateway> {
    pub store: S,
    pub subscriptions: Arc<SubscriptionManager<S>>,
    pub checkout: Arc<CheckoutManager<S, G>>,
    pub reconciler: Arc<Reconciler<S, G>>,
}

impl<S, G> AppState<S, G>
where
    S: BillingStore + Clone,
    G: PaymentGateway + Clone,
{
    /// Build the managers over one store and gateway, auditing through
    /// `tracing`.
    pub fn new(store: S, gateway: G, billing: &BillingConfig) -> Self {
        Self::with_audit_logger(store, gateway, billing, Arc::new(TracingAuditLogger))
    }

    pub fn with_audit_logger(
        store: S,
        gateway: G,
        billing: &BillingConfig,
        audit: Arc<dyn BillingAuditLogger>,
    ) -> Self {
        let subscriptions =
            SubscriptionManager::new(store.clone()).with_audit_logger(audit.clone());
        let checkout = CheckoutManager::new(store.clone(), gateway.clone(), billing.checkout())
            .with_audit_logger(audit.clone());
        let reconciler = Reconciler::new(store.clone(), gateway)
            .trust_redirect_hint(billing.trust_redirect_hint)
            .with_audit_logger(audit);

        Self {
            store,
            subscriptions: Arc::new(subscriptions),
            checkout: Arc::new(checkout),
            reconciler: Arc::new(reconciler),
        }
    }
}

impl<S: BillingStore + Clone, G: PaymentGateway> Clone for AppState<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            subscriptions: self.subscriptions.clone(),
            checkout: self.checkout.clone(),
            reconciler: self.reconciler.clone(),
        }
    }
}
