//! Testing utilities for applications built on `kakasaku`.
//!
//! - [`MockGateway`]: a scriptable [`PaymentGateway`](crate::billing::PaymentGateway)
//! - [`RecordingAuditLogger`]: captures audit events for assertions
//! - [`fixtures`]: subscriptions, bills and payment records from `"M-YYYY"` strings
//!
//! # Example
//!
//! ```rust,ignore
//! use kakasaku::billing::{InMemoryBillingStore, Reconciler};
//! use kakasaku::testing::{MockGateway, fixtures};
//!
//! #[tokio::test]
//! async fn settles_bill() {
//!     let store = InMemoryBillingStore::new();
//!     store.insert_payment(&fixtures::pending_record("KKSK-1", "sub_1", &["3-2026"], 50_000)).await?;
//!
//!     let gateway = MockGateway::new();
//!     gateway.set_status("KKSK-1", "2");
//!
//!     let reconciler = Reconciler::new(store, gateway);
//!     reconciler.refresh("KKSK-1").await?;
//! }
//! ```

pub mod fixtures;
mod mock;

pub use mock::{MockGateway, RecordingAuditLogger};
