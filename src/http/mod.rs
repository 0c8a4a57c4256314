//! HTTP endpoints for Kakasaku billing.
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | `GET` | `/kakasaku/packages` | donation packages, cheapest first |
//! | `POST` | `/kakasaku/subscriptions` | subscribe a donor to a package |
//! | `POST` | `/kakasaku/bills` | bill the selected months, returns the payment link |
//! | `GET` | `/kakasaku/payments/{bill_no}` | stored payment record |
//! | `POST` | `/kakasaku/payments/{bill_no}/refresh` | ask the gateway again |
//! | `GET` | `/kakasaku/status` | gateway return URL, reconciles the bill |
//! | `GET` | `/kakasaku/subscriptions/{id}/calendar` | month grid with eligibility |
//! | `GET` | `/kakasaku/donors/{donor_id}/summary` | donor dashboard totals |
//! | `GET` | `/kakasaku/donors/{donor_id}/payments` | payment history, newest first |

pub mod handlers;
pub mod response;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};

use crate::billing::{BillingStore, PaymentGateway};

pub use handlers::{CalendarQuery, CalendarView, PaymentStatusView, SubscribeRequest};
pub use response::{ApiResponse, CreatedResponse, JsonResponse};
pub use state::AppState;

/// Build the Kakasaku router over shared state.
pub fn router<S, G>(state: AppState<S, G>) -> Router
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route("/kakasaku/packages", get(handlers::list_packages::<S, G>))
        .route(
            "/kakasaku/subscriptions",
            post(handlers::create_subscription::<S, G>),
        )
        .route("/kakasaku/bills", post(handlers::create_bill::<S, G>))
        .route("/kakasaku/status", get(handlers::redirect_status::<S, G>))
        .route("/kakasaku/payments/{bill_no}", get(handlers::get_payment::<S, G>))
        .route(
            "/kakasaku/payments/{bill_no}/refresh",
            post(handlers::refresh_payment::<S, G>),
        )
        .route(
            "/kakasaku/subscriptions/{id}/calendar",
            get(handlers::calendar::<S, G>),
        )
        .route(
            "/kakasaku/donors/{donor_id}/summary",
            get(handlers::donor_summary::<S, G>),
        )
        .route(
            "/kakasaku/donors/{donor_id}/payments",
            get(handlers::payment_history::<S, G>),
        )
        .with_state(state)
}
