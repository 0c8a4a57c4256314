//! Kakasaku endpoint handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::response::{ApiResponse, CreatedResponse, JsonResponse};
use super::state::AppState;
use crate::billing::{
    BillingError, BillingStore, CheckoutRequest, CheckoutSession, DonorSummary, MonthSlot,
    Package, PaymentGateway, PaymentRecord, PaymentStatus, Period, ReconcileOutcome,
    RedirectParams, Selection, Subscription,
};
use crate::error::KakasakuError;

/// A payment's state after a reconciliation attempt.
#[derive(Debug, Serialize)]
pub struct PaymentStatusView {
    pub bill_no: String,
    pub status: PaymentStatus,
    pub reference: String,
    pub amount: i64,
    pub periods: Vec<Period>,
    pub reconcile: ReconcileOutcome,
}

impl PaymentStatusView {
    fn new(record: PaymentRecord, reconcile: ReconcileOutcome) -> Self {
        Self {
            periods: record.covered(),
            bill_no: record.bill_no,
            status: record.status,
            reference: record.bill_reference,
            amount: record.total_amount,
            reconcile,
        }
    }
}

/// Month grid for one year of a subscription.
#[derive(Debug, Serialize)]
pub struct CalendarView {
    pub subscription_id: String,
    pub year: i32,
    pub start: Period,
    pub next_due: Period,
    pub slots: Vec<MonthSlot>,
    pub selected: Vec<Period>,
    /// Every payable month of the year is selected; the control reads
    /// "unselect all".
    pub all_selected: bool,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    /// Comma separated `M-YYYY` months the donor has ticked.
    pub selected: Option<String>,
}

/// Body of `POST /kakasaku/subscriptions`.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub donor_id: String,
    pub package_id: String,
    /// Defaults to today (UTC).
    pub start_date: Option<NaiveDate>,
}

fn parse_period_list(text: &str) -> Result<Vec<Period>, BillingError> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

async fn load_payment<S: BillingStore>(store: &S, bill_no: &str) -> Result<PaymentRecord, KakasakuError> {
    store
        .get_payment(bill_no)
        .await?
        .ok_or_else(|| BillingError::PaymentNotFound { bill_no: bill_no.to_string() }.into())
}

/// `GET /kakasaku/packages`: cheapest first.
pub async fn list_packages<S, G>(State(state): State<AppState<S, G>>) -> JsonResponse<Vec<Package>>
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let packages = state.subscriptions.packages().await?;
    Ok(ApiResponse::success(packages))
}

/// `POST /kakasaku/subscriptions`
pub async fn create_subscription<S, G>(
    State(state): State<AppState<S, G>>,
    Json(request): Json<SubscribeRequest>,
) -> Result<CreatedResponse<Subscription>, KakasakuError>
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let start_date = request.start_date.unwrap_or_else(|| Utc::now().date_naive());
    let subscription = state
        .subscriptions
        .subscribe_to_package(&request.donor_id, &request.package_id, start_date)
        .await?;
    let location = format!("/kakasaku/subscriptions/{}/calendar", subscription.id);
    Ok(ApiResponse::created(subscription, location))
}

/// `POST /kakasaku/bills`
pub async fn create_bill<S, G>(
    State(state): State<AppState<S, G>>,
    Json(request): Json<CheckoutRequest>,
) -> Result<CreatedResponse<CheckoutSession>, KakasakuError>
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let session = state.checkout.create_bill(request).await?;
    let location = format!("/kakasaku/payments/{}", session.bill_no);
    Ok(ApiResponse::created(session, location))
}

/// `GET /kakasaku/payments/{bill_no}`
pub async fn get_payment<S, G>(
    State(state): State<AppState<S, G>>,
    Path(bill_no): Path<String>,
) -> JsonResponse<PaymentRecord>
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let record = load_payment(&state.store, &bill_no).await?;
    Ok(ApiResponse::success(record))
}

/// `GET /kakasaku/status`: where the gateway sends the payer back.
pub async fn redirect_status<S, G>(
    State(state): State<AppState<S, G>>,
    Query(params): Query<RedirectParams>,
) -> JsonResponse<PaymentStatusView>
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.reconciler.handle_redirect(&params).await?;
    let record = load_payment(&state.store, params.bill_no()?).await?;
    Ok(ApiResponse::success(PaymentStatusView::new(record, outcome)))
}

/// `POST /kakasaku/payments/{bill_no}/refresh`
pub async fn refresh_payment<S, G>(
    State(state): State<AppState<S, G>>,
    Path(bill_no): Path<String>,
) -> JsonResponse<PaymentStatusView>
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let outcome = state.reconciler.refresh(&bill_no).await?;
    let record = load_payment(&state.store, &bill_no).await?;
    Ok(ApiResponse::success(PaymentStatusView::new(record, outcome)))
}

/// `GET /kakasaku/subscriptions/{id}/calendar?year=&selected=`
pub async fn calendar<S, G>(
    State(state): State<AppState<S, G>>,
    Path(subscription_id): Path<String>,
    Query(query): Query<CalendarQuery>,
) -> JsonResponse<CalendarView>
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let subscription = state.subscriptions.get_subscription(&subscription_id).await?;
    let calendar = state.subscriptions.calendar(&subscription_id).await?;

    let requested = match query.selected.as_deref() {
        Some(text) => parse_period_list(text)?,
        None => Vec::new(),
    };
    let selection = Selection::from_periods(requested, &calendar)?;
    let next_due = calendar.first_unpaid();
    let year = query.year.unwrap_or_else(|| next_due.year());
    Period::new(1, year)?;

    Ok(ApiResponse::success(CalendarView {
        subscription_id: subscription.id,
        year,
        start: calendar.start(),
        next_due,
        slots: calendar.slots(year, &selection),
        all_selected: selection.is_year_selected(year, &calendar),
        total: selection.total(subscription.monthly_amount),
        selected: selection.iter().collect(),
    }))
}

/// `GET /kakasaku/donors/{donor_id}/summary`
pub async fn donor_summary<S, G>(
    State(state): State<AppState<S, G>>,
    Path(donor_id): Path<String>,
) -> JsonResponse<DonorSummary>
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let summary = state.subscriptions.summary(&donor_id).await?;
    Ok(ApiResponse::success(summary))
}

/// `GET /kakasaku/donors/{donor_id}/payments`: newest first.
pub async fn payment_history<S, G>(
    State(state): State<AppState<S, G>>,
    Path(donor_id): Path<String>,
) -> JsonResponse<Vec<PaymentRecord>>
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let payments = state.subscriptions.payment_history(&donor_id).await?;
    Ok(ApiResponse::success(payments))
}
