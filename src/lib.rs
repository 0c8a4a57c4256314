//! Kakasaku - recurring-donor billing for Jakarta Mengabdi
//!
//! Donors subscribe to a monthly package and pay any run of consecutive
//! unpaid months in one Faspay bill. The crate covers the whole flow:
//!
//! - **Periods**: `M-YYYY` calendar months with ordering and arithmetic
//! - **Eligibility**: which months a donor may tick, given what is paid
//! - **Selection**: contiguous month sets with toggle and select-all
//! - **Bills**: bill numbers, amounts and the legacy reference string
//! - **Faspay**: signed payment links and status inquiries
//! - **Reconciliation**: idempotent, last-write-wins status settlement
//! - **HTTP**: axum endpoints for checkout, redirect landing and calendars
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kakasaku::{ConfigBuilder, server};
//!
//! #[tokio::main]
//! async fn main() -> kakasaku::Result<()> {
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     kakasaku::init_tracing_with_config(&config);
//!     server::serve(config).await
//! }
//! ```

pub mod billing;
pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod testing;
pub mod utils;

pub use billing::{
    BillRequest, BillingCalendar, BillingError, BillingResult, BillingStore, CheckoutManager,
    FaspayClient, FaspayConfig, InMemoryBillingStore, PaymentGateway, PaymentRecord,
    PaymentStatus, Period, Reconciler, Selection, SubscriptionManager,
};
pub use config::{BillingConfig, Config, ConfigBuilder, LoggingConfig, ServerConfig};
pub use error::{ErrorResponse, KakasakuError, Result};
pub use http::{ApiResponse, AppState, CreatedResponse, JsonResponse, router};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "kakasaku=debug")
/// - `KAKASAKU_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("KAKASAKU_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from [`LoggingConfig`]
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
