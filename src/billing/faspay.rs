//! Faspay payment gateway client.
//!
//! Bills are posted once; a failed bill request is surfaced to the donor
//! instead of being retried, so a second bill is never created behind
//! their back. Status inquiries are read-only and retry transient
//! failures with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use md5::Md5;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use sha1::{Digest, Sha1};

use super::error::{BillingError, BillingResult};
use super::gateway::{InquiryResponse, PaymentGateway, PaymentRedirect, PaymentRequest};

const LOG_TARGET: &str = "kakasaku::billing::faspay";

/// Faspay sandbox endpoint for bill requests.
pub const SANDBOX_PAYMENT_URL: &str = "https://xpress-sandbox.faspay.co.id/v4/post";

/// Configuration for [`FaspayClient`].
#[derive(Debug, Clone)]
pub struct FaspayConfig {
    pub user_id: String,
    pub password: SecretString,
    pub merchant_id: String,
    /// Shown on the Faspay payment page.
    pub merchant_name: String,
    pub payment_url: String,
    pub inquiry_url: String,
    /// Where Faspay sends the payer back to.
    pub return_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Maximum retry attempts for inquiries.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for FaspayConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            password: SecretString::from(String::new()),
            merchant_id: String::new(),
            merchant_name: "Jakarta Mengabdi".to_string(),
            payment_url: SANDBOX_PAYMENT_URL.to_string(),
            inquiry_url: String::new(),
            return_url: String::new(),
            timeout_seconds: 30,
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl FaspayConfig {
    /// Create a config with the merchant credentials.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        password: impl Into<String>,
        merchant_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            password: SecretString::from(password.into()),
            merchant_id: merchant_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn merchant_name(mut self, name: impl Into<String>) -> Self {
        self.merchant_name = name.into();
        self
    }

    #[must_use]
    pub fn payment_url(mut self, url: impl Into<String>) -> Self {
        self.payment_url = url.into();
        self
    }

    #[must_use]
    pub fn inquiry_url(mut self, url: impl Into<String>) -> Self {
        self.inquiry_url = url.into();
        self
    }

    #[must_use]
    pub fn return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = url.into();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set maximum retry attempts for inquiries.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set base delay for exponential backoff.
    #[must_use]
    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Check that credentials and endpoints are present.
    pub fn validate(&self) -> BillingResult<()> {
        let missing = [
            ("user_id", self.user_id.is_empty()),
            ("password", self.password.expose_secret().is_empty()),
            ("merchant_id", self.merchant_id.is_empty()),
            ("payment_url", self.payment_url.is_empty()),
            ("inquiry_url", self.inquiry_url.is_empty()),
            ("return_url", self.return_url.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BillingError::Internal {
                message: format!("Faspay config is missing: {}", missing.join(", ")),
            })
        }
    }
}

// ============================================================================
// Signatures
// ============================================================================

fn sha1_of_md5(input: &str) -> String {
    let md5_hex = hex::encode(Md5::digest(input.as_bytes()));
    hex::encode(Sha1::digest(md5_hex.as_bytes()))
}

/// Signature for a bill request: `sha1(md5(user + password + bill_no + amount))`.
#[must_use]
pub fn payment_signature(user_id: &str, password: &str, bill_no: &str, amount: i64) -> String {
    sha1_of_md5(&format!("{user_id}{password}{bill_no}{amount}"))
}

/// Signature for a status inquiry: `sha1(md5(user + password + bill_no))`.
#[must_use]
pub fn inquiry_signature(user_id: &str, password: &str, bill_no: &str) -> String {
    sha1_of_md5(&format!("{user_id}{password}{bill_no}"))
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct BillPayload<'a> {
    merchant_id: &'a str,
    merchant_name: &'a str,
    bill_no: &'a str,
    bill_date: String,
    bill_total: i64,
    bill_desc: &'a str,
    cust_no: &'a str,
    cust_name: &'a str,
    email: &'a str,
    return_url: &'a str,
    signature: String,
}

#[derive(Debug, Serialize)]
struct InquiryPayload<'a> {
    merchant_id: &'a str,
    bill_no: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    trx_id: Option<&'a str>,
    signature: String,
}

/// Read a field that Faspay may send as a string or a number.
fn text_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract the payer redirect from a bill response.
///
/// The URL is read from `redirect_url`, then `payment_url`, then `url`.
fn parse_bill_response(body: &Value) -> BillingResult<PaymentRedirect> {
    let redirect_url = ["redirect_url", "payment_url", "url"]
        .iter()
        .find_map(|key| text_field(body, key));

    match redirect_url {
        Some(redirect_url) => Ok(PaymentRedirect {
            redirect_url,
            trx_id: text_field(body, "trx_id"),
        }),
        None => Err(BillingError::GatewayRequest {
            message: text_field(body, "response_desc")
                .unwrap_or_else(|| "gateway returned no redirect URL".to_string()),
            code: text_field(body, "response_code"),
            http_status: None,
        }),
    }
}

fn parse_inquiry_response(body: &Value) -> BillingResult<InquiryResponse> {
    let payment_status_code =
        text_field(body, "payment_status_code").ok_or_else(|| BillingError::GatewayRequest {
            message: text_field(body, "response_desc")
                .unwrap_or_else(|| "inquiry response has no payment_status_code".to_string()),
            code: text_field(body, "response_code"),
            http_status: None,
        })?;

    Ok(InquiryResponse {
        payment_status_code,
        bill_total: text_field(body, "bill_total").and_then(|s| s.parse().ok()),
        trx_id: text_field(body, "trx_id"),
    })
}

// ============================================================================
// Client
// ============================================================================

/// Faspay client.
///
/// The password is kept in a [`SecretString`] and never appears in debug
/// output.
#[derive(Clone)]
pub struct FaspayClient {
    http: reqwest::Client,
    config: FaspayConfig,
}

impl FaspayClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the HTTP
    /// client cannot be built.
    pub fn new(config: FaspayConfig) -> BillingResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("kakasaku/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BillingError::Internal {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, config })
    }

    /// Get the configured timeout duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    fn bill_payload<'a>(&'a self, request: &'a PaymentRequest) -> BillPayload<'a> {
        BillPayload {
            merchant_id: &self.config.merchant_id,
            merchant_name: &self.config.merchant_name,
            bill_no: &request.bill_no,
            bill_date: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            bill_total: request.amount,
            bill_desc: &request.description,
            cust_no: &request.customer.id,
            cust_name: &request.customer.name,
            email: &request.customer.email,
            return_url: &self.config.return_url,
            signature: payment_signature(
                &self.config.user_id,
                self.config.password.expose_secret(),
                &request.bill_no,
                request.amount,
            ),
        }
    }

    fn inquiry_payload<'a>(&'a self, bill_no: &'a str, trx_id: Option<&'a str>) -> InquiryPayload<'a> {
        InquiryPayload {
            merchant_id: &self.config.merchant_id,
            bill_no,
            trx_id,
            signature: inquiry_signature(
                &self.config.user_id,
                self.config.password.expose_secret(),
                bill_no,
            ),
        }
    }

    /// POST a JSON payload and read the JSON reply.
    async fn post_json<P: Serialize + Sync>(&self, url: &str, payload: &P) -> BillingResult<Value> {
        let send = async {
            let response = self
                .http
                .post(url)
                .json(payload)
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(BillingError::GatewayRequest {
                    message: format!("gateway responded with HTTP {}", status.as_u16()),
                    code: None,
                    http_status: Some(status.as_u16()),
                });
            }

            response.json::<Value>().await.map_err(|e| BillingError::GatewayRequest {
                message: format!("unreadable gateway response: {e}"),
                code: None,
                http_status: Some(status.as_u16()),
            })
        };

        match tokio::time::timeout(self.timeout(), send).await {
            Ok(result) => result,
            Err(_elapsed) => Err(BillingError::GatewayRequest {
                message: format!("request timed out after {} seconds", self.config.timeout_seconds),
                code: None,
                http_status: Some(408),
            }),
        }
    }
}

impl std::fmt::Debug for FaspayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaspayClient")
            .field("merchant_id", &self.config.merchant_id)
            .field("payment_url", &self.config.payment_url)
            .field("inquiry_url", &self.config.inquiry_url)
            .finish_non_exhaustive()
    }
}

fn map_transport_error(error: reqwest::Error) -> BillingError {
    let http_status = if error.is_timeout() {
        Some(408)
    } else {
        error.status().map(|s| s.as_u16())
    };
    BillingError::GatewayRequest {
        message: format!("gateway request failed: {error}"),
        code: None,
        http_status,
    }
}

/// Calculate backoff delay with exponential backoff and jitter.
fn calculate_backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2_u64.saturating_pow(attempt)).min(max_ms);

    // 0-25% jitter
    let jitter = if delay_ms > 0 {
        fastrand::u64(0..=delay_ms / 4)
    } else {
        0
    };
    Duration::from_millis(delay_ms.saturating_add(jitter))
}

#[async_trait]
impl PaymentGateway for FaspayClient {
    async fn request_payment(&self, request: &PaymentRequest) -> BillingResult<PaymentRedirect> {
        let payload = self.bill_payload(request);
        let body = self.post_json(&self.config.payment_url, &payload).await?;
        let redirect = parse_bill_response(&body)?;

        tracing::info!(
            target: LOG_TARGET,
            bill_no = %request.bill_no,
            amount = request.amount,
            trx_id = ?redirect.trx_id,
            "Faspay accepted bill"
        );
        Ok(redirect)
    }

    async fn inquire(&self, bill_no: &str, trx_id: Option<&str>) -> BillingResult<InquiryResponse> {
        let payload = self.inquiry_payload(bill_no, trx_id);
        let mut attempts = 0;

        loop {
            let result = self
                .post_json(&self.config.inquiry_url, &payload)
                .await
                .and_then(|body| parse_inquiry_response(&body));

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempts < self.config.max_retries => {
                    let delay = calculate_backoff_delay(
                        attempts,
                        self.config.base_delay_ms,
                        self.config.max_delay_ms,
                    );
                    tracing::warn!(
                        target: LOG_TARGET,
                        bill_no = bill_no,
                        attempt = attempts + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying Faspay inquiry after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempts += 1;
                }
                Err(e) => {
                    return Err(BillingError::Reconciliation {
                        bill_no: bill_no.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}
