//! Payment gateway abstraction.
//!
//! The billing flow talks to the gateway through [`PaymentGateway`] so the
//! managers can be driven by [`FaspayClient`](super::faspay::FaspayClient)
//! in production and by a mock in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{BillingError, BillingResult};
use super::payment::PaymentStatus;

/// Customer details sent along with a bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// A bill to be paid through the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    pub bill_no: String,
    /// Total, in rupiah.
    pub amount: i64,
    /// Shown to the payer.
    pub description: String,
    pub customer: Customer,
}

/// Where to send the payer after a bill was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRedirect {
    pub redirect_url: String,
    /// Gateway transaction ID, when the gateway assigns one up front.
    pub trx_id: Option<String>,
}

/// Result of a status inquiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryResponse {
    pub payment_status_code: String,
    /// Amount the gateway billed, when reported.
    pub bill_total: Option<i64>,
    pub trx_id: Option<String>,
}

impl InquiryResponse {
    #[must_use]
    pub fn status(&self) -> GatewayStatus {
        GatewayStatus::from_code(&self.payment_status_code)
    }
}

/// Payment status as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    /// `0`
    Unprocessed,
    /// `1`
    InProcess,
    /// `2`
    Success,
    /// `3`
    Failed,
    /// `4`
    Reversal,
    /// `5`
    NoBillsFound,
    /// `7`
    Expired,
    /// `8`
    Cancelled,
    /// `9`
    Unknown,
    /// Any code not listed above.
    Other(String),
}

impl GatewayStatus {
    /// Parse a gateway status code.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "0" => Self::Unprocessed,
            "1" => Self::InProcess,
            "2" => Self::Success,
            "3" => Self::Failed,
            "4" => Self::Reversal,
            "5" => Self::NoBillsFound,
            "7" => Self::Expired,
            "8" => Self::Cancelled,
            "9" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    /// Local status this gateway status maps to.
    ///
    /// Anything the gateway has not settled either way stays pending.
    #[must_use]
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            Self::Success => PaymentStatus::Success,
            Self::Failed | Self::Reversal | Self::Expired | Self::Cancelled => PaymentStatus::Failed,
            Self::Unprocessed
            | Self::InProcess
            | Self::NoBillsFound
            | Self::Unknown
            | Self::Other(_) => PaymentStatus::Pending,
        }
    }
}

/// Query parameters the gateway appends when sending the payer back.
///
/// Not authenticated; only a hint until confirmed by an inquiry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RedirectParams {
    pub trx_id: Option<String>,
    pub bill_no: Option<String>,
    pub bill_ref: Option<String>,
    pub status: Option<String>,
    pub bill_total: Option<String>,
}

impl RedirectParams {
    /// Read the parameters from a full return URL.
    pub fn from_return_url(return_url: &str) -> BillingResult<Self> {
        let url = url::Url::parse(return_url).map_err(|e| BillingError::InvalidRedirect {
            message: format!("unparseable return URL: {e}"),
        })?;

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "trx_id" => params.trx_id = value,
                "bill_no" => params.bill_no = value,
                "bill_ref" => params.bill_ref = value,
                "status" => params.status = value,
                "bill_total" => params.bill_total = value,
                _ => {}
            }
        }
        Ok(params)
    }

    /// The bill this redirect is about. `bill_no` wins over `bill_ref`.
    pub fn bill_no(&self) -> BillingResult<&str> {
        self.bill_no
            .as_deref()
            .or(self.bill_ref.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BillingError::InvalidRedirect {
                message: "missing bill_no".to_string(),
            })
    }

    /// Status hinted by the redirect. Absent means still pending.
    #[must_use]
    pub fn hinted_status(&self) -> PaymentStatus {
        self.status
            .as_deref()
            .map_or(PaymentStatus::Pending, |code| GatewayStatus::from_code(code).payment_status())
    }

    /// `bill_total` as a number, if present and numeric.
    #[must_use]
    pub fn bill_total(&self) -> Option<i64> {
        self.bill_total.as_deref().and_then(|s| s.trim().parse().ok())
    }
}

/// Operations the billing flow needs from a payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submit a bill and get the URL the payer should be sent to.
    ///
    /// A gateway-side rejection is a [`BillingError::GatewayRequest`].
    async fn request_payment(&self, request: &PaymentRequest) -> BillingResult<PaymentRedirect>;

    /// Ask the gateway for the current status of a bill.
    async fn inquire(&self, bill_no: &str, trx_id: Option<&str>) -> BillingResult<InquiryResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_codes() {
        assert_eq!(GatewayStatus::from_code("2").payment_status(), PaymentStatus::Success);
        for code in ["3", "4", "7", "8"] {
            assert_eq!(GatewayStatus::from_code(code).payment_status(), PaymentStatus::Failed, "code {code}");
        }
        for code in ["0", "1", "5", "9", "6", "42", ""] {
            assert_eq!(GatewayStatus::from_code(code).payment_status(), PaymentStatus::Pending, "code {code}");
        }
        assert_eq!(GatewayStatus::from_code(" 2 "), GatewayStatus::Success);
        assert_eq!(GatewayStatus::from_code("6"), GatewayStatus::Other("6".to_string()));
    }

    #[test]
    fn test_redirect_from_return_url() {
        let params = RedirectParams::from_return_url(
            "https://donasi.example/kakasaku/status?trx_id=T1&bill_no=KKSK-1&status=2&bill_total=100000",
        )
        .unwrap();

        assert_eq!(params.bill_no().unwrap(), "KKSK-1");
        assert_eq!(params.trx_id.as_deref(), Some("T1"));
        assert_eq!(params.hinted_status(), PaymentStatus::Success);
        assert_eq!(params.bill_total(), Some(100_000));
    }

    #[test]
    fn test_redirect_bill_ref_fallback() {
        let params = RedirectParams::from_return_url("https://donasi.example/status?bill_ref=KKSK-2&status=1").unwrap();
        assert_eq!(params.bill_no().unwrap(), "KKSK-2");
        assert_eq!(params.hinted_status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_redirect_missing_fields() {
        let params = RedirectParams::from_return_url("https://donasi.example/status").unwrap();
        assert!(matches!(params.bill_no(), Err(BillingError::InvalidRedirect { .. })));
        assert_eq!(params.hinted_status(), PaymentStatus::Pending);
        assert_eq!(params.bill_total(), None);

        assert!(RedirectParams::from_return_url("not a url").is_err());
    }
}
