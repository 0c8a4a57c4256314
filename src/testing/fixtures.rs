//! Builders for subscriptions, bills and payment records used in tests.
//!
//! Months are written as `"M-YYYY"` strings; these helpers panic on
//! malformed input since they are only meant for test code.

use chrono::{NaiveDate, Utc};

use crate::billing::{
    BillRequest, Customer, Package, PaymentRecord, Period, Subscription, SubscriptionStatus,
    bill_reference,
};

/// Parse `"M-YYYY"`, panicking on bad input.
pub fn period(text: &str) -> Period {
    text.parse()
        .unwrap_or_else(|e| panic!("bad test period {text:?}: {e}"))
}

/// Parse a list of `"M-YYYY"` strings, sorted ascending.
pub fn periods(texts: &[&str]) -> Vec<Period> {
    let mut periods: Vec<Period> = texts.iter().map(|t| period(t)).collect();
    periods.sort();
    periods
}

/// First day of the month of `start`.
pub fn start_date(start: &str) -> NaiveDate {
    let start = period(start);
    NaiveDate::from_ymd_opt(start.year(), u32::from(start.month()), 1)
        .unwrap_or_else(|| panic!("no first day for {start}"))
}

/// An active subscription starting on the first day of `start`.
pub fn subscription(id: &str, donor_id: &str, monthly_amount: i64, start: &str) -> Subscription {
    Subscription {
        id: id.to_string(),
        donor_id: donor_id.to_string(),
        package_id: "pkg_test".to_string(),
        monthly_amount,
        start_date: start_date(start),
        status: SubscriptionStatus::Active,
        created_at: Utc::now(),
    }
}

/// A catalogue package.
pub fn package(monthly_amount: i64) -> Package {
    Package {
        id: format!("pkg_{monthly_amount}"),
        name: format!("Kakak Saku {monthly_amount}"),
        monthly_amount,
    }
}

/// Gateway customer details for a donor.
pub fn customer(donor_id: &str) -> Customer {
    Customer {
        id: donor_id.to_string(),
        name: format!("Donor {donor_id}"),
        email: format!("{donor_id}@example.com"),
    }
}

/// A composed bill for `donor_1` with a fixed bill number.
pub fn bill(bill_no: &str, subscription_id: &str, months: &[&str], monthly_amount: i64) -> BillRequest {
    let periods = periods(months);
    BillRequest {
        bill_no: bill_no.to_string(),
        subscription_id: subscription_id.to_string(),
        donor_id: "donor_1".to_string(),
        amount: periods.len() as i64 * monthly_amount,
        reference: bill_reference(&periods),
        periods,
    }
}

/// A pending payment record for [`bill`].
pub fn pending_record(
    bill_no: &str,
    subscription_id: &str,
    months: &[&str],
    monthly_amount: i64,
) -> PaymentRecord {
    PaymentRecord::pending(&bill(bill_no, subscription_id, months, monthly_amount), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_fixture() {
        let sub = subscription("sub_1", "donor_1", 50_000, "11-2025");
        assert_eq!(sub.start_date, NaiveDate::from_ymd_opt(2025, 11, 1).unwrap());
        assert_eq!(sub.start_period(), period("11-2025"));
    }

    #[test]
    fn test_bill_fixture_sorts_months() {
        let bill = bill("KKSK-1", "sub_1", &["1-2026", "12-2025"], 25_000);
        assert_eq!(bill.amount, 50_000);
        assert_eq!(bill.reference, "Pay 2 months (12-2025, 1-2026)");
        assert_eq!(bill.periods, periods(&["12-2025", "1-2026"]));
    }
}
