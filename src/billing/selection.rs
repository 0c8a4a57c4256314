//! The donor's in-progress choice of months to pay.
//!
//! [`Selection`] is a plain value owned by the caller. Every transition
//! returns a new selection and leaves the old one untouched, so a UI can
//! keep it in component state and the server can rebuild it from a
//! submitted list of months.

use std::collections::BTreeSet;

use serde::Serialize;

use super::eligibility::BillingCalendar;
use super::error::{BillingError, BillingResult};
use super::period::Period;

/// Ordered set of selected months for one subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selection {
    periods: BTreeSet<Period>,
}

impl Selection {
    /// An empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a selection from months submitted by a client.
    ///
    /// Months are added in ascending order, each one checked against the
    /// calendar as if the donor had clicked it.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Sequencing`] for the first month that could
    /// not have been selected (already paid, before the start, or leaving a
    /// gap).
    pub fn from_periods(
        periods: impl IntoIterator<Item = Period>,
        calendar: &BillingCalendar,
    ) -> BillingResult<Self> {
        let requested: BTreeSet<Period> = periods.into_iter().collect();
        let mut selection = Self::new();

        for period in requested {
            if !calendar.is_selectable(period, &selection) {
                return Err(BillingError::Sequencing {
                    period: period.to_string(),
                    message: rejection_reason(calendar, period).to_string(),
                });
            }
            selection.periods.insert(period);
        }

        Ok(selection)
    }

    #[must_use]
    pub fn contains(&self, period: Period) -> bool {
        self.periods.contains(&period)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Selected months in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Period> + '_ {
        self.periods.iter().copied()
    }

    /// Select or deselect one month.
    ///
    /// Deselecting also drops every later selected month, otherwise they
    /// would be left hanging after a gap. Selecting a month the calendar
    /// has disabled is a no-op.
    #[must_use]
    pub fn toggle(&self, period: Period, calendar: &BillingCalendar) -> Self {
        if self.contains(period) {
            return self.truncate_from(period);
        }

        if !calendar.is_selectable(period, self) {
            return self.clone();
        }

        let mut next = self.clone();
        next.periods.insert(period);
        next
    }

    /// Select every unpaid month of `year`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Sequencing`] without changing anything when
    /// the first unpaid month of the year is still blocked by an unpaid
    /// month before it (typically in the previous year).
    pub fn select_all(&self, year: i32, calendar: &BillingCalendar) -> BillingResult<Self> {
        let candidates = calendar.unpaid_in_year(year);

        let Some(&first) = candidates.first() else {
            return Ok(self.clone());
        };

        if !self.contains(first) && !calendar.is_selectable(first, self) {
            return Err(BillingError::Sequencing {
                period: first.to_string(),
                message: "pay or select the earlier unpaid months first".to_string(),
            });
        }

        let mut next = self.clone();
        next.periods.extend(candidates);
        Ok(next)
    }

    /// Whether every unpaid month of `year` is already selected.
    #[must_use]
    pub fn is_year_selected(&self, year: i32, calendar: &BillingCalendar) -> bool {
        let candidates = calendar.unpaid_in_year(year);
        !candidates.is_empty() && candidates.iter().all(|p| self.contains(*p))
    }

    /// Undo a "select all": drop the first unpaid month of `year` and
    /// everything selected after it.
    #[must_use]
    pub fn deselect_year(&self, year: i32, calendar: &BillingCalendar) -> Self {
        match calendar.unpaid_in_year(year).first() {
            Some(&first) => self.truncate_from(first),
            None => self.clone(),
        }
    }

    /// An empty selection.
    #[must_use]
    pub fn clear(&self) -> Self {
        Self::new()
    }

    /// Total due for the selection at `monthly_amount` per month.
    #[must_use]
    pub fn total(&self, monthly_amount: i64) -> i64 {
        (self.periods.len() as i64).saturating_mul(monthly_amount)
    }

    fn truncate_from(&self, period: Period) -> Self {
        Self {
            periods: self.periods.iter().copied().filter(|p| *p < period).collect(),
        }
    }
}

fn rejection_reason(calendar: &BillingCalendar, period: Period) -> &'static str {
    if calendar.is_before_start(period) {
        "month is before the subscription started"
    } else if calendar.is_paid(period) {
        "month is already paid"
    } else {
        "earlier months must be paid or selected first"
    }
}
