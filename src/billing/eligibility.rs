//! Which months a donor may select.
//!
//! Months are paid strictly in order: a month becomes selectable only once
//! the month before it is paid, selected, or falls before the subscription
//! started. Everything here is a pure function of its inputs; callers
//! recompute slots whenever the paid set or the selection changes.

use std::collections::BTreeSet;

use serde::Serialize;

use super::period::Period;
use super::selection::Selection;

/// Billing state of one subscription: where it starts and what is paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingCalendar {
    start: Period,
    paid: BTreeSet<Period>,
}

impl BillingCalendar {
    /// Create a calendar from the start month and the paid months.
    #[must_use]
    pub fn new(start: Period, paid: impl IntoIterator<Item = Period>) -> Self {
        Self {
            start,
            paid: paid.into_iter().collect(),
        }
    }

    /// First payable month.
    #[must_use]
    pub fn start(&self) -> Period {
        self.start
    }

    #[must_use]
    pub fn paid(&self) -> &BTreeSet<Period> {
        &self.paid
    }

    #[must_use]
    pub fn is_paid(&self, period: Period) -> bool {
        self.paid.contains(&period)
    }

    #[must_use]
    pub fn is_before_start(&self, period: Period) -> bool {
        period < self.start
    }

    /// Whether `period` can be added to `selection` right now.
    #[must_use]
    pub fn is_selectable(&self, period: Period, selection: &Selection) -> bool {
        if self.is_before_start(period) || self.is_paid(period) {
            return false;
        }
        let prev = period.prev();
        self.is_before_start(prev) || self.is_paid(prev) || selection.contains(prev)
    }

    /// Display state of a single month.
    #[must_use]
    pub fn slot(&self, period: Period, selection: &Selection) -> MonthSlot {
        MonthSlot {
            period,
            disabled: !self.is_selectable(period, selection),
            paid: self.is_paid(period),
            before_start: self.is_before_start(period),
        }
    }

    /// Display state of all twelve months of `year`.
    #[must_use]
    pub fn slots(&self, year: i32, selection: &Selection) -> Vec<MonthSlot> {
        Period::months_of(year)
            .into_iter()
            .map(|period| self.slot(period, selection))
            .collect()
    }

    /// Months of `year` that still need paying, in order.
    #[must_use]
    pub fn unpaid_in_year(&self, year: i32) -> Vec<Period> {
        Period::months_of(year)
            .into_iter()
            .filter(|p| !self.is_before_start(*p) && !self.is_paid(*p))
            .collect()
    }

    /// The donor's next due month: the earliest unpaid month from the start.
    #[must_use]
    pub fn first_unpaid(&self) -> Period {
        let mut period = self.start;
        while self.paid.contains(&period) {
            period = period.next();
        }
        period
    }

    /// Check the paid months form one run from the start month.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        is_contiguous_from(self.start, self.paid.iter().copied())
    }
}

/// True when `periods` are exactly `start, start+1, ..` with no gaps.
#[must_use]
pub fn is_contiguous_from(start: Period, periods: impl IntoIterator<Item = Period>) -> bool {
    let sorted: BTreeSet<Period> = periods.into_iter().collect();
    sorted
        .iter()
        .enumerate()
        .all(|(i, p)| p.ordinal() == start.ordinal() + i as i64)
}

/// One cell of the month grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthSlot {
    #[serde(rename = "id")]
    pub period: Period,
    /// Cannot be newly selected.
    pub disabled: bool,
    /// Already settled.
    pub paid: bool,
    /// Falls before the subscription started (rendered locked).
    pub before_start: bool,
}
