use chrono::{Datelike, Duration, NaiveDate};

// Business days are Monday..=Friday. No exchange holiday calendar is applied.

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut cur = date + Duration::days(1);
    while is_weekend(cur) {
        cur = cur + Duration::days(1);
    }
    cur
}

/// The `n` business days strictly after `date`.
pub fn business_days_after(date: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut cur = date;
    for _ in 0..n {
        cur = next_business_day(cur);
        out.push(cur);
    }
    out
}

/// Historical dates followed by `periods` future business days.
pub fn extend_index(history: &[NaiveDate], periods: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(history.len() + periods);
    out.extend_from_slice(history);
    if let Some(last) = history.last() {
        out.extend(business_days_after(*last, periods));
    }
    out
}
