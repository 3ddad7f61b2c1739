use chrono::{Duration, Local, Months, NaiveDate, NaiveDateTime, Timelike};

use crate::models::BudgetDuration;

/// Layout timestamps are written in. Lexicographic order of this layout is
/// chronological order, which the budget queries rely on.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time, truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare
/// `YYYY-MM-DD` (midnight).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// End of a budget period starting at `start`. Months are calendar months,
/// clamped to the last day of a shorter month (Jan 31 + 1 month = Feb 28/29).
pub fn period_end(start: NaiveDateTime, duration: BudgetDuration) -> Option<NaiveDateTime> {
    match duration {
        BudgetDuration::Day => start.checked_add_signed(Duration::days(1)),
        BudgetDuration::Week => start.checked_add_signed(Duration::weeks(1)),
        BudgetDuration::Month => start.checked_add_months(Months::new(1)),
    }
}
