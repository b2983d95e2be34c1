use super::{Action, HeaderCheck};
use crate::auth_results::AuthResults;
use crate::results::{ResultEntry, RESULT_SOURCE};
use crate::transaction::Transaction;
use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TRAILING_COMMENT: Regex = Regex::new(r"\s*\([^)]*\)\s*$").unwrap();
    static ref LEADING_WEEKDAY: Regex = Regex::new(r"^[A-Za-z]+\s*,\s*").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateVerdict {
    Ok,
    Future,
    Past,
    Unparsable,
}

pub struct InvalidDate {
    future_days: i64,
    past_days: i64,
    reject: bool,
}

impl InvalidDate {
    pub fn new(future_days: i64, past_days: i64, reject: bool) -> Self {
        Self {
            future_days,
            past_days,
            reject,
        }
    }

    /// Classifies a Date value against the tolerance windows around `now`.
    /// A window of zero or fewer days is disabled.
    pub fn classify(&self, value: &str, now: DateTime<Utc>) -> DateVerdict {
        let Some(date) = parse_date(value) else {
            return DateVerdict::Unparsable;
        };

        if let Some(bound) = window(self.future_days).and_then(|w| now.checked_add_signed(w)) {
            if date > bound {
                return DateVerdict::Future;
            }
        }
        if let Some(bound) = window(self.past_days).and_then(|w| now.checked_sub_signed(w)) {
            if date < bound {
                return DateVerdict::Past;
            }
        }
        DateVerdict::Ok
    }
}

/// Tolerance window in days. Non-positive or out-of-range values disable it.
fn window(days: i64) -> Option<Duration> {
    if days <= 0 {
        return None;
    }
    Duration::try_days(days)
}

/// RFC 5322 date, tolerating a trailing `(zone comment)`. The day name is
/// dropped so a wrong weekday cannot turn an out-of-window date unparsable.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = TRAILING_COMMENT.replace(value.trim(), "");
    let value = LEADING_WEEKDAY.replace(&value, "");
    DateTime::parse_from_rfc2822(&value)
        .or_else(|_| DateTime::parse_from_rfc3339(&value))
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

impl HeaderCheck for InvalidDate {
    fn run(&self, txn: &mut Transaction, _auth: &AuthResults) -> Action {
        let Some(value) = txn.headers.get_first("Date").map(str::to_string) else {
            return Action::Continue;
        };

        let (token, message) = match self.classify(&value, Utc::now()) {
            DateVerdict::Ok => {
                txn.results.add(RESULT_SOURCE, ResultEntry::pass("invalid_date"));
                return Action::Continue;
            }
            DateVerdict::Unparsable => {
                txn.results.add(
                    RESULT_SOURCE,
                    ResultEntry::fail("invalid_date(unparsable)").with_msg(value),
                );
                return Action::Continue;
            }
            DateVerdict::Future => (
                "invalid_date(future)",
                "The Date header is too far in the future",
            ),
            DateVerdict::Past => ("invalid_date(past)", "The Date header is too old"),
        };

        txn.results.add(RESULT_SOURCE, ResultEntry::fail(token));
        if !self.reject {
            return Action::Continue;
        }
        Action::reject(message)
    }

    fn name(&self) -> &'static str {
        "invalid_date"
    }
}
