//! Reserved `@` identifiers bound to the current UTC time.
//!
//! | macro | value |
//! |---|---|
//! | `@now` | `YYYY-MM-DD HH:MM:SS.mmmZ` |
//! | `@second` `@minute` `@hour` `@day` `@month` `@year` | number |
//! | `@weekday` | number, 0 (Sunday) to 6 |
//! | `@todayStart` `@todayEnd` | datetime text |
//! | `@monthStart` `@monthEnd` | datetime text |
//! | `@yearStart` `@yearEnd` | datetime text |

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use sea_orm::Value;

use super::resolver::ResolverResult;
use crate::sql::{Params, param_name};

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

pub const MACRO_NAMES: [&str; 14] = [
    "@now",
    "@second",
    "@minute",
    "@hour",
    "@day",
    "@month",
    "@year",
    "@weekday",
    "@todayStart",
    "@todayEnd",
    "@monthStart",
    "@monthEnd",
    "@yearStart",
    "@yearEnd",
];

/// Resolve a macro against the current time; `None` for any other name.
#[must_use]
pub fn resolve_macro(name: &str) -> Option<ResolverResult> {
    resolve_macro_at(name, Utc::now())
}

/// Resolve a macro against a fixed `now`.
#[must_use]
pub fn resolve_macro_at(name: &str, now: DateTime<Utc>) -> Option<ResolverResult> {
    let value = match name {
        "@now" => format_datetime(now.naive_utc()),
        "@second" => Value::from(i64::from(now.second())),
        "@minute" => Value::from(i64::from(now.minute())),
        "@hour" => Value::from(i64::from(now.hour())),
        "@day" => Value::from(i64::from(now.day())),
        "@month" => Value::from(i64::from(now.month())),
        "@year" => Value::from(i64::from(now.year())),
        "@weekday" => Value::from(i64::from(now.weekday().num_days_from_sunday())),
        "@todayStart" => format_datetime(now.date_naive().and_time(NaiveTime::MIN)),
        "@todayEnd" => format_datetime(now.date_naive().and_time(end_of_day()?)),
        "@monthStart" => format_datetime(month_start(now)?.and_time(NaiveTime::MIN)),
        "@monthEnd" => {
            let last = month_start(now)?.checked_add_months(Months::new(1))?.pred_opt()?;
            format_datetime(last.and_time(end_of_day()?))
        }
        "@yearStart" => format_datetime(NaiveDate::from_ymd_opt(now.year(), 1, 1)?.and_time(NaiveTime::MIN)),
        "@yearEnd" => format_datetime(NaiveDate::from_ymd_opt(now.year(), 12, 31)?.and_time(end_of_day()?)),
        _ => return None,
    };

    let name = param_name();
    let identifier = format!("{{:{name}}}");
    let mut params = Params::new();
    params.insert(name, value);

    Some(ResolverResult::with_params(identifier, params))
}

fn format_datetime(datetime: NaiveDateTime) -> Value {
    Value::from(datetime.format(DATETIME_FORMAT).to_string())
}

fn end_of_day() -> Option<NaiveTime> {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
}

fn month_start(now: DateTime<Utc>) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
}
