//! Built-in converters.
//!
//! Every converter takes the current value plus the positional arguments of its
//! chain link (`number:,:.` passes `[",", "."]`). Malformed input degrades to
//! [`Value::Null`], it never fails.

use super::ConvertContext;
use crate::value::Value;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

pub(crate) type BuiltinFn = fn(Value, &[String], &ConvertContext) -> Value;

/// Built-in converter names.
pub const NAMES: &[&str] = &[
    "default",
    "defaultNull",
    "trim",
    "upper",
    "lower",
    "bool",
    "number",
    "int",
    "date",
    "split",
    "json",
];

pub(crate) fn lookup(name: &str) -> Option<BuiltinFn> {
    let converter: BuiltinFn = match name {
        "default" => default,
        "defaultNull" => default_null,
        "trim" => trim,
        "upper" => upper,
        "lower" => lower,
        "bool" => boolean,
        "number" => number,
        "int" => int,
        "date" => date,
        "split" => split,
        "json" => json,
        _ => return None,
    };
    Some(converter)
}

/// Text seen by converters working on strings. Booleans follow the usual
/// scripting casts: `true` is `"1"`, `false` is empty.
fn text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null | Value::Bool(false) => Cow::Borrowed(""),
        Value::Bool(true) => Cow::Borrowed("1"),
        other => other.to_field_text().unwrap_or_default(),
    }
}

fn arg<'a>(args: &'a [String], i: usize) -> Option<&'a str> {
    args.get(i).map(String::as_str)
}

fn default(value: Value, args: &[String], _: &ConvertContext) -> Value {
    if value.is_blank() {
        return arg(args, 0).map_or(Value::Null, Value::from);
    }
    value
}

fn default_null(value: Value, _: &[String], ctx: &ConvertContext) -> Value {
    default(value, &[], ctx)
}

fn trim(value: Value, _: &[String], _: &ConvertContext) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other,
    }
}

fn upper(value: Value, _: &[String], _: &ConvertContext) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_uppercase()),
        other => other,
    }
}

fn lower(value: Value, _: &[String], _: &ConvertContext) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => other,
    }
}

fn boolean(value: Value, _: &[String], _: &ConvertContext) -> Value {
    let normalized = text(&value).trim().to_lowercase();
    Value::Bool(!matches!(normalized.as_str(), "false" | "0" | ""))
}

static DOT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?[0-9]*(\.[0-9]+)?$").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

/// Number patterns keyed by decimal separator, compiled on first use.
static SEPARATOR_NUMBERS: LazyLock<Mutex<HashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn number_pattern(decimal_separator: &str) -> Option<Regex> {
    let mut cache = SEPARATOR_NUMBERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = cache.get(decimal_separator) {
        return Some(re.clone());
    }
    let pattern = format!(r"^-?[0-9]*({}[0-9]+)?$", regex::escape(decimal_separator));
    let re = Regex::new(&pattern).ok()?;
    cache.insert(decimal_separator.to_string(), re.clone());
    Some(re)
}

/// Validates a decimal number, returning it with `.` as decimal separator.
fn parse_number(
    raw: &str,
    decimal_separator: &str,
    thousands_separator: Option<&str>,
) -> Option<String> {
    let mut value = raw.trim().to_string();
    if let Some(ts) = thousands_separator.filter(|ts| !ts.is_empty()) {
        value = value.replace(ts, "");
    }

    let matched = if decimal_separator == "." {
        DOT_NUMBER.is_match(&value)
    } else {
        number_pattern(decimal_separator).is_some_and(|re| re.is_match(&value))
    };
    if !matched {
        return None;
    }

    if decimal_separator != "." {
        value = value.replacen(decimal_separator, ".", 1);
    }
    Some(value)
}

fn number_args<'a>(args: &'a [String], ctx: &'a ConvertContext) -> (&'a str, Option<&'a str>) {
    let decimal = arg(args, 0)
        .filter(|ds| !ds.trim().is_empty())
        .unwrap_or(&ctx.decimal_separator);
    (decimal, arg(args, 1))
}

fn number(value: Value, args: &[String], ctx: &ConvertContext) -> Value {
    let (decimal, thousands) = number_args(args, ctx);
    parse_number(&text(&value), decimal, thousands).map_or(Value::Null, Value::String)
}

fn int(value: Value, args: &[String], ctx: &ConvertContext) -> Value {
    let (decimal, thousands) = number_args(args, ctx);
    match parse_number(&text(&value), decimal, thousands) {
        Some(n) if !n.contains('.') => Value::String(n),
        _ => Value::Null,
    }
}

/// Zone used for values which carry no offset of their own.
enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

impl Zone {
    fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("utc") || name.eq_ignore_ascii_case("z") {
            return Some(Zone::Fixed(Utc.fix()));
        }
        if let Ok(offset) = name.parse::<FixedOffset>() {
            return Some(Zone::Fixed(offset));
        }
        name.parse::<Tz>().ok().map(Zone::Named)
    }

    fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            Zone::Fixed(offset) => offset.from_local_datetime(naive).earliest(),
            Zone::Named(tz) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.fixed_offset()),
        }
    }
}

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%b %d, %Y",
];

/// Parses a free-form date-time. Values without offset are anchored to `zone`.
fn parse_date(raw: &str, zone: &Zone) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt);
    }
    if let Some(dt) = ZONED_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(s, f).ok())
    {
        return Some(dt);
    }
    if let Some(secs) = s.strip_prefix('@').and_then(|t| t.parse::<i64>().ok()) {
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.fixed_offset());
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    zone.localize(&naive)
}

fn date(value: Value, args: &[String], _: &ConvertContext) -> Value {
    if value.is_blank() {
        return Value::Null;
    }
    // `date:+02:00` arrives split at the colon
    let tz = args.join(":");
    let zone = match Some(tz.as_str()).filter(|tz| !tz.trim().is_empty()) {
        Some(name) => match Zone::parse(name) {
            Some(zone) => zone,
            None => {
                tracing::debug!(timezone = name, "unknown timezone, date resolves to null");
                return Value::Null;
            }
        },
        None => Zone::Fixed(Utc.fix()),
    };
    parse_date(&text(&value), &zone).map_or(Value::Null, Value::Date)
}

fn split(value: Value, args: &[String], _: &ConvertContext) -> Value {
    if value.is_blank() {
        return Value::Null;
    }
    let delimiter = arg(args, 0).filter(|d| !d.is_empty()).unwrap_or("|");
    Value::List(text(&value).split(delimiter).map(Value::from).collect())
}

fn json(value: Value, args: &[String], _: &ConvertContext) -> Value {
    if value.is_blank() {
        return Value::Null;
    }
    let keep_objects = arg(args, 0) == Some("object");
    match serde_json::from_str::<serde_json::Value>(&text(&value)) {
        Ok(parsed) => Value::from_json(parsed, keep_objects),
        Err(e) => {
            tracing::debug!(error = %e, "malformed JSON resolves to null");
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn utc() -> Zone {
        Zone::Fixed(Utc.fix())
    }

    #[test]
    fn test_lookup() {
        for name in NAMES {
            assert!(lookup(name).is_some(), "{name}");
        }
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("  45.8 ", ".", None).as_deref(), Some("45.8"));
        assert_eq!(parse_number("-1.789", ".", None).as_deref(), Some("-1.789"));
        assert_eq!(parse_number(".0", ".", None).as_deref(), Some(".0"));
        assert_eq!(parse_number("cd", ".", None), None);
        assert_eq!(parse_number("1.", ".", None), None);
        assert_eq!(parse_number("1.234,5", ",", Some(".")).as_deref(), Some("1234.5"));
        assert_eq!(parse_number("1,5", ".", None), None);
    }

    #[test]
    fn test_number_pattern_cached_per_separator() {
        let first = number_pattern(";").unwrap();
        let second = number_pattern(";").unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert!(SEPARATOR_NUMBERS.lock().unwrap().contains_key(";"));
        assert_eq!(parse_number("4;5", ";", None).as_deref(), Some("4.5"));
        assert_eq!(parse_number("4;5;6", ";", None), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let dt = parse_date("2019-08-24 11:44:01", &utc()).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2019, 8, 24));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (11, 44, 1));

        let dt = parse_date("2019-08-24", &utc()).unwrap();
        assert_eq!((dt.hour(), dt.minute()), (0, 0));

        let dt = parse_date("2019-08-24T11:44:01+02:00", &utc()).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 7200);

        assert!(parse_date("xasdas", &utc()).is_none());
    }

    #[test]
    fn test_parse_date_zone() {
        let zone = Zone::parse("Europe/Berlin").unwrap();
        let dt = parse_date("2019-08-24 11:44:01", &zone).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 7200);

        let zone = Zone::parse("-05:00").unwrap();
        let dt = parse_date("2019-01-01", &zone).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -5 * 3600);

        assert!(Zone::parse("Mars/Olympus").is_none());
    }
}
