//! Built-in primitive types and the coercions behind them.

use crate::core::registry::TypeRegistry;
use crate::domain::model::AttributeDescriptor;
use crate::domain::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Deserialized datetimes use this format when the attribute has none.
pub const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD";

pub fn install(registry: &mut TypeRegistry) {
    // Booleans
    registry
        .set_default_value("boolean", false)
        .add_serializer_validator("boolean", is_boolean)
        .add_serializer("boolean", parse_boolean)
        .add_deserializer_validator("boolean", is_boolean)
        .add_deserializer("boolean", parse_boolean);

    // Integers
    registry
        .set_default_value("integer", 0)
        .add_serializer_validator("integer", is_integer)
        .add_serializer("integer", parse_integer)
        .add_deserializer_validator("integer", is_integer)
        .add_deserializer("integer", parse_integer);

    // Floats
    registry
        .set_default_value("float", 0.0)
        .add_serializer_validator("float", is_number)
        .add_serializer("float", parse_float)
        .add_deserializer_validator("float", is_number)
        .add_deserializer("float", parse_float);

    // Strings
    registry
        .set_default_value("string", "")
        .add_serializer_validator("string", is_string)
        .add_serializer("string", to_string)
        .add_deserializer_validator("string", is_string);

    // Date/time
    registry
        .set_default_value("datetime", DateTime::<Utc>::UNIX_EPOCH)
        .add_serializer("datetime", to_datetime)
        .add_serializer_validator("datetime", is_datetime)
        .add_deserializer_validator("datetime", is_datetime)
        .add_deserializer("datetime", format_datetime);

    // Email
    registry
        .set_default_value("email", "")
        .add_serializer("email", to_string)
        .add_serializer_validator("email", is_email)
        .add_deserializer("email", to_string)
        .add_deserializer_validator("email", is_email);

    tracing::debug!("Installed {} built-in types", registry.type_names().len());
}

pub fn is_boolean(_value: &Value, _attr: &AttributeDescriptor) -> bool {
    true
}

pub fn parse_boolean(value: Value, _attr: &AttributeDescriptor) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(b),
        Value::String(s) => {
            let s = s.trim().to_lowercase();
            Value::Bool(!matches!(s.as_str(), "" | "false" | "0" | "no" | "off"))
        }
        Value::Integer(i) => Value::Bool(i != 0),
        Value::Float(f) => Value::Bool(f != 0.0 && !f.is_nan()),
        _ => Value::Bool(true),
    }
}

/// Numeric check: numbers, booleans, dates and numeric strings pass.
pub fn is_number(value: &Value, _attr: &AttributeDescriptor) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Integer(_) | Value::DateTime(_) => true,
        Value::Float(f) => !f.is_nan(),
        Value::String(s) => s.trim().parse::<f64>().is_ok_and(|f| !f.is_nan()),
        _ => false,
    }
}

/// Numeric check that also rejects values outside the `i64` range.
pub fn is_integer(value: &Value, attr: &AttributeDescriptor) -> bool {
    match value {
        Value::Integer(_) => true,
        other => is_number(other, attr) && numeric(other).is_none_or(fits_integer),
    }
}

// i64::MAX as f64 rounds up to 2^63, which is already out of range
fn fits_integer(f: f64) -> bool {
    f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::DateTime(dt) => Some(dt.timestamp_millis() as f64),
        _ => None,
    }
}

pub fn parse_integer(value: Value, _attr: &AttributeDescriptor) -> Value {
    match value {
        Value::Integer(i) => Value::Integer(i),
        Value::Null => Value::Null,
        other => match numeric(&other) {
            Some(f) if fits_integer(f) => Value::Integer(f.trunc() as i64),
            _ => other,
        },
    }
}

pub fn parse_float(value: Value, _attr: &AttributeDescriptor) -> Value {
    match value {
        Value::Null => Value::Null,
        other => match numeric(&other) {
            Some(f) => Value::Float(f),
            None => other,
        },
    }
}

pub fn is_string(value: &Value, _attr: &AttributeDescriptor) -> bool {
    matches!(value, Value::String(_) | Value::Null)
}

pub fn to_string(value: Value, _attr: &AttributeDescriptor) -> Value {
    match value {
        Value::String(s) => Value::String(s),
        Value::Null => Value::Null,
        other => Value::String(other.to_display_string()),
    }
}

/// Translates moment-style tokens (`YYYY-MM-DD HH:mm:ss`) into a chrono format.
/// Formats that already contain `%` are taken as chrono formats.
pub fn chrono_format(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }

    const TOKENS: &[(&str, &str)] = &[
        ("YYYY", "%Y"),
        ("SSS", "%3f"),
        ("YY", "%y"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("ZZ", "%z"),
        ("Z", "%:z"),
        ("A", "%p"),
    ];

    let mut out = String::with_capacity(format.len() + 8);
    let mut rest = format;
    'outer: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

fn parse_with_format(text: &str, format: &str) -> Option<DateTime<Utc>> {
    let format = chrono_format(format);

    if let Ok(dt) = DateTime::parse_from_str(text, &format) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, &format) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, &format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_free_form(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d"]
        .iter()
        .find_map(|format| parse_with_format(text, format))
}

/// Parses a datetime-ish value. A string is tried against the attribute's
/// format first and then against common ISO forms. Numbers are epoch millis.
pub fn coerce_datetime(value: &Value, format: Option<&str>) -> Option<DateTime<Utc>> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Integer(millis) => DateTime::from_timestamp_millis(*millis),
        Value::Float(millis) if millis.is_finite() => DateTime::from_timestamp_millis(*millis as i64),
        Value::String(text) => {
            let text = text.trim();
            format
                .and_then(|f| parse_with_format(text, f))
                .or_else(|| parse_free_form(text))
        }
        _ => None,
    }
}

pub fn is_datetime(value: &Value, attr: &AttributeDescriptor) -> bool {
    coerce_datetime(value, attr.format.as_deref()).is_some()
}

pub fn to_datetime(value: Value, attr: &AttributeDescriptor) -> Value {
    match coerce_datetime(&value, attr.format.as_deref()) {
        Some(dt) => Value::DateTime(dt),
        None => value,
    }
}

pub fn format_datetime(value: Value, attr: &AttributeDescriptor) -> Value {
    let format = attr.format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
    match coerce_datetime(&value, attr.format.as_deref()) {
        Some(dt) => Value::String(dt.format(&chrono_format(format)).to_string()),
        None => value,
    }
}

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let local = r#"(?:[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*|"(?:[^"\\\r\n]|\\.)*")"#;
    let domain = r#"(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*|\[[^\[\]\\\r\n]*\])"#;
    let addr = format!("{local}@{domain}");
    Regex::new(&format!(r#"^\s*(?:{addr}|[^<>@"]*<\s*{addr}\s*>)\s*$"#))
        .expect("email pattern is a valid regex")
});

/// Blank strings are accepted so an unset address is not an invalid one.
pub fn is_email(value: &Value, _attr: &AttributeDescriptor) -> bool {
    match value {
        Value::String(s) => s.trim().is_empty() || EMAIL_PATTERN.is_match(s),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    fn attr(type_name: &str) -> AttributeDescriptor {
        AttributeDescriptor::primitive(type_name)
    }

    #[test]
    fn test_is_number() {
        let a = attr("integer");
        assert!(is_number(&Value::from(3), &a));
        assert!(is_number(&Value::from(" 42 "), &a));
        assert!(is_number(&Value::from("4.5"), &a));
        assert!(!is_number(&Value::from("abc"), &a));
        assert!(!is_number(&Value::Float(f64::NAN), &a));
        assert!(!is_number(&Value::array(vec![]), &a));
    }

    #[test]
    fn test_integer_range() {
        let a = attr("integer");
        assert!(is_integer(&Value::from("9007199254740993"), &a));
        assert!(is_integer(&Value::Integer(i64::MAX), &a));
        assert!(is_integer(&Value::Null, &a));
        assert!(!is_integer(&Value::from("1e300"), &a));
        assert!(!is_integer(&Value::Float(-1e19), &a));
        assert!(!is_integer(&Value::from("abc"), &a));
        assert!(is_number(&Value::from("1e300"), &a));

        assert_eq!(parse_integer(Value::from("1e300"), &a), Value::from("1e300"));
    }

    #[test]
    fn test_parse_integer_and_float() {
        let a = attr("integer");
        assert_eq!(parse_integer(Value::from("12.7"), &a), Value::Integer(12));
        assert_eq!(parse_integer(Value::Float(-3.9), &a), Value::Integer(-3));
        assert_eq!(parse_integer(Value::from(true), &a), Value::Integer(1));
        assert_eq!(parse_float(Value::from("2.5"), &a), Value::Float(2.5));
        assert_eq!(parse_float(Value::from(2), &a), Value::Float(2.0));
    }

    #[test]
    fn test_parse_boolean() {
        let a = attr("boolean");
        assert_eq!(parse_boolean(Value::from("true"), &a), Value::Bool(true));
        assert_eq!(parse_boolean(Value::from(" FALSE "), &a), Value::Bool(false));
        assert_eq!(parse_boolean(Value::from(0), &a), Value::Bool(false));
        assert_eq!(parse_boolean(Value::from(2), &a), Value::Bool(true));
    }

    #[test]
    fn test_to_string() {
        let a = attr("string");
        assert_eq!(to_string(Value::from(42), &a), Value::from("42"));
        assert_eq!(to_string(Value::from("x"), &a), Value::from("x"));
        assert!(is_string(&Value::Null, &a));
        assert!(!is_string(&Value::from(1), &a));
    }

    #[test]
    fn test_chrono_format_translation() {
        assert_eq!(chrono_format("YYYY-MM-DD HH:mm:ss"), "%Y-%m-%d %H:%M:%S");
        assert_eq!(chrono_format("DD/MM/YY"), "%d/%m/%y");
        assert_eq!(chrono_format("%Y"), "%Y");
    }

    #[test]
    fn test_datetime_with_format() {
        let a = attr("datetime").with_format("YYYY-MM-DD HH:mm:ss");
        let value = to_datetime(Value::from("2015-03-04 10:20:30"), &a);
        let dt = value.as_datetime().unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2015, 3, 4));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (10, 20, 30));

        assert_eq!(format_datetime(value, &a), Value::from("2015-03-04 10:20:30"));
    }

    #[test]
    fn test_datetime_without_format_uses_default_output() {
        let a = attr("datetime");
        let dt = Utc.with_ymd_and_hms(1815, 12, 10, 8, 0, 0).unwrap();
        assert!(is_datetime(&Value::from(dt), &a));
        assert_eq!(format_datetime(Value::from(dt), &a), Value::from("1815-12-10"));
        assert!(is_datetime(&Value::from("2024-01-15T10:30:00Z"), &a));
        assert!(!is_datetime(&Value::from("not a date"), &a));
    }

    #[test]
    fn test_email_validator() {
        let a = attr("email");
        assert!(is_email(&Value::from("ada@example.com"), &a));
        assert!(is_email(&Value::from("Ada Lovelace <ada@example.com>"), &a));
        assert!(is_email(&Value::from(""), &a));
        assert!(is_email(&Value::from("   "), &a));
        assert!(!is_email(&Value::from("not-an-email"), &a));
        assert!(!is_email(&Value::from(5), &a));
    }
}
