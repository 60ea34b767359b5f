use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{config::DEFAULT_MAX_FIELD_CHARS, sanitize};

/// Report attributes that are persisted, in column order. Anything else in the payload is
/// ignored.
pub const FIELDS: [&str; 8] = [
    "blocked-uri",
    "disposition",
    "document-uri",
    "effective-directive",
    "original-policy",
    "referrer",
    "status-code",
    "violated-directive",
];

pub const ENVELOPE_KEY: &str = "csp-report";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d:%H:%M:%S UTC";

/// Why a request body was not accepted. Only ever logged; callers just see a 404.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("empty request body")]
    EmptyBody,
    #[error("body is not valid JSON")]
    InvalidJson,
    #[error("body decodes to an empty or falsy JSON value")]
    FalsyJson,
    #[error("missing or empty `csp-report` object")]
    MissingEnvelope,
    #[error("field `{field}` is {chars} chars (limit {limit})")]
    FieldTooLong {
        field: &'static str,
        chars: usize,
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ReportLimits {
    pub max_field_chars: usize,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            max_field_chars: DEFAULT_MAX_FIELD_CHARS,
        }
    }
}

/// How values are quoted when a row is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    /// Wrap in single quotes, nothing escaped. Matches logs written by earlier collectors.
    #[default]
    Legacy,
    /// Double embedded single quotes and fold CR/LF to spaces so a row is always one line.
    Doubled,
}

impl QuoteStyle {
    pub fn quote(self, value: &str) -> String {
        match self {
            QuoteStyle::Legacy => format!("'{value}'"),
            QuoteStyle::Doubled => {
                let escaped = value.replace('\'', "''").replace(['\r', '\n'], " ");
                format!("'{escaped}'")
            }
        }
    }
}

/// A validated, sanitized report: one value per entry of [`FIELDS`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    values: [String; 8],
}

impl Report {
    pub fn values(&self) -> &[String; 8] {
        &self.values
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        FIELDS
            .iter()
            .position(|f| *f == field)
            .map(|i| self.values[i].as_str())
    }

    /// Stamp the report with the moment it was accepted.
    pub fn into_row(self, accepted_at: DateTime<Utc>) -> ReportRow {
        ReportRow {
            timestamp: accepted_at.format(TIMESTAMP_FORMAT).to_string(),
            values: self.values,
        }
    }
}

/// One line of the report log, without its CRLF terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub timestamp: String,
    pub values: [String; 8],
}

impl ReportRow {
    pub fn to_line(&self, style: QuoteStyle) -> String {
        let mut line = style.quote(&self.timestamp);
        for v in &self.values {
            line.push(',');
            line.push_str(&style.quote(v));
        }
        line
    }
}

pub fn header_line(style: QuoteStyle) -> String {
    let mut line = style.quote("timestamp");
    for f in FIELDS {
        line.push(',');
        line.push_str(&style.quote(f));
    }
    line
}

/// Render any JSON value as the text that is length-checked and logged.
pub fn to_display_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => v.to_string(),
    }
}

fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(_) => false,
    }
}

/// Validate a raw request body and extract the allow-listed fields.
///
/// Every field is checked before anything is returned, so an oversized value anywhere
/// rejects the whole report.
pub fn parse_report(body: &[u8], limits: &ReportLimits) -> Result<Report, Rejection> {
    // A body of "0" was always treated as absent.
    if body.is_empty() || body == b"0" {
        return Err(Rejection::EmptyBody);
    }

    let parsed: Value = serde_json::from_slice(body).map_err(|_| Rejection::InvalidJson)?;
    if is_falsy(&parsed) {
        return Err(Rejection::FalsyJson);
    }

    let report = parsed
        .get(ENVELOPE_KEY)
        .and_then(Value::as_object)
        .filter(|obj| !obj.is_empty())
        .ok_or(Rejection::MissingEnvelope)?;

    let mut values: [String; 8] = Default::default();
    for (slot, field) in values.iter_mut().zip(FIELDS) {
        let raw = report.get(field).map(to_display_string).unwrap_or_default();
        let chars = raw.chars().count();
        if chars > limits.max_field_chars {
            return Err(Rejection::FieldTooLong {
                field,
                chars,
                limit: limits.max_field_chars,
            });
        }
        *slot = sanitize::sanitize(&raw);
    }

    Ok(Report { values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn display_string_rules() {
        assert_eq!(to_display_string(&json!(null)), "");
        assert_eq!(to_display_string(&json!(true)), "true");
        assert_eq!(to_display_string(&json!(200)), "200");
        assert_eq!(to_display_string(&json!(1.5)), "1.5");
        assert_eq!(to_display_string(&json!("x")), "x");
        assert_eq!(to_display_string(&json!([1, "a"])), r#"[1,"a"]"#);
        assert_eq!(to_display_string(&json!({"k": 1})), r#"{"k":1}"#);
    }

    #[test]
    fn timestamp_format() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let row = Report {
            values: Default::default(),
        }
        .into_row(at);
        assert_eq!(row.timestamp, "2024-01-01:12:00:00 UTC");
        assert!(row
            .to_line(QuoteStyle::Legacy)
            .starts_with("'2024-01-01:12:00:00 UTC',"));
    }

    #[test]
    fn doubled_style_escapes_quotes_and_newlines() {
        assert_eq!(
            QuoteStyle::Doubled.quote("default-src 'self'\r\nx"),
            "'default-src ''self''  x'"
        );
        assert_eq!(QuoteStyle::Legacy.quote("a'b"), "'a'b'");
    }

    #[test]
    fn header_lists_timestamp_then_fields() {
        assert_eq!(
            header_line(QuoteStyle::Legacy),
            "'timestamp','blocked-uri','disposition','document-uri','effective-directive',\
             'original-policy','referrer','status-code','violated-directive'"
        );
    }

    #[test]
    fn falsy_values() {
        for v in [json!(null), json!(false), json!(0), json!(""), json!("0"), json!([])] {
            assert!(is_falsy(&v), "{v}");
        }
        for v in [json!({}), json!([0]), json!("a"), json!(1)] {
            assert!(!is_falsy(&v), "{v}");
        }
    }
}
