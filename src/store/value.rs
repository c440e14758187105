// ==========================================
// Talhão APEX - typed cell values
// ==========================================
// Value: one cell (Null / Integer / Real / Text / Date)
// ColumnType: declared semantic type of a column
// Affinity coercion mirrors SQLite so in-memory rows match stored rows
// Julian-day helpers back every date computation (age, mean dates)
// ==========================================

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Julian day number of 0001-01-01 00:00 minus one day (proleptic Gregorian)
const JD_CE_OFFSET: f64 = 1_721_424.5;

// ==========================================
// ColumnType
// ==========================================

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Date,
}

impl ColumnType {
    /// Declared SQL type used in CREATE/ALTER statements
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Date => "DATE",
        }
    }

    /// Map a declared SQL type back to a column type (SQLite affinity rules)
    pub fn from_declared(decl: &str) -> ColumnType {
        let d = decl.to_ascii_uppercase();
        if d.contains("INT") {
            ColumnType::Integer
        } else if d.contains("DATE") || d.contains("TIME") {
            ColumnType::Date
        } else if d.contains("CHAR") || d.contains("CLOB") || d.contains("TEXT") || d.is_empty() {
            ColumnType::Text
        } else {
            ColumnType::Real
        }
    }

    /// Coerce a value the way SQLite column affinity stores it
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Integer, Value::Real(f)) => real_to_integer(f),
            (ColumnType::Integer, Value::Text(s)) => match parse_numeric(&s) {
                Some(Value::Integer(i)) => Value::Integer(i),
                Some(Value::Real(f)) => real_to_integer(f),
                _ => Value::Text(s),
            },
            (ColumnType::Real, Value::Integer(i)) => Value::Real(i as f64),
            (ColumnType::Real, Value::Text(s)) => match parse_numeric(&s) {
                Some(Value::Integer(i)) => Value::Real(i as f64),
                Some(Value::Real(f)) => Value::Real(f),
                _ => Value::Text(s),
            },
            (ColumnType::Text, Value::Integer(i)) => Value::Text(i.to_string()),
            (ColumnType::Text, Value::Real(f)) => Value::Text(real_to_text(f)),
            (ColumnType::Date, Value::Text(s)) => match parse_datetime(&s) {
                Some(dt) if dt.time() == chrono::NaiveTime::MIN => Value::Date(dt.date()),
                _ => Value::Text(s),
            },
            (_, v) => v,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_type())
    }
}

fn real_to_integer(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::Integer(f as i64)
    } else {
        Value::Real(f)
    }
}

/// Render a real the way SQLite does for whole numbers (`1.0`, not `1`)
fn real_to_text(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1.0e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// Parse text as an integer or real (trimmed), SQLite-style
pub fn parse_numeric(s: &str) -> Option<Value> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(i) = t.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    match t.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(Value::Real(f)),
        _ => None,
    }
}

// ==========================================
// Date helpers
// ==========================================

/// Parse a date or date-time string
///
/// Accepts ISO dates with an optional time part and `dd/mm/yyyy`.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let t = s.trim();
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Some(d.and_time(chrono::NaiveTime::MIN));
        }
    }
    None
}

/// Julian day number of a date-time
pub fn julian_day(dt: &NaiveDateTime) -> f64 {
    let days = dt.date().num_days_from_ce() as f64;
    let secs = dt.time().num_seconds_from_midnight() as f64;
    days + JD_CE_OFFSET + secs / 86_400.0
}

/// Calendar date containing a julian day number
pub fn date_from_julian_day(jd: f64) -> Option<NaiveDate> {
    if !jd.is_finite() {
        return None;
    }
    let days = (jd + 0.5).floor() - (JD_CE_OFFSET + 0.5);
    NaiveDate::from_num_days_from_ce_opt(days as i32)
}

// ==========================================
// Value
// ==========================================

/// One cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view (numeric text included)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Text(s) => match parse_numeric(s) {
                Some(Value::Integer(i)) => Some(i as f64),
                Some(Value::Real(f)) => Some(f),
                _ => None,
            },
            _ => None,
        }
    }

    /// Integer view; reals are accepted only when whole
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            other => other
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64),
        }
    }

    /// Text view; numbers and dates are rendered
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(f) => Some(real_to_text(*f)),
            Value::Text(s) => Some(s.clone()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Date-time view (dates and parseable text)
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(d.and_time(chrono::NaiveTime::MIN)),
            Value::Text(s) => parse_datetime(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        self.as_datetime().map(|dt| dt.date())
    }

    pub fn julian_day(&self) -> Option<f64> {
        self.as_datetime().map(|dt| julian_day(&dt))
    }

    /// Placeholder values that legacy spreadsheets use for "missing"
    ///
    /// Null, the literal text `None`, empty text, and numeric zero.
    pub fn is_placeholder(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => {
                let t = s.trim();
                t.is_empty() || t == "None" || matches!(parse_numeric(t), Some(v) if v.as_f64() == Some(0.0))
            }
            Value::Integer(0) => true,
            Value::Real(f) => *f == 0.0,
            _ => false,
        }
    }

    /// Build a value from an operator-entered string
    ///
    /// Empty strings and the literal `None` become Null.
    pub fn from_input(s: &str) -> Value {
        let t = s.trim();
        if t.is_empty() || t == "None" {
            Value::Null
        } else {
            Value::Text(t.to_string())
        }
    }
}

/// SQL comparison between two non-null values
///
/// Numbers compare numerically, numeric text compares as a number against
/// numbers, other text sorts after numbers.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Text(_) | Value::Date(_), Value::Text(_) | Value::Date(_)) => {
            Some(a.as_text()?.cmp(&b.as_text()?))
        }
        (Value::Integer(_) | Value::Real(_), _) => match b.as_f64() {
            Some(y) => a.as_f64()?.partial_cmp(&y),
            None => Some(Ordering::Less),
        },
        (_, Value::Integer(_) | Value::Real(_)) => match a.as_f64() {
            Some(x) => x.partial_cmp(&b.as_f64()?),
            None => Some(Ordering::Greater),
        },
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "NULL"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        if f.is_finite() {
            Value::Real(f)
        } else {
            Value::Null
        }
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                Value::Text(String::from_utf8_lossy(t).into_owned())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_affinity() {
        assert_eq!(ColumnType::Integer.coerce(Value::Text("1".into())), Value::Integer(1));
        assert_eq!(ColumnType::Integer.coerce(Value::Real(12.0)), Value::Integer(12));
        assert_eq!(ColumnType::Integer.coerce(Value::Real(12.5)), Value::Real(12.5));
        assert_eq!(
            ColumnType::Integer.coerce(Value::Text("abc".into())),
            Value::Text("abc".into())
        );
    }

    #[test]
    fn test_text_affinity_renders_numbers() {
        assert_eq!(ColumnType::Text.coerce(Value::Integer(2)), Value::Text("2".into()));
        assert_eq!(ColumnType::Text.coerce(Value::Real(3.0)), Value::Text("3.0".into()));
    }

    #[test]
    fn test_julian_day_round_trip() {
        let dt = parse_datetime("2000-01-01").unwrap();
        assert_eq!(julian_day(&dt), 2_451_544.5);
        let d = date_from_julian_day(2_451_545.0).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        let d = date_from_julian_day(2_451_544.5).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    }

    #[test]
    fn test_parse_datetime_variants() {
        assert!(parse_datetime("2021-01-01 00:00:00").is_some());
        assert!(parse_datetime("2021-01-01T10:30:00").is_some());
        assert_eq!(
            parse_datetime("15/03/2019").map(|dt| dt.date()),
            NaiveDate::from_ymd_opt(2019, 3, 15)
        );
        assert!(parse_datetime("ontem").is_none());
    }

    #[test]
    fn test_placeholder_values() {
        assert!(Value::Null.is_placeholder());
        assert!(Value::Text("None".into()).is_placeholder());
        assert!(Value::Text("0".into()).is_placeholder());
        assert!(Value::Integer(0).is_placeholder());
        assert!(!Value::Text("CL-01".into()).is_placeholder());
        assert!(!Value::Real(0.5).is_placeholder());
    }

    #[test]
    fn test_compare_mixed_types() {
        use std::cmp::Ordering::*;
        assert_eq!(compare_values(&Value::Integer(2), &Value::Real(2.0)), Some(Equal));
        assert_eq!(compare_values(&Value::Text("10".into()), &Value::Integer(9)), Some(Greater));
        assert_eq!(compare_values(&Value::Integer(9), &Value::Text("abc".into())), Some(Less));
        assert_eq!(compare_values(&Value::Null, &Value::Integer(1)), None);
    }
}
