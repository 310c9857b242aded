//! Defensive field parsing for provider payloads.
//!
//! Quote providers are loose about types: the same field can arrive as a JSON number, a
//! string with formatting, `null`, or not at all. Everything here returns `None` for values
//! that cannot be read as a finite number instead of guessing a default.

use serde_json::{Map, Value};

/// Reads a numeric field that may be a JSON number or a numeric string.
pub fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|x| x.is_finite()),
        Value::String(s) => parse_num(s),
        _ => None,
    }
}

/// Reads a percentage such as `"+12.5%"`, `"(-3.2%)"`, `"12.5"` or `12.5`.
pub fn percent(v: &Value) -> Option<f64> {
    match v {
        Value::Number(_) => number(v),
        Value::String(s) => parse_percent(s),
        _ => None,
    }
}

pub fn parse_percent(s: &str) -> Option<f64> {
    let mut t = s.trim();
    if let Some(inner) = t.strip_prefix('(').and_then(|x| x.strip_suffix(')')) {
        t = inner.trim();
    }
    let t = t.strip_suffix('%').unwrap_or(t).trim();
    let t = t.strip_prefix('+').unwrap_or(t);
    parse_num(t)
}

pub fn parse_num(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let cleaned: String = t.chars().filter(|c| *c != ',' && *c != '_').collect();
    cleaned.parse::<f64>().ok().filter(|x| x.is_finite())
}

/// First value present under any of `keys`, skipping explicit nulls.
pub fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

pub fn text(v: &Value) -> Option<String> {
    v.as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_percentage_strings() {
        assert_eq!(percent(&json!("12.5%")), Some(12.5));
        assert_eq!(percent(&json!("+12.5%")), Some(12.5));
        assert_eq!(percent(&json!("12.5")), Some(12.5));
        assert_eq!(percent(&json!("-3.2%")), Some(-3.2));
        assert_eq!(percent(&json!("(+41.07%)")), Some(41.07));
        assert_eq!(percent(&json!(7.25)), Some(7.25));
    }

    #[test]
    fn rejects_non_numeric_percentages() {
        assert_eq!(percent(&json!("n/a")), None);
        assert_eq!(percent(&json!("%")), None);
        assert_eq!(percent(&json!("")), None);
        assert_eq!(percent(&Value::Null), None);
        assert_eq!(percent(&json!(["12.5"])), None);
    }

    #[test]
    fn numbers_tolerate_strings_and_separators() {
        assert_eq!(number(&json!("1,250,000")), Some(1_250_000.0));
        assert_eq!(number(&json!(" 4.2 ")), Some(4.2));
        assert_eq!(number(&json!(3)), Some(3.0));
        assert_eq!(number(&json!("NaN")), None);
        assert_eq!(number(&json!("inf")), None);
        assert_eq!(number(&json!(true)), None);
    }

    #[test]
    fn field_skips_nulls_and_uses_aliases() {
        let v = json!({"symbol": null, "ticker": "ABCD"});
        let obj = v.as_object().unwrap();
        let found = field(obj, &["symbol", "ticker"]).and_then(text);
        assert_eq!(found.as_deref(), Some("ABCD"));
        assert!(field(obj, &["price"]).is_none());
    }
}
