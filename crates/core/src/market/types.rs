use serde::Deserialize;
use serde_json::Value;

// Numeric fields stay as raw `Value`s and go through `market::parse`; the provider mixes
// numbers, numeric strings and nulls for the same field. Text fields are optional for the
// same reason: `default` covers a missing key, not an explicit null.

#[derive(Debug, Clone, Deserialize)]
pub struct SharesFloatRow {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, rename = "floatShares")]
    pub float_shares: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRow {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, rename = "previousClose")]
    pub previous_close: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalPriceFull {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub historical: Vec<HistoricalBar>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalBar {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub volume: Value,
}

/// Error shape the provider uses instead of an array, e.g. `{"Error Message": "..."}`.
pub fn error_message(v: &Value) -> Option<String> {
    let obj = v.as_object()?;
    ["Error Message", "error", "message"]
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|m| m.as_str().map(str::to_string))
        .or_else(|| Some(v.to_string()))
}
