use crate::domain::outcome::SkipReason;
use crate::market::parse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Float reported for symbols whose float lookup failed. Larger than any usable ceiling,
/// so the float filter drops the candidate on its own.
pub const FLOAT_UNAVAILABLE: f64 = f64::MAX;

/// One normalized row of the gainers feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub name: Option<String>,
    pub price: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub previous_close: Option<f64>,
    /// Position in the raw feed; breaks sort ties.
    pub feed_index: usize,
}

impl Candidate {
    /// Normalizes a raw feed record. Any missing or unreadable required field rejects the
    /// record; a missing percentage change is never read as zero.
    pub fn from_feed(feed_index: usize, raw: &Value) -> Result<Self, SkipReason> {
        let obj = raw
            .as_object()
            .ok_or_else(|| SkipReason::invalid("record is not an object"))?;

        let symbol = parse::field(obj, &["symbol", "ticker"])
            .and_then(parse::text)
            .ok_or_else(|| SkipReason::invalid("missing symbol"))?;

        let price = parse::field(obj, &["price"])
            .and_then(parse::number)
            .ok_or_else(|| SkipReason::invalid("missing or unparsable price"))?;
        if price <= 0.0 {
            return Err(SkipReason::invalid(format!("non-positive price {price}")));
        }

        let change_percent = parse::field(obj, &["changesPercentage", "changePercentage"])
            .and_then(parse::percent)
            .ok_or_else(|| SkipReason::invalid("missing or unparsable percentage change"))?;

        let volume = parse::field(obj, &["volume"])
            .and_then(parse::number)
            .ok_or_else(|| SkipReason::invalid("missing or unparsable volume"))?;
        if volume < 0.0 {
            return Err(SkipReason::invalid(format!("negative volume {volume}")));
        }

        let previous_close = parse::field(obj, &["previousClose"])
            .and_then(parse::number)
            .filter(|p| *p > 0.0);

        let name = parse::field(obj, &["name", "companyName"]).and_then(parse::text);

        Ok(Self {
            symbol,
            name,
            price,
            change_percent,
            volume: volume.round() as u64,
            previous_close,
            feed_index,
        })
    }

    /// Percentage move from the prior close, rounded to cents of a percent.
    pub fn gap_percent(&self, previous_close: f64) -> Option<f64> {
        if previous_close <= 0.0 || !previous_close.is_finite() {
            return None;
        }
        let gap = (self.price - previous_close) / previous_close * 100.0;
        Some((gap * 100.0).round() / 100.0)
    }
}

/// A candidate that survived the filters, with the fields derived along the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub relative_volume: f64,
    pub float_millions: f64,
    pub gap_percent: Option<f64>,
    pub headline: Option<String>,
    pub news_link: Option<String>,
}

impl EnrichedCandidate {
    pub fn symbol(&self) -> &str {
        &self.candidate.symbol
    }

    pub fn change_percent(&self) -> f64 {
        self.candidate.change_percent
    }

    pub fn float_known(&self) -> bool {
        self.float_millions < FLOAT_UNAVAILABLE
    }
}
