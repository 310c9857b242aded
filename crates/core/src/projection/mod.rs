//! Ordering and display of scan survivors.

pub mod render;

use crate::domain::EnrichedCandidate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use render::{
    export_csv, render_html_cards, render_report, render_table, watchlist, DisplayOptions,
    ExportFormat,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<EnrichedCandidate>,
}

impl ScanResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.symbol())
    }
}

/// Sorts survivors by percentage change, highest first. Equal changes keep feed order.
pub fn project(mut rows: Vec<EnrichedCandidate>, generated_at: DateTime<Utc>) -> ScanResult {
    rows.sort_by(|a, b| {
        b.change_percent()
            .partial_cmp(&a.change_percent())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.candidate.feed_index.cmp(&b.candidate.feed_index))
    });
    ScanResult { generated_at, rows }
}

pub fn fmt_currency(v: f64) -> String {
    if v < 0.0 {
        format!("-${:.2}", v.abs())
    } else {
        format!("${v:.2}")
    }
}

pub fn fmt_percent(v: f64) -> String {
    format!("{v:+.2}%")
}

pub fn fmt_ratio(v: f64) -> String {
    format!("{v:.2}x")
}

pub fn fmt_millions(v: f64) -> String {
    if v >= crate::domain::FLOAT_UNAVAILABLE {
        "n/a".to_string()
    } else {
        format!("{v:.2}M")
    }
}

pub fn fmt_volume(v: u64) -> String {
    let digits = v.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
