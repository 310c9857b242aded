//! The scan pipeline: fetch, normalize, filter, enrich, project.
//!
//! Filters run cheapest first and stop at the first failure, so network-bound lookups only
//! happen for candidates that already cleared the local price and percent-change checks.

use crate::cache::{Metric, MetricKey, ScanCache};
use crate::domain::outcome::funnel;
use crate::domain::{
    Candidate, CandidateOutcome, EnrichedCandidate, FilterConfig, ScanOptions, SkipReason,
    SkippedCandidate, StageCount, FLOAT_UNAVAILABLE,
};
use crate::market::{GatewayError, MarketDataGateway};
use crate::news::{news_search_link, NewsLookup};
use crate::projection::{project, ScanResult};
use crate::time::us_market::{self, MarketSession};
use crate::volume;
use anyhow::ensure;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Everything one scan produced, including why candidates were dropped.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub provider: &'static str,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub trading_date: Option<NaiveDate>,
    pub session: Option<MarketSession>,
    pub filters: FilterConfig,
    pub total_records: usize,
    pub result: ScanResult,
    pub skipped: Vec<SkippedCandidate>,
    pub funnel: Vec<StageCount>,
    /// Set when the gainers feed could not be read; the result is then empty.
    pub gateway_error: Option<GatewayError>,
}

impl ScanReport {
    pub fn warning(&self) -> Option<String> {
        self.gateway_error
            .as_ref()
            .map(|err| format!("no market data this scan: {err}"))
    }
}

pub struct ScanPipeline {
    gateway: Arc<dyn MarketDataGateway>,
    news: Option<Arc<dyn NewsLookup>>,
    filters: FilterConfig,
    options: ScanOptions,
}

impl ScanPipeline {
    /// Fails on configuration problems only; nothing about live data can fail construction.
    pub fn new(
        gateway: Arc<dyn MarketDataGateway>,
        news: Option<Arc<dyn NewsLookup>>,
        filters: FilterConfig,
        options: ScanOptions,
    ) -> anyhow::Result<Self> {
        filters.validate()?;
        ensure!(
            !filters.require_news || news.is_some(),
            "require_news is set but no news lookup is configured"
        );
        ensure!(options.concurrency >= 1, "concurrency must be >= 1");

        Ok(Self {
            gateway,
            news,
            filters,
            options,
        })
    }

    pub fn filters(&self) -> &FilterConfig {
        &self.filters
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Runs one scan with its own fresh cache.
    pub async fn run(&self) -> ScanReport {
        let cache = ScanCache::new();
        self.run_with_cache(&cache).await
    }

    pub async fn run_with_cache(&self, cache: &ScanCache) -> ScanReport {
        let started_at = Utc::now();
        let t0 = std::time::Instant::now();

        let (records, gateway_error) = match self.gateway.fetch_gainers().await {
            Ok(records) => (records, None),
            Err(err) => {
                tracing::warn!(
                    provider = self.gateway.provider_name(),
                    error = %err,
                    "gainers fetch failed; scanning zero candidates"
                );
                (Vec::new(), Some(err))
            }
        };
        let total_records = records.len();

        let (candidates, mut skipped) = normalize(&records);

        let outcomes: Vec<CandidateOutcome> = stream::iter(candidates)
            .map(|c| self.evaluate(c, cache))
            .buffered(self.options.concurrency)
            .collect()
            .await;

        let mut passed = Vec::new();
        for outcome in outcomes {
            match outcome {
                CandidateOutcome::Passed(enriched) => passed.push(*enriched),
                CandidateOutcome::Skipped(skip) => skipped.push(skip),
            }
        }
        skipped.sort_by_key(|s| s.feed_index);

        let funnel = funnel(total_records, &skipped);
        let completed_at = Utc::now();
        let result = project(passed, completed_at);

        tracing::info!(
            records = total_records,
            passed = result.len(),
            skipped = skipped.len(),
            lookups = cache.computations(),
            elapsed_ms = t0.elapsed().as_millis(),
            "scan complete"
        );

        ScanReport {
            scan_id: Uuid::new_v4(),
            provider: self.gateway.provider_name(),
            started_at,
            completed_at,
            trading_date: us_market::trading_date(started_at).ok(),
            session: us_market::session_at(started_at).ok(),
            filters: self.filters.clone(),
            total_records,
            result,
            skipped,
            funnel,
            gateway_error,
        }
    }

    /// Runs the filter stages for one parsed candidate, stopping at the first failure, then
    /// enriches a survivor.
    pub async fn evaluate(&self, candidate: Candidate, cache: &ScanCache) -> CandidateOutcome {
        let f = &self.filters;

        if candidate.price < f.price_min || candidate.price > f.price_max {
            return skip(
                &candidate,
                SkipReason::PriceOutOfRange {
                    price: candidate.price,
                },
            );
        }

        if candidate.change_percent < f.percent_change_min {
            return skip(
                &candidate,
                SkipReason::ChangeBelowMinimum {
                    change_percent: candidate.change_percent,
                },
            );
        }

        let relative_volume = self.relative_volume(&candidate.symbol, cache).await;
        if relative_volume < f.relative_volume_min {
            return skip(
                &candidate,
                SkipReason::RelativeVolumeBelowMinimum { relative_volume },
            );
        }

        let float_millions = self.float_millions(&candidate.symbol, cache).await;
        if float_millions >= FLOAT_UNAVAILABLE || float_millions > f.float_max_millions {
            return skip(&candidate, SkipReason::FloatAboveMaximum { float_millions });
        }

        let mut headline = None;
        if f.require_news {
            headline = self.headline(&candidate.symbol, cache).await;
            if headline.is_none() {
                return skip(&candidate, SkipReason::NoNews);
            }
        } else if self.options.fetch_headlines && self.news.is_some() {
            headline = self.headline(&candidate.symbol, cache).await;
        }

        let gap_percent = if self.options.show_gap {
            let previous_close = match candidate.previous_close {
                Some(close) => Some(close),
                None => self.previous_close(&candidate.symbol, cache).await,
            };
            previous_close.and_then(|close| candidate.gap_percent(close))
        } else {
            None
        };

        let news_link = self
            .options
            .show_news_links
            .then(|| news_search_link(&candidate.symbol));

        CandidateOutcome::Passed(Box::new(EnrichedCandidate {
            candidate,
            relative_volume,
            float_millions,
            gap_percent,
            headline,
            news_link,
        }))
    }

    async fn relative_volume(&self, symbol: &str, cache: &ScanCache) -> f64 {
        let lookback = self.options.lookback_days;
        let baseline = self.options.baseline;
        cache
            .get_or_compute(symbol, MetricKey::RelativeVolume, || async {
                Metric::Number(
                    volume::relative_volume(self.gateway.as_ref(), symbol, lookback, baseline)
                        .await,
                )
            })
            .await
            .as_number()
            .unwrap_or(0.0)
    }

    async fn float_millions(&self, symbol: &str, cache: &ScanCache) -> f64 {
        cache
            .get_or_compute(symbol, MetricKey::FloatMillions, || async {
                Metric::Number(self.gateway.fetch_float(symbol).await)
            })
            .await
            .as_number()
            .unwrap_or(FLOAT_UNAVAILABLE)
    }

    async fn previous_close(&self, symbol: &str, cache: &ScanCache) -> Option<f64> {
        cache
            .get_or_compute(symbol, MetricKey::PreviousClose, || async {
                Metric::MaybeNumber(self.gateway.fetch_previous_close(symbol).await)
            })
            .await
            .as_number()
    }

    async fn headline(&self, symbol: &str, cache: &ScanCache) -> Option<String> {
        let news = self.news.as_ref()?;
        cache
            .get_or_compute(symbol, MetricKey::Headline, || async {
                Metric::Text(news.latest_headline(symbol).await)
            })
            .await
            .into_text()
    }
}

/// Parses every record in feed order. Records that fail to parse, and later repeats of a
/// symbol, become skips.
pub fn normalize(records: &[Value]) -> (Vec<Candidate>, Vec<SkippedCandidate>) {
    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for (idx, raw) in records.iter().enumerate() {
        match Candidate::from_feed(idx, raw) {
            Ok(c) if !seen.insert(c.symbol.clone()) => {
                skipped.push(SkippedCandidate {
                    feed_index: idx,
                    symbol: Some(c.symbol),
                    reason: SkipReason::DuplicateSymbol,
                });
            }
            Ok(c) => candidates.push(c),
            Err(reason) => {
                let symbol = raw
                    .get("symbol")
                    .or_else(|| raw.get("ticker"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                tracing::debug!(feed_index = idx, symbol = ?symbol, %reason, "skipping gainer record");
                skipped.push(SkippedCandidate {
                    feed_index: idx,
                    symbol,
                    reason,
                });
            }
        }
    }

    (candidates, skipped)
}

fn skip(candidate: &Candidate, reason: SkipReason) -> CandidateOutcome {
    tracing::debug!(symbol = %candidate.symbol, stage = %reason.stage(), %reason, "candidate filtered out");
    CandidateOutcome::Skipped(SkippedCandidate {
        feed_index: candidate.feed_index,
        symbol: Some(candidate.symbol.clone()),
        reason,
    })
}
