use crate::config::{env_or, Settings};
use crate::market::parse;
use crate::market::types::{error_message, HistoricalPriceFull, QuoteRow, SharesFloatRow};
use crate::market::{GatewayError, MarketDataGateway};
use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;

const GAINERS_PATH: &str = "/api/v3/stock_market/gainers";
const SHARES_FLOAT_PATH: &str = "/api/v4/shares_float";
const QUOTE_PATH: &str = "/api/v3/quote";
const HISTORY_PATH: &str = "/api/v3/historical-price-full";

// Error bodies can be whole HTML pages.
const MAX_ERROR_BODY: usize = 512;

/// Financial Modeling Prep quote provider.
#[derive(Debug, Clone)]
pub struct FmpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retries: u32,
    backoff_base: Duration,
}

impl FmpClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_fmp_api_key()?.to_string();
        let base_url = settings
            .fmp_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = env_or("FMP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let retries = env_or("FMP_RETRIES", DEFAULT_RETRIES);

        Ok(Self::new(base_url, api_key, Duration::from_secs(timeout_secs))?.with_retries(retries))
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build FMP http client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            retries: DEFAULT_RETRIES,
            backoff_base: Duration::from_secs(1),
        })
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Endpoint URL, with `symbol` appended as one encoded path segment when given.
    fn url(&self, path: &str, symbol: Option<&str>) -> Result<reqwest::Url, GatewayError> {
        let raw = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut url = reqwest::Url::parse(&raw).map_err(|err| GatewayError::Transport {
            detail: format!("invalid FMP url {raw}: {err}"),
        })?;
        if let Some(symbol) = symbol {
            url.path_segments_mut()
                .map_err(|_| GatewayError::Transport {
                    detail: format!("FMP base url cannot take a path: {raw}"),
                })?
                .push(symbol);
        }
        Ok(url)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.pow(attempt.saturating_sub(1).min(6))
    }

    async fn get_json(
        &self,
        path: &str,
        symbol: Option<&str>,
        query: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        let url = self.url(path, symbol)?;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let res = self
                .http
                .get(url.clone())
                .query(query)
                .query(&[("apikey", self.api_key.as_str())])
                .send()
                .await;

            let res = match res {
                Ok(r) => r,
                Err(err) => {
                    // The URL carries the API key; keep it out of errors and logs.
                    let err = err.without_url();
                    if attempt >= self.retries {
                        return Err(GatewayError::Transport {
                            detail: err.to_string(),
                        });
                    }
                    let backoff = self.backoff(attempt);
                    tracing::warn!(attempt, ?backoff, path = url.path(), error = %err, "FMP request failed; retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            };

            let status = res.status();
            let text = res.text().await.map_err(|err| GatewayError::Transport {
                detail: format!("failed to read response: {}", err.without_url()),
            })?;

            if !status.is_success() {
                let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                if retryable && attempt < self.retries {
                    let backoff = self.backoff(attempt);
                    tracing::warn!(attempt, ?backoff, path = url.path(), http_status = %status, "FMP HTTP error; retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                return Err(GatewayError::Http {
                    status: status.as_u16(),
                    body: truncate(&text, MAX_ERROR_BODY),
                });
            }

            return serde_json::from_str::<Value>(&text).map_err(|err| GatewayError::Malformed {
                detail: format!("response is not valid JSON: {err}"),
            });
        }
    }
}

#[async_trait::async_trait]
impl MarketDataGateway for FmpClient {
    fn provider_name(&self) -> &'static str {
        "financialmodelingprep"
    }

    async fn fetch_gainers(&self) -> Result<Vec<Value>, GatewayError> {
        let body = self.get_json(GAINERS_PATH, None, &[]).await?;
        let rows = into_rows(body)?;
        tracing::debug!(records = rows.len(), "fetched gainers");
        Ok(rows)
    }

    async fn try_float_shares(&self, symbol: &str) -> Result<f64, GatewayError> {
        let body = self
            .get_json(SHARES_FLOAT_PATH, None, &[("symbol", symbol.to_string())])
            .await?;
        let row = first_row::<SharesFloatRow>(body, symbol)?;
        parse::number(&row.float_shares).ok_or_else(|| GatewayError::Malformed {
            detail: format!("floatShares missing for {symbol}"),
        })
    }

    async fn try_previous_close(&self, symbol: &str) -> Result<Option<f64>, GatewayError> {
        let body = self
            .get_json(QUOTE_PATH, Some(symbol), &[])
            .await?;
        let row = first_row::<QuoteRow>(body, symbol)?;
        Ok(parse::number(&row.previous_close))
    }

    async fn try_volume_history(
        &self,
        symbol: &str,
        sessions: usize,
    ) -> Result<Vec<u64>, GatewayError> {
        let body = self
            .get_json(
                HISTORY_PATH,
                Some(symbol),
                &[("timeseries", sessions.to_string())],
            )
            .await?;

        let Some(obj) = body.as_object() else {
            return Err(GatewayError::Malformed {
                detail: format!("historical prices for {symbol} are not an object"),
            });
        };
        if obj.is_empty() {
            return Err(GatewayError::NotFound {
                symbol: symbol.to_string(),
            });
        }
        if !obj.contains_key("historical") {
            if let Some(message) = error_message(&body) {
                return Err(GatewayError::ErrorPayload { message });
            }
        }

        let parsed = serde_json::from_value::<HistoricalPriceFull>(body).map_err(|err| {
            GatewayError::Malformed {
                detail: format!("historical prices for {symbol}: {err}"),
            }
        })?;

        let mut bars = parsed.historical;
        // ISO dates sort lexicographically; newest first.
        bars.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(bars
            .iter()
            .filter_map(|bar| parse::number(&bar.volume))
            .filter(|v| *v >= 0.0)
            .map(|v| v.round() as u64)
            .take(sessions)
            .collect())
    }
}

fn into_rows(body: Value) -> Result<Vec<Value>, GatewayError> {
    match body {
        Value::Array(rows) => Ok(rows),
        Value::Object(_) => Err(GatewayError::ErrorPayload {
            message: error_message(&body).unwrap_or_default(),
        }),
        other => Err(GatewayError::Malformed {
            detail: format!("expected an array, got {other}"),
        }),
    }
}

fn first_row<T: serde::de::DeserializeOwned>(body: Value, symbol: &str) -> Result<T, GatewayError> {
    let first = into_rows(body)?
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::NotFound {
            symbol: symbol.to_string(),
        })?;
    serde_json::from_value::<T>(first).map_err(|err| GatewayError::Malformed {
        detail: format!("unexpected row shape for {symbol}: {err}"),
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
