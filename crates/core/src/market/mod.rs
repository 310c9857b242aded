pub mod fmp;
pub mod parse;
pub mod types;

use crate::domain::FLOAT_UNAVAILABLE;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Failure talking to the quote provider. Recoverable: callers treat it as "no data".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayError {
    Transport { detail: String },
    Http { status: u16, body: String },
    Malformed { detail: String },
    /// The provider answered with an error object instead of data.
    ErrorPayload { message: String },
    NotFound { symbol: String },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { detail } => write!(f, "quote provider request failed: {detail}"),
            Self::Http { status, body } => write!(f, "quote provider HTTP {status}: {body}"),
            Self::Malformed { detail } => write!(f, "malformed quote provider payload: {detail}"),
            Self::ErrorPayload { message } => write!(f, "quote provider returned an error: {message}"),
            Self::NotFound { symbol } => write!(f, "no quote provider data for {symbol}"),
        }
    }
}

impl std::error::Error for GatewayError {}

#[async_trait::async_trait]
pub trait MarketDataGateway: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Raw gainer records, exactly as listed by the provider.
    async fn fetch_gainers(&self) -> Result<Vec<Value>, GatewayError>;

    /// Shares available for public trading (absolute count).
    async fn try_float_shares(&self, symbol: &str) -> Result<f64, GatewayError>;

    async fn try_previous_close(&self, symbol: &str) -> Result<Option<f64>, GatewayError>;

    /// Daily session volumes, newest first, at most `sessions` long.
    async fn try_volume_history(
        &self,
        symbol: &str,
        sessions: usize,
    ) -> Result<Vec<u64>, GatewayError>;

    /// Float in millions of shares, or [`FLOAT_UNAVAILABLE`] when the lookup fails.
    async fn fetch_float(&self, symbol: &str) -> f64 {
        match self.try_float_shares(symbol).await {
            Ok(shares) if shares.is_finite() && shares >= 0.0 => shares / 1_000_000.0,
            Ok(shares) => {
                tracing::warn!(%symbol, shares, "float lookup returned an unusable value");
                FLOAT_UNAVAILABLE
            }
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "float lookup failed; using sentinel");
                FLOAT_UNAVAILABLE
            }
        }
    }

    /// Prior session close, or `None` when the lookup fails (disables the gap column).
    async fn fetch_previous_close(&self, symbol: &str) -> Option<f64> {
        match self.try_previous_close(symbol).await {
            Ok(close) => close.filter(|c| c.is_finite() && *c > 0.0),
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "previous close lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGateway;

    #[tokio::test]
    async fn float_lookup_failure_maps_to_sentinel() {
        let gw = FakeGateway::new(vec![]).with_float("OK", 12_500_000.0);

        assert_eq!(gw.fetch_float("OK").await, 12.5);
        assert_eq!(gw.fetch_float("MISSING").await, FLOAT_UNAVAILABLE);
    }

    #[tokio::test]
    async fn previous_close_failure_maps_to_none() {
        let gw = FakeGateway::new(vec![]).with_previous_close("OK", 4.0);

        assert_eq!(gw.fetch_previous_close("OK").await, Some(4.0));
        assert_eq!(gw.fetch_previous_close("MISSING").await, None);
    }

    #[test]
    fn gateway_error_serializes_with_kind() {
        let err = GatewayError::Http {
            status: 503,
            body: "busy".to_string(),
        };
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["kind"], "http");
        assert_eq!(v["status"], 503);
        assert_eq!(err.to_string(), "quote provider HTTP 503: busy");
    }
}
