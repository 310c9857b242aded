//! In-memory collaborators for pipeline tests.

use crate::market::{GatewayError, MarketDataGateway};
use crate::news::NewsLookup;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Float,
    PreviousClose,
    Volume,
}

pub(crate) struct FakeGateway {
    gainers: Result<Vec<Value>, GatewayError>,
    floats: HashMap<String, f64>,
    closes: HashMap<String, f64>,
    volumes: HashMap<String, Vec<u64>>,
    calls: Mutex<Vec<(Call, String)>>,
}

impl FakeGateway {
    pub(crate) fn new(gainers: Vec<Value>) -> Self {
        Self {
            gainers: Ok(gainers),
            floats: HashMap::new(),
            closes: HashMap::new(),
            volumes: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(err: GatewayError) -> Self {
        Self {
            gainers: Err(err),
            ..Self::new(vec![])
        }
    }

    pub(crate) fn with_float(mut self, symbol: &str, shares: f64) -> Self {
        self.floats.insert(symbol.to_string(), shares);
        self
    }

    pub(crate) fn with_previous_close(mut self, symbol: &str, close: f64) -> Self {
        self.closes.insert(symbol.to_string(), close);
        self
    }

    pub(crate) fn with_volumes(mut self, symbol: &str, volumes: Vec<u64>) -> Self {
        self.volumes.insert(symbol.to_string(), volumes);
        self
    }

    /// Gives `symbol` a history whose relative volume is `ratio` under the default
    /// exclude-latest baseline, plus a float of `float_millions`.
    pub(crate) fn with_metrics(self, symbol: &str, ratio: u64, float_millions: f64) -> Self {
        let mut volumes = vec![1_000 * ratio];
        volumes.extend(std::iter::repeat(1_000).take(40));
        self.with_volumes(symbol, volumes)
            .with_float(symbol, float_millions * 1_000_000.0)
    }

    pub(crate) fn calls(&self, kind: Call) -> usize {
        self.lock_calls().iter().filter(|(k, _)| *k == kind).count()
    }

    pub(crate) fn calls_for(&self, symbol: &str) -> usize {
        self.lock_calls().iter().filter(|(_, s)| s == symbol).count()
    }

    fn record(&self, kind: Call, symbol: &str) {
        self.lock_calls().push((kind, symbol.to_string()));
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<(Call, String)>> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait::async_trait]
impl MarketDataGateway for FakeGateway {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_gainers(&self) -> Result<Vec<Value>, GatewayError> {
        self.gainers.clone()
    }

    async fn try_float_shares(&self, symbol: &str) -> Result<f64, GatewayError> {
        self.record(Call::Float, symbol);
        self.floats
            .get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::NotFound {
                symbol: symbol.to_string(),
            })
    }

    async fn try_previous_close(&self, symbol: &str) -> Result<Option<f64>, GatewayError> {
        self.record(Call::PreviousClose, symbol);
        match self.closes.get(symbol) {
            Some(c) => Ok(Some(*c)),
            None => Err(GatewayError::NotFound {
                symbol: symbol.to_string(),
            }),
        }
    }

    async fn try_volume_history(
        &self,
        symbol: &str,
        sessions: usize,
    ) -> Result<Vec<u64>, GatewayError> {
        self.record(Call::Volume, symbol);
        match self.volumes.get(symbol) {
            Some(v) => Ok(v.iter().copied().take(sessions).collect()),
            None => Err(GatewayError::Transport {
                detail: "connection reset".to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeNews {
    headlines: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FakeNews {
    pub(crate) fn with_headline(mut self, symbol: &str, title: &str) -> Self {
        self.headlines.insert(symbol.to_string(), title.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait::async_trait]
impl NewsLookup for FakeNews {
    async fn try_latest_headline(&self, symbol: &str) -> anyhow::Result<Option<String>> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(symbol.to_string());
        if symbol == "BROKEN" {
            anyhow::bail!("news provider HTTP 500");
        }
        Ok(self.headlines.get(symbol).cloned())
    }
}
