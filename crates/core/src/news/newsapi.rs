use crate::config::{env_or, Settings};
use crate::news::NewsLookup;
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://newsapi.org";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const EVERYTHING_PATH: &str = "/v2/everything";

#[derive(Debug, Clone)]
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NewsApiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_news_api_key()?.to_string();
        let base_url = settings
            .news_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = env_or("NEWS_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        Self::new(base_url, api_key, Duration::from_secs(timeout_secs))
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build news http client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), EVERYTHING_PATH)
    }
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
}

#[async_trait::async_trait]
impl NewsLookup for NewsApiClient {
    async fn try_latest_headline(&self, symbol: &str) -> anyhow::Result<Option<String>> {
        let res = self
            .http
            .get(self.url())
            .query(&[
                ("q", symbol),
                ("sortBy", "publishedAt"),
                ("pageSize", "1"),
                ("language", "en"),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|err| err.without_url())
            .context("news request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|err| err.without_url())
            .context("failed to read news response")?;
        if !status.is_success() {
            anyhow::bail!("news provider HTTP {status}: {text}");
        }

        let body = serde_json::from_str::<EverythingResponse>(&text)
            .with_context(|| format!("news response is not valid JSON: {text}"))?;
        if body.status == "error" {
            anyhow::bail!(
                "news provider error: {}",
                body.message.unwrap_or_else(|| "unknown".to_string())
            );
        }

        Ok(body
            .articles
            .into_iter()
            .next()
            .and_then(|a| a.title)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}
