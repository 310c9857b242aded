pub mod newsapi;

use crate::config::Settings;
use std::sync::Arc;

const SEARCH_URL: &str = "https://www.google.com/search";

#[async_trait::async_trait]
pub trait NewsLookup: Send + Sync {
    /// Title of the most recent article mentioning `symbol`, if any.
    async fn try_latest_headline(&self, symbol: &str) -> anyhow::Result<Option<String>>;

    /// Like [`NewsLookup::try_latest_headline`], with failures read as "no news".
    async fn latest_headline(&self, symbol: &str) -> Option<String> {
        match self.try_latest_headline(symbol).await {
            Ok(headline) => headline,
            Err(err) => {
                tracing::warn!(%symbol, error = %format!("{err:#}"), "news lookup failed; treating as no news");
                None
            }
        }
    }
}

/// News lookup for a scan, if one can be built.
///
/// A missing credential is fatal only when `require_news` is set; otherwise headlines are
/// simply left off.
pub fn lookup_from_settings(
    settings: &Settings,
    require_news: bool,
) -> anyhow::Result<Option<Arc<dyn NewsLookup>>> {
    match newsapi::NewsApiClient::from_settings(settings) {
        Ok(client) => Ok(Some(Arc::new(client))),
        Err(err) if require_news => Err(err.context("news filter is enabled")),
        Err(err) => {
            tracing::warn!(error = %err, "news lookup disabled");
            Ok(None)
        }
    }
}

/// Web search link for recent coverage of `symbol`.
pub fn news_search_link(symbol: &str) -> String {
    let query = format!("{} stock news", symbol.trim());
    match reqwest::Url::parse_with_params(SEARCH_URL, &[("q", query.as_str())]) {
        Ok(url) => url.to_string(),
        Err(_) => SEARCH_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNews;

    #[test]
    fn builds_search_link() {
        assert_eq!(
            news_search_link("AAA"),
            "https://www.google.com/search?q=AAA+stock+news"
        );
        assert_eq!(
            news_search_link("BRK&B"),
            "https://www.google.com/search?q=BRK%26B+stock+news"
        );
    }

    fn settings(news_api_key: Option<&str>) -> Settings {
        Settings {
            fmp_api_key: Some("fmp".to_string()),
            fmp_base_url: None,
            news_api_key: news_api_key.map(str::to_string),
            news_base_url: None,
            sentry_dsn: None,
        }
    }

    #[test]
    fn missing_news_key_only_fails_when_news_is_required() {
        assert!(lookup_from_settings(&settings(None), false).unwrap().is_none());

        let err = lookup_from_settings(&settings(None), true).err().unwrap();
        assert_eq!(format!("{err:#}"), "news filter is enabled: NEWS_API_KEY is required");

        assert!(lookup_from_settings(&settings(Some("k")), true).unwrap().is_some());
    }

    #[tokio::test]
    async fn lookup_errors_read_as_absent() {
        let news = FakeNews::default().with_headline("AAA", "AAA wins contract");

        assert_eq!(
            news.latest_headline("AAA").await.as_deref(),
            Some("AAA wins contract")
        );
        assert_eq!(news.latest_headline("BROKEN").await, None);
        assert_eq!(news.latest_headline("QUIET").await, None);
        assert_eq!(news.calls(), 3);
    }
}
