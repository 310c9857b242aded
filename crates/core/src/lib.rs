pub mod cache;
pub mod domain;
pub mod market;
pub mod news;
pub mod pipeline;
pub mod projection;
pub mod time;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub fmp_api_key: Option<String>,
        pub fmp_base_url: Option<String>,
        pub news_api_key: Option<String>,
        pub news_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                fmp_api_key: non_empty_env("FMP_API_KEY"),
                fmp_base_url: non_empty_env("FMP_BASE_URL"),
                news_api_key: non_empty_env("NEWS_API_KEY"),
                news_base_url: non_empty_env("NEWS_BASE_URL"),
                sentry_dsn: non_empty_env("SENTRY_DSN"),
            })
        }

        pub fn require_fmp_api_key(&self) -> anyhow::Result<&str> {
            self.fmp_api_key
                .as_deref()
                .context("FMP_API_KEY is required")
        }

        pub fn require_news_api_key(&self) -> anyhow::Result<&str> {
            self.news_api_key
                .as_deref()
                .context("NEWS_API_KEY is required")
        }
    }

    fn non_empty_env(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    /// Reads `key` and parses it, falling back to `default` when unset or unparsable.
    pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }

    /// Like [`env_or`] but accepts the usual spellings of a boolean flag.
    pub fn env_flag_or(key: &str, default: bool) -> bool {
        match std::env::var(key) {
            Ok(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => default,
            },
            Err(_) => default,
        }
    }

}
