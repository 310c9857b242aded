use crate::config::{env_flag_or, env_or};
use crate::domain::candidate::FLOAT_UNAVAILABLE;
use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// Thresholds for one scan. Built once and passed by value into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub price_min: f64,
    pub price_max: f64,
    pub percent_change_min: f64,
    pub relative_volume_min: f64,
    pub float_max_millions: f64,
    pub require_news: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            price_min: 1.0,
            price_max: 20.0,
            percent_change_min: 10.0,
            relative_volume_min: 2.0,
            float_max_millions: 20.0,
            require_news: false,
        }
    }
}

impl FilterConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            price_min: env_or("SCAN_PRICE_MIN", d.price_min),
            price_max: env_or("SCAN_PRICE_MAX", d.price_max),
            percent_change_min: env_or("SCAN_PERCENT_CHANGE_MIN", d.percent_change_min),
            relative_volume_min: env_or("SCAN_RELATIVE_VOLUME_MIN", d.relative_volume_min),
            float_max_millions: env_or("SCAN_FLOAT_MAX_MILLIONS", d.float_max_millions),
            require_news: env_flag_or("SCAN_REQUIRE_NEWS", d.require_news),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, v) in [
            ("price_min", self.price_min),
            ("price_max", self.price_max),
            ("percent_change_min", self.percent_change_min),
            ("relative_volume_min", self.relative_volume_min),
            ("float_max_millions", self.float_max_millions),
        ] {
            ensure!(v.is_finite(), "{name} must be finite (got {v})");
        }

        ensure!(
            self.price_min >= 0.0,
            "price_min must be >= 0 (got {})",
            self.price_min
        );
        ensure!(
            self.price_min <= self.price_max,
            "price_min must not exceed price_max ({} > {})",
            self.price_min,
            self.price_max
        );
        ensure!(
            self.relative_volume_min >= 0.0,
            "relative_volume_min must be >= 0 (got {})",
            self.relative_volume_min
        );
        ensure!(
            self.float_max_millions >= 0.0,
            "float_max_millions must be >= 0 (got {})",
            self.float_max_millions
        );
        ensure!(
            self.float_max_millions < FLOAT_UNAVAILABLE,
            "float_max_millions must be below the unavailable-float sentinel (got {})",
            self.float_max_millions
        );
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "price {:.2}..={:.2}, change >= {:.2}%, rvol >= {:.2}, float <= {:.2}M{}",
            self.price_min,
            self.price_max,
            self.percent_change_min,
            self.relative_volume_min,
            self.float_max_millions,
            if self.require_news { ", news required" } else { "" }
        )
    }
}

/// Whether the latest session counts toward its own relative-volume baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMode {
    #[default]
    ExcludeLatest,
    IncludeLatest,
}

impl std::str::FromStr for BaselineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "exclude_latest" | "exclude" => Ok(Self::ExcludeLatest),
            "include_latest" | "include" => Ok(Self::IncludeLatest),
            other => Err(format!("unknown baseline mode: {other}")),
        }
    }
}

/// Knobs that shape how a scan runs and what it attaches, without changing which
/// candidates pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub lookback_days: usize,
    pub baseline: BaselineMode,
    /// Candidates evaluated at once. 1 keeps the scan fully sequential.
    pub concurrency: usize,
    pub show_gap: bool,
    pub show_news_links: bool,
    /// Attach the latest headline to survivors when a news lookup is configured.
    pub fetch_headlines: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            lookback_days: 20,
            baseline: BaselineMode::ExcludeLatest,
            concurrency: 1,
            show_gap: true,
            show_news_links: true,
            fetch_headlines: true,
        }
    }
}

impl ScanOptions {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            lookback_days: env_or("SCAN_LOOKBACK_DAYS", d.lookback_days),
            baseline: env_or("SCAN_BASELINE", d.baseline),
            concurrency: env_or("SCAN_CONCURRENCY", d.concurrency).max(1),
            show_gap: env_flag_or("SCAN_SHOW_GAP", d.show_gap),
            show_news_links: env_flag_or("SCAN_SHOW_NEWS_LINKS", d.show_news_links),
            fetch_headlines: env_flag_or("SCAN_FETCH_HEADLINES", d.fetch_headlines),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        FilterConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_float_ceiling_at_sentinel() {
        let cfg = FilterConfig {
            float_max_millions: f64::MAX,
            ..FilterConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("float_max_millions"));
    }

    #[test]
    fn rejects_inverted_price_range() {
        let cfg = FilterConfig {
            price_min: 30.0,
            price_max: 20.0,
            ..FilterConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("price_min must not exceed price_max"));
    }

    #[test]
    fn rejects_non_finite_thresholds() {
        let cfg = FilterConfig {
            float_max_millions: f64::INFINITY,
            ..FilterConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_baseline_modes() {
        assert_eq!(
            "exclude-latest".parse::<BaselineMode>().unwrap(),
            BaselineMode::ExcludeLatest
        );
        assert_eq!(
            "INCLUDE".parse::<BaselineMode>().unwrap(),
            BaselineMode::IncludeLatest
        );
        assert!("median".parse::<BaselineMode>().is_err());
    }
}
