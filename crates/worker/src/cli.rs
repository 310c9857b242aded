use clap::Parser;
use momoscan_core::domain::{BaselineMode, FilterConfig, ScanOptions};
use momoscan_core::projection::ExportFormat;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "momoscan_worker", about = "Scan today's top gainers for momentum setups")]
pub struct Args {
    /// table, json, csv, watchlist or html.
    #[arg(long, default_value = "table")]
    pub format: ExportFormat,

    /// Write to this file instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub price_min: Option<f64>,

    #[arg(long)]
    pub price_max: Option<f64>,

    #[arg(long)]
    pub percent_change_min: Option<f64>,

    #[arg(long)]
    pub relative_volume_min: Option<f64>,

    #[arg(long)]
    pub float_max_millions: Option<f64>,

    /// Drop candidates without a recent headline (needs NEWS_API_KEY).
    #[arg(long)]
    pub require_news: bool,

    #[arg(long)]
    pub no_gap: bool,

    #[arg(long)]
    pub no_news_links: bool,

    /// Skip headline lookups unless the news filter needs them.
    #[arg(long)]
    pub no_headlines: bool,

    /// Candidates evaluated at once.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=64))]
    pub concurrency: Option<u32>,

    /// Sessions averaged for the relative-volume baseline.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=250))]
    pub lookback_days: Option<u32>,

    /// Count the latest session in its own baseline.
    #[arg(long)]
    pub include_latest_in_baseline: bool,
}

impl Args {
    /// Layers flags over environment configuration. Flags win.
    pub fn apply(&self, filters: &mut FilterConfig, options: &mut ScanOptions) {
        if let Some(v) = self.price_min {
            filters.price_min = v;
        }
        if let Some(v) = self.price_max {
            filters.price_max = v;
        }
        if let Some(v) = self.percent_change_min {
            filters.percent_change_min = v;
        }
        if let Some(v) = self.relative_volume_min {
            filters.relative_volume_min = v;
        }
        if let Some(v) = self.float_max_millions {
            filters.float_max_millions = v;
        }
        if self.require_news {
            filters.require_news = true;
        }

        if self.no_gap {
            options.show_gap = false;
        }
        if self.no_news_links {
            options.show_news_links = false;
        }
        if self.no_headlines {
            options.fetch_headlines = false;
        }
        if let Some(n) = self.concurrency {
            options.concurrency = n as usize;
        }
        if let Some(n) = self.lookback_days {
            options.lookback_days = n as usize;
        }
        if self.include_latest_in_baseline {
            options.baseline = BaselineMode::IncludeLatest;
        }
    }
}
