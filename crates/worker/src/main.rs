use anyhow::Context;
use clap::Parser;
use momoscan_core::domain::{FilterConfig, ScanOptions};
use momoscan_core::market::fmp::FmpClient;
use momoscan_core::pipeline::ScanPipeline;
use momoscan_core::projection::{render_report, DisplayOptions};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = momoscan_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = cli::Args::parse();

    if let Err(err) = run(&settings, &args).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "scan failed");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: &momoscan_core::config::Settings, args: &cli::Args) -> anyhow::Result<()> {
    let mut filters = FilterConfig::from_env();
    let mut options = ScanOptions::from_env();
    args.apply(&mut filters, &mut options);

    let gateway = Arc::new(FmpClient::from_settings(settings)?);
    let news = momoscan_core::news::lookup_from_settings(settings, filters.require_news)?;
    let display = DisplayOptions::from(&options);
    let pipeline = ScanPipeline::new(gateway, news, filters, options)?;

    tracing::info!(
        format = %args.format,
        filters = %pipeline.filters().summary(),
        concurrency = pipeline.options().concurrency,
        "starting scan"
    );

    let report = pipeline.run().await;
    if let Some(warning) = report.warning() {
        sentry::capture_message(&warning, sentry::Level::Warning);
        tracing::warn!(scan_id = %report.scan_id, "{warning}");
    }

    let rendered = render_report(&report, args.format, display)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(
                path = %path.display(),
                rows = report.result.len(),
                "scan written"
            );
        }
        None => print!("{rendered}"),
    }

    Ok(())
}

fn init_sentry(settings: &momoscan_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
