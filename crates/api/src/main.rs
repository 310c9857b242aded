use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use momoscan_core::domain::{FilterConfig, ScanOptions};
use momoscan_core::market::{fmp::FmpClient, MarketDataGateway};
use momoscan_core::news::NewsLookup;
use momoscan_core::pipeline::{ScanPipeline, ScanReport};
use momoscan_core::projection::{render_report, DisplayOptions, ExportFormat};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SCAN_WARNING: HeaderName = HeaderName::from_static("x-scan-warning");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = momoscan_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let filters = FilterConfig::from_env();
    let options = ScanOptions::from_env();

    let gateway: Arc<dyn MarketDataGateway> = match FmpClient::from_settings(&settings) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "market data gateway unavailable");
            return Err(e);
        }
    };
    let news = momoscan_core::news::lookup_from_settings(&settings, filters.require_news)?;

    // Fail at startup, not per request.
    ScanPipeline::new(gateway.clone(), news.clone(), filters.clone(), options.clone())?;

    let state = AppState {
        gateway,
        news,
        filters,
        options,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/scan", get(scan_json))
        .route("/scan/table", get(scan_table))
        .route("/scan/cards", get(scan_cards))
        .route("/scan/watchlist", get(scan_watchlist))
        .route("/scan/export.csv", get(scan_csv))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    gateway: Arc<dyn MarketDataGateway>,
    news: Option<Arc<dyn NewsLookup>>,
    filters: FilterConfig,
    options: ScanOptions,
}

impl AppState {
    /// One fresh scan with its own cache.
    async fn scan(&self) -> Result<ScanReport, StatusCode> {
        let pipeline = ScanPipeline::new(
            self.gateway.clone(),
            self.news.clone(),
            self.filters.clone(),
            self.options.clone(),
        )
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        let report = pipeline.run().await;
        if let Some(warning) = report.warning() {
            sentry::capture_message(&warning, sentry::Level::Warning);
        }
        Ok(report)
    }

    fn display(&self) -> DisplayOptions {
        DisplayOptions::from(&self.options)
    }
}

async fn scan_json(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let report = state.scan().await?;
    let headers = warning_headers(&report);
    Ok((headers, Json(report)).into_response())
}

async fn scan_table(State(state): State<AppState>) -> Result<Response, StatusCode> {
    rendered(&state, ExportFormat::Table).await
}

async fn scan_cards(State(state): State<AppState>) -> Result<Response, StatusCode> {
    rendered(&state, ExportFormat::Html).await
}

async fn scan_watchlist(State(state): State<AppState>) -> Result<Response, StatusCode> {
    rendered(&state, ExportFormat::Watchlist).await
}

async fn scan_csv(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let mut response = rendered(&state, ExportFormat::Csv).await?;
    let disposition = format!(
        "attachment; filename=\"momentum-{}.{}\"",
        file_stamp(),
        ExportFormat::Csv.extension()
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

async fn rendered(state: &AppState, format: ExportFormat) -> Result<Response, StatusCode> {
    let report = state.scan().await?;
    let body = render_report(&report, format, state.display()).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut headers = warning_headers(&report);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    Ok((headers, body).into_response())
}

fn warning_headers(report: &ScanReport) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = report.warning().as_deref().and_then(warning_value) {
        headers.insert(SCAN_WARNING, value);
    }
    headers
}

/// Header-safe form of a warning: printable ASCII only, bounded length.
fn warning_value(warning: &str) -> Option<HeaderValue> {
    let cleaned: String = warning
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '?' })
        .take(200)
        .collect();
    HeaderValue::from_str(cleaned.trim()).ok()
}

fn file_stamp() -> String {
    momoscan_core::time::us_market::to_eastern(chrono::Utc::now())
        .map(|et| et.format("%Y%m%d-%H%M").to_string())
        .unwrap_or_else(|_| chrono::Utc::now().format("%Y%m%d-%H%M").to_string())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_header_is_printable_ascii() {
        let value = warning_value("no market data this scan: http 503 \u{2013} down\n").unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "no market data this scan: http 503 ? down?"
        );
    }

    #[test]
    fn long_warnings_are_truncated() {
        let long = "x".repeat(1000);
        assert_eq!(warning_value(&long).unwrap().len(), 200);
    }
}
