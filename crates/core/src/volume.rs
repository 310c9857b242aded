use crate::domain::BaselineMode;
use crate::market::MarketDataGateway;

/// Sessions of history a ratio needs for the given lookback and baseline.
pub fn required_sessions(lookback_days: usize, baseline: BaselineMode) -> usize {
    match baseline {
        BaselineMode::ExcludeLatest => lookback_days + 1,
        BaselineMode::IncludeLatest => lookback_days,
    }
}

/// Latest-session volume over the trailing average. `volumes` is newest first.
///
/// Returns 0 when the history is shorter than the lookback needs or the average is zero.
pub fn relative_volume_from_history(
    volumes: &[u64],
    lookback_days: usize,
    baseline: BaselineMode,
) -> f64 {
    if lookback_days == 0 || volumes.len() < required_sessions(lookback_days, baseline) {
        return 0.0;
    }

    let window = match baseline {
        BaselineMode::ExcludeLatest => &volumes[1..=lookback_days],
        BaselineMode::IncludeLatest => &volumes[..lookback_days],
    };

    let avg = window.iter().map(|v| *v as f64).sum::<f64>() / lookback_days as f64;
    if avg <= 0.0 || !avg.is_finite() {
        return 0.0;
    }

    volumes[0] as f64 / avg
}

/// Fetches history and computes the ratio. Any lookup failure yields 0.
pub async fn relative_volume(
    gateway: &dyn MarketDataGateway,
    symbol: &str,
    lookback_days: usize,
    baseline: BaselineMode,
) -> f64 {
    let sessions = required_sessions(lookback_days, baseline);
    match gateway.try_volume_history(symbol, sessions).await {
        Ok(volumes) => {
            let ratio = relative_volume_from_history(&volumes, lookback_days, baseline);
            if ratio == 0.0 {
                tracing::debug!(%symbol, sessions = volumes.len(), "relative volume unavailable");
            }
            ratio
        }
        Err(err) => {
            tracing::warn!(%symbol, error = %err, "volume history lookup failed; relative volume = 0");
            0.0
        }
    }
}
