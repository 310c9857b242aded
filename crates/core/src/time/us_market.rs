use anyhow::Context;
use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const EST_OFFSET_SECS: i32 = 5 * 3600;
const EDT_OFFSET_SECS: i32 = 4 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSession {
    PreMarket,
    Regular,
    AfterHours,
    Closed,
}

impl std::fmt::Display for MarketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreMarket => write!(f, "pre-market"),
            Self::Regular => write!(f, "regular"),
            Self::AfterHours => write!(f, "after-hours"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// US Eastern offset in effect at `now_utc`.
///
/// DST runs from the second Sunday of March, 02:00 EST, to the first Sunday of
/// November, 02:00 EDT.
pub fn eastern_offset(now_utc: DateTime<Utc>) -> anyhow::Result<FixedOffset> {
    let year = now_utc.year();
    let start = nth_sunday(year, 3, 2)
        .and_then(|d| d.and_hms_opt(2 + 5, 0, 0))
        .context("invalid DST start")?
        .and_utc();
    let end = nth_sunday(year, 11, 1)
        .and_then(|d| d.and_hms_opt(2 + 4, 0, 0))
        .context("invalid DST end")?
        .and_utc();

    let secs = if now_utc >= start && now_utc < end {
        EDT_OFFSET_SECS
    } else {
        EST_OFFSET_SECS
    };
    FixedOffset::west_opt(secs).context("invalid ET offset")
}

pub fn session_at(now_utc: DateTime<Utc>) -> anyhow::Result<MarketSession> {
    let et = now_utc.with_timezone(&eastern_offset(now_utc)?);
    let date = et.date_naive();
    if is_weekend(date) || configured_holidays().contains(&date) {
        return Ok(MarketSession::Closed);
    }

    let t = et.time();
    let session = if t < hm(4, 0) {
        MarketSession::Closed
    } else if t < hm(9, 30) {
        MarketSession::PreMarket
    } else if t < hm(16, 0) {
        MarketSession::Regular
    } else if t < hm(20, 0) {
        MarketSession::AfterHours
    } else {
        MarketSession::Closed
    };
    Ok(session)
}

/// Trading date a scan at `now_utc` reports on: the ET date, or the previous business day
/// before pre-market opens, rolled back over weekends and holidays.
pub fn trading_date(now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    let et = now_utc.with_timezone(&eastern_offset(now_utc)?);
    let mut date = et.date_naive();
    if et.time() < hm(4, 0) {
        date = date - Duration::days(1);
    }

    let holidays = configured_holidays();
    while is_weekend(date) || holidays.contains(&date) {
        date = date - Duration::days(1);
    }
    Ok(date)
}

/// Wall-clock time in ET, for display.
pub fn to_eastern(now_utc: DateTime<Utc>) -> anyhow::Result<DateTime<FixedOffset>> {
    let offset = eastern_offset(now_utc)?;
    Ok(offset.from_utc_datetime(&now_utc.naive_utc()))
}

fn nth_sunday(year: i32, month: u32, n: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let to_sunday = (7 - first.weekday().num_days_from_sunday()) % 7;
    first.checked_add_days(Days::new(u64::from(to_sunday + 7 * (n - 1))))
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn configured_holidays() -> HashSet<NaiveDate> {
    // Fixed-date closures only. Extend via US_MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD".
    let mut out = HashSet::new();
    let years = [2024, 2025, 2026, 2027, 2028, 2029, 2030];
    for y in years {
        for (m, d) in [(1, 1), (6, 19), (7, 4), (12, 25)] {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                out.insert(date);
            }
        }
    }

    if let Ok(s) = std::env::var("US_MARKET_HOLIDAYS") {
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Ok(d) = NaiveDate::parse_from_str(part, "%Y-%m-%d") {
                out.insert(d);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn finds_dst_boundaries() {
        assert_eq!(nth_sunday(2026, 3, 2), NaiveDate::from_ymd_opt(2026, 3, 8));
        assert_eq!(nth_sunday(2026, 11, 1), NaiveDate::from_ymd_opt(2026, 11, 1));
    }

    #[test]
    fn regular_session_in_winter() {
        // 2026-01-05 15:00 UTC = 10:00 EST (Monday)
        let now = utc(2026, 1, 5, 15, 0);
        assert_eq!(session_at(now).unwrap(), MarketSession::Regular);
        assert_eq!(
            trading_date(now).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
        );
    }

    #[test]
    fn applies_daylight_saving_after_march_switch() {
        // 2026-03-09 13:45 UTC = 09:45 EDT (would be 08:45 EST)
        let now = utc(2026, 3, 9, 13, 45);
        assert_eq!(eastern_offset(now).unwrap().utc_minus_local(), 4 * 3600);
        assert_eq!(session_at(now).unwrap(), MarketSession::Regular);
    }

    #[test]
    fn falls_back_in_november() {
        // 2026-11-02 14:00 UTC = 09:00 EST
        let now = utc(2026, 11, 2, 14, 0);
        assert_eq!(session_at(now).unwrap(), MarketSession::PreMarket);
    }

    #[test]
    fn weekend_rolls_back_to_friday() {
        // Saturday 2026-01-03
        let now = utc(2026, 1, 3, 15, 0);
        assert_eq!(session_at(now).unwrap(), MarketSession::Closed);
        assert_eq!(
            trading_date(now).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()
        );
    }

    #[test]
    fn before_pre_market_uses_previous_business_day() {
        // 2026-01-05 06:00 UTC = 01:00 EST Monday; Sunday rolls back to Friday.
        let now = utc(2026, 1, 5, 6, 0);
        assert_eq!(
            trading_date(now).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()
        );
    }

    #[test]
    fn new_year_is_closed() {
        let now = utc(2026, 1, 1, 15, 0);
        assert_eq!(session_at(now).unwrap(), MarketSession::Closed);
        assert_eq!(
            trading_date(now).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
    }
}
