use super::{fmt_currency, fmt_millions, fmt_percent, fmt_ratio, fmt_volume, ScanResult};
use crate::domain::{EnrichedCandidate, ScanOptions};
use crate::pipeline::ScanReport;
use crate::time::us_market;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const CSV_HEADER: [&str; 11] = [
    "symbol",
    "name",
    "price",
    "change_percent",
    "volume",
    "relative_volume",
    "float_millions",
    "gap_percent",
    "headline",
    "news_link",
    "timestamp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Table,
    Json,
    Csv,
    Watchlist,
    Html,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Table | Self::Watchlist => "text/plain; charset=utf-8",
            Self::Json => "application/json",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Table | Self::Watchlist => "txt",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Html => "html",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
            Self::Watchlist => write!(f, "watchlist"),
            Self::Html => write!(f, "html"),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" | "txt" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "watchlist" | "symbols" => Ok(Self::Watchlist),
            "html" | "cards" => Ok(Self::Html),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// Which optional columns a rendering surface shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub show_gap: bool,
    pub show_news_links: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_gap: true,
            show_news_links: true,
        }
    }
}

impl From<&ScanOptions> for DisplayOptions {
    fn from(o: &ScanOptions) -> Self {
        Self {
            show_gap: o.show_gap,
            show_news_links: o.show_news_links,
        }
    }
}

/// Columns actually shown: optional ones drop out when disabled or empty on every row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    gap: bool,
    headline: bool,
    link: bool,
}

impl Columns {
    fn for_result(result: &ScanResult, display: DisplayOptions) -> Self {
        Self {
            gap: display.show_gap && result.rows.iter().any(|r| r.gap_percent.is_some()),
            headline: result.rows.iter().any(|r| r.headline.is_some()),
            link: display.show_news_links && result.rows.iter().any(|r| r.news_link.is_some()),
        }
    }
}

/// Full rendering of a scan in `format`.
pub fn render_report(
    report: &ScanReport,
    format: ExportFormat,
    display: DisplayOptions,
) -> anyhow::Result<String> {
    Ok(match format {
        ExportFormat::Table => {
            let mut out = String::new();
            let _ = writeln!(out, "Momentum scan {}", report.scan_id);
            if let Some(d) = report.trading_date {
                let session = report
                    .session
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let _ = writeln!(out, "trading date {d} ({session})");
            }
            let _ = writeln!(out, "filters: {}", report.filters.summary());
            if let Some(warning) = report.warning() {
                let _ = writeln!(out, "warning: {warning}");
            }
            out.push('\n');
            out.push_str(&render_table(&report.result, display));
            out.push('\n');
            for stage in &report.funnel {
                let _ = writeln!(
                    out,
                    "{:<16} in {:>4}  out {:>4}  ({:.1}% dropped)",
                    stage.stage.to_string(),
                    stage.entered,
                    stage.eliminated,
                    stage.elimination_rate
                );
            }
            out
        }
        ExportFormat::Json => serde_json::to_string_pretty(report)?,
        ExportFormat::Csv => export_csv(&report.result)?,
        ExportFormat::Watchlist => watchlist(&report.result),
        ExportFormat::Html => render_html_cards(&report.result, display),
    })
}

pub fn render_table(result: &ScanResult, display: DisplayOptions) -> String {
    if result.is_empty() {
        return "No qualifying stocks found.\n".to_string();
    }

    let cols = Columns::for_result(result, display);
    let time = display_time(result.generated_at);

    let mut header = vec!["Symbol", "Price", "% Change", "Volume", "RVOL", "Float (M)"];
    if cols.gap {
        header.push("Gap %");
    }
    header.push("Time");
    if cols.headline {
        header.push("Headline");
    }
    if cols.link {
        header.push("News");
    }

    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|r| {
            let mut cells = vec![
                r.symbol().to_string(),
                fmt_currency(r.candidate.price),
                fmt_percent(r.change_percent()),
                fmt_volume(r.candidate.volume),
                fmt_ratio(r.relative_volume),
                fmt_millions(r.float_millions),
            ];
            if cols.gap {
                cells.push(r.gap_percent.map(fmt_percent).unwrap_or_default());
            }
            cells.push(time.clone());
            if cols.headline {
                cells.push(r.headline.clone().unwrap_or_default());
            }
            if cols.link {
                cells.push(r.news_link.clone().unwrap_or_default());
            }
            cells
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, header.iter().map(|h| h.to_string()), &widths);
    push_line(&mut out, widths.iter().map(|w| "-".repeat(*w)), &widths);
    for row in rows {
        push_line(&mut out, row.into_iter(), &widths);
    }
    out
}

fn push_line(out: &mut String, cells: impl Iterator<Item = String>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}", w = *w))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

/// Self-contained HTML page with one card per candidate.
pub fn render_html_cards(result: &ScanResult, display: DisplayOptions) -> String {
    let cols = Columns::for_result(result, display);
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Momentum Scanner</title>\n<style>\n");
    out.push_str(
        "body{font-family:system-ui,sans-serif;background:#0e1117;color:#e6e6e6;margin:24px}\n\
         .grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(240px,1fr));gap:16px}\n\
         .card{background:#161b22;border:1px solid #30363d;border-radius:10px;padding:14px}\n\
         .symbol{font-size:1.4em;font-weight:700}\n\
         .name{color:#8b949e;font-size:.85em}\n\
         .change{font-size:1.2em;font-weight:600}\n\
         .up{color:#3fb950}.down{color:#f85149}\n\
         dl{display:grid;grid-template-columns:auto 1fr;gap:2px 10px;margin:10px 0 0}\n\
         dt{color:#8b949e}dd{margin:0;text-align:right}\n\
         .headline{margin-top:10px;font-size:.9em}\n\
         a{color:#58a6ff}\n",
    );
    out.push_str("</style>\n</head>\n<body>\n<h1>Momentum Scanner</h1>\n");
    let _ = writeln!(
        out,
        "<p class=\"meta\">{} candidates &middot; {}</p>",
        result.len(),
        escape_html(&display_time(result.generated_at))
    );

    if result.is_empty() {
        out.push_str("<p>No qualifying stocks found.</p>\n</body>\n</html>\n");
        return out;
    }

    out.push_str("<div class=\"grid\">\n");
    for r in &result.rows {
        card(&mut out, r, cols);
    }
    out.push_str("</div>\n</body>\n</html>\n");
    out
}

fn card(out: &mut String, r: &EnrichedCandidate, cols: Columns) {
    let direction = if r.change_percent() >= 0.0 { "up" } else { "down" };

    out.push_str("<div class=\"card\">\n");
    let _ = writeln!(out, "<div class=\"symbol\">{}</div>", escape_html(r.symbol()));
    if let Some(name) = &r.candidate.name {
        let _ = writeln!(out, "<div class=\"name\">{}</div>", escape_html(name));
    }
    let _ = writeln!(
        out,
        "<div class=\"change {direction}\">{}</div>",
        fmt_percent(r.change_percent())
    );

    out.push_str("<dl>\n");
    let mut item = |label: &str, value: String| {
        let _ = writeln!(out, "<dt>{label}</dt><dd>{}</dd>", escape_html(&value));
    };
    item("Price", fmt_currency(r.candidate.price));
    item("Volume", fmt_volume(r.candidate.volume));
    item("RVOL", fmt_ratio(r.relative_volume));
    item("Float", fmt_millions(r.float_millions));
    if cols.gap {
        item("Gap", r.gap_percent.map(fmt_percent).unwrap_or_default());
    }
    out.push_str("</dl>\n");

    if cols.headline {
        if let Some(h) = &r.headline {
            let _ = writeln!(out, "<div class=\"headline\">{}</div>", escape_html(h));
        }
    }
    if cols.link {
        if let Some(link) = &r.news_link {
            let _ = writeln!(
                out,
                "<div class=\"headline\"><a href=\"{}\" target=\"_blank\" rel=\"noopener\">News</a></div>",
                escape_html(link)
            );
        }
    }
    out.push_str("</div>\n");
}

/// Newline-terminated symbol list, in result order.
pub fn watchlist(result: &ScanResult) -> String {
    result.symbols().map(|s| format!("{s}\n")).collect()
}

/// Row export of every field. Identical output no matter which surface asks for it.
pub fn export_csv(result: &ScanResult) -> anyhow::Result<String> {
    let timestamp = result.generated_at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for r in &result.rows {
        let c = &r.candidate;
        let float = if r.float_known() {
            format!("{:.4}", r.float_millions)
        } else {
            String::new()
        };
        writer.write_record([
            c.symbol.clone(),
            c.name.clone().unwrap_or_default(),
            c.price.to_string(),
            c.change_percent.to_string(),
            c.volume.to_string(),
            format!("{:.4}", r.relative_volume),
            float,
            r.gap_percent.map(|g| g.to_string()).unwrap_or_default(),
            r.headline.clone().unwrap_or_default(),
            r.news_link.clone().unwrap_or_default(),
            timestamp.clone(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to finish csv export: {}", err.error()))?;
    String::from_utf8(bytes).context("csv export is not valid UTF-8")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn display_time(at: DateTime<Utc>) -> String {
    match us_market::to_eastern(at) {
        Ok(et) => et.format("%Y-%m-%d %H:%M:%S ET").to_string(),
        Err(_) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::project;
    use crate::projection::tests::{at, row};

    fn sample() -> ScanResult {
        let mut a = row("AAA", 15.0, 0);
        a.gap_percent = Some(12.5);
        a.headline = Some("AAA, Inc. \"beats\" estimates".to_string());
        a.news_link = Some("https://www.google.com/search?q=AAA+stock+news".to_string());
        let mut b = row("BBB", 22.0, 1);
        b.float_millions = crate::domain::FLOAT_UNAVAILABLE;
        project(vec![a, b], at())
    }

    #[test]
    fn watchlist_is_newline_delimited() {
        assert_eq!(watchlist(&sample()), "BBB\nAAA\n");
        assert_eq!(watchlist(&project(vec![], at())), "");
    }

    #[test]
    fn csv_has_header_and_quotes_special_fields() {
        let csv = export_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "symbol,name,price,change_percent,volume,relative_volume,float_millions,gap_percent,headline,news_link,timestamp"
        );
        assert_eq!(
            lines[1],
            "BBB,,5,22,1250000,3.5000,,,,,2026-01-05T15:30:00Z"
        );
        assert_eq!(
            lines[2],
            "AAA,,5,15,1250000,3.5000,12.3450,12.5,\"AAA, Inc. \"\"beats\"\" estimates\",https://www.google.com/search?q=AAA+stock+news,2026-01-05T15:30:00Z"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn csv_is_independent_of_display_options() {
        let r = sample();
        let first = export_csv(&r).unwrap();
        let _ = render_table(
            &r,
            DisplayOptions {
                show_gap: false,
                show_news_links: false,
            },
        );
        assert_eq!(first, export_csv(&r).unwrap());
    }

    #[test]
    fn table_hides_disabled_and_empty_columns() {
        let r = sample();
        let full = render_table(&r, DisplayOptions::default());
        assert!(full.starts_with("Symbol"));
        assert!(full.contains("Gap %"));
        assert!(full.contains("News"));
        assert!(full.contains("+12.50%"));
        assert!(full.contains("n/a"));
        assert!(full.contains("10:30:00 ET"));

        let bare = render_table(
            &r,
            DisplayOptions {
                show_gap: false,
                show_news_links: false,
            },
        );
        assert!(!bare.contains("Gap %"));
        assert!(!bare.contains("News"));

        let mut plain = row("CCC", 11.0, 0);
        plain.float_millions = 3.0;
        let no_optional = render_table(&project(vec![plain], at()), DisplayOptions::default());
        assert!(!no_optional.contains("Gap %"));
        assert!(!no_optional.contains("Headline"));
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(
            render_table(&project(vec![], at()), DisplayOptions::default()),
            "No qualifying stocks found.\n"
        );
    }

    #[test]
    fn html_cards_escape_text() {
        let html = render_html_cards(&sample(), DisplayOptions::default());
        assert!(html.contains("<div class=\"symbol\">BBB</div>"));
        assert!(html.contains("AAA, Inc. &quot;beats&quot; estimates"));
        assert!(html.contains("class=\"change up\""));
        assert!(html.find("BBB").unwrap() < html.find(">AAA<").unwrap());
    }

    #[test]
    fn parses_export_formats() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("cards".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Watchlist.to_string(), "watchlist");
    }
}
