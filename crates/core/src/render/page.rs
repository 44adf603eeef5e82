use anyhow::Result;
use std::fmt::Write as _;

use crate::domain::price::Horizon;
use crate::domain::report::AnalysisReport;
use crate::pipeline::PipelineOutcome;
use crate::render::charts::{forecast_chart, history_chart, overlay_chart};
use crate::render::format::{escape_html, format_amount, format_currency};
use crate::render::table::{sorted_rows, HistorySort, SortDir, SortKey};

const PAGE_TITLE: &str = "Stock analysis";
const PROMPT_MESSAGE: &str = "Enter a company ticker in the sidebar to start the analysis.";

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; color: #1f2933; background: #f5f7fa; }
.layout { display: grid; grid-template-columns: 260px 1fr; min-height: 100vh; }
aside { background: #fff; border-right: 1px solid #d9e2ec; padding: 24px; }
aside h2 { font-size: 1rem; border-bottom: 3px solid; border-image: linear-gradient(90deg, #e63946, #f4a261, #2a9d8f, #457b9d) 1; padding-bottom: 6px; }
aside input[type=text] { width: 100%; box-sizing: border-box; padding: 6px; }
aside input[type=range] { width: 100%; }
main { padding: 24px 32px; }
.cards { display: grid; grid-template-columns: repeat(3, 1fr); gap: 16px; }
.card, .panel { background: #fff; border: 1px solid #d9e2ec; border-radius: 8px; padding: 16px; }
.card .value { font-size: 1.6rem; font-weight: 600; }
.grid2 { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; margin-top: 16px; }
.info { background: #e0f2fe; border-radius: 6px; padding: 8px 12px; margin-bottom: 8px; }
.alert { border-radius: 6px; padding: 12px 16px; }
.alert.warning { background: #fff7e6; border: 1px solid #f4a261; }
.alert.error { background: #fdecea; border: 1px solid #e63946; }
.scroll { max-height: 380px; overflow: auto; }
table { border-collapse: collapse; width: 100%; font-size: 0.85rem; }
th, td { padding: 4px 8px; border-bottom: 1px solid #e4e7eb; text-align: right; }
th:first-child, td:first-child { text-align: left; }
th a { color: inherit; text-decoration: none; }
svg { max-width: 100%; height: auto; }
circle.tip { fill: transparent; pointer-events: all; }
circle.tip:hover { fill: #1f2933; fill-opacity: 0.5; }
"#;

/// Input state echoed back into the sidebar and the table's sort links.
#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub ticker: String,
    pub horizon: Horizon,
    pub sort: HistorySort,
}

pub fn render_page(view: &PageView, outcome: &PipelineOutcome) -> String {
    let content = match outcome {
        PipelineOutcome::Prompt => alert("warning", PROMPT_MESSAGE),
        PipelineOutcome::NotFound { message } => alert("warning", message),
        PipelineOutcome::Failed { message } => {
            alert("error", &format!("An error occurred: {message}"))
        }
        PipelineOutcome::Ready(report) => match render_report(view, report) {
            Ok(html) => html,
            Err(err) => {
                tracing::error!(error = %err, "rendering analysis failed");
                alert("error", &format!("An error occurred: {err:#}"))
            }
        },
    };

    let mut out = String::with_capacity(content.len() + 4096);
    let _ = write!(
        out,
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
<div class="layout">
{sidebar}
<main>
<h1>{title}</h1>
{content}
</main>
</div>
</body>
</html>
"#,
        title = PAGE_TITLE,
        style = STYLE,
        sidebar = sidebar(view),
    );
    out
}

fn sidebar(view: &PageView) -> String {
    let horizon = view.horizon;
    format!(
        r#"<aside>
<form method="get" action="/">
<h2>Company ticker</h2>
<label for="ticker">Ticker</label>
<input type="text" id="ticker" name="ticker" value="{ticker}" placeholder="e.g. PETR4, AAPL" autofocus>
<h2>Forecast</h2>
<label for="horizon">Forecast days</label>
<input type="range" id="horizon" name="horizon" min="{min}" max="{max}" value="{horizon}" oninput="this.nextElementSibling.value = this.value">
<output>{horizon}</output>
<p><button type="submit">Analyze</button></p>
</form>
</aside>"#,
        ticker = escape_html(&view.ticker),
        min = Horizon::MIN,
        max = Horizon::MAX,
    )
}

fn alert(kind: &str, message: &str) -> String {
    format!(
        r#"<div class="alert {kind}">{}</div>"#,
        escape_html(message)
    )
}

fn render_report(view: &PageView, report: &AnalysisReport) -> Result<String> {
    let symbol = escape_html(&report.symbol);
    let currency = report.currency.as_deref();

    let history_svg = history_chart(&report.history)?;
    let forecast_svg = forecast_chart(&report.forecast)?;
    let overlay_svg = overlay_chart(&report.history, &report.forecast)?;

    let mut out = String::new();

    out.push_str(r#"<section class="cards">"#);
    for (title, value) in [
        ("Max close", report.summary.max),
        ("Min close", report.summary.min),
        ("Average close", report.summary.mean),
    ] {
        let _ = write!(
            out,
            r#"<div class="card"><div class="info">{title}</div><div class="value">{}</div></div>"#,
            escape_html(&format_currency(value, currency))
        );
    }
    out.push_str("</section>");

    let _ = write!(
        out,
        r#"<section class="grid2">
<div class="panel"><div class="info">Stock price table - {symbol}</div><div class="scroll">{table}</div></div>
<div class="panel"><div class="info">Stock price chart - {symbol}</div>{history_svg}</div>
</section>
<section class="grid2">
<div class="panel"><div class="info">Forecast table - {symbol}</div><div class="scroll">{forecast_table}</div></div>
<div class="panel"><div class="info">Forecast chart - {symbol}</div>{forecast_svg}</div>
</section>
<section class="grid2">
<div class="panel"><div class="info">Closing prices vs forecast - {symbol}</div>{overlay_svg}</div>
</section>"#,
        table = history_table(view, report),
        forecast_table = forecast_table(report),
    );

    Ok(out)
}

fn history_table(view: &PageView, report: &AnalysisReport) -> String {
    let mut out = String::from("<table><thead><tr>");
    for key in SortKey::ALL {
        let next = view.sort.toggle(key);
        let marker = match (view.sort.key == key, view.sort.dir) {
            (true, SortDir::Asc) => " ▲",
            (true, SortDir::Desc) => " ▼",
            (false, _) => "",
        };
        let href = format!(
            "?ticker={}&horizon={}&sort={}&dir={}",
            urlencoding::encode(&view.ticker),
            view.horizon,
            next.key.as_str(),
            next.dir.as_str()
        );
        let _ = write!(
            out,
            r#"<th><a href="{}">{}{marker}</a></th>"#,
            escape_html(&href),
            key.label()
        );
    }
    out.push_str("</tr></thead><tbody>");

    for bar in sorted_rows(&report.history, view.sort) {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            bar.date.format("%Y-%m-%d"),
            format_amount(bar.open),
            format_amount(bar.high),
            format_amount(bar.low),
            format_amount(bar.close),
            bar.volume
        );
    }
    out.push_str("</tbody></table>");
    out
}

fn forecast_table(report: &AnalysisReport) -> String {
    let mut out = String::from(
        "<table><thead><tr><th>ds</th><th>yhat</th><th>yhat_lower</th><th>yhat_upper</th></tr></thead><tbody>",
    );
    for p in report.forecast.tail(report.horizon.days()) {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td></tr>",
            p.ds.format("%Y-%m-%d"),
            p.yhat,
            p.yhat_lower,
            p.yhat_upper
        );
    }
    out.push_str("</tbody></table>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::trim::trailing;
    use crate::domain::price::fixtures::weekday_bars;
    use crate::domain::report::{ForecastFrame, ForecastPoint, SummaryStats};
    use crate::time::business_days::extend_index;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn report() -> AnalysisReport {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let bars = weekday_bars(start, 40, |i| 1000.0 + i as f64 * 10.0);
        let horizon = Horizon::new(30).unwrap();
        let history = trailing(&bars, horizon.days()).to_vec();
        let dates: Vec<NaiveDate> = history.iter().map(|b| b.date).collect();
        let points = extend_index(&dates, horizon.days())
            .into_iter()
            .map(|ds| ForecastPoint {
                ds,
                yhat: 1200.0,
                yhat_lower: 1100.0,
                yhat_upper: 1300.0,
            })
            .collect();

        AnalysisReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            ticker: "PETR4".to_string(),
            symbol: "PETR4.SA".to_string(),
            horizon,
            currency: Some("BRL".to_string()),
            summary: SummaryStats::from_bars(&history),
            history,
            forecast: ForecastFrame {
                history_len: dates.len(),
                points,
            },
        }
    }

    fn view() -> PageView {
        PageView {
            ticker: "PETR4".to_string(),
            horizon: Horizon::new(30).unwrap(),
            sort: HistorySort::default(),
        }
    }

    #[test]
    fn prompt_state_renders_no_charts() {
        let html = render_page(&PageView::default(), &PipelineOutcome::Prompt);
        assert!(html.contains(PROMPT_MESSAGE));
        assert!(!html.contains("<svg"));
        assert!(html.contains(r#"value="30""#));
    }

    #[test]
    fn not_found_state_shows_message_only() {
        let outcome = PipelineOutcome::NotFound {
            message: "ticker not found: no price history for ZZZZINVALID".to_string(),
        };
        let html = render_page(&view(), &outcome);
        assert!(html.contains("ticker not found"));
        assert!(!html.contains("<svg"));
        assert!(!html.contains("<table"));
    }

    #[test]
    fn failure_state_includes_cause() {
        let outcome = PipelineOutcome::Failed {
            message: "market data HTTP 503".to_string(),
        };
        let html = render_page(&view(), &outcome);
        assert!(html.contains("An error occurred: market data HTTP 503"));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn ready_state_renders_cards_tables_and_charts() {
        let report = report();
        let html = render_page(&view(), &PipelineOutcome::Ready(Box::new(report.clone())));

        // 40 bars at 1000 + 10i, last 30 kept: closes 1100..=1390.
        assert!(html.contains("R$ 1,390.00"));
        assert!(html.contains("R$ 1,100.00"));
        assert!(html.contains("R$ 1,245.00"));
        assert_eq!(html.matches("<svg").count(), 3);
        assert!(html.contains("Forecast table - PETR4.SA"));
        // 30 history rows + 30 forecast rows.
        assert_eq!(html.matches("<tr><td>").count(), 60);
        let last_future = report.forecast.points.last().unwrap().ds.format("%Y-%m-%d").to_string();
        assert!(html.contains(&last_future));
    }

    #[test]
    fn sort_links_toggle_the_active_column() {
        let html = history_table(&view(), &report());
        assert!(html.contains("?ticker=PETR4&amp;horizon=30&amp;sort=date&amp;dir=desc"));
        assert!(html.contains("?ticker=PETR4&amp;horizon=30&amp;sort=close&amp;dir=asc"));
        assert!(html.contains("Date ▲"));
    }

    #[test]
    fn echoes_ticker_escaped() {
        let view = PageView {
            ticker: r#""><script>"#.to_string(),
            ..PageView::default()
        };
        let html = render_page(&view, &PipelineOutcome::Prompt);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&quot;&gt;&lt;script&gt;"));
    }
}
