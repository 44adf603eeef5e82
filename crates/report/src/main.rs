use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quotecast_core::domain::price::Horizon;
use quotecast_core::domain::report::AnalysisReport;
use quotecast_core::pipeline::{classify_error, AnalysisRequest, Pipeline, PipelineOutcome};
use quotecast_core::render::page::{render_page, PageView};
use quotecast_core::render::table::HistorySort;

#[derive(Debug, Parser)]
#[command(name = "quotecast_report")]
struct Args {
    /// Company ticker, e.g. PETR4 or AAPL.
    #[arg(long)]
    ticker: String,

    /// Days of history to keep and business days to forecast (30..=365).
    #[arg(long, default_value = "30", value_parser = parse_horizon)]
    horizon: Horizon,

    /// Where to write the HTML page.
    #[arg(long, default_value = "report.html")]
    out: PathBuf,

    /// Print the analysis as JSON to stdout instead of writing HTML.
    #[arg(long)]
    json: bool,

    /// History table sort column (date, open, high, low, close, volume).
    #[arg(long)]
    sort: Option<String>,

    /// History table sort direction (asc, desc).
    #[arg(long)]
    dir: Option<String>,
}

fn parse_horizon(s: &str) -> Result<Horizon, String> {
    let days: u32 = s.parse().map_err(|e| format!("{e}"))?;
    Horizon::new(days).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = quotecast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let request = AnalysisRequest::new(args.ticker.trim(), args.horizon);
    anyhow::ensure!(request.has_ticker(), "--ticker must not be blank");

    let pipeline = Pipeline::from_settings(&settings)?;
    let report = match pipeline.run(&request).await {
        Ok(report) => report,
        Err(err) => {
            if matches!(classify_error(&err), PipelineOutcome::Failed { .. }) {
                sentry_anyhow::capture_anyhow(&err);
            }
            tracing::error!(ticker = %request.ticker, error = %format!("{err:#}"), "report run failed");
            return Err(err);
        }
    };

    if args.json {
        println!("{}", to_json(&report)?);
        return Ok(());
    }

    let view = PageView {
        ticker: request.ticker.clone(),
        horizon: args.horizon,
        sort: HistorySort::from_query(args.sort.as_deref(), args.dir.as_deref()),
    };
    let html = render_html(&view, report);
    std::fs::write(&args.out, html)
        .with_context(|| format!("write report to {} failed", args.out.display()))?;

    tracing::info!(out = %args.out.display(), ticker = %request.ticker, "report written");
    Ok(())
}

fn to_json(report: &AnalysisReport) -> anyhow::Result<String> {
    serde_json::to_string_pretty(report).context("serialize report failed")
}

fn render_html(view: &PageView, report: AnalysisReport) -> String {
    render_page(view, &PipelineOutcome::Ready(Box::new(report)))
}

fn init_sentry(settings: &quotecast_core::config::Settings) -> Option<sentry::ClientInitGuard> {
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
    use chrono::{NaiveDate, Utc};
    use quotecast_core::domain::price::PriceBar;
    use quotecast_core::domain::report::{ForecastFrame, ForecastPoint, SummaryStats};

    fn report() -> AnalysisReport {
        let day = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        let history: Vec<PriceBar> = [(2, 10.0), (3, 12.0), (4, 11.0)]
            .into_iter()
            .map(|(d, close)| PriceBar {
                date: day(d),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 500,
            })
            .collect();
        let points = [2, 3, 4, 5, 6]
            .into_iter()
            .enumerate()
            .map(|(i, d)| ForecastPoint {
                ds: day(d),
                yhat: 10.0 + i as f64,
                yhat_lower: 9.0 + i as f64,
                yhat_upper: 11.0 + i as f64,
            })
            .collect();
        AnalysisReport {
            run_id: uuid::Uuid::nil(),
            generated_at: Utc::now(),
            ticker: "VALE3".to_string(),
            symbol: "VALE3.SA".to_string(),
            horizon: Horizon::default(),
            currency: Some("BRL".to_string()),
            summary: SummaryStats::from_bars(&history),
            history,
            forecast: ForecastFrame {
                history_len: 3,
                points,
            },
        }
    }

    #[test]
    fn parses_defaults() {
        let args = Args::try_parse_from(["quotecast_report", "--ticker", "PETR4"]).unwrap();
        assert_eq!(args.ticker, "PETR4");
        assert_eq!(args.horizon.days(), 30);
        assert_eq!(args.out, PathBuf::from("report.html"));
        assert!(!args.json);
    }

    #[test]
    fn rejects_out_of_range_horizon() {
        let err = Args::try_parse_from(["quotecast_report", "--ticker", "PETR4", "--horizon", "400"])
            .unwrap_err();
        assert!(err.to_string().contains("horizon must be"));
        assert!(Args::try_parse_from(["quotecast_report", "--ticker", "X", "--horizon", "ten"]).is_err());
    }

    #[test]
    fn json_output_carries_summary_and_forecast() {
        let json = to_json(&report()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["symbol"], "VALE3.SA");
        assert_eq!(v["summary"]["max"], 12.0);
        assert_eq!(v["forecast"]["points"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn html_output_is_the_dashboard_page() {
        let view = PageView {
            ticker: "VALE3".to_string(),
            horizon: Horizon::default(),
            sort: HistorySort::default(),
        };
        let html = render_html(&view, report());
        assert!(html.contains("Stock price table - VALE3.SA"));
        assert!(html.contains("R$ 12.00"));
        assert_eq!(html.matches("<svg").count(), 3);
    }
}
