use crate::config::Settings;
use crate::domain::price::PriceSeries;
use crate::ingest::types::ChartResponse;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;

const CHART_PATH: &str = "/v8/finance/chart";
const HISTORY_RANGE: &str = "1y";
const HISTORY_INTERVAL: &str = "1d";

#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// One year of daily bars for `symbol`. An unknown symbol yields an empty series, not an error.
    async fn fetch_daily_history(&self, symbol: &str) -> Result<PriceSeries>;
}

#[derive(Debug, Clone)]
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

enum Attempt {
    Done(PriceSeries),
    Retry(anyhow::Error),
}

impl YahooChartClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.market_data_timeout_secs))
            .user_agent(settings.market_data_user_agent.clone())
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url: settings.market_data_base_url.clone(),
            retries: settings.market_data_retries.max(1),
        })
    }

    fn url(&self, symbol: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url.trim_end_matches('/'),
            CHART_PATH,
            urlencoding::encode(symbol)
        )
    }

    async fn fetch_once(&self, symbol: &str) -> Result<Attempt> {
        let res = match self
            .http
            .get(self.url(symbol))
            .query(&[("range", HISTORY_RANGE), ("interval", HISTORY_INTERVAL)])
            .send()
            .await
        {
            Ok(res) => res,
            Err(err) => {
                return Ok(Attempt::Retry(
                    anyhow::Error::new(err).context("market data request failed"),
                ))
            }
        };

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Ok(Attempt::Retry(anyhow::anyhow!(
                "market data HTTP {status} for {symbol}"
            )));
        }

        let parsed = parse_chart_body(symbol, status, &text)?;
        Ok(Attempt::Done(parsed))
    }
}

#[async_trait::async_trait]
impl MarketDataClient for YahooChartClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_daily_history(&self, symbol: &str) -> Result<PriceSeries> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(symbol).await? {
                Attempt::Done(series) => {
                    tracing::debug!(symbol, bars = series.len(), "market data fetched");
                    return Ok(series);
                }
                Attempt::Retry(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, symbol, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Interprets a non-retryable chart response. "Not Found" is an empty series.
pub fn parse_chart_body(symbol: &str, status: StatusCode, text: &str) -> Result<PriceSeries> {
    let body = serde_json::from_str::<ChartResponse>(text);

    if status == StatusCode::NOT_FOUND {
        return Ok(PriceSeries::new(symbol, Vec::new()));
    }

    let body = body.with_context(|| format!("market data response is not a chart payload: {text}"))?;

    if let Some(err) = body.chart.error {
        if err.is_not_found() {
            return Ok(PriceSeries::new(symbol, Vec::new()));
        }
        anyhow::bail!(
            "market data error for {symbol}: {} ({})",
            err.code,
            err.description
        );
    }

    if !status.is_success() {
        anyhow::bail!("market data HTTP {status} for {symbol}: {text}");
    }

    match body.chart.result.and_then(|r| r.into_iter().next()) {
        Some(result) => result.into_series(symbol),
        None => Ok(PriceSeries::new(symbol, Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves the scripted responses in order, one per connection; the last one repeats.
    async fn scripted_server(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = responses[n.min(responses.len() - 1)].clone();

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(k) => request.extend_from_slice(&buf[..k]),
                    }
                }

                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}"), hits)
    }

    fn client_for(base_url: String, retries: u32) -> YahooChartClient {
        let settings = Settings {
            market_data_base_url: base_url,
            market_data_retries: retries,
            market_data_timeout_secs: 5,
            ..Settings::default()
        };
        YahooChartClient::from_settings(&settings).unwrap()
    }

    fn one_bar_chart() -> String {
        json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "PETR4.SA", "currency": "BRL", "gmtoffset": -10800},
                    "timestamp": [1767618000],
                    "indicators": {"quote": [{
                        "open": [30.0], "high": [31.0], "low": [29.5], "close": [30.5], "volume": [1000]
                    }]}
                }],
                "error": null
            }
        })
        .to_string()
    }

    fn unavailable() -> (u16, String) {
        (503, json!({"error": "unavailable"}).to_string())
    }

    #[tokio::test]
    async fn recovers_after_a_server_error() {
        let (base, hits) = scripted_server(vec![unavailable(), (200, one_bar_chart())]).await;
        let series = client_for(base, 3).fetch_daily_history("PETR4.SA").await.unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series.currency.as_deref(), Some("BRL"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_the_retry_budget() {
        let (base, hits) = scripted_server(vec![unavailable()]).await;
        let err = client_for(base, 2).fetch_daily_history("PETR4.SA").await.unwrap_err();

        assert!(err.to_string().contains("503"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let (base, hits) = scripted_server(vec![
            (429, json!({"error": "slow down"}).to_string()),
            (200, one_bar_chart()),
        ])
        .await;
        let series = client_for(base, 2).fetch_daily_history("PETR4.SA").await.unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn http_not_found_is_an_empty_series_without_retry() {
        let body = json!({
            "chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}
        })
        .to_string();
        let (base, hits) = scripted_server(vec![(404, body)]).await;
        let series = client_for(base, 3).fetch_daily_history("ZZZZINVALID").await.unwrap();

        assert!(series.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connection_refused_is_an_error_after_retries() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client_for(format!("http://{addr}"), 2)
            .fetch_daily_history("PETR4.SA")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("market data request failed"));
    }

    #[test]
    fn not_found_status_is_empty_series() {
        let body = json!({
            "chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}
        })
        .to_string();
        let series = parse_chart_body("ZZZZINVALID", StatusCode::NOT_FOUND, &body).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.symbol, "ZZZZINVALID");

        let series = parse_chart_body("ZZZZINVALID", StatusCode::NOT_FOUND, "<html>").unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn other_provider_errors_fail() {
        let body = json!({
            "chart": {"result": null, "error": {"code": "Bad Request", "description": "Invalid input"}}
        })
        .to_string();
        let err = parse_chart_body("AAPL", StatusCode::BAD_REQUEST, &body).unwrap_err();
        assert!(format!("{err:#}").contains("Bad Request"));
    }

    #[test]
    fn rejects_non_json_success() {
        assert!(parse_chart_body("AAPL", StatusCode::OK, "not json").is_err());
    }

    #[test]
    fn encodes_symbol_in_path() {
        let client = YahooChartClient::from_settings(&Settings::default()).unwrap();
        assert_eq!(
            client.url("^BVSP"),
            "https://query1.finance.yahoo.com/v8/finance/chart/%5EBVSP"
        );
    }
}
