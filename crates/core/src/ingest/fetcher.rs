use anyhow::{ensure, Result};

use crate::domain::price::PriceSeries;
use crate::ingest::error::TickerNotFound;
use crate::ingest::provider::MarketDataClient;

#[derive(Debug, Clone)]
pub struct ResolvedSeries {
    pub ticker: String,
    pub symbol: String,
    pub series: PriceSeries,
}

pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// The bare ticker first, then one candidate per configured suffix the ticker doesn't already carry.
pub fn candidate_symbols(ticker: &str, suffixes: &[String]) -> Vec<String> {
    let mut out = vec![ticker.to_string()];
    for suffix in suffixes {
        let suffix = suffix.to_ascii_uppercase();
        if ticker.ends_with(&suffix) {
            continue;
        }
        let candidate = format!("{ticker}{suffix}");
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

pub async fn fetch_with_fallback(
    client: &dyn MarketDataClient,
    raw_ticker: &str,
    suffixes: &[String],
) -> Result<ResolvedSeries> {
    let ticker = normalize_ticker(raw_ticker);
    ensure!(!ticker.is_empty(), "ticker must be non-empty");

    let candidates = candidate_symbols(&ticker, suffixes);
    for (idx, symbol) in candidates.iter().enumerate() {
        let mut series = client.fetch_daily_history(symbol).await?;
        if series.is_empty() {
            tracing::info!(
                %ticker,
                %symbol,
                provider = client.provider_name(),
                "no price history for symbol"
            );
            continue;
        }

        if idx > 0 {
            tracing::info!(%ticker, %symbol, "resolved ticker via suffix fallback");
        }
        series.symbol = symbol.clone();
        return Ok(ResolvedSeries {
            ticker,
            symbol: symbol.clone(),
            series,
        });
    }

    Err(TickerNotFound {
        ticker,
        tried: candidates,
    }
    .into())
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use crate::domain::price::PriceBar;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory provider keyed by symbol; records every lookup.
    #[derive(Default)]
    pub struct StaticMarketData {
        pub series: HashMap<String, Vec<PriceBar>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl StaticMarketData {
        pub fn with(symbol: &str, bars: Vec<PriceBar>) -> Self {
            let mut out = Self::default();
            out.series.insert(symbol.to_string(), bars);
            out
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl MarketDataClient for StaticMarketData {
        fn provider_name(&self) -> &'static str {
            "static"
        }

        async fn fetch_daily_history(&self, symbol: &str) -> Result<PriceSeries> {
            self.calls.lock().unwrap().push(symbol.to_string());
            let bars = self.series.get(symbol).cloned().unwrap_or_default();
            Ok(PriceSeries::new(symbol, bars))
        }
    }
}
