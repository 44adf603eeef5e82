use anyhow::Result;
use serde::Deserialize;

use crate::domain::price::{PriceBar, PriceSeries};
use crate::time::normalize::MarketTimestamp;

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartEnvelope {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

impl ChartError {
    pub fn is_not_found(&self) -> bool {
        self.code.eq_ignore_ascii_case("Not Found")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    // Absent when the range holds no trading days.
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub exchange_timezone_name: Option<String>,
    #[serde(default, rename = "gmtoffset")]
    pub gmt_offset: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteColumns>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteColumns {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

impl ChartResult {
    /// Converts columnar provider data to chronological bars. Offsets are stripped here, once.
    pub fn into_series(self, requested_symbol: &str) -> Result<PriceSeries> {
        let offset = self.meta.gmt_offset;
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();

        let mut bars: Vec<PriceBar> = Vec::with_capacity(self.timestamp.len());
        for (i, ts) in self.timestamp.iter().copied().enumerate() {
            let (Some(open), Some(close)) = (column(&quote.open, i), column(&quote.close, i)) else {
                continue;
            };
            let high = column(&quote.high, i).unwrap_or(open.max(close));
            let low = column(&quote.low, i).unwrap_or(open.min(close));
            let volume = column(&quote.volume, i).map(|v| v.max(0.0) as u64).unwrap_or(0);

            let date = MarketTimestamp::from_epoch(ts, offset)?.local_date();

            // Intraday refreshes can repeat the last session; keep the latest row per date.
            if let Some(last) = bars.last_mut() {
                if last.date == date {
                    *last = PriceBar { date, open, high, low, close, volume };
                    continue;
                }
            }
            bars.push(PriceBar { date, open, high, low, close, volume });
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);

        Ok(PriceSeries {
            symbol: self
                .meta
                .symbol
                .unwrap_or_else(|| requested_symbol.to_string()),
            currency: self.meta.currency,
            exchange_timezone: self.meta.exchange_timezone_name,
            bars,
        })
    }
}

fn column(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten().filter(|v| v.is_finite())
}
