use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::price::{Horizon, PriceBar};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ds: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Model output over the historical dates followed by the future business days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastFrame {
    pub history_len: usize,
    pub points: Vec<ForecastPoint>,
}

impl ForecastFrame {
    pub fn history(&self) -> &[ForecastPoint] {
        &self.points[..self.history_len.min(self.points.len())]
    }

    pub fn future(&self) -> &[ForecastPoint] {
        &self.points[self.history_len.min(self.points.len())..]
    }

    /// Last `n` rows, in order.
    pub fn tail(&self, n: usize) -> &[ForecastPoint] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub ticker: String,
    pub symbol: String,
    pub horizon: Horizon,
    pub currency: Option<String>,
    pub history: Vec<PriceBar>,
    pub summary: SummaryStats,
    pub forecast: ForecastFrame,
}
