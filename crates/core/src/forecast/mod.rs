pub mod prophet;

use anyhow::{ensure, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeSet;

use crate::domain::price::{Horizon, PriceBar};
use crate::domain::report::{ForecastFrame, ForecastPoint};
use crate::time::business_days::extend_index;

/// Closing prices in the `(ds, y)` shape the model trains on. `ds` is always timezone-naive.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingFrame {
    pub ds: Vec<NaiveDateTime>,
    pub y: Vec<f64>,
}

impl TrainingFrame {
    pub fn from_bars(bars: &[PriceBar]) -> Self {
        let (ds, y): (Vec<NaiveDateTime>, Vec<f64>) = bars
            .iter()
            .map(|b| (b.date.and_time(NaiveTime::MIN), b.close))
            .unzip();
        Self { ds, y }
    }

    pub fn len(&self) -> usize {
        self.ds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }

    pub fn distinct_timestamps(&self) -> usize {
        self.ds.iter().collect::<BTreeSet<_>>().len()
    }
}

/// Point estimates for every index entry, with optional uncertainty bounds.
#[derive(Debug, Clone, Default)]
pub struct ModelOutput {
    pub yhat: Vec<f64>,
    pub lower: Option<Vec<f64>>,
    pub upper: Option<Vec<f64>>,
}

pub trait Forecaster: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fits on `frame` and predicts every date of `index`. Blocking.
    fn fit_predict(&self, frame: &TrainingFrame, index: &[NaiveDate]) -> Result<ModelOutput>;
}

pub fn build_forecast(
    forecaster: &dyn Forecaster,
    bars: &[PriceBar],
    horizon: Horizon,
) -> Result<ForecastFrame> {
    let frame = TrainingFrame::from_bars(bars);
    ensure!(
        frame.distinct_timestamps() >= 2,
        "not enough data to fit the forecast model: need at least 2 distinct dates, got {}",
        frame.distinct_timestamps()
    );

    let history: Vec<NaiveDate> = frame.ds.iter().map(|dt| dt.date()).collect();
    let index = extend_index(&history, horizon.days());

    let started = std::time::Instant::now();
    let output = forecaster.fit_predict(&frame, &index)?;
    tracing::info!(
        model = forecaster.name(),
        train_len = frame.len(),
        index_len = index.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "forecast model fitted"
    );

    ensure!(
        output.yhat.len() == index.len(),
        "forecast returned {} points for an index of {}",
        output.yhat.len(),
        index.len()
    );

    let (lower, upper) = match (output.lower, output.upper) {
        (Some(lower), Some(upper)) if lower.len() == index.len() && upper.len() == index.len() => {
            (lower, upper)
        }
        _ => {
            let band = 1.96 * stddev(&frame.y);
            tracing::warn!(band, "forecast model returned no usable bounds; using residual band");
            (
                output.yhat.iter().map(|v| v - band).collect(),
                output.yhat.iter().map(|v| v + band).collect(),
            )
        }
    };

    let points = index
        .into_iter()
        .enumerate()
        .map(|(i, ds)| ForecastPoint {
            ds,
            yhat: output.yhat[i],
            yhat_lower: lower[i],
            yhat_upper: upper[i],
        })
        .collect();

    Ok(ForecastFrame {
        history_len: history.len(),
        points,
    })
}

fn stddev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (n as f64 - 1.0)).sqrt()
}


#[cfg(test)]
mod tests {
    use super::fakes::LinearForecaster;
    use super::*;
    use crate::domain::price::fixtures::weekday_bars;
    use crate::time::business_days::is_weekend;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()
    }

    #[test]
    fn training_frame_is_naive_midnight_closes() {
        let bars = weekday_bars(start(), 3, |i| 10.0 + i as f64);
        let frame = TrainingFrame::from_bars(&bars);
        assert_eq!(frame.y, vec![10.0, 11.0, 12.0]);
        assert_eq!(frame.ds[0], bars[0].date.and_hms_opt(0, 0, 0).unwrap());
        assert!(frame
            .ds
            .iter()
            .zip(&bars)
            .all(|(ds, bar)| ds.date() == bar.date && ds.time() == NaiveTime::MIN));
        assert_eq!(frame.distinct_timestamps(), 3);
    }

    #[test]
    fn extends_by_horizon_business_days() {
        let bars = weekday_bars(start(), 30, |i| 100.0 + i as f64);
        let horizon = Horizon::new(30).unwrap();
        let frame = build_forecast(&LinearForecaster { with_bounds: true }, &bars, horizon).unwrap();

        assert_eq!(frame.history_len, 30);
        assert_eq!(frame.points.len(), 60);
        let last_hist = bars.last().unwrap().date;
        let future = frame.future();
        assert_eq!(future.len(), 30);
        assert!(future.iter().all(|p| p.ds > last_hist && !is_weekend(p.ds)));
        assert!(frame.points.windows(2).all(|w| w[0].ds < w[1].ds));
        assert_eq!(frame.points[0].yhat_lower, frame.points[0].yhat - 1.0);
    }

    #[test]
    fn falls_back_to_residual_band_without_bounds() {
        let bars = weekday_bars(start(), 10, |i| if i % 2 == 0 { 10.0 } else { 12.0 });
        let frame = build_forecast(
            &LinearForecaster { with_bounds: false },
            &bars,
            Horizon::default(),
        )
        .unwrap();
        let band = 1.96 * stddev(&TrainingFrame::from_bars(&bars).y);
        assert!(band > 0.0);
        for p in &frame.points {
            assert!((p.yhat_upper - p.yhat - band).abs() < 1e-9);
            assert!((p.yhat - p.yhat_lower - band).abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_fewer_than_two_distinct_dates() {
        let one = weekday_bars(start(), 1, |_| 10.0);
        let err = build_forecast(&LinearForecaster { with_bounds: true }, &one, Horizon::default())
            .unwrap_err();
        assert!(err.to_string().contains("not enough data"));

        let mut dup = weekday_bars(start(), 1, |_| 10.0);
        dup.push(dup[0]);
        assert!(build_forecast(&LinearForecaster { with_bounds: true }, &dup, Horizon::default()).is_err());
    }
}
