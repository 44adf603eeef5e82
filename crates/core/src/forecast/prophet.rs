use anyhow::{anyhow, ensure, Context, Result};
use augurs::prophet::wasmstan::WasmstanOptimizer;
use augurs::prophet::{IntervalWidth, PredictionData, Prophet, ProphetOptions, TrainingData};
use chrono::NaiveDate;

use crate::config::Settings;
use crate::forecast::{Forecaster, ModelOutput, TrainingFrame};
use crate::time::normalize::date_to_ts;

/// Additive trend + seasonality model (Prophet), optimized with the bundled wasm Stan build.
#[derive(Debug, Clone)]
pub struct ProphetForecaster {
    interval_width: f64,
    uncertainty_samples: u32,
}

impl ProphetForecaster {
    pub fn new(interval_width: f64, uncertainty_samples: u32) -> Self {
        Self {
            interval_width,
            uncertainty_samples,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.forecast_interval_width,
            settings.forecast_uncertainty_samples,
        )
    }

    fn options(&self) -> Result<ProphetOptions> {
        ensure!(
            self.interval_width > 0.0 && self.interval_width < 1.0,
            "interval width must be in (0, 1), got {}",
            self.interval_width
        );
        let interval_width = IntervalWidth::try_from(self.interval_width)
            .map_err(|_| anyhow!("invalid interval width: {}", self.interval_width))?;
        Ok(ProphetOptions {
            interval_width,
            uncertainty_samples: self.uncertainty_samples,
            ..Default::default()
        })
    }
}

impl Forecaster for ProphetForecaster {
    fn name(&self) -> &'static str {
        "prophet"
    }

    fn fit_predict(&self, frame: &TrainingFrame, index: &[NaiveDate]) -> Result<ModelOutput> {
        let ds: Vec<i64> = frame
            .ds
            .iter()
            .map(|dt| dt.and_utc().timestamp())
            .collect();
        let data = TrainingData::new(ds, frame.y.clone()).context("create prophet training data")?;

        let mut prophet = Prophet::new(self.options()?, WasmstanOptimizer::new());
        prophet
            .fit(data, Default::default())
            .context("fit prophet model")?;

        let future = index
            .iter()
            .map(|d| date_to_ts(*d))
            .collect::<Result<Vec<_>>>()?;
        let predictions = prophet
            .predict(Some(PredictionData::new(future)))
            .context("predict with prophet")?;

        let yhat = predictions.yhat;
        Ok(ModelOutput {
            yhat: yhat.point,
            lower: yhat.lower,
            upper: yhat.upper,
        })
    }
}
