use crate::domain::price::PriceBar;
use crate::domain::report::SummaryStats;

impl SummaryStats {
    /// Max/min/mean of the closes. All NaN for an empty slice.
    pub fn from_bars(bars: &[PriceBar]) -> Self {
        if bars.is_empty() {
            return Self {
                max: f64::NAN,
                min: f64::NAN,
                mean: f64::NAN,
            };
        }

        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        let mut sum = 0.0;
        for bar in bars {
            max = max.max(bar.close);
            min = min.min(bar.close);
            sum += bar.close;
        }

        // Rounding in the sum can push the mean a hair outside [min, max] for flat series.
        let mean = (sum / bars.len() as f64).clamp(min, max);
        Self { max, min, mean }
    }
}
