use crate::domain::price::{Horizon, PriceBar, PriceSeries};

/// The last `n` bars in chronological order; everything when fewer are available.
pub fn trailing(bars: &[PriceBar], n: usize) -> &[PriceBar] {
    &bars[bars.len().saturating_sub(n)..]
}

pub fn trim_series(series: &PriceSeries, horizon: Horizon) -> PriceSeries {
    PriceSeries {
        symbol: series.symbol.clone(),
        currency: series.currency.clone(),
        exchange_timezone: series.exchange_timezone.clone(),
        bars: trailing(&series.bars, horizon.days()).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::fixtures::weekday_bars;
    use chrono::NaiveDate;

    fn series(len: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        PriceSeries::new("AAPL", weekday_bars(start, len, |i| i as f64))
    }

    #[test]
    fn length_is_min_of_horizon_and_history() {
        for len in [0, 1, 29, 30, 31, 200, 252, 400] {
            let s = series(len);
            for days in [30, 31, 90, 252, 365] {
                let h = Horizon::new(days).unwrap();
                let trimmed = trim_series(&s, h);
                assert_eq!(trimmed.len(), (days as usize).min(len), "len={len} days={days}");
                assert!(trimmed.len() <= s.len());
            }
        }
    }

    #[test]
    fn keeps_the_most_recent_bars_in_order() {
        let s = series(100);
        let trimmed = trim_series(&s, Horizon::new(30).unwrap());
        assert_eq!(trimmed.bars.first(), s.bars.get(70));
        assert_eq!(trimmed.bars.last(), s.bars.last());
        assert!(trimmed.bars.windows(2).all(|w| w[0].date < w[1].date));
    }
}
