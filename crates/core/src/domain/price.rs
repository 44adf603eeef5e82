use anyhow::ensure;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day. `date` is the exchange-local calendar date, already stripped of any offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub currency: Option<String>,
    pub exchange_timezone: Option<String>,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol: symbol.into(),
            currency: None,
            exchange_timezone: None,
            bars,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.close)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// Forecast horizon in business days; doubles as the trailing window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Horizon(u16);

impl Horizon {
    pub const MIN: u16 = 30;
    pub const MAX: u16 = 365;

    pub fn new(days: u32) -> anyhow::Result<Self> {
        ensure!(
            (Self::MIN as u32..=Self::MAX as u32).contains(&days),
            "horizon must be {}..={} days (got {days})",
            Self::MIN,
            Self::MAX
        );
        Ok(Self(days as u16))
    }

    pub fn days(self) -> usize {
        self.0 as usize
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<u32> for Horizon {
    type Error = anyhow::Error;

    fn try_from(days: u32) -> anyhow::Result<Self> {
        Self::new(days)
    }
}

impl From<Horizon> for u32 {
    fn from(h: Horizon) -> Self {
        h.0 as u32
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::time::business_days::business_days_after;

    /// Weekday-only bars starting after `start`, closes following `f(i)`.
    pub fn weekday_bars(start: NaiveDate, n: usize, f: impl Fn(usize) -> f64) -> Vec<PriceBar> {
        business_days_after(start, n)
            .into_iter()
            .enumerate()
            .map(|(i, date)| {
                let close = f(i);
                PriceBar {
                    date,
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000 + i as u64,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_accepts_inclusive_bounds() {
        assert_eq!(Horizon::new(30).unwrap().days(), 30);
        assert_eq!(Horizon::new(365).unwrap().days(), 365);
        assert!(Horizon::new(29).is_err());
        assert!(Horizon::new(366).is_err());
    }

    #[test]
    fn horizon_deserializes_with_validation() {
        let h: Horizon = serde_json::from_str("90").unwrap();
        assert_eq!(h.days(), 90);
        assert!(serde_json::from_str::<Horizon>("7").is_err());
        assert_eq!(serde_json::to_string(&h).unwrap(), "90");
    }
}
