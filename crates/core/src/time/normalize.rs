use anyhow::Context;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// A provider timestamp, either offset-aware or already naive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketTimestamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl MarketTimestamp {
    /// Builds an aware timestamp from UTC epoch seconds and the exchange's offset from UTC.
    pub fn from_epoch(secs: i64, gmt_offset_secs: i32) -> anyhow::Result<Self> {
        let offset = FixedOffset::east_opt(gmt_offset_secs)
            .with_context(|| format!("invalid gmt offset: {gmt_offset_secs}s"))?;
        let utc = DateTime::from_timestamp(secs, 0)
            .with_context(|| format!("timestamp out of range: {secs}"))?;
        Ok(Self::Aware(utc.with_timezone(&offset)))
    }

    /// Drops any offset and keeps the local wall clock. Naive values pass through unchanged.
    pub fn normalize(self) -> NaiveDateTime {
        match self {
            Self::Aware(dt) => dt.naive_local(),
            Self::Naive(dt) => dt,
        }
    }

    pub fn local_date(self) -> NaiveDate {
        self.normalize().date()
    }
}

impl From<NaiveDateTime> for MarketTimestamp {
    fn from(dt: NaiveDateTime) -> Self {
        Self::Naive(dt)
    }
}

impl From<DateTime<FixedOffset>> for MarketTimestamp {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::Aware(dt)
    }
}

/// Midnight of `date` as epoch seconds, the timestamp scale the forecast model trains on.
pub fn date_to_ts(date: NaiveDate) -> anyhow::Result<i64> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .context("invalid date for timestamp")
}
