use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::price::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::Date,
        SortKey::Open,
        SortKey::High,
        SortKey::Low,
        SortKey::Close,
        SortKey::Volume,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Open => "open",
            SortKey::High => "high",
            SortKey::Low => "low",
            SortKey::Close => "close",
            SortKey::Volume => "volume",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Date => "Date",
            SortKey::Open => "Open",
            SortKey::High => "High",
            SortKey::Low => "Low",
            SortKey::Close => "Close",
            SortKey::Volume => "Volume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDir::Asc),
            "desc" => Some(SortDir::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

/// History table ordering; the default is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistorySort {
    pub key: SortKey,
    pub dir: SortDir,
}

impl HistorySort {
    /// Unknown values fall back to the default ordering.
    pub fn from_query(key: Option<&str>, dir: Option<&str>) -> Self {
        Self {
            key: key.and_then(SortKey::parse).unwrap_or_default(),
            dir: dir.and_then(SortDir::parse).unwrap_or_default(),
        }
    }

    /// The ordering a click on `key`'s header should request.
    pub fn toggle(self, key: SortKey) -> Self {
        if self.key == key {
            Self {
                key,
                dir: self.dir.flipped(),
            }
        } else {
            Self {
                key,
                dir: SortDir::Asc,
            }
        }
    }
}

/// Borrowed view of `bars` in the requested order. Ties keep chronological order.
pub fn sorted_rows(bars: &[PriceBar], sort: HistorySort) -> Vec<&PriceBar> {
    let mut rows: Vec<&PriceBar> = bars.iter().collect();
    rows.sort_by(|a, b| {
        let ord = compare(a, b, sort.key);
        match sort.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });
    rows
}

fn compare(a: &PriceBar, b: &PriceBar, key: SortKey) -> Ordering {
    match key {
        SortKey::Date => a.date.cmp(&b.date),
        SortKey::Open => a.open.total_cmp(&b.open),
        SortKey::High => a.high.total_cmp(&b.high),
        SortKey::Low => a.low.total_cmp(&b.low),
        SortKey::Close => a.close.total_cmp(&b.close),
        SortKey::Volume => a.volume.cmp(&b.volume),
    }
}
