use std::fmt;

/// No data for the ticker, including every configured suffix fallback.
#[derive(Debug, Clone)]
pub struct TickerNotFound {
    pub ticker: String,
    pub tried: Vec<String>,
}

impl fmt::Display for TickerNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticker not found: no price history for {} (tried {})",
            self.ticker,
            self.tried.join(", ")
        )
    }
}

impl std::error::Error for TickerNotFound {}
