pub mod analysis;
pub mod domain;
pub mod forecast;
pub mod ingest;
pub mod pipeline;
pub mod render;
pub mod time;

pub mod config {
    use anyhow::Context;

    const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query1.finance.yahoo.com";
    const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; quotecast/0.1)";
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_RETRIES: u32 = 3;
    const DEFAULT_FALLBACK_SUFFIXES: &[&str] = &[".SA"];
    const DEFAULT_INTERVAL_WIDTH: f64 = 0.8;
    const DEFAULT_UNCERTAINTY_SAMPLES: u32 = 1000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub sentry_dsn: Option<String>,
        pub market_data_base_url: String,
        pub market_data_user_agent: String,
        pub market_data_timeout_secs: u64,
        pub market_data_retries: u32,
        pub ticker_fallback_enabled: bool,
        pub ticker_fallback_suffixes: Vec<String>,
        pub forecast_interval_width: f64,
        pub forecast_uncertainty_samples: u32,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                sentry_dsn: None,
                market_data_base_url: DEFAULT_MARKET_DATA_BASE_URL.to_string(),
                market_data_user_agent: DEFAULT_USER_AGENT.to_string(),
                market_data_timeout_secs: DEFAULT_TIMEOUT_SECS,
                market_data_retries: DEFAULT_RETRIES,
                ticker_fallback_enabled: true,
                ticker_fallback_suffixes: DEFAULT_FALLBACK_SUFFIXES
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                forecast_interval_width: DEFAULT_INTERVAL_WIDTH,
                forecast_uncertainty_samples: DEFAULT_UNCERTAINTY_SAMPLES,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();

            let settings = Self {
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.market_data_base_url),
                market_data_user_agent: std::env::var("MARKET_DATA_USER_AGENT")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.market_data_user_agent),
                market_data_timeout_secs: std::env::var("MARKET_DATA_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(defaults.market_data_timeout_secs),
                market_data_retries: std::env::var("MARKET_DATA_RETRIES")
                    .ok()
                    .and_then(|s| s.parse::<u32>().ok())
                    .filter(|n| *n >= 1)
                    .unwrap_or(defaults.market_data_retries),
                ticker_fallback_enabled: std::env::var("TICKER_FALLBACK_ENABLED")
                    .ok()
                    .and_then(|s| parse_bool(&s))
                    .unwrap_or(defaults.ticker_fallback_enabled),
                ticker_fallback_suffixes: std::env::var("TICKER_FALLBACK_SUFFIXES")
                    .ok()
                    .map(|s| parse_suffixes(&s))
                    .unwrap_or(defaults.ticker_fallback_suffixes),
                forecast_interval_width: std::env::var("FORECAST_INTERVAL_WIDTH")
                    .ok()
                    .and_then(|s| s.parse::<f64>().ok())
                    .unwrap_or(defaults.forecast_interval_width),
                forecast_uncertainty_samples: std::env::var("FORECAST_UNCERTAINTY_SAMPLES")
                    .ok()
                    .and_then(|s| s.parse::<u32>().ok())
                    .unwrap_or(defaults.forecast_uncertainty_samples),
            };

            settings.validate()?;
            Ok(settings)
        }

        pub fn validate(&self) -> anyhow::Result<()> {
            anyhow::ensure!(
                self.forecast_interval_width > 0.0 && self.forecast_interval_width < 1.0,
                "FORECAST_INTERVAL_WIDTH must be between 0 and 1 (got {})",
                self.forecast_interval_width
            );
            reqwest::Url::parse(&self.market_data_base_url)
                .with_context(|| {
                    format!("MARKET_DATA_BASE_URL is not a valid URL: {}", self.market_data_base_url)
                })?;
            Ok(())
        }

        /// Suffixes tried, in order, when the bare ticker has no data.
        pub fn fallback_suffixes(&self) -> Vec<String> {
            if self.ticker_fallback_enabled {
                self.ticker_fallback_suffixes.clone()
            } else {
                Vec::new()
            }
        }
    }

    fn parse_bool(s: &str) -> Option<bool> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    fn parse_suffixes(s: &str) -> Vec<String> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                if part.starts_with('.') {
                    part.to_ascii_uppercase()
                } else {
                    format!(".{}", part.to_ascii_uppercase())
                }
            })
            .collect()
    }

}
