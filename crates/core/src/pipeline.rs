use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::analysis::trim::trim_series;
use crate::config::Settings;
use crate::domain::price::Horizon;
use crate::domain::report::{AnalysisReport, SummaryStats};
use crate::forecast::prophet::ProphetForecaster;
use crate::forecast::{build_forecast, Forecaster};
use crate::ingest::error::TickerNotFound;
use crate::ingest::fetcher::fetch_with_fallback;
use crate::ingest::provider::{MarketDataClient, YahooChartClient};

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub horizon: Horizon,
}

impl AnalysisRequest {
    pub fn new(ticker: impl Into<String>, horizon: Horizon) -> Self {
        Self {
            ticker: ticker.into(),
            horizon,
        }
    }

    pub fn has_ticker(&self) -> bool {
        !self.ticker.trim().is_empty()
    }
}

/// What the presentation layer renders for one input change.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// No ticker yet; nothing was fetched.
    Prompt,
    Ready(Box<AnalysisReport>),
    NotFound { message: String },
    Failed { message: String },
}

/// fetch -> trim -> {summary, forecast}. Holds only immutable collaborators; every call starts fresh.
#[derive(Clone)]
pub struct Pipeline {
    market_data: Arc<dyn MarketDataClient>,
    forecaster: Arc<dyn Forecaster>,
    fallback_suffixes: Vec<String>,
}

impl Pipeline {
    pub fn new(
        market_data: Arc<dyn MarketDataClient>,
        forecaster: Arc<dyn Forecaster>,
        fallback_suffixes: Vec<String>,
    ) -> Self {
        Self {
            market_data,
            forecaster,
            fallback_suffixes,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let market_data = YahooChartClient::from_settings(settings)?;
        let forecaster = ProphetForecaster::from_settings(settings);
        Ok(Self::new(
            Arc::new(market_data),
            Arc::new(forecaster),
            settings.fallback_suffixes(),
        ))
    }

    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        let run_id = Uuid::new_v4();
        let horizon = request.horizon;
        tracing::info!(%run_id, ticker = %request.ticker, %horizon, "analysis run started");

        let resolved = fetch_with_fallback(
            self.market_data.as_ref(),
            &request.ticker,
            &self.fallback_suffixes,
        )
        .await?;

        let trimmed = trim_series(&resolved.series, horizon);
        let summary = SummaryStats::from_bars(&trimmed.bars);

        let forecaster = Arc::clone(&self.forecaster);
        let bars = trimmed.bars.clone();
        let forecast =
            tokio::task::spawn_blocking(move || build_forecast(forecaster.as_ref(), &bars, horizon))
                .await
                .context("join forecast task failed")??;

        tracing::info!(
            %run_id,
            symbol = %resolved.symbol,
            history = trimmed.len(),
            forecast = forecast.points.len(),
            "analysis run finished"
        );

        Ok(AnalysisReport {
            run_id,
            generated_at: Utc::now(),
            ticker: resolved.ticker,
            symbol: resolved.symbol,
            horizon,
            currency: trimmed.currency,
            history: trimmed.bars,
            summary,
            forecast,
        })
    }

    /// Outermost boundary: a blank ticker never fetches, and every failure becomes a message.
    pub async fn evaluate(&self, request: &AnalysisRequest) -> PipelineOutcome {
        if !request.has_ticker() {
            return PipelineOutcome::Prompt;
        }

        match self.run(request).await {
            Ok(report) => PipelineOutcome::Ready(Box::new(report)),
            Err(err) => classify_error(&err),
        }
    }
}

pub fn classify_error(err: &anyhow::Error) -> PipelineOutcome {
    if let Some(not_found) = err.downcast_ref::<TickerNotFound>() {
        return PipelineOutcome::NotFound {
            message: not_found.to_string(),
        };
    }
    PipelineOutcome::Failed {
        message: format!("{err:#}"),
    }
}
