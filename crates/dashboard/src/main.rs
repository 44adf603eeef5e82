use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quotecast_core::domain::price::Horizon;
use quotecast_core::pipeline::{AnalysisRequest, Pipeline, PipelineOutcome};
use quotecast_core::render::page::{render_page, PageView};
use quotecast_core::render::table::HistorySort;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = quotecast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pipeline = Pipeline::from_settings(&settings)?;
    tracing::info!(
        base_url = %settings.market_data_base_url,
        fallback_suffixes = ?settings.fallback_suffixes(),
        "pipeline configured"
    );

    let app = router(AppState {
        pipeline: Arc::new(pipeline),
    });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "dashboard listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/analysis", get(analysis_json))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Raw widget values. Kept as strings so a bad value is reported on the page, not rejected by the extractor.
#[derive(Debug, Default, Deserialize)]
struct DashboardQuery {
    ticker: Option<String>,
    horizon: Option<String>,
    sort: Option<String>,
    dir: Option<String>,
}

impl DashboardQuery {
    fn ticker(&self) -> String {
        self.ticker.as_deref().unwrap_or("").trim().to_string()
    }

    fn horizon(&self) -> anyhow::Result<Horizon> {
        match self.horizon.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(Horizon::default()),
            Some(s) => {
                let days: u32 = s
                    .parse()
                    .map_err(|_| anyhow::anyhow!("horizon must be a whole number of days (got {s:?})"))?;
                Horizon::new(days)
            }
        }
    }
}

async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Html<String> {
    let ticker = query.ticker();
    let sort = HistorySort::from_query(query.sort.as_deref(), query.dir.as_deref());

    let (horizon, outcome) = match query.horizon() {
        Ok(horizon) => {
            let request = AnalysisRequest::new(ticker.clone(), horizon);
            let outcome = state.pipeline.evaluate(&request).await;
            report_outcome(&ticker, &outcome);
            (horizon, outcome)
        }
        // Form typos are logged, not sent to Sentry.
        Err(err) => {
            tracing::warn!(%ticker, error = %err, "invalid horizon");
            (
                Horizon::default(),
                PipelineOutcome::Failed {
                    message: err.to_string(),
                },
            )
        }
    };

    let view = PageView {
        ticker,
        horizon,
        sort,
    };
    Html(render_page(&view, &outcome))
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

fn api_error(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ApiError { error: error.into() })).into_response()
}

async fn analysis_json(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let ticker = query.ticker();
    let horizon = match query.horizon() {
        Ok(h) => h,
        Err(err) => {
            tracing::warn!(%ticker, error = %err, "invalid horizon");
            return api_error(StatusCode::BAD_REQUEST, err.to_string());
        }
    };

    let outcome = state
        .pipeline
        .evaluate(&AnalysisRequest::new(ticker.clone(), horizon))
        .await;
    report_outcome(&ticker, &outcome);

    match outcome {
        PipelineOutcome::Prompt => api_error(StatusCode::BAD_REQUEST, "ticker is required"),
        PipelineOutcome::Ready(report) => Json(*report).into_response(),
        PipelineOutcome::NotFound { message } => api_error(StatusCode::NOT_FOUND, message),
        PipelineOutcome::Failed { message } => api_error(StatusCode::BAD_GATEWAY, message),
    }
}

fn report_outcome(ticker: &str, outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Failed { message } => {
            sentry::capture_message(message, sentry::Level::Error);
            tracing::error!(%ticker, error = %message, "analysis failed");
        }
        PipelineOutcome::NotFound { message } => {
            tracing::warn!(%ticker, %message, "ticker not found");
        }
        PipelineOutcome::Ready(_) | PipelineOutcome::Prompt => {}
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &quotecast_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
