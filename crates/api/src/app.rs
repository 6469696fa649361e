//! Router assembly.

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::get,
    Router,
};
use skillgap_aggregation::AggregationService;
use skillgap_ingestion::RefreshCoordinator;
use std::sync::Arc;
use tower_http::cors::{AllowCredentials, AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ApiConfig;
use crate::routes;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub aggregation: AggregationService,
    pub refresh: Arc<RefreshCoordinator>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(
        aggregation: AggregationService,
        refresh: Arc<RefreshCoordinator>,
        config: ApiConfig,
    ) -> Self {
        Self {
            aggregation,
            refresh,
            config: Arc::new(config),
        }
    }
}

/// CORS for the allow-listed origins only; other origins get no CORS headers.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    let credentialed = origins.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(AllowCredentials::predicate(move |origin, _| {
            credentialed.contains(origin)
        }))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

/// Build the application router.
///
/// Read routes are bounded by the request timeout. The refresh route is
/// bounded by the scrape timeout only.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/map-summary", get(routes::map_summary))
        .route("/trends/:slug", get(routes::trends))
        .route("/top-skills", get(routes::top_skills))
        .route("/export/csv", get(routes::export_csv))
        .route("/export/raw", get(routes::export_raw))
        .route("/export/summary", get(routes::export_summary))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .route("/scheduled-task", get(routes::scheduled_task))
        .layer(cors_layer(&state.config.allowed_origins));

    Router::new()
        .route("/", get(routes::index))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
