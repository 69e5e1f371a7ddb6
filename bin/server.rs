// Season Standings - Web Server
// Read-only JSON API over the computed standings files

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use season_standings::standings::{category_display, season_display, DisplayTable};
use season_standings::{list_seasons, load_config, AppConfig, Category, DEFAULT_CONFIG_FILE};

/// Shared application state
#[derive(Clone)]
struct AppState {
    config: Arc<AppConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn failure<T: Serialize>(status: StatusCode, message: String) -> axum::response::Response {
    (status, Json(ApiResponse::<T>::err(message))).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/seasons - Seasons present in the data directory
async fn get_seasons(State(state): State<AppState>) -> impl IntoResponse {
    match list_seasons(&state.config.data_dir) {
        Ok(seasons) => (StatusCode::OK, Json(ApiResponse::ok(seasons))).into_response(),
        Err(e) => {
            error!("Error listing seasons: {:#}", e);
            failure::<Vec<String>>(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/:season/standings - Every computed category of a season
async fn get_standings(
    State(state): State<AppState>,
    Path(season): Path<String>,
) -> impl IntoResponse {
    match season_display(&state.config, &season) {
        Ok(tables) => (StatusCode::OK, Json(ApiResponse::ok(tables))).into_response(),
        Err(e) => {
            error!("Error reading standings of {}: {:#}", season, e);
            failure::<Vec<DisplayTable>>(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/:season/standings/:category - One category
async fn get_category_standings(
    State(state): State<AppState>,
    Path((season, category)): Path<(String, String)>,
) -> impl IntoResponse {
    let category = Category::from_code(&category);

    match category_display(&state.config, &season, &category) {
        Ok(Some(table)) => (StatusCode::OK, Json(ApiResponse::ok(table))).into_response(),
        Ok(None) => failure::<DisplayTable>(
            StatusCode::NOT_FOUND,
            format!("No standings for category {} in season {}", category, season),
        ),
        Err(e) => {
            error!("Error reading standings of {} / {}: {:#}", season, category, e);
            failure::<DisplayTable>(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/seasons", get(get_seasons))
        .route("/:season/standings", get(get_standings))
        .route("/:season/standings/:category", get(get_category_standings))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "season_standings=info,standings_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var_os("SEASON_STANDINGS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = load_config(&config_path)?;
    info!("Serving standings from {}", config.data_dir.display());

    let state = AppState {
        config: Arc::new(config),
    };

    let addr = std::env::var("STANDINGS_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🚀 Server running on http://{}", addr);
    info!("   API: http://{}/api/seasons", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
