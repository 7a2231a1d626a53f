// Temperature Forecast API v0.1
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::forecasts::AppState;
use services::history::HistoricalStore;
use services::sessions::SessionRegistry;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;

/// Temperature Forecast API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Temperature Forecast API",
        version = "0.1.0",
        description = "Temperature lookup for Philippine regions and cities. \
            Averages historical readings for a region, city, date and hour, or \
            synthesizes a placeholder value when none exist. Values are stable \
            per session and can be saved to a database and the CSV history.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Catalog", description = "Selectable regions and cities"),
        (name = "Sessions", description = "Client sessions owning forecast caches"),
        (name = "Forecasts", description = "Forecast resolution and persistence"),
    ),
    paths(
        routes::health::health_check,
        routes::catalog::list_regions,
        routes::catalog::list_cities,
        routes::sessions::create_session,
        routes::sessions::get_session,
        routes::forecasts::get_session_forecast,
        routes::forecasts::save_session_forecast,
        routes::forecasts::list_saved_forecasts,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::sessions::SessionResponse,
            routes::forecasts::ForecastResponse,
            routes::forecasts::SaveForecastRequest,
            routes::forecasts::SaveForecastResponse,
            routes::forecasts::SavedForecastResponse,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing; LOG_FORMAT=json switches to structured output
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "temperature_forecast_api=debug,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Load (or seed) the historical CSV; no forecast can be served without it
    let history = match HistoricalStore::open(&config.history_csv, &config.fallback) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(
                "Failed to load historical data from {}: {}",
                config.history_csv,
                e
            );
            std::process::exit(1);
        }
    };

    // Set up database connection pool, creating the SQLite file if needed
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("DATABASE_URL must be a valid SQLite URL")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .connect_with(connect_options)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    let sessions = SessionRegistry::new();

    // Build shared application state
    let app_state = AppState {
        pool: pool.clone(),
        history,
        sessions: sessions.clone(),
        fallback: config.fallback,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    // Build router
    let catalog_routes = Router::new()
        .route("/api/v1/regions", get(routes::catalog::list_regions))
        .route(
            "/api/v1/regions/:region/cities",
            get(routes::catalog::list_cities),
        );

    let session_routes = Router::new()
        .route("/api/v1/sessions", post(routes::sessions::create_session))
        .route(
            "/api/v1/sessions/:session_id",
            get(routes::sessions::get_session),
        )
        .with_state(sessions);

    let forecast_routes = Router::new()
        .route(
            "/api/v1/sessions/:session_id/forecast",
            get(routes::forecasts::get_session_forecast),
        )
        .route(
            "/api/v1/sessions/:session_id/forecast/save",
            post(routes::forecasts::save_session_forecast),
        )
        .with_state(app_state.clone());

    let saved_routes = Router::new()
        .route(
            "/api/v1/forecasts/saved",
            get(routes::forecasts::list_saved_forecasts),
        )
        .with_state(pool);

    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(app_state);

    let app = Router::new()
        .merge(health_routes)
        .merge(catalog_routes)
        .merge(session_routes)
        .merge(forecast_routes)
        .merge(saved_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
