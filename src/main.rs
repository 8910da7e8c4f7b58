use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

mod config;
mod database;
mod errors;
mod handlers;
mod models;
mod routes;
mod seed;
mod services;
mod state;

use database::connection::get_db_client;
use services::mpesa_simulator::{MpesaSimulator, RandomOutcomeSource};
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = config::AppConfig::from_env();
    let db = get_db_client(&config).await;

    if let Err(e) = seed::initialize_db(&db).await {
        tracing::error!("❌ Failed to seed database: {}", e);
        std::process::exit(1);
    }
    tracing::info!("✅ Database seeded with default data");

    let simulator = Arc::new(MpesaSimulator::new(db.clone(), Arc::new(RandomOutcomeSource)));
    let app_state = AppState::new(db, simulator);

    let app = build_router(app_state);
    start_server(app, &config).await;
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/status", get(status))
        .nest("/api", routes::auth::routes())
        .nest("/api", routes::shifts::routes())
        .nest("/api", routes::reports::routes())
        .nest("/api/payments", routes::payments::routes())
        .nest("/api/admin", routes::admin::routes())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, config: &config::AppConfig) {
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("🚀 Server starting on {}", addr);

    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "⛽ Energy Station API"
}

async fn status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Energy App Backend is running",
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! {"ping": 1}).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
