use axum::{routing::get, Router};

use crate::handlers::reports;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/sales", get(reports::sales_report))
        .route("/filters", get(reports::get_filters))
}
