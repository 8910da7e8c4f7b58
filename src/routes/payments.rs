use axum::{routing::post, Router};

use crate::handlers::payments;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/stk_push", post(payments::stk_push))
}
