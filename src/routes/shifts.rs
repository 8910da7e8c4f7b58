use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::shifts;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pumps", get(shifts::get_pumps))
        .route("/shifts", get(shifts::get_shifts))
        .route("/shift/open", post(shifts::open_shift))
        .route("/shift/close", post(shifts::close_shift))
}
