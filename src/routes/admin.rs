use axum::{routing::get, Router};

use crate::handlers::users;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/users",
        get(users::list_users)
            .post(users::create_user)
            .put(users::update_user)
            .delete(users::deactivate_user)
            .fallback(users::method_not_allowed),
    )
}
