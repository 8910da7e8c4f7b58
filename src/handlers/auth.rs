use axum::{extract::State, response::Json};
use bcrypt::verify;
use mongodb::bson::doc;
use mongodb::Collection;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::{AppError, Result};
use crate::models::user::{LoginRequest, User};
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>> {
    let username = payload
        .username
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::validation("Missing username or password."))?;
    let password = payload
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::validation("Missing username or password."))?;

    let users: Collection<User> = state.db.collection("users");
    let user = users
        .find_one(doc! { "username": username })
        .await?
        .ok_or(AppError::AuthFailed)?;

    let valid = verify(password, &user.password_hash).map_err(|_| AppError::AuthFailed)?;
    if !valid {
        return Err(AppError::AuthFailed);
    }

    // Deactivated accounts keep their history but can no longer sign in.
    if !user.is_active {
        return Err(AppError::AuthFailed);
    }

    info!("Login: {} ({})", user.username, user.role.as_name());

    Ok(Json(json!({
        "status": "success",
        "message": "Login successful",
        "user": {
            "user_id": user._id.map(|id| id.to_hex()).unwrap_or_default(),
            "full_name": user.full_name,
            "username": user.username,
            "role": user.role.as_name(),
        }
    })))
}
