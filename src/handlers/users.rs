// handlers/users.rs
//
// Admin user management. Accounts are never hard-deleted; DELETE flips the
// active flag so historical shifts and sales keep a valid attendant.
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use bcrypt::{hash, DEFAULT_COST};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::Collection;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::{is_duplicate_key, AppError, Result};
use crate::models::user::{CreateUserRequest, Role, UpdateUserRequest, User, UserView};
use crate::state::AppState;

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserView>>> {
    let users: Collection<User> = state.db.collection("users");
    let cursor = users.find(doc! {}).await?;
    let all_users: Vec<User> = cursor.try_collect().await?;

    Ok(Json(all_users.iter().map(UserView::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let (full_name, username, mobile_no, password, role_name) = match (
        payload.full_name,
        payload.username,
        payload.mobile_no,
        payload.password,
        payload.role,
    ) {
        (Some(f), Some(u), Some(m), Some(p), Some(r)) => (f, u, m, p, r),
        _ => {
            return Err(AppError::validation(
                "Missing required fields to create a user.",
            ))
        }
    };

    let role = Role::from_name(&role_name)
        .ok_or_else(|| AppError::validation("Invalid role name."))?;

    let password_hash = hash(&password, DEFAULT_COST)
        .map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))?;

    let user_id = ObjectId::new();
    let user = User {
        _id: Some(user_id),
        full_name,
        username: username.clone(),
        password_hash,
        mobile_no,
        role,
        is_active: true,
    };

    let users: Collection<User> = state.db.collection("users");
    users.insert_one(&user).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::conflict("A user with this username or phone number already exists.")
        } else {
            e.into()
        }
    })?;

    info!("User created: {} ({})", username, role.as_name());

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "User created successfully",
            "user_id": user_id.to_hex(),
        })),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<Value>> {
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::validation("Missing user_id."))?;
    let user_id = ObjectId::parse_str(&user_id)?;

    let mut changes = Document::new();
    if let Some(full_name) = payload.full_name {
        changes.insert("full_name", full_name);
    }
    if let Some(mobile_no) = payload.mobile_no {
        changes.insert("mobile_no", mobile_no);
    }
    if let Some(role_name) = payload.role {
        let role = Role::from_name(&role_name)
            .ok_or_else(|| AppError::validation("Invalid role name."))?;
        changes.insert("role", role.as_name());
    }
    if let Some(password) = payload.password {
        let password_hash = hash(&password, DEFAULT_COST)
            .map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))?;
        changes.insert("password_hash", password_hash);
    }
    if let Some(is_active) = payload.is_active {
        changes.insert("is_active", is_active);
    }

    if changes.is_empty() {
        return Err(AppError::validation("No fields to update."));
    }

    let users: Collection<User> = state.db.collection("users");
    let result = users
        .update_one(doc! { "_id": user_id }, doc! { "$set": changes })
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::conflict("A user with this phone number already exists.")
            } else {
                AppError::from(e)
            }
        })?;

    if result.matched_count == 0 {
        return Err(AppError::not_found("User not found."));
    }

    Ok(Json(json!({
        "status": "success",
        "message": "User updated successfully",
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeactivateQuery {
    pub user_id: Option<String>,
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    Query(query): Query<DeactivateQuery>,
) -> Result<Json<Value>> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::validation("Missing user_id."))?;
    let user_id = ObjectId::parse_str(&user_id)?;

    let users: Collection<User> = state.db.collection("users");
    let result = users
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "is_active": false } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::not_found("User not found."));
    }

    info!("User deactivated: {}", user_id.to_hex());

    Ok(Json(json!({
        "status": "success",
        "message": "User deactivated",
    })))
}

pub async fn method_not_allowed() -> (StatusCode, Json<Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "status": "error",
            "message": "Method not allowed",
        })),
    )
}
