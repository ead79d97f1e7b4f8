//! Accounts: registration, sessions, profile, username and password changes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use neuronote_core::Error;
use neuronote_store::{NewUser, UserProfile};

use crate::auth::AuthUser;
use crate::error::{ApiJson, ApiResult};
use crate::pipeline;
use crate::state::AppState;

/// Reply to every reset request, so it reveals nothing about which accounts exist.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(get_user).delete(delete_user))
        .route("/username/{new_username}", patch(change_username))
        .route("/password", post(change_password))
        .route("/password-reset", post(request_password_reset))
        .route("/password-reset/confirm", post(confirm_password_reset))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Deserialize)]
struct PasswordRequest {
    #[serde(default)]
    password: Option<String>,
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    #[serde(default)]
    old_password: Option<String>,
    #[serde(default)]
    new_password: Option<String>,
}

#[derive(Deserialize)]
struct ResetRequest {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct ResetConfirmRequest {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, Error> {
    value.ok_or_else(|| Error::MissingField(field.to_string()))
}

/// POST /api/register
async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user = state.blocking(move |s| s.store.register(req)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user_id": user.id,
        })),
    ))
}

/// POST /api/login
async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let username = required(req.username, "username")?;
    let password = required(req.password, "password")?;
    let session = state
        .blocking(move |s| {
            s.store
                .authenticate(&username, &password, s.session_ttl_ms())
        })
        .await?;
    Ok(Json(json!({
        "token": session.token,
        "username": session.user.username,
        "expires_at": session.expires_at,
    })))
}

/// POST /api/logout
async fn logout(State(state): State<Arc<AppState>>, auth: AuthUser) -> ApiResult<Json<Value>> {
    state.store.logout(&auth.token)?;
    Ok(Json(json!({ "message": "Logged out" })))
}

/// GET /api/user
async fn get_user(auth: AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&auth.user))
}

/// DELETE /api/user: requires the current password; removes everything the
/// user owns.
async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<PasswordRequest>,
) -> ApiResult<Json<Value>> {
    let password = required(req.password, "password")?;
    let user_id = auth.id();
    let report = state
        .blocking(move |s| s.store.delete_user(user_id, &password))
        .await?;
    pipeline::remove_document_blobs(&report.documents);
    Ok(Json(json!({
        "message": "Account deleted",
        "deleted": report,
    })))
}

/// PATCH /api/username/{new_username}
async fn change_username(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(new_username): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = state.store.change_username(auth.id(), &new_username)?;
    Ok(Json(json!({
        "message": "Username updated",
        "username": user.username,
    })))
}

/// POST /api/password
async fn change_password(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    let old_password = required(req.old_password, "old_password")?;
    let new_password = required(req.new_password, "new_password")?;
    let user_id = auth.id();
    state
        .blocking(move |s| {
            s.store
                .change_password(user_id, &old_password, &new_password)
        })
        .await?;
    Ok(Json(json!({ "message": "Password updated" })))
}

/// POST /api/password-reset: the reply is the same whether or not the
/// email belongs to an account, and for a missing email.
async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ResetRequest>,
) -> ApiResult<Json<Value>> {
    let email = req.email.unwrap_or_default();
    if email.trim().is_empty() {
        debug!("Password reset requested without an email");
    } else if let Some((user, token)) = state
        .store
        .create_password_reset(&email, state.reset_ttl_ms())?
    {
        if let Err(e) = state.mailer.send_password_reset(&user, &token) {
            warn!("Failed to send reset mail to user {}: {}", user.id, e);
        }
    } else {
        info!("Password reset requested for unknown email");
    }
    Ok(Json(json!({ "message": RESET_REQUESTED_MESSAGE })))
}

/// POST /api/password-reset/confirm
async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ResetConfirmRequest>,
) -> ApiResult<Json<Value>> {
    let token = required(req.token, "token")?;
    let password = required(req.password, "password")?;
    state
        .blocking(move |s| s.store.confirm_password_reset(&token, &password))
        .await?;
    Ok(Json(json!({ "message": "Password has been reset" })))
}
