use axum::extract::{Path, State};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::dto::{ApiResponse, LoginRequest, RegisterRequest, UpdateUserRequest};
use super::middleware::{AuthUser, ClientIp};
use super::SharedState;
use crate::errors::ApiError;
use crate::security::password::{hash_password, verify_password};
use crate::store::{NewUser, UserMetadata, UserUpdate};

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn register(
    State(state): State<SharedState>,
    ClientIp(client): ClientIp,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::BadRequest)?;

    if state
        .store
        .find_by_email(&req.email)
        .await
        .map_err(ApiError::from_store)?
        .is_some()
    {
        warn!(email = %req.email, "registration with existing email");
        return Err(ApiError::Conflict("email"));
    }
    if state
        .store
        .find_by_username(&req.username)
        .await
        .map_err(ApiError::from_store)?
        .is_some()
    {
        warn!(username = %req.username, "registration with existing username");
        return Err(ApiError::Conflict("username"));
    }

    let password_hash = hash_password(&req.password).map_err(|err| {
        state.audit.internal_error(&client, &err.to_string());
        ApiError::Internal
    })?;

    let device = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    // Atomic: the user row and its metadata land together or not at all.
    // A concurrent duplicate slips past the pre-checks and is classified
    // from the unique constraint here.
    let user = state
        .store
        .create_user_with_metadata(
            NewUser {
                name: req.name,
                username: req.username,
                email: req.email,
                phone_number: req.phone_number,
                role: "user".to_string(),
                password_hash,
            },
            UserMetadata { device },
        )
        .await
        .map_err(ApiError::from_store)?;

    state.audit.user_registered(&user.username, &client);
    Ok(Json(ApiResponse::success(user.snapshot())))
}

pub async fn login(
    State(state): State<SharedState>,
    ClientIp(client): ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Unknown username and wrong password are indistinguishable on purpose.
    let user = state
        .store
        .find_by_username(&req.username)
        .await
        .map_err(ApiError::from_store)?
        .ok_or_else(|| {
            state.audit.auth_failure(&client, "unknown username");
            ApiError::InvalidCredentials
        })?;

    if !verify_password(&req.password, &user.password_hash) {
        state.audit.auth_failure(&client, "password mismatch");
        return Err(ApiError::InvalidCredentials);
    }

    let snapshot = user.snapshot();
    let token = state.tokens.issue(&snapshot).map_err(|err| {
        state.audit.internal_error(&client, &err.to_string());
        ApiError::Internal
    })?;

    state.audit.user_login(&snapshot.username, &client);
    Ok(Json(ApiResponse::with_token(snapshot, token)))
}

/// Echo the identity attached by the pipeline; no storage round-trip.
pub async fn current_user(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(ApiResponse::success(user))
}

pub async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .store
        .find_by_id(id)
        .await
        .map_err(ApiError::from_store)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(ApiResponse::success(user.snapshot())))
}

pub async fn update_user(
    State(state): State<SharedState>,
    ClientIp(client): ClientIp,
    AuthUser(auth): AuthUser,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::BadRequest)?;

    let current = state
        .store
        .find_by_id(auth.id)
        .await
        .map_err(ApiError::from_store)?
        .ok_or(ApiError::NotFound)?;

    // Renames may not collide with other rows.
    if req.username != current.username
        && state
            .store
            .find_by_username(&req.username)
            .await
            .map_err(ApiError::from_store)?
            .is_some()
    {
        return Err(ApiError::Conflict("username"));
    }
    if req.email != current.email
        && state
            .store
            .find_by_email(&req.email)
            .await
            .map_err(ApiError::from_store)?
            .is_some()
    {
        return Err(ApiError::Conflict("email"));
    }

    let password_hash = match req.password.as_deref() {
        Some(plaintext) => Some(hash_password(plaintext).map_err(|err| {
            state.audit.internal_error(&client, &err.to_string());
            ApiError::Internal
        })?),
        None => None,
    };

    let updated = state
        .store
        .update_user(
            auth.id,
            UserUpdate {
                name: req.name,
                username: req.username,
                email: req.email,
                phone_number: req.phone_number,
                password_hash,
            },
        )
        .await
        .map_err(ApiError::from_store)?;

    Ok(Json(ApiResponse::success(updated.snapshot())))
}
