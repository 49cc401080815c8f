//! Single-use, expiring password reset tokens.
//!
//! Only the SHA-256 of a token is stored. Issuing a new token for a user
//! invalidates the previous one, and a successful reset deletes every
//! outstanding request for that user.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tower_sessions::Session;
use uuid::Uuid;

use crate::AppState;
use crate::auth::{get_user_by_email, get_user_by_id, hash_password, validate_password};
use crate::constants::*;
use crate::database::Db;
use crate::models::{
    MessageResponse, ResetCheckResponse, ResetPasswordPayload, ResetRequestPayload,
    ResetRequestResponse,
};
use crate::utils::log_db_error;

#[derive(Debug, thiserror::Error)]
pub enum ResetTokenError {
    #[error("reset token is unknown")]
    Invalid,

    #[error("reset token has expired")]
    Expired,

    #[error("reset token storage failed: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<libsql::Error> for ResetTokenError {
    fn from(e: libsql::Error) -> Self {
        ResetTokenError::Storage(e.into())
    }
}

impl From<ResetTokenError> for (StatusCode, String) {
    fn from(e: ResetTokenError) -> Self {
        match e {
            ResetTokenError::Invalid | ResetTokenError::Expired => {
                (StatusCode::BAD_REQUEST, ERR_INVALID_RESET_TOKEN.to_string())
            }
            ResetTokenError::Storage(e) => {
                tracing::error!("password reset storage error: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ERR_DATABASE_OPERATION.to_string(),
                )
            }
        }
    }
}

pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    to_hex(&bytes)
}

pub fn hash_token(token: &str) -> String {
    to_hex(&Sha256::digest(token.as_bytes()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Store a fresh request for `user_id`, replacing any earlier one, and return
/// the plain token.
pub async fn issue_reset_token(
    db: &Db,
    user_id: &str,
    now: OffsetDateTime,
    ttl: Duration,
) -> anyhow::Result<String> {
    let token = generate_reset_token();
    let token_hash = hash_token(&token);
    let id = Uuid::new_v4().to_string();
    let expires_at = now + ttl;

    let conn = db.write().await;
    let tx = conn.transaction().await?;
    tx.execute("DELETE FROM reset_requests WHERE user_id = ?", [user_id])
        .await?;
    tx.execute(
        "INSERT INTO reset_requests (id, user_id, token_hash, requested_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        (
            id.as_str(),
            user_id,
            token_hash.as_str(),
            now.unix_timestamp(),
            expires_at.unix_timestamp(),
        ),
    )
    .await?;
    tx.commit().await?;

    Ok(token)
}

/// The id of the user owning `token`, if the token exists and has not
/// expired. Expired requests are deleted on sight.
pub async fn validate_reset_token(
    db: &Db,
    token: &str,
    now: OffsetDateTime,
) -> Result<String, ResetTokenError> {
    let token_hash = hash_token(token);
    let conn = db.write().await;

    let mut rows = conn
        .query(
            "SELECT id, user_id, expires_at FROM reset_requests WHERE token_hash = ?",
            [token_hash.as_str()],
        )
        .await?;

    let row = rows.next().await?.ok_or(ResetTokenError::Invalid)?;
    let request_id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let expires_at: i64 = row.get(2)?;
    drop(rows);

    if expires_at <= now.unix_timestamp() {
        conn.execute("DELETE FROM reset_requests WHERE id = ?", [request_id.as_str()])
            .await?;
        return Err(ResetTokenError::Expired);
    }

    Ok(user_id)
}

pub async fn request_reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequestPayload>,
) -> Result<(StatusCode, Json<ResetRequestResponse>), (StatusCode, String)> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Email is required".to_string()));
    }

    let accepted = ResetRequestResponse {
        message: RESET_REQUEST_ACCEPTED.to_string(),
        token: None,
    };

    // Same answer for unknown emails so accounts cannot be enumerated.
    let Some(user) = get_user_by_email(&state.main_db, &email)
        .await
        .map_err(log_db_error("failed to look up user"))?
    else {
        tracing::debug!("password reset requested for unknown email");
        return Ok((StatusCode::OK, Json(accepted)));
    };

    let token = issue_reset_token(
        &state.main_db,
        &user.id,
        OffsetDateTime::now_utc(),
        state.config.reset_token_ttl,
    )
    .await
    .map_err(log_db_error("failed to store reset request"))?;

    tracing::info!(user_id = %user.id, "issued password reset token");

    let token = state.config.expose_reset_tokens.then_some(token);
    Ok((StatusCode::OK, Json(ResetRequestResponse { token, ..accepted })))
}

pub async fn check_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<ResetCheckResponse>), (StatusCode, String)> {
    let user_id = validate_reset_token(&state.main_db, &token, OffsetDateTime::now_utc()).await?;

    let user = get_user_by_id(&state.main_db, &user_id)
        .await
        .map_err(log_db_error("failed to look up user"))?
        .ok_or(ResetTokenError::Invalid)?;

    Ok((
        StatusCode::OK,
        Json(ResetCheckResponse {
            valid: true,
            email: user.email,
        }),
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<(StatusCode, Json<MessageResponse>), (StatusCode, String)> {
    let user_id = validate_reset_token(&state.main_db, &token, OffsetDateTime::now_utc()).await?;

    if payload.plain_password.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Password is required".to_string()));
    }
    validate_password(&payload.plain_password)?;

    let hash = hash_password(&payload.plain_password).map_err(|e| {
        tracing::error!("failed to hash password: {e:#}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ERR_DATABASE_OPERATION.to_string(),
        )
    })?;

    {
        let conn = state.main_db.write().await;
        let tx = conn
            .transaction()
            .await
            .map_err(log_db_error("failed to start password reset"))?;
        tx.execute(
            "UPDATE users SET password_hash = ? WHERE id = ?",
            (hash.as_str(), user_id.as_str()),
        )
        .await
        .map_err(log_db_error("failed to update password"))?;
        tx.execute("DELETE FROM reset_requests WHERE user_id = ?", [user_id.as_str()])
            .await
            .map_err(log_db_error("failed to consume reset token"))?;
        tx.commit()
            .await
            .map_err(log_db_error("failed to commit password reset"))?;
    }

    session.clear().await;
    tracing::info!(%user_id, "password reset completed");

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password successfully reset".to_string(),
        }),
    ))
}
