use axum::{Json, extract::State, http::StatusCode};
use tower_sessions::Session;

use crate::AppState;
use crate::auth::{
    get_current_user, get_user_by_id, is_unique_violation, normalize_email, set_session_user,
    validate_username,
};
use crate::constants::*;
use crate::models::{PublicUser, UpdateProfilePayload};
use crate::utils::log_db_error;

pub async fn get_profile(
    State(state): State<AppState>,
    session: Session,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user = get_user_by_id(&state.main_db, &user_id)
        .await
        .map_err(log_db_error("failed to load profile"))?
        .ok_or((StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED.to_string()))?;

    Ok((StatusCode::OK, Json(user.into())))
}

pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let mut user = get_user_by_id(&state.main_db, &user_id)
        .await
        .map_err(log_db_error("failed to load profile"))?
        .ok_or((StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED.to_string()))?;

    if let Some(username) = payload.username.as_deref() {
        validate_username(username)?;
        user.username = username.trim().to_string();
    }
    if let Some(email) = payload.email.as_deref() {
        user.email = normalize_email(email)?;
    }

    {
        let conn = state.main_db.write().await;
        conn.execute(
            "UPDATE users SET email = ?, name = ? WHERE id = ?",
            (user.email.as_str(), user.username.as_str(), user.id.as_str()),
        )
        .await
        .map_err(|e| {
            let e = anyhow::Error::from(e);
            if is_unique_violation(&e) {
                (StatusCode::CONFLICT, "Email already registered".to_string())
            } else {
                tracing::error!(%user_id, "failed to update profile: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ERR_DATABASE_OPERATION.to_string(),
                )
            }
        })?;
    }

    set_session_user(&session, &user.id, &user.username).await?;

    Ok((StatusCode::OK, Json(user.into())))
}
