use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode};
use email_address::EmailAddress;
use std::str::FromStr;
use tower_sessions::Session;
use uuid::Uuid;

use crate::AppState;
use crate::constants::*;
use crate::database::Db;
use crate::models::{LoginPayload, PublicUser, RegisterPayload, User};
use crate::utils::log_db_error;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Lowercased, trimmed email if it is syntactically valid.
pub fn normalize_email(email: &str) -> Result<String, (StatusCode, String)> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Email cannot be empty".to_string()));
    }
    EmailAddress::from_str(&email)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid email address".to_string()))?;
    Ok(email)
}

pub fn validate_username(username: &str) -> Result<(), (StatusCode, String)> {
    if username.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Username cannot be empty".to_string(),
        ));
    }
    let length = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&length) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "Username must be between {} and {} characters",
                MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
            ),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err((
            StatusCode::BAD_REQUEST,
            "Username can only contain alphanumeric characters, underscores, and hyphens"
                .to_string(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), (StatusCode, String)> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            ),
        ));
    }
    Ok(())
}

pub async fn create_user(
    db: &Db,
    email: &str,
    username: &str,
    password: &str,
) -> anyhow::Result<PublicUser> {
    let hash = hash_password(password)?;
    let id = Uuid::new_v4().to_string();
    let conn = db.write().await;

    conn.execute(
        "INSERT INTO users (id, email, name, password_hash) VALUES (?, ?, ?, ?)",
        (id.as_str(), email, username, hash.as_str()),
    )
    .await?;

    Ok(PublicUser {
        id,
        email: email.to_string(),
        username: username.to_string(),
    })
}

fn extract_user_from_row(row: &libsql::Row) -> anyhow::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
    })
}

pub async fn get_user_by_email(db: &Db, email: &str) -> anyhow::Result<Option<User>> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            "SELECT id, email, name, password_hash FROM users WHERE email = ?",
            [email],
        )
        .await?;

    match rows.next().await? {
        Some(row) => Ok(Some(extract_user_from_row(&row)?)),
        None => Ok(None),
    }
}

pub async fn get_user_by_id(db: &Db, user_id: &str) -> anyhow::Result<Option<User>> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            "SELECT id, email, name, password_hash FROM users WHERE id = ?",
            [user_id],
        )
        .await?;

    match rows.next().await? {
        Some(row) => Ok(Some(extract_user_from_row(&row)?)),
        None => Ok(None),
    }
}

pub fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    let email = normalize_email(&payload.email)?;
    validate_username(&payload.username)?;
    validate_password(&payload.password)?;

    let user = create_user(&state.main_db, &email, payload.username.trim(), &payload.password)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                (StatusCode::CONFLICT, "Email already registered".to_string())
            } else {
                tracing::error!("failed to create user: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ERR_DATABASE_OPERATION.to_string(),
                )
            }
        })?;

    tracing::info!(user_id = %user.id, "registered new user");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginPayload>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    if payload.email.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Email cannot be empty".to_string()));
    }
    if payload.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Password cannot be empty".to_string(),
        ));
    }

    let email = payload.email.trim().to_lowercase();
    let user = get_user_by_email(&state.main_db, &email)
        .await
        .map_err(log_db_error("failed to look up user"))?
        .ok_or((StatusCode::UNAUTHORIZED, ERR_INVALID_CREDENTIALS.to_string()))?;

    let is_valid = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        tracing::error!(user_id = %user.id, "stored password hash is unreadable: {e:#}");
        (StatusCode::INTERNAL_SERVER_ERROR, ERR_DATABASE_OPERATION.to_string())
    })?;

    if !is_valid {
        tracing::debug!(user_id = %user.id, "rejected login with wrong password");
        return Err((StatusCode::UNAUTHORIZED, ERR_INVALID_CREDENTIALS.to_string()));
    }

    session
        .cycle_id()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    set_session_user(&session, &user.id, &user.username).await?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok((StatusCode::OK, Json(user.into())))
}

pub async fn set_session_user(
    session: &Session,
    user_id: &str,
    username: &str,
) -> Result<(), (StatusCode, String)> {
    session
        .insert(SESSION_USER_ID_KEY, user_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    session
        .insert(SESSION_USERNAME_KEY, username)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(())
}

/// The session's user id and display name, or 401.
pub async fn get_current_user(session: &Session) -> Result<(String, String), (StatusCode, String)> {
    let user_id: Option<String> = session
        .get(SESSION_USER_ID_KEY)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, ERR_INVALID_SESSION.to_string()))?;

    let username: Option<String> = session
        .get(SESSION_USERNAME_KEY)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, ERR_INVALID_SESSION.to_string()))?;

    match (user_id, username) {
        (Some(id), Some(name)) => Ok((id, name)),
        _ => Err((StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED.to_string())),
    }
}

pub async fn me(
    State(state): State<AppState>,
    session: Session,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;
    let user = get_user_by_id(&state.main_db, &user_id)
        .await
        .map_err(log_db_error("failed to look up user"))?
        .ok_or((StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED.to_string()))?;

    Ok((StatusCode::OK, Json(user.into())))
}

pub async fn logout(session: Session) -> Result<StatusCode, (StatusCode, String)> {
    session.clear().await;

    Ok(StatusCode::NO_CONTENT)
}
