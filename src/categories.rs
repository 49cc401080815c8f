use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::AppState;
use crate::auth::get_current_user;
use crate::constants::*;
use crate::models::{
    Category, CreateCategoryPayload, GetCategoriesResponse, PaginationQuery, UpdateCategoryPayload,
};
use crate::utils::{
    db_error, db_error_with_context, get_user_database, log_db_error, normalize_optional_text,
    not_found, validate_categories_limit, validate_offset, validate_string_length,
};

pub fn validate_category_name(name: &str) -> Result<(), (StatusCode, String)> {
    validate_string_length(name, "Category name", MAX_CATEGORY_NAME_LENGTH)
}

pub fn extract_category_from_row(row: libsql::Row) -> Result<Category, (StatusCode, String)> {
    let id: String = row
        .get(0)
        .map_err(|_| db_error_with_context("invalid category data"))?;
    let name: String = row
        .get(1)
        .map_err(|_| db_error_with_context("invalid category data"))?;
    let description: Option<String> = row
        .get(2)
        .map_err(|_| db_error_with_context("invalid category data"))?;

    Ok(Category {
        id,
        name,
        description,
    })
}

/// Reject a name already used by another category, ignoring case.
async fn ensure_name_available(
    conn: &libsql::Connection,
    name: &str,
    except_id: Option<&str>,
) -> Result<(), (StatusCode, String)> {
    let mut existing_rows = conn
        .query(
            "SELECT id FROM categories WHERE LOWER(name) = LOWER(?) AND id != ?",
            (name, except_id.unwrap_or("")),
        )
        .await
        .map_err(|_| db_error_with_context("failed to check existing category"))?;

    if existing_rows
        .next()
        .await
        .map_err(|_| db_error())?
        .is_some()
    {
        return Err((
            StatusCode::CONFLICT,
            "Category name already exists (case-insensitive)".to_string(),
        ));
    }
    Ok(())
}

/// Categories referenced by a transaction cannot be deleted.
pub async fn validate_category_not_in_use(
    conn: &libsql::Connection,
    category_id: &str,
) -> Result<(), (StatusCode, String)> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM transactions WHERE category_id = ?",
            [category_id],
        )
        .await
        .map_err(|_| db_error_with_context("failed to check category usage"))?;

    let in_use: u32 = match rows.next().await.map_err(|_| db_error())? {
        Some(row) => row.get(0).map_err(|_| db_error())?,
        None => 0,
    };

    if in_use > 0 {
        return Err((
            StatusCode::CONFLICT,
            format!("Category is used by {} transaction(s)", in_use),
        ));
    }
    Ok(())
}

pub async fn get_category(
    conn: &libsql::Connection,
    category_id: &str,
) -> Result<Option<Category>, (StatusCode, String)> {
    let mut rows = conn
        .query(
            "SELECT id, name, description FROM categories WHERE id = ?",
            [category_id],
        )
        .await
        .map_err(log_db_error("failed to load category"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => Ok(Some(extract_category_from_row(row)?)),
        None => Ok(None),
    }
}

pub async fn create_category(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateCategoryPayload>,
) -> Result<(StatusCode, Json<Category>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    validate_category_name(&payload.name)?;
    let category_name = payload.name.trim().to_string();
    let description = normalize_optional_text(
        payload.description.as_deref(),
        "Category description",
        MAX_CATEGORY_DESCRIPTION_LENGTH,
    )?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;

    // Use a single write connection for the check and the insert
    let conn = user_db.write().await;
    ensure_name_available(&conn, &category_name, None).await?;

    let category_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO categories (id, name, description) VALUES (?, ?, ?)",
        (
            category_id.as_str(),
            category_name.as_str(),
            description.clone(),
        ),
    )
    .await
    .map_err(log_db_error("category creation failed"))?;

    let category = Category {
        id: category_id,
        name: category_name,
        description,
    };

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_categories(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PaginationQuery>,
) -> Result<(StatusCode, Json<GetCategoriesResponse>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;
    let limit = validate_categories_limit(query.limit)?;
    let offset = validate_offset(query.offset)?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.read().await;

    let mut count_rows = conn
        .query("SELECT COUNT(*) FROM categories", ())
        .await
        .map_err(log_db_error("failed to count categories"))?;
    let total_count: u32 = match count_rows.next().await.map_err(|_| db_error())? {
        Some(row) => row.get(0).map_err(|_| db_error())?,
        None => 0,
    };

    let mut rows = conn
        .query(
            "SELECT id, name, description FROM categories ORDER BY name COLLATE NOCASE ASC LIMIT ? OFFSET ?",
            (limit, offset),
        )
        .await
        .map_err(log_db_error("failed to query categories"))?;

    let mut categories = Vec::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        categories.push(extract_category_from_row(row)?);
    }

    Ok((
        StatusCode::OK,
        Json(GetCategoriesResponse {
            categories,
            total_count,
        }),
    ))
}

pub async fn update_category(
    State(state): State<AppState>,
    session: Session,
    Path(category_id): Path<String>,
    Json(payload): Json<UpdateCategoryPayload>,
) -> Result<(StatusCode, Json<Category>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    validate_category_name(&payload.name)?;
    let category_name = payload.name.trim().to_string();
    let description = normalize_optional_text(
        payload.description.as_deref(),
        "Category description",
        MAX_CATEGORY_DESCRIPTION_LENGTH,
    )?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;

    if get_category(&conn, &category_id).await?.is_none() {
        return Err(not_found(ERR_CATEGORY_NOT_FOUND));
    }
    ensure_name_available(&conn, &category_name, Some(&category_id)).await?;

    conn.execute(
        "UPDATE categories SET name = ?, description = ? WHERE id = ?",
        (
            category_name.as_str(),
            description.clone(),
            category_id.as_str(),
        ),
    )
    .await
    .map_err(log_db_error("category update failed"))?;

    Ok((
        StatusCode::OK,
        Json(Category {
            id: category_id,
            name: category_name,
            description,
        }),
    ))
}

pub async fn delete_category(
    State(state): State<AppState>,
    session: Session,
    Path(category_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;

    if get_category(&conn, &category_id).await?.is_none() {
        return Err(not_found(ERR_CATEGORY_NOT_FOUND));
    }
    validate_category_not_in_use(&conn, &category_id).await?;

    conn.execute("DELETE FROM categories WHERE id = ?", [category_id.as_str()])
        .await
        .map_err(log_db_error("category deletion failed"))?;

    Ok(StatusCode::NO_CONTENT)
}
