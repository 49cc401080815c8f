use std::{fmt::Display, str::FromStr};

use axum::http::StatusCode;
use rust_decimal::Decimal;
use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::constants::*;
use crate::database::{Db, get_user_db};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

pub async fn get_user_database(data_path: &str, user_id: &str) -> Result<Db, (StatusCode, String)> {
    get_user_db(data_path, user_id).await.map_err(|e| {
        tracing::error!(%user_id, "failed to open user database: {e:#}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ERR_DATABASE_ACCESS.to_string(),
        )
    })
}

pub fn db_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ERR_DATABASE_OPERATION.to_string(),
    )
}

pub fn db_error_with_context(context: &str) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Database error: {}", context),
    )
}

/// Map a storage error to a 500 response, logging the cause.
pub fn log_db_error<E: Display>(context: &'static str) -> impl FnOnce(E) -> (StatusCode, String) {
    move |e| {
        tracing::error!("database error, {context}: {e}");
        db_error_with_context(context)
    }
}

pub fn not_found(message: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, message.to_string())
}

pub fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

pub fn validate_string_length(
    value: &str,
    field_name: &str,
    max_length: usize,
) -> Result<(), (StatusCode, String)> {
    if value.trim().is_empty() {
        return Err(bad_request(format!("{} cannot be empty", field_name)));
    }
    if value.chars().count() > max_length {
        return Err(bad_request(format!(
            "{} must be less than {} characters",
            field_name, max_length
        )));
    }
    Ok(())
}

/// Trim an optional free-text field, treating blank text as absent.
pub fn normalize_optional_text(
    value: Option<&str>,
    field_name: &str,
    max_length: usize,
) -> Result<Option<String>, (StatusCode, String)> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > max_length => Err(bad_request(format!(
            "{} must be less than {} characters",
            field_name, max_length
        ))),
        Some(text) => Ok(Some(text.to_string())),
    }
}

pub fn validate_positive_amount(amount: Decimal, field_name: &str) -> Result<(), (StatusCode, String)> {
    if amount <= Decimal::ZERO {
        return Err(bad_request(format!("{} must be greater than zero", field_name)));
    }
    validate_max_amount(amount, field_name)
}

pub fn validate_max_amount(amount: Decimal, field_name: &str) -> Result<(), (StatusCode, String)> {
    if amount > Decimal::from(MAX_AMOUNT) {
        return Err(bad_request(format!(
            "{} cannot exceed {}",
            field_name, MAX_AMOUNT
        )));
    }
    Ok(())
}

pub fn validate_limit(limit: Option<u32>, default: u32) -> Result<u32, (StatusCode, String)> {
    match limit {
        Some(l) => {
            if l == 0 {
                Err(bad_request("Limit must be greater than 0"))
            } else if l > MAX_LIMIT {
                Err(bad_request(format!("Limit cannot exceed {}", MAX_LIMIT)))
            } else {
                Ok(l)
            }
        }
        None => Ok(default),
    }
}

pub fn validate_categories_limit(limit: Option<u32>) -> Result<u32, (StatusCode, String)> {
    validate_limit(limit, DEFAULT_CATEGORIES_LIMIT)
}

pub fn validate_goals_limit(limit: Option<u32>) -> Result<u32, (StatusCode, String)> {
    validate_limit(limit, DEFAULT_GOALS_LIMIT)
}

pub fn validate_transactions_limit(limit: Option<u32>) -> Result<u32, (StatusCode, String)> {
    validate_limit(limit, DEFAULT_TRANSACTIONS_LIMIT)
}

pub fn validate_offset(offset: Option<u32>) -> Result<u32, (StatusCode, String)> {
    match offset {
        Some(o) => {
            if o > MAX_OFFSET {
                Err(bad_request(format!("Offset cannot exceed {}", MAX_OFFSET)))
            } else {
                Ok(o)
            }
        }
        None => Ok(0),
    }
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn format_date(date: Date) -> String {
    // The format only uses calendar components, which every Date has.
    date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}

pub fn parse_date(value: &str) -> anyhow::Result<Date> {
    Ok(Date::parse(value.trim(), DATE_FORMAT)?)
}

/// Parse a `YYYY-MM-DD` query parameter, answering 400 when malformed.
pub fn parse_date_param(value: Option<&str>, field_name: &str) -> Result<Option<Date>, (StatusCode, String)> {
    value
        .map(|raw| {
            parse_date(raw).map_err(|_| bad_request(format!("{} must be a date like 2025-01-31", field_name)))
        })
        .transpose()
}

pub fn parse_decimal(value: &str) -> anyhow::Result<Decimal> {
    Ok(Decimal::from_str(value.trim())?)
}

pub fn validate_date_range(start_date: Date, end_date: Date) -> Result<(), (StatusCode, String)> {
    if end_date < start_date {
        return Err(bad_request("End date cannot be before start date"));
    }
    Ok(())
}

pub async fn validate_category_exists(
    conn: &libsql::Connection,
    category_id: &str,
) -> Result<(), (StatusCode, String)> {
    let mut rows = conn
        .query("SELECT id FROM categories WHERE id = ?", [category_id])
        .await
        .map_err(|_| db_error_with_context("failed to check category existence"))?;

    if rows.next().await.map_err(|_| db_error())?.is_none() {
        return Err(bad_request("Category does not exist"));
    }
    Ok(())
}
