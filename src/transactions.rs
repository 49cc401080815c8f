use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use time::Date;
use tower_sessions::Session;

use crate::AppState;
use crate::auth::get_current_user;
use crate::constants::*;
use crate::domain::{Transaction, TransactionType};
use crate::models::{CreateTransactionPayload, GetTransactionsQuery, GetTransactionsResponse};
use crate::store::{
    TransactionFilter, count_transactions, delete_transaction_row, insert_transaction,
    query_transactions, relink_transaction, require_transaction, sync_goal_amounts,
    update_transaction_row,
};
use crate::utils::{
    get_user_database, log_db_error, normalize_optional_text, parse_date_param, today,
    validate_category_exists, validate_offset, validate_positive_amount,
    validate_transactions_limit,
};

/// Validated transaction fields shared by the create and update routes.
#[derive(Debug, Clone)]
pub struct TransactionInput {
    pub amount: Decimal,
    pub kind: TransactionType,
    pub description: Option<String>,
    pub date: Date,
    pub category_id: Option<String>,
}

impl TransactionInput {
    pub fn validate(
        amount: Decimal,
        kind: TransactionType,
        description: Option<&str>,
        date: Option<Date>,
        category_id: Option<&str>,
    ) -> Result<Self, (StatusCode, String)> {
        validate_positive_amount(amount, "Transaction amount")?;
        let description = normalize_optional_text(
            description,
            "Transaction description",
            MAX_TRANSACTION_DESCRIPTION_LENGTH,
        )?;
        let category_id = category_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        Ok(Self {
            amount,
            kind,
            description,
            date: date.unwrap_or_else(today),
            category_id,
        })
    }

    /// Copy the fields onto `transaction`; the goal link is handled
    /// separately.
    pub fn apply_to(&self, transaction: &mut Transaction) {
        transaction
            .set_amount(self.amount)
            .set_kind(self.kind)
            .set_description(self.description.clone())
            .set_date(self.date)
            .set_category_id(self.category_id.clone());
    }
}

/// Create and store a transaction, attaching it to `goal_id` if given. Runs
/// in its own SQL transaction.
pub async fn create_linked_transaction(
    conn: &libsql::Connection,
    user_id: &str,
    input: &TransactionInput,
    goal_id: Option<&str>,
) -> Result<Transaction, (StatusCode, String)> {
    if let Some(category_id) = input.category_id.as_deref() {
        validate_category_exists(conn, category_id).await?;
    }

    let tx = conn
        .transaction()
        .await
        .map_err(log_db_error("failed to start transaction"))?;

    let mut transaction = Transaction::new(user_id, input.amount, input.kind, input.date);
    input.apply_to(&mut transaction);
    let touched = relink_transaction(&tx, &mut transaction, goal_id).await?;

    insert_transaction(&tx, &transaction).await?;
    sync_goal_amounts(&tx, &touched).await?;

    tx.commit()
        .await
        .map_err(log_db_error("failed to commit transaction"))?;

    tracing::debug!(transaction_id = transaction.id(), goal_id, "created transaction");
    Ok(transaction)
}

pub async fn create_transaction(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateTransactionPayload>,
) -> Result<(StatusCode, Json<Transaction>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let input = TransactionInput::validate(
        payload.amount,
        payload.kind,
        payload.description.as_deref(),
        payload.date,
        payload.category_id.as_deref(),
    )?;
    let goal_id = payload
        .goal_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;

    let transaction = create_linked_transaction(&conn, &user_id, &input, goal_id).await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn get_transactions(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<GetTransactionsQuery>,
) -> Result<(StatusCode, Json<GetTransactionsResponse>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let limit = validate_transactions_limit(query.limit)?;
    let offset = validate_offset(query.offset)?;
    let filter = TransactionFilter {
        goal_id: query.goal_id,
        category_id: query.category_id,
        start_date: parse_date_param(query.start_date.as_deref(), "Start date")?,
        end_date: parse_date_param(query.end_date.as_deref(), "End date")?,
    };

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.read().await;

    let total_count = count_transactions(&conn, &filter).await?;
    let transactions = query_transactions(&conn, &filter, limit, offset).await?;

    Ok((
        StatusCode::OK,
        Json(GetTransactionsResponse {
            transactions,
            total_count,
        }),
    ))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    session: Session,
    Path(transaction_id): Path<String>,
) -> Result<(StatusCode, Json<Transaction>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.read().await;
    let transaction = require_transaction(&conn, &transaction_id).await?;

    Ok((StatusCode::OK, Json(transaction)))
}

pub async fn update_transaction(
    State(state): State<AppState>,
    session: Session,
    Path(transaction_id): Path<String>,
    Json(payload): Json<CreateTransactionPayload>,
) -> Result<(StatusCode, Json<Transaction>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let input = TransactionInput::validate(
        payload.amount,
        payload.kind,
        payload.description.as_deref(),
        payload.date,
        payload.category_id.as_deref(),
    )?;
    let goal_id = payload
        .goal_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;

    if let Some(category_id) = input.category_id.as_deref() {
        validate_category_exists(&conn, category_id).await?;
    }

    let tx = conn
        .transaction()
        .await
        .map_err(log_db_error("failed to start transaction"))?;

    let mut transaction = require_transaction(&tx, &transaction_id).await?;
    input.apply_to(&mut transaction);
    let touched = relink_transaction(&tx, &mut transaction, goal_id).await?;

    update_transaction_row(&tx, &transaction).await?;
    sync_goal_amounts(&tx, &touched).await?;

    tx.commit()
        .await
        .map_err(log_db_error("failed to commit transaction"))?;

    Ok((StatusCode::OK, Json(transaction)))
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    session: Session,
    Path(transaction_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;

    let tx = conn
        .transaction()
        .await
        .map_err(log_db_error("failed to start transaction"))?;

    let mut transaction = require_transaction(&tx, &transaction_id).await?;
    let touched = relink_transaction(&tx, &mut transaction, None).await?;

    delete_transaction_row(&tx, transaction.id()).await?;
    sync_goal_amounts(&tx, &touched).await?;

    tx.commit()
        .await
        .map_err(log_db_error("failed to commit transaction"))?;

    Ok(StatusCode::NO_CONTENT)
}
