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
use crate::domain::{Goal, GoalProgress, Transaction};
use crate::models::{
    CreateGoalPayload, CreateGoalTransactionPayload, GetGoalsResponse, PaginationQuery,
    UpdateGoalPayload,
};
use crate::store::{
    count_rows, delete_goal_row, insert_goal, load_goal_transactions, load_goals,
    relink_transaction, require_goal, require_transaction, sync_goal_amounts, update_goal_row,
    update_transaction_row,
};
use crate::transactions::{TransactionInput, create_linked_transaction};
use crate::utils::{
    bad_request, get_user_database, log_db_error, today, validate_date_range, validate_goals_limit,
    validate_max_amount, validate_offset, validate_positive_amount, validate_string_length,
};

pub fn validate_goal_title(title: &str) -> Result<(), (StatusCode, String)> {
    validate_string_length(title, "Goal title", MAX_GOAL_TITLE_LENGTH)
}

/// Checks shared by goal creation and update.
pub fn validate_goal_fields(
    title: &str,
    target_amount: Decimal,
    current_amount: Option<Decimal>,
    start_date: Date,
    end_date: Date,
) -> Result<(), (StatusCode, String)> {
    validate_goal_title(title)?;
    validate_positive_amount(target_amount, "Target amount")?;
    if let Some(current_amount) = current_amount {
        if current_amount < Decimal::ZERO {
            return Err(bad_request("Current amount cannot be negative"));
        }
        validate_max_amount(current_amount, "Current amount")?;
    }
    validate_date_range(start_date, end_date)
}

pub async fn create_goal(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateGoalPayload>,
) -> Result<(StatusCode, Json<Goal>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    validate_goal_fields(
        &payload.title,
        payload.target_amount,
        payload.current_amount,
        payload.start_date,
        payload.end_date,
    )?;

    let mut goal = Goal::new(
        user_id.as_str(),
        payload.title.trim(),
        payload.target_amount,
        payload.start_date,
        payload.end_date,
    );
    if let Some(current_amount) = payload.current_amount {
        goal.set_current_amount(current_amount);
    }

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;
    insert_goal(&conn, &goal).await?;

    tracing::debug!(goal_id = goal.id(), "created goal");
    Ok((StatusCode::CREATED, Json(goal)))
}

pub async fn get_goals(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PaginationQuery>,
) -> Result<(StatusCode, Json<GetGoalsResponse>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;
    let limit = validate_goals_limit(query.limit)?;
    let offset = validate_offset(query.offset)?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.read().await;

    let total_count = count_rows(&conn, "goals").await?;
    let goals = load_goals(&conn, limit, offset).await?;

    Ok((StatusCode::OK, Json(GetGoalsResponse { goals, total_count })))
}

pub async fn get_goal(
    State(state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
) -> Result<(StatusCode, Json<Goal>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.read().await;
    let goal = require_goal(&conn, &goal_id).await?;

    Ok((StatusCode::OK, Json(goal)))
}

/// Replace a goal's fields. An explicit `current_amount` overrides the synced
/// value until the goal's membership next changes.
pub async fn update_goal(
    State(state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
    Json(payload): Json<UpdateGoalPayload>,
) -> Result<(StatusCode, Json<Goal>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    validate_goal_fields(
        &payload.title,
        payload.target_amount,
        payload.current_amount,
        payload.start_date,
        payload.end_date,
    )?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;

    let mut goal = require_goal(&conn, &goal_id).await?;
    goal.set_title(payload.title.trim())
        .set_target_amount(payload.target_amount)
        .set_start_date(payload.start_date)
        .set_end_date(payload.end_date);
    if let Some(current_amount) = payload.current_amount {
        goal.set_current_amount(current_amount);
    }

    update_goal_row(&conn, &goal).await?;

    Ok((StatusCode::OK, Json(goal)))
}

/// Delete a goal. Its transactions are detached and kept.
pub async fn delete_goal(
    State(state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;

    let tx = conn
        .transaction()
        .await
        .map_err(log_db_error("failed to start transaction"))?;

    let mut goal = require_goal(&tx, &goal_id).await?;
    let mut members = load_goal_transactions(&tx, &goal_id).await?;
    for transaction in members.iter_mut() {
        goal.remove_transaction(transaction);
        update_transaction_row(&tx, transaction).await?;
    }
    delete_goal_row(&tx, &goal_id).await?;

    tx.commit()
        .await
        .map_err(log_db_error("failed to commit transaction"))?;

    tracing::debug!(%goal_id, detached = members.len(), "deleted goal");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_goal_progress(
    State(state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
) -> Result<(StatusCode, Json<GoalProgress>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.read().await;
    let goal = require_goal(&conn, &goal_id).await?;

    Ok((StatusCode::OK, Json(GoalProgress::for_goal(&goal, today()))))
}

pub async fn get_goal_transactions(
    State(state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
) -> Result<(StatusCode, Json<Vec<Transaction>>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.read().await;
    require_goal(&conn, &goal_id).await?;
    let transactions = load_goal_transactions(&conn, &goal_id).await?;

    Ok((StatusCode::OK, Json(transactions)))
}

pub async fn create_goal_transaction(
    State(state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
    Json(payload): Json<CreateGoalTransactionPayload>,
) -> Result<(StatusCode, Json<Transaction>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let input = TransactionInput::validate(
        payload.amount,
        payload.kind,
        payload.description.as_deref(),
        payload.date,
        payload.category_id.as_deref(),
    )?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;
    require_goal(&conn, &goal_id).await?;

    let transaction = create_linked_transaction(&conn, &user_id, &input, Some(&goal_id)).await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Attach an existing transaction to a goal, moving it off any other goal.
pub async fn attach_goal_transaction(
    State(state): State<AppState>,
    session: Session,
    Path((goal_id, transaction_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Goal>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;

    let tx = conn
        .transaction()
        .await
        .map_err(log_db_error("failed to start transaction"))?;

    require_goal(&tx, &goal_id).await?;
    let mut transaction = require_transaction(&tx, &transaction_id).await?;
    let touched = relink_transaction(&tx, &mut transaction, Some(&goal_id)).await?;

    update_transaction_row(&tx, &transaction).await?;
    sync_goal_amounts(&tx, &touched).await?;
    let goal = require_goal(&tx, &goal_id).await?;

    tx.commit()
        .await
        .map_err(log_db_error("failed to commit transaction"))?;

    Ok((StatusCode::OK, Json(goal)))
}

/// Detach a transaction from a goal. Detaching a transaction that is not a
/// member leaves everything unchanged.
pub async fn detach_goal_transaction(
    State(state): State<AppState>,
    session: Session,
    Path((goal_id, transaction_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Goal>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.write().await;

    let tx = conn
        .transaction()
        .await
        .map_err(log_db_error("failed to start transaction"))?;

    let mut goal = require_goal(&tx, &goal_id).await?;
    let mut transaction = require_transaction(&tx, &transaction_id).await?;

    if goal.contains(&transaction) {
        goal.remove_transaction(&mut transaction);
        update_transaction_row(&tx, &transaction).await?;
        sync_goal_amounts(&tx, &[goal_id.clone()]).await?;
        goal = require_goal(&tx, &goal_id).await?;
    }

    tx.commit()
        .await
        .map_err(log_db_error("failed to commit transaction"))?;

    Ok((StatusCode::OK, Json(goal)))
}
