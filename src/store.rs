//! Row mapping and persistence for goals and transactions.
//!
//! A transaction's `goal_id` column is the stored side of the goal
//! relationship; a goal's `transaction_ids` are rebuilt from it on load.
//! Every membership change goes through the [`Goal`] aggregator first and is
//! then written back here.

use axum::http::StatusCode;
use std::collections::HashMap;
use libsql::{Connection, Row, Value};
use time::Date;

use crate::constants::*;
use crate::domain::{Goal, Transaction, TransactionType};
use crate::utils::{
    bad_request, db_error, db_error_with_context, format_date, log_db_error, parse_date, parse_decimal,
};

pub const TRANSACTION_COLUMNS: &str =
    "id, amount, kind, description, date, category_id, goal_id, user_id";
pub const GOAL_COLUMNS: &str =
    "id, title, target_amount, current_amount, start_date, end_date, user_id";

fn invalid<E: std::fmt::Display>(what: &'static str) -> impl FnOnce(E) -> (StatusCode, String) {
    move |e| {
        tracing::error!("stored {what} is malformed: {e}");
        db_error_with_context(what)
    }
}

pub fn extract_transaction_from_row(row: &Row) -> Result<Transaction, (StatusCode, String)> {
    let bad_row = |_| db_error_with_context("invalid transaction data");

    let id: String = row.get(0).map_err(bad_row)?;
    let amount: String = row.get(1).map_err(bad_row)?;
    let kind: String = row.get(2).map_err(bad_row)?;
    let description: Option<String> = row.get(3).map_err(bad_row)?;
    let date: String = row.get(4).map_err(bad_row)?;
    let category_id: Option<String> = row.get(5).map_err(bad_row)?;
    let goal_id: Option<String> = row.get(6).map_err(bad_row)?;
    let user_id: String = row.get(7).map_err(bad_row)?;

    let amount = parse_decimal(&amount).map_err(invalid("transaction amount"))?;
    let kind = kind
        .parse::<TransactionType>()
        .map_err(invalid("transaction type"))?;
    let date = parse_date(&date).map_err(invalid("transaction date"))?;

    let mut transaction = Transaction::new(user_id, amount, kind, date)
        .with_id(id)
        .with_goal_id(goal_id);
    transaction
        .set_description(description)
        .set_category_id(category_id);

    Ok(transaction)
}

/// Goal columns only; `transaction_ids` are filled in by [`load_goal`].
pub fn extract_goal_from_row(row: &Row) -> Result<Goal, (StatusCode, String)> {
    let bad_row = |_| db_error_with_context("invalid goal data");

    let id: String = row.get(0).map_err(bad_row)?;
    let title: String = row.get(1).map_err(bad_row)?;
    let target_amount: String = row.get(2).map_err(bad_row)?;
    let current_amount: String = row.get(3).map_err(bad_row)?;
    let start_date: String = row.get(4).map_err(bad_row)?;
    let end_date: String = row.get(5).map_err(bad_row)?;
    let user_id: String = row.get(6).map_err(bad_row)?;

    let target_amount = parse_decimal(&target_amount).map_err(invalid("goal target amount"))?;
    let current_amount = parse_decimal(&current_amount).map_err(invalid("goal current amount"))?;
    let start_date = parse_date(&start_date).map_err(invalid("goal start date"))?;
    let end_date = parse_date(&end_date).map_err(invalid("goal end date"))?;

    let mut goal = Goal::new(user_id, title, target_amount, start_date, end_date).with_id(id);
    goal.set_current_amount(current_amount);
    Ok(goal)
}

pub async fn load_transaction(
    conn: &Connection,
    transaction_id: &str,
) -> Result<Option<Transaction>, (StatusCode, String)> {
    let mut rows = conn
        .query(
            &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"),
            [transaction_id],
        )
        .await
        .map_err(log_db_error("failed to load transaction"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => Ok(Some(extract_transaction_from_row(&row)?)),
        None => Ok(None),
    }
}

pub async fn require_transaction(
    conn: &Connection,
    transaction_id: &str,
) -> Result<Transaction, (StatusCode, String)> {
    load_transaction(conn, transaction_id)
        .await?
        .ok_or((StatusCode::NOT_FOUND, ERR_TRANSACTION_NOT_FOUND.to_string()))
}

/// Member transactions of a goal, oldest first.
pub async fn load_goal_transactions(
    conn: &Connection,
    goal_id: &str,
) -> Result<Vec<Transaction>, (StatusCode, String)> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE goal_id = ? ORDER BY date ASC, rowid ASC"
            ),
            [goal_id],
        )
        .await
        .map_err(log_db_error("failed to load goal transactions"))?;

    let mut transactions = Vec::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        transactions.push(extract_transaction_from_row(&row)?);
    }
    Ok(transactions)
}

pub async fn load_goal(conn: &Connection, goal_id: &str) -> Result<Option<Goal>, (StatusCode, String)> {
    let mut rows = conn
        .query(
            &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?"),
            [goal_id],
        )
        .await
        .map_err(log_db_error("failed to load goal"))?;

    let goal = match rows.next().await.map_err(|_| db_error())? {
        Some(row) => extract_goal_from_row(&row)?,
        None => return Ok(None),
    };
    drop(rows);

    let transaction_ids = load_goal_transactions(conn, goal.id())
        .await?
        .iter()
        .map(|transaction| transaction.id().to_string())
        .collect();

    Ok(Some(goal.with_transaction_ids(transaction_ids)))
}

pub async fn require_goal(conn: &Connection, goal_id: &str) -> Result<Goal, (StatusCode, String)> {
    load_goal(conn, goal_id)
        .await?
        .ok_or((StatusCode::NOT_FOUND, ERR_GOAL_NOT_FOUND.to_string()))
}

/// One page of goals ordered by end date then title, with their member ids.
pub async fn load_goals(
    conn: &Connection,
    limit: u32,
    offset: u32,
) -> Result<Vec<Goal>, (StatusCode, String)> {
    load_goal_page(conn, i64::from(limit), i64::from(offset)).await
}

/// Every goal, in the same order as [`load_goals`].
pub async fn load_all_goals(conn: &Connection) -> Result<Vec<Goal>, (StatusCode, String)> {
    // A negative LIMIT means no limit in SQLite.
    load_goal_page(conn, -1, 0).await
}

const GOAL_PAGE: &str = "SELECT id FROM goals ORDER BY end_date ASC, title ASC LIMIT ?1 OFFSET ?2";

async fn load_goal_page(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<Vec<Goal>, (StatusCode, String)> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {GOAL_COLUMNS} FROM goals WHERE id IN ({GOAL_PAGE}) \
                 ORDER BY end_date ASC, title ASC"
            ),
            (limit, offset),
        )
        .await
        .map_err(log_db_error("failed to query goals"))?;

    let mut goals = Vec::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        goals.push(extract_goal_from_row(&row)?);
    }
    drop(rows);

    let mut rows = conn
        .query(
            &format!(
                "SELECT id, goal_id FROM transactions WHERE goal_id IN ({GOAL_PAGE}) \
                 ORDER BY date ASC, rowid ASC"
            ),
            (limit, offset),
        )
        .await
        .map_err(log_db_error("failed to query goal members"))?;

    let mut members: HashMap<String, Vec<String>> = HashMap::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        let id: String = row.get(0).map_err(|_| db_error())?;
        let goal_id: String = row.get(1).map_err(|_| db_error())?;
        members.entry(goal_id).or_default().push(id);
    }

    Ok(goals
        .into_iter()
        .map(|goal| {
            let transaction_ids = members.remove(goal.id()).unwrap_or_default();
            goal.with_transaction_ids(transaction_ids)
        })
        .collect())
}

pub async fn count_rows(conn: &Connection, table: &'static str) -> Result<u32, (StatusCode, String)> {
    let mut rows = conn
        .query(&format!("SELECT COUNT(*) FROM {table}"), ())
        .await
        .map_err(log_db_error("failed to count rows"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => row.get(0).map_err(|_| db_error()),
        None => Ok(0),
    }
}

pub async fn insert_transaction(
    conn: &Connection,
    transaction: &Transaction,
) -> Result<(), (StatusCode, String)> {
    conn.execute(
        &format!("INSERT INTO transactions ({TRANSACTION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"),
        transaction_values(transaction),
    )
    .await
    .map_err(log_db_error("failed to create transaction"))?;
    Ok(())
}

pub async fn update_transaction_row(
    conn: &Connection,
    transaction: &Transaction,
) -> Result<(), (StatusCode, String)> {
    let mut values = transaction_values(transaction);
    // Move the id from the front to the WHERE clause.
    let id = values.remove(0);
    values.push(id);

    conn.execute(
        "UPDATE transactions SET amount = ?, kind = ?, description = ?, date = ?, category_id = ?, goal_id = ?, user_id = ? WHERE id = ?",
        values,
    )
    .await
    .map_err(log_db_error("failed to update transaction"))?;
    Ok(())
}

pub async fn delete_transaction_row(
    conn: &Connection,
    transaction_id: &str,
) -> Result<(), (StatusCode, String)> {
    conn.execute("DELETE FROM transactions WHERE id = ?", [transaction_id])
        .await
        .map_err(log_db_error("failed to delete transaction"))?;
    Ok(())
}

fn transaction_values(transaction: &Transaction) -> Vec<Value> {
    vec![
        Value::Text(transaction.id().to_string()),
        Value::Text(transaction.amount().to_string()),
        Value::Text(transaction.kind().as_str().to_string()),
        optional_text(transaction.description()),
        Value::Text(format_date(transaction.date())),
        optional_text(transaction.category_id()),
        optional_text(transaction.goal_id()),
        Value::Text(transaction.user_id().to_string()),
    ]
}

fn optional_text(value: Option<&str>) -> Value {
    match value {
        Some(text) => Value::Text(text.to_string()),
        None => Value::Null,
    }
}

pub async fn insert_goal(conn: &Connection, goal: &Goal) -> Result<(), (StatusCode, String)> {
    conn.execute(
        &format!("INSERT INTO goals ({GOAL_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"),
        (
            goal.id(),
            goal.title(),
            goal.target_amount().to_string(),
            goal.current_amount().to_string(),
            format_date(goal.start_date()),
            format_date(goal.end_date()),
            goal.user_id(),
        ),
    )
    .await
    .map_err(log_db_error("failed to create goal"))?;
    Ok(())
}

pub async fn update_goal_row(conn: &Connection, goal: &Goal) -> Result<(), (StatusCode, String)> {
    conn.execute(
        "UPDATE goals SET title = ?, target_amount = ?, current_amount = ?, start_date = ?, end_date = ? WHERE id = ?",
        (
            goal.title(),
            goal.target_amount().to_string(),
            goal.current_amount().to_string(),
            format_date(goal.start_date()),
            format_date(goal.end_date()),
            goal.id(),
        ),
    )
    .await
    .map_err(log_db_error("failed to update goal"))?;
    Ok(())
}

pub async fn delete_goal_row(conn: &Connection, goal_id: &str) -> Result<(), (StatusCode, String)> {
    conn.execute("DELETE FROM goals WHERE id = ?", [goal_id])
        .await
        .map_err(log_db_error("failed to delete goal"))?;
    Ok(())
}

/// Recompute a goal's `current_amount` from its stored members and save it.
pub async fn sync_goal_amount(conn: &Connection, goal_id: &str) -> Result<Goal, (StatusCode, String)> {
    let mut goal = require_goal(conn, goal_id).await?;
    let members = load_goal_transactions(conn, goal_id).await?;

    let current_amount = goal
        .checked_contributed_amount(&members)
        .ok_or_else(|| bad_request(ERR_GOAL_AMOUNT_OUT_OF_RANGE))?;
    goal.set_current_amount(current_amount);
    conn.execute(
        "UPDATE goals SET current_amount = ? WHERE id = ?",
        (goal.current_amount().to_string(), goal.id()),
    )
    .await
    .map_err(log_db_error("failed to sync goal amount"))?;

    tracing::debug!(goal_id, current_amount = %goal.current_amount(), "synced goal amount");
    Ok(goal)
}

/// Point `transaction` at `target_goal_id`, or detach it when `None`, going
/// through the aggregator on both the old and the new goal.
///
/// Only the in-memory transaction is changed; the caller persists it and then
/// resyncs the goals returned here.
pub async fn relink_transaction(
    conn: &Connection,
    transaction: &mut Transaction,
    target_goal_id: Option<&str>,
) -> Result<Vec<String>, (StatusCode, String)> {
    let previous_goal_id = transaction.goal_id().map(str::to_string);
    let mut touched = Vec::new();

    if previous_goal_id.as_deref() == target_goal_id {
        touched.extend(previous_goal_id);
        return Ok(touched);
    }

    if let Some(previous_id) = previous_goal_id {
        match load_goal(conn, &previous_id).await? {
            Some(mut previous) => {
                previous.remove_transaction(transaction);
                touched.push(previous_id);
            }
            // Dangling pointer to a goal that no longer exists.
            None => {
                transaction.set_goal_id(None);
            }
        }
    }

    if let Some(target_id) = target_goal_id {
        let mut target = load_goal(conn, target_id)
            .await?
            .ok_or((StatusCode::BAD_REQUEST, "Goal does not exist".to_string()))?;
        target.add_transaction(transaction);
        touched.push(target_id.to_string());
    }

    Ok(touched)
}

pub async fn sync_goal_amounts(conn: &Connection, goal_ids: &[String]) -> Result<(), (StatusCode, String)> {
    for goal_id in goal_ids {
        sync_goal_amount(conn, goal_id).await?;
    }
    Ok(())
}

/// Filters for listing transactions. Empty filters match everything.
#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    pub goal_id: Option<String>,
    pub category_id: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

impl TransactionFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(goal_id) = &self.goal_id {
            conditions.push("goal_id = ?");
            values.push(Value::Text(goal_id.clone()));
        }
        if let Some(category_id) = &self.category_id {
            conditions.push("category_id = ?");
            values.push(Value::Text(category_id.clone()));
        }
        if let Some(start_date) = self.start_date {
            conditions.push("date >= ?");
            values.push(Value::Text(format_date(start_date)));
        }
        if let Some(end_date) = self.end_date {
            conditions.push("date <= ?");
            values.push(Value::Text(format_date(end_date)));
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

pub async fn count_transactions(
    conn: &Connection,
    filter: &TransactionFilter,
) -> Result<u32, (StatusCode, String)> {
    let (where_clause, values) = filter.where_clause();
    let mut rows = conn
        .query(&format!("SELECT COUNT(*) FROM transactions{where_clause}"), values)
        .await
        .map_err(log_db_error("failed to count transactions"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => row.get(0).map_err(|_| db_error()),
        None => Ok(0),
    }
}

/// Matching transactions, newest first.
pub async fn query_transactions(
    conn: &Connection,
    filter: &TransactionFilter,
    limit: u32,
    offset: u32,
) -> Result<Vec<Transaction>, (StatusCode, String)> {
    let (where_clause, mut values) = filter.where_clause();
    values.push(Value::Integer(i64::from(limit)));
    values.push(Value::Integer(i64::from(offset)));

    let mut rows = conn
        .query(
            &format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions{where_clause} ORDER BY date DESC, rowid DESC LIMIT ? OFFSET ?"
            ),
            values,
        )
        .await
        .map_err(log_db_error("failed to query transactions"))?;

    let mut transactions = Vec::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        transactions.push(extract_transaction_from_row(&row)?);
    }
    Ok(transactions)
}
