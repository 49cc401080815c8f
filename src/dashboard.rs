use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use tower_sessions::Session;

use crate::AppState;
use crate::auth::get_current_user;
use crate::constants::ERR_TOTALS_OUT_OF_RANGE;
use crate::domain::{GoalProgress, TransactionType};
use crate::models::DashboardResponse;
use crate::store::load_all_goals;
use crate::utils::{db_error, get_user_database, log_db_error, parse_decimal, today};

/// Income and expense totals. Amounts are summed as decimals in Rust since
/// they are stored as text. A total that overflows `Decimal` is a 500.
pub async fn transaction_totals(
    conn: &libsql::Connection,
) -> Result<(Decimal, Decimal), (StatusCode, String)> {
    let mut rows = conn
        .query("SELECT amount, kind FROM transactions", ())
        .await
        .map_err(log_db_error("failed to query transaction totals"))?;

    let mut income = Decimal::ZERO;
    let mut expense = Decimal::ZERO;
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        let amount: String = row.get(0).map_err(|_| db_error())?;
        let kind: String = row.get(1).map_err(|_| db_error())?;

        let amount = parse_decimal(&amount).map_err(log_db_error("invalid transaction amount"))?;
        let total = match kind.parse::<TransactionType>() {
            Ok(TransactionType::Income) => &mut income,
            Ok(TransactionType::Expense) => &mut expense,
            Err(e) => {
                tracing::warn!("skipping transaction in totals: {e}");
                continue;
            }
        };
        *total = total.checked_add(amount).ok_or_else(totals_out_of_range)?;
    }

    Ok((income, expense))
}

fn totals_out_of_range() -> (StatusCode, String) {
    tracing::error!("transaction totals overflowed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ERR_TOTALS_OUT_OF_RANGE.to_string(),
    )
}

/// Totals plus progress for every goal. Goals are not paged here.
pub async fn get_dashboard(
    State(state): State<AppState>,
    session: Session,
) -> Result<(StatusCode, Json<DashboardResponse>), (StatusCode, String)> {
    let (user_id, _) = get_current_user(&session).await?;

    let user_db = get_user_database(&state.config.data_path, &user_id).await?;
    let conn = user_db.read().await;

    let (total_income, total_expense) = transaction_totals(&conn).await?;
    let today = today();
    let balance = total_income
        .checked_sub(total_expense)
        .ok_or_else(totals_out_of_range)?;
    let goals = load_all_goals(&conn)
        .await?
        .iter()
        .map(|goal| GoalProgress::for_goal(goal, today))
        .collect();

    Ok((
        StatusCode::OK,
        Json(DashboardResponse {
            total_income,
            total_expense,
            balance,
            goals,
        }),
    ))
}
