use criterion::{Criterion, criterion_group, criterion_main};
use rust_decimal::Decimal;
use std::hint::black_box;
use tempfile::tempdir;
use time::macros::date;
use time::Duration;
use tokio::runtime::Runtime;
use uuid::Uuid;

use budget_goals_server::database::{get_user_db, init_main_db};
use budget_goals_server::domain::{Goal, GoalProgress, Transaction, TransactionType};
use budget_goals_server::store::{
    TransactionFilter, insert_goal, insert_transaction, load_goal, query_transactions,
    sync_goal_amount,
};

const BENCH_TRANSACTION_COUNT: usize = 1000;

async fn setup_benchmark_environment() -> (String, String, tempfile::TempDir) {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let data_path = temp_dir.path().to_str().unwrap().to_string();
    let user_id = Uuid::new_v4().to_string();

    init_main_db(&data_path).await.unwrap();
    get_user_db(&data_path, &user_id).await.unwrap();

    (data_path, user_id, temp_dir)
}

/// One goal with every other transaction attached to it.
async fn create_benchmark_data(data_path: &str, user_id: &str, count: usize) -> String {
    let user_db = get_user_db(data_path, user_id).await.unwrap();
    let conn = user_db.write().await;

    let mut goal = Goal::new(
        user_id,
        "Benchmark goal",
        Decimal::from(1_000_000),
        date!(2025 - 01 - 01),
        date!(2030 - 12 - 31),
    );
    insert_goal(&conn, &goal).await.unwrap();

    for i in 0..count {
        let kind = if i % 5 == 0 {
            TransactionType::Expense
        } else {
            TransactionType::Income
        };
        let date = date!(2025 - 01 - 01) + Duration::days((i % 365) as i64);
        let mut transaction =
            Transaction::new(user_id, Decimal::from(10 + (i % 100) as i64), kind, date);
        if i % 2 == 0 {
            goal.add_transaction(&mut transaction);
        }
        insert_transaction(&conn, &transaction).await.unwrap();
    }

    goal.id().to_string()
}

async fn benchmark_load_goal(data_path: &str, user_id: &str, goal_id: &str) {
    let user_db = get_user_db(data_path, user_id).await.unwrap();
    let conn = user_db.read().await;

    let goal = load_goal(&conn, goal_id).await.unwrap().unwrap();
    black_box(GoalProgress::for_goal(&goal, date!(2025 - 06 - 01)));
}

async fn benchmark_sync_goal(data_path: &str, user_id: &str, goal_id: &str) {
    let user_db = get_user_db(data_path, user_id).await.unwrap();
    let conn = user_db.write().await;

    let goal = sync_goal_amount(&conn, goal_id).await.unwrap();
    black_box(goal.current_amount());
}

async fn benchmark_filtered_query(data_path: &str, user_id: &str, goal_id: &str) {
    let user_db = get_user_db(data_path, user_id).await.unwrap();
    let conn = user_db.read().await;

    let filter = TransactionFilter {
        goal_id: Some(goal_id.to_string()),
        start_date: Some(date!(2025 - 03 - 01)),
        end_date: Some(date!(2025 - 09 - 30)),
        ..Default::default()
    };
    let transactions = query_transactions(&conn, &filter, 500, 0).await.unwrap();

    black_box(transactions.len());
}

fn criterion_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    // Setup benchmark data once
    let (data_path, user_id, _temp_dir) = rt.block_on(setup_benchmark_environment());
    let goal_id = rt.block_on(create_benchmark_data(
        &data_path,
        &user_id,
        BENCH_TRANSACTION_COUNT,
    ));

    c.bench_function("load_goal_with_progress", |b| {
        b.to_async(&rt)
            .iter(|| benchmark_load_goal(&data_path, &user_id, &goal_id))
    });

    c.bench_function("sync_goal_amount", |b| {
        b.to_async(&rt)
            .iter(|| benchmark_sync_goal(&data_path, &user_id, &goal_id))
    });

    c.bench_function("filtered_transaction_query", |b| {
        b.to_async(&rt)
            .iter(|| benchmark_filtered_query(&data_path, &user_id, &goal_id))
    });

    // Keep temp_dir alive until the end
    std::mem::forget(_temp_dir);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
