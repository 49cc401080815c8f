#![allow(dead_code)]

use axum::http::StatusCode;
use axum_test::TestServer;
use axum_test::TestRequest;
use budget_goals_server::config::Config;
use budget_goals_server::database::{get_user_db, init_main_db};
use budget_goals_server::domain::{Goal, Transaction, TransactionType};
use budget_goals_server::store::{insert_goal, insert_transaction};
use budget_goals_server::{AppState, build_router};
use rust_decimal::Decimal;
use serde_json::json;
use tempfile::{TempDir, tempdir};
use time::{Date, Duration};
use tower_sessions::cookie::Cookie;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct-horse";

pub async fn setup_test_environment() -> (String, String, TempDir) {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let data_path = temp_dir
        .path()
        .to_str()
        .expect("Failed to convert path to string")
        .to_string();
    let user_id = Uuid::new_v4().to_string();

    init_main_db(&data_path)
        .await
        .unwrap_or_else(|e| panic!("Failed to initialize main database at {}: {}", data_path, e));

    get_user_db(&data_path, &user_id).await.unwrap_or_else(|e| {
        panic!(
            "Failed to initialize user database for user {} at {}: {}",
            user_id, data_path, e
        )
    });

    (data_path, user_id, temp_dir)
}

pub fn test_config(data_path: &str) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: "0".to_string(),
        data_path: data_path.to_string(),
        session_secret: "s".repeat(64),
        cors_origin: "http://localhost:3001".to_string(),
        reset_token_ttl: Duration::minutes(60),
        expose_reset_tokens: true,
    }
}

/// A test server over a fresh data directory. Keep the `TempDir` alive for
/// the duration of the test.
pub async fn setup_test_server() -> (TestServer, TempDir) {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let data_path = temp_dir.path().to_str().unwrap().to_string();

    let main_db = init_main_db(&data_path)
        .await
        .expect("Failed to initialize main database");
    let app = build_router(AppState::new(main_db, test_config(&data_path)))
        .expect("Failed to build router");
    let server = TestServer::try_new(app).expect("Could not create test server.");

    (server, temp_dir)
}

pub async fn register_user(server: &TestServer, email: &str, username: &str) {
    server
        .post("/auth/register")
        .json(&json!({
            "email": email,
            "username": username,
            "password": TEST_PASSWORD,
        }))
        .await
        .assert_status(StatusCode::CREATED);
}

pub async fn log_in(server: &TestServer, email: &str, password: &str) -> Cookie<'static> {
    let response = server
        .post("/auth/login")
        .json(&json!({ "email": email, "password": password }))
        .await;
    response.assert_status_ok();
    response.cookie("axum_session")
}

/// Register a fresh user and return their session cookie.
pub async fn register_and_log_in(server: &TestServer) -> Cookie<'static> {
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    let email = format!("saver-{}@example.com", suffix);
    register_user(server, &email, &format!("saver_{}", suffix)).await;
    log_in(server, &email, TEST_PASSWORD).await
}

pub fn authed(request: TestRequest, cookie: &Cookie<'static>) -> TestRequest {
    request.add_cookie(cookie.clone())
}

pub async fn create_test_goal(
    data_path: &str,
    user_id: &str,
    title: &str,
    target_amount: Decimal,
    start_date: Date,
    end_date: Date,
) -> Goal {
    let user_db = get_user_db(data_path, user_id)
        .await
        .unwrap_or_else(|e| panic!("Failed to get user database for {}: {}", user_id, e));
    let conn = user_db.write().await;

    let goal = Goal::new(user_id, title, target_amount, start_date, end_date);
    insert_goal(&conn, &goal)
        .await
        .unwrap_or_else(|e| panic!("Failed to insert test goal '{}': {:?}", title, e));
    goal
}

pub async fn create_test_transaction(
    data_path: &str,
    user_id: &str,
    amount: Decimal,
    kind: TransactionType,
    date: Date,
    goal: Option<&mut Goal>,
) -> Transaction {
    let user_db = get_user_db(data_path, user_id)
        .await
        .unwrap_or_else(|e| panic!("Failed to get user database for {}: {}", user_id, e));
    let conn = user_db.write().await;

    let mut transaction = Transaction::new(user_id, amount, kind, date);
    if let Some(goal) = goal {
        goal.add_transaction(&mut transaction);
    }
    insert_transaction(&conn, &transaction)
        .await
        .unwrap_or_else(|e| panic!("Failed to insert test transaction: {:?}", e));
    transaction
}
