use axum::http::StatusCode;
use axum_test::TestServer;
use budget_goals_server::constants::{MAX_AMOUNT, MAX_LIMIT};
use budget_goals_server::database::get_user_db;
use budget_goals_server::domain::{Goal, GoalProgress, Transaction, TransactionType};
use budget_goals_server::goals::validate_goal_fields;
use budget_goals_server::models::{GetGoalsResponse, GetTransactionsResponse};
use budget_goals_server::store::{
    insert_goal, load_all_goals, load_goal_transactions, load_goals, require_goal,
    sync_goal_amount,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use time::macros::date;
use tower_sessions::cookie::Cookie;

mod common;
use common::*;

async fn post_goal(server: &TestServer, cookie: &Cookie<'static>, title: &str, target: u32) -> Goal {
    let response = authed(server.post("/goals"), cookie)
        .json(&json!({
            "title": title,
            "target_amount": target,
            "start_date": "2025-01-01",
            "end_date": "2099-12-31",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Goal>()
}

async fn post_income(server: &TestServer, cookie: &Cookie<'static>, amount: u32, goal_id: Option<&str>) -> Transaction {
    let response = authed(server.post("/transactions"), cookie)
        .json(&json!({
            "amount": amount,
            "type": "income",
            "date": "2025-03-01",
            "goal_id": goal_id,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Transaction>()
}

async fn fetch_goal(server: &TestServer, cookie: &Cookie<'static>, goal_id: &str) -> Goal {
    let response = authed(server.get(&format!("/goals/{}", goal_id)), cookie).await;
    response.assert_status_ok();
    response.json::<Goal>()
}

#[tokio::test]
async fn validate_goal_fields_rules() {
    let start = date!(2025 - 01 - 01);
    let end = date!(2025 - 12 - 31);

    assert!(validate_goal_fields("Car", dec!(5000), None, start, end).is_ok());
    assert!(validate_goal_fields("Car", dec!(5000), Some(dec!(0)), start, start).is_ok());

    let (status, message) = validate_goal_fields("Car", dec!(5000), None, end, start).unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "End date cannot be before start date");

    assert!(validate_goal_fields("Car", dec!(0), None, start, end).is_err());
    assert!(validate_goal_fields("Car", dec!(5000), Some(dec!(-1)), start, end).is_err());
    assert!(validate_goal_fields("   ", dec!(5000), None, start, end).is_err());
    assert!(validate_goal_fields(&"x".repeat(256), dec!(5000), None, start, end).is_err());

    let cap = Decimal::from(MAX_AMOUNT);
    assert!(validate_goal_fields("Car", cap, Some(cap), start, end).is_ok());
    let (status, message) =
        validate_goal_fields("Car", cap + dec!(0.01), None, start, end).unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "Target amount cannot exceed 1000000000000000");
    assert!(validate_goal_fields("Car", dec!(5000), Some(cap + dec!(1)), start, end).is_err());
}

#[tokio::test]
async fn create_and_fetch_goal() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;

    let created = post_goal(&server, &cookie, "  Emergency fund ", 3000).await;
    assert_eq!(created.title(), "Emergency fund");
    assert_eq!(created.target_amount(), dec!(3000));
    assert_eq!(created.current_amount(), Decimal::ZERO);
    assert!(created.transaction_ids().is_empty());

    let fetched = fetch_goal(&server, &cookie, created.id()).await;
    assert_eq!(fetched, created);

    let list = authed(server.get("/goals"), &cookie)
        .await
        .json::<GetGoalsResponse>();
    assert_eq!(list.total_count, 1);
    assert_eq!(list.goals[0].id(), created.id());
}

#[tokio::test]
async fn create_goal_rejects_inverted_dates() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;

    let response = authed(server.post("/goals"), &cookie)
        .json(&json!({
            "title": "Backwards",
            "target_amount": 100,
            "start_date": "2025-06-01",
            "end_date": "2025-05-01",
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_text("End date cannot be before start date");
}

#[tokio::test]
async fn unknown_goal_is_not_found() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;

    for path in ["/goals/missing", "/goals/missing/progress", "/goals/missing/transactions"] {
        authed(server.get(path), &cookie)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
    authed(server.delete("/goals/missing"), &cookie)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn goals_are_private_to_their_owner() {
    let (server, _temp_dir) = setup_test_server().await;
    let owner = register_and_log_in(&server).await;
    let stranger = register_and_log_in(&server).await;

    let goal = post_goal(&server, &owner, "Private", 500).await;

    authed(server.get(&format!("/goals/{}", goal.id())), &stranger)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let list = authed(server.get("/goals"), &stranger)
        .await
        .json::<GetGoalsResponse>();
    assert_eq!(list.total_count, 0);
}

#[tokio::test]
async fn savings_scenario_reaches_58_percent() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;
    let goal = post_goal(&server, &cookie, "Holidays", 3000).await;

    for amount in [300, 400, 350, 400, 300] {
        let response = authed(server.post(&format!("/goals/{}/transactions", goal.id())), &cookie)
            .json(&json!({ "amount": amount, "type": "recette", "date": "2025-03-01" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<Transaction>().goal_id(), Some(goal.id()));
    }

    let goal = fetch_goal(&server, &cookie, goal.id()).await;
    assert_eq!(goal.transaction_ids().len(), 5);
    assert_eq!(goal.current_amount(), dec!(1750));

    let progress = authed(server.get(&format!("/goals/{}/progress", goal.id())), &cookie)
        .await
        .json::<GoalProgress>();
    assert_eq!(progress.progress, 58);
    assert_eq!(progress.remaining, dec!(1250));
    assert!(progress.days_remaining > 0);

    let members = authed(server.get(&format!("/goals/{}/transactions", goal.id())), &cookie)
        .await
        .json::<Vec<Transaction>>();
    assert_eq!(members.len(), 5);
    assert!(members.iter().all(|t| goal.contains(t)));
}

#[tokio::test]
async fn attach_and_detach_existing_transaction() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;
    let goal = post_goal(&server, &cookie, "Bike", 800).await;
    let transaction = post_income(&server, &cookie, 200, None).await;
    assert_eq!(transaction.goal_id(), None);

    let path = format!("/goals/{}/transactions/{}", goal.id(), transaction.id());

    let attached = authed(server.put(&path), &cookie).await;
    attached.assert_status_ok();
    let attached = attached.json::<Goal>();
    assert_eq!(attached.transaction_ids(), [transaction.id().to_string()]);
    assert_eq!(attached.current_amount(), dec!(200));

    // Attaching twice changes nothing.
    let again = authed(server.put(&path), &cookie).await.json::<Goal>();
    assert_eq!(again, attached);

    let detached = authed(server.delete(&path), &cookie).await;
    detached.assert_status_ok();
    let detached = detached.json::<Goal>();
    assert!(detached.transaction_ids().is_empty());
    assert_eq!(detached.current_amount(), Decimal::ZERO);

    let stored = authed(server.get(&format!("/transactions/{}", transaction.id())), &cookie)
        .await
        .json::<Transaction>();
    assert_eq!(stored.goal_id(), None);

    // Detaching a non-member is a no-op.
    authed(server.delete(&path), &cookie).await.assert_status_ok();
}

#[tokio::test]
async fn attach_unknown_transaction_is_not_found() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;
    let goal = post_goal(&server, &cookie, "Bike", 800).await;

    authed(
        server.put(&format!("/goals/{}/transactions/nope", goal.id())),
        &cookie,
    )
    .await
    .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn moving_a_transaction_resyncs_both_goals() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;
    let first = post_goal(&server, &cookie, "First", 1000).await;
    let second = post_goal(&server, &cookie, "Second", 1000).await;

    let transaction = post_income(&server, &cookie, 400, Some(first.id())).await;
    assert_eq!(fetch_goal(&server, &cookie, first.id()).await.current_amount(), dec!(400));

    let moved = authed(
        server.put(&format!("/goals/{}/transactions/{}", second.id(), transaction.id())),
        &cookie,
    )
    .await
    .json::<Goal>();
    assert_eq!(moved.current_amount(), dec!(400));

    let first = fetch_goal(&server, &cookie, first.id()).await;
    assert!(first.transaction_ids().is_empty());
    assert_eq!(first.current_amount(), Decimal::ZERO);
}

#[tokio::test]
async fn deleting_goal_keeps_its_transactions() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;
    let goal = post_goal(&server, &cookie, "Short lived", 1000).await;
    let transaction = post_income(&server, &cookie, 250, Some(goal.id())).await;

    authed(server.delete(&format!("/goals/{}", goal.id())), &cookie)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    authed(server.get(&format!("/goals/{}", goal.id())), &cookie)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let stored = authed(server.get(&format!("/transactions/{}", transaction.id())), &cookie)
        .await
        .json::<Transaction>();
    assert_eq!(stored.goal_id(), None);
    assert_eq!(stored.amount(), dec!(250));

    let list = authed(server.get("/transactions"), &cookie)
        .await
        .json::<GetTransactionsResponse>();
    assert_eq!(list.total_count, 1);
}

#[tokio::test]
async fn update_goal_overrides_current_amount() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;
    let goal = post_goal(&server, &cookie, "Laptop", 1500).await;
    post_income(&server, &cookie, 100, Some(goal.id())).await;

    let response = authed(server.put(&format!("/goals/{}", goal.id())), &cookie)
        .json(&json!({
            "title": "New laptop",
            "target_amount": 2000,
            "current_amount": 600,
            "start_date": "2025-01-01",
            "end_date": "2099-12-31",
        }))
        .await;
    response.assert_status_ok();
    let updated = response.json::<Goal>();
    assert_eq!(updated.title(), "New laptop");
    assert_eq!(updated.target_amount(), dec!(2000));
    assert_eq!(updated.current_amount(), dec!(600));
    assert_eq!(updated.transaction_ids().len(), 1);

    // The next membership change resyncs from the members.
    post_income(&server, &cookie, 50, Some(goal.id())).await;
    assert_eq!(fetch_goal(&server, &cookie, goal.id()).await.current_amount(), dec!(150));
}

#[tokio::test]
async fn update_goal_without_current_amount_keeps_it() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;
    let goal = post_goal(&server, &cookie, "Camera", 900).await;
    post_income(&server, &cookie, 300, Some(goal.id())).await;

    let updated = authed(server.put(&format!("/goals/{}", goal.id())), &cookie)
        .json(&json!({
            "title": "Camera",
            "target_amount": 1200,
            "start_date": "2025-01-01",
            "end_date": "2099-12-31",
        }))
        .await
        .json::<Goal>();
    assert_eq!(updated.current_amount(), dec!(300));
}

#[tokio::test]
async fn expenses_reduce_goal_amount() {
    let (server, _temp_dir) = setup_test_server().await;
    let cookie = register_and_log_in(&server).await;
    let goal = post_goal(&server, &cookie, "Savings", 1000).await;
    post_income(&server, &cookie, 500, Some(goal.id())).await;

    authed(server.post(&format!("/goals/{}/transactions", goal.id())), &cookie)
        .json(&json!({ "amount": 150, "type": "expense" }))
        .await
        .assert_status(StatusCode::CREATED);

    assert_eq!(fetch_goal(&server, &cookie, goal.id()).await.current_amount(), dec!(350));
}

#[tokio::test]
async fn store_sync_matches_member_rows() {
    let (data_path, user_id, _temp_dir) = setup_test_environment().await;
    let mut goal = create_test_goal(
        &data_path,
        &user_id,
        "Direct",
        dec!(1000),
        date!(2025 - 01 - 01),
        date!(2025 - 12 - 31),
    )
    .await;

    let january = date!(2025 - 01 - 15);
    let february = date!(2025 - 02 - 01);
    create_test_transaction(&data_path, &user_id, dec!(300), TransactionType::Income, february, Some(&mut goal)).await;
    create_test_transaction(&data_path, &user_id, dec!(100), TransactionType::Expense, january, Some(&mut goal)).await;
    create_test_transaction(&data_path, &user_id, dec!(999), TransactionType::Income, february, None).await;

    let user_db = get_user_db(&data_path, &user_id).await.unwrap();
    let conn = user_db.write().await;

    let loaded = require_goal(&conn, goal.id()).await.unwrap();
    assert_eq!(loaded.transaction_ids().len(), 2);
    assert_eq!(loaded.current_amount(), Decimal::ZERO);

    let members = load_goal_transactions(&conn, goal.id()).await.unwrap();
    assert_eq!(members[0].amount(), dec!(100), "oldest first");

    let synced = sync_goal_amount(&conn, goal.id()).await.unwrap();
    assert_eq!(synced.current_amount(), dec!(200));
    assert_eq!(require_goal(&conn, goal.id()).await.unwrap().current_amount(), dec!(200));
}

#[tokio::test]
async fn store_sync_rejects_total_out_of_range() {
    let (data_path, user_id, _temp_dir) = setup_test_environment().await;
    let mut goal = create_test_goal(
        &data_path,
        &user_id,
        "Overflow",
        dec!(1000),
        date!(2025 - 01 - 01),
        date!(2025 - 12 - 31),
    )
    .await;

    let day = date!(2025 - 03 - 01);
    create_test_transaction(&data_path, &user_id, Decimal::MAX, TransactionType::Income, day, Some(&mut goal)).await;
    create_test_transaction(&data_path, &user_id, Decimal::MAX, TransactionType::Income, day, Some(&mut goal)).await;

    let user_db = get_user_db(&data_path, &user_id).await.unwrap();
    let conn = user_db.write().await;

    let (status, message) = sync_goal_amount(&conn, goal.id()).await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "Goal total is out of range");
    assert_eq!(require_goal(&conn, goal.id()).await.unwrap().current_amount(), Decimal::ZERO);
}

#[tokio::test]
async fn load_goals_attaches_members_per_goal() {
    let (data_path, user_id, _temp_dir) = setup_test_environment().await;
    let start = date!(2025 - 01 - 01);
    let mut house = create_test_goal(&data_path, &user_id, "House", dec!(1000), start, date!(2030 - 01 - 01)).await;
    let mut bike = create_test_goal(&data_path, &user_id, "Bike", dec!(500), start, date!(2026 - 01 - 01)).await;
    let empty = create_test_goal(&data_path, &user_id, "Empty", dec!(10), start, date!(2027 - 01 - 01)).await;

    let later = create_test_transaction(&data_path, &user_id, dec!(20), TransactionType::Income, date!(2025 - 05 - 01), Some(&mut house)).await;
    let earlier = create_test_transaction(&data_path, &user_id, dec!(10), TransactionType::Income, date!(2025 - 02 - 01), Some(&mut house)).await;
    let ride = create_test_transaction(&data_path, &user_id, dec!(30), TransactionType::Income, date!(2025 - 03 - 01), Some(&mut bike)).await;
    create_test_transaction(&data_path, &user_id, dec!(40), TransactionType::Income, date!(2025 - 03 - 01), None).await;

    let user_db = get_user_db(&data_path, &user_id).await.unwrap();
    let conn = user_db.read().await;

    let goals = load_all_goals(&conn).await.unwrap();
    let titles: Vec<_> = goals.iter().map(Goal::title).collect();
    assert_eq!(titles, ["Bike", "Empty", "House"]);
    assert_eq!(goals[0].transaction_ids(), [ride.id().to_string()]);
    assert!(goals[1].transaction_ids().is_empty());
    assert_eq!(
        goals[2].transaction_ids(),
        [earlier.id().to_string(), later.id().to_string()]
    );
    assert_eq!(goals[0].id(), bike.id());
    assert_eq!(goals[1].id(), empty.id());

    let page = load_goals(&conn, 1, 2).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0], goals[2]);
}

#[tokio::test]
async fn load_all_goals_is_not_capped_by_list_limit() {
    let (data_path, user_id, _temp_dir) = setup_test_environment().await;
    let user_db = get_user_db(&data_path, &user_id).await.unwrap();
    let conn = user_db.write().await;

    let tx = conn.transaction().await.unwrap();
    for i in 0..=MAX_LIMIT {
        let goal = Goal::new(
            user_id.as_str(),
            format!("Goal {i:04}"),
            dec!(100),
            date!(2025 - 01 - 01),
            date!(2025 - 12 - 31),
        );
        insert_goal(&tx, &goal).await.unwrap();
    }
    tx.commit().await.unwrap();

    assert_eq!(load_goals(&conn, MAX_LIMIT, 0).await.unwrap().len(), MAX_LIMIT as usize);
    assert_eq!(load_all_goals(&conn).await.unwrap().len(), MAX_LIMIT as usize + 1);
}
