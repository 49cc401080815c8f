use anyhow::Result;
use libsql::{Builder, Connection};
use std::{path::Path, sync::Arc};
use tokio::sync::RwLock;

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id             TEXT    PRIMARY KEY,
    email          TEXT    UNIQUE NOT NULL COLLATE NOCASE,
    name           TEXT    NOT NULL,
    password_hash  TEXT    NOT NULL
);
"#;

const CREATE_RESET_REQUESTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS reset_requests (
    id            TEXT    PRIMARY KEY,
    user_id       TEXT    NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash    TEXT    UNIQUE NOT NULL,
    requested_at  INTEGER NOT NULL,
    expires_at    INTEGER NOT NULL
);
"#;

const CREATE_CATEGORIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id           TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    description  TEXT
);
"#;

const CREATE_GOALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS goals (
    id              TEXT PRIMARY KEY,
    title           TEXT NOT NULL,
    target_amount   TEXT NOT NULL,
    current_amount  TEXT NOT NULL DEFAULT '0',
    start_date      TEXT NOT NULL,
    end_date        TEXT NOT NULL,
    user_id         TEXT NOT NULL
);
"#;

const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id           TEXT PRIMARY KEY,
    amount       TEXT NOT NULL,
    kind         TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
    description  TEXT,
    date         TEXT NOT NULL,
    category_id  TEXT REFERENCES categories(id),
    goal_id      TEXT REFERENCES goals(id),
    user_id      TEXT NOT NULL
);
"#;

const CREATE_TRANSACTIONS_GOAL_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_transactions_goal ON transactions(goal_id);";
const CREATE_TRANSACTIONS_DATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);";

pub type Db = Arc<RwLock<Connection>>;

/// Main users registry DB (users.db)
pub async fn init_main_db(data_dir: &str) -> Result<Db> {
    tokio::fs::create_dir_all(data_dir).await?;
    let path = Path::new(data_dir).join("users.db");
    let db = Builder::new_local(path).build().await?;
    let conn = db.connect()?;

    conn.execute(CREATE_USERS_TABLE, ()).await?;
    conn.execute(CREATE_RESET_REQUESTS_TABLE, ()).await?;
    Ok(Arc::new(RwLock::new(conn)))
}

/// Per-user isolated DB (user_{id}.db), schema created on first open
pub async fn get_user_db(data_dir: &str, user_id: &str) -> Result<Db> {
    tokio::fs::create_dir_all(data_dir).await?;
    let path = Path::new(data_dir).join(format!("user_{}.db", user_id));
    let db = Builder::new_local(path).build().await?;
    let conn = db.connect()?;

    for statement in [
        CREATE_CATEGORIES_TABLE,
        CREATE_GOALS_TABLE,
        CREATE_TRANSACTIONS_TABLE,
        CREATE_TRANSACTIONS_GOAL_INDEX,
        CREATE_TRANSACTIONS_DATE_INDEX,
    ] {
        conn.execute(statement, ()).await?;
    }
    Ok(Arc::new(RwLock::new(conn)))
}
