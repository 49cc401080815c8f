// Server configuration
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: &str = "3000";
pub const DEFAULT_DATA_PATH: &str = "data";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3001";

// Session configuration
pub const SESSION_NAME: &str = "axum_session";
pub const SESSION_EXPIRY_DAYS: i64 = 3;
pub const MIN_SESSION_SECRET_LENGTH: usize = 64;
pub const SESSION_USER_ID_KEY: &str = "user_id";
pub const SESSION_USERNAME_KEY: &str = "username";

// Password reset
pub const DEFAULT_RESET_TOKEN_TTL_MINUTES: i64 = 60;
pub const RESET_TOKEN_BYTES: usize = 32;
pub const RESET_REQUEST_ACCEPTED: &str = "If your email exists, a reset link has been sent.";

// Database limits and defaults
pub const DEFAULT_CATEGORIES_LIMIT: u32 = 100;
pub const DEFAULT_GOALS_LIMIT: u32 = 100;
pub const DEFAULT_TRANSACTIONS_LIMIT: u32 = 500;
pub const MAX_LIMIT: u32 = 1000;
pub const MAX_OFFSET: u32 = 1_000_000;

// Validation limits
pub const MAX_CATEGORY_NAME_LENGTH: usize = 100;
pub const MAX_CATEGORY_DESCRIPTION_LENGTH: usize = 255;
pub const MAX_GOAL_TITLE_LENGTH: usize = 255;
pub const MAX_TRANSACTION_DESCRIPTION_LENGTH: usize = 255;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_USERNAME_LENGTH: usize = 4;
pub const MIN_PASSWORD_LENGTH: usize = 6;
/// Largest amount accepted for a transaction or goal.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

// Error messages
pub const ERR_DATABASE_ACCESS: &str = "Database access error";
pub const ERR_DATABASE_OPERATION: &str = "Database operation failed";
pub const ERR_INVALID_SESSION: &str = "Invalid session";
pub const ERR_UNAUTHORIZED: &str = "Not logged in";
pub const ERR_INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const ERR_INVALID_RESET_TOKEN: &str = "Invalid or expired token";
pub const ERR_GOAL_AMOUNT_OUT_OF_RANGE: &str = "Goal total is out of range";
pub const ERR_TOTALS_OUT_OF_RANGE: &str = "Transaction totals are out of range";
pub const ERR_GOAL_NOT_FOUND: &str = "Goal not found";
pub const ERR_TRANSACTION_NOT_FOUND: &str = "Transaction not found";
pub const ERR_CATEGORY_NOT_FOUND: &str = "Category not found";
