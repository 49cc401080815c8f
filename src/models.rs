use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::{Goal, GoalProgress, Transaction, TransactionType};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub username: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct RegisterPayload {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct UpdateProfilePayload {
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ResetRequestPayload {
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ResetRequestResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ResetCheckResponse {
    pub valid: bool,
    pub email: String,
}

#[derive(Deserialize, Debug)]
pub struct ResetPasswordPayload {
    #[serde(alias = "plainPassword")]
    pub plain_password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CreateCategoryPayload {
    #[serde(alias = "nom")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateCategoryPayload {
    #[serde(alias = "nom")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PaginationQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GetCategoriesResponse {
    pub categories: Vec<Category>,
    pub total_count: u32,
}

#[derive(Deserialize, Debug)]
pub struct CreateTransactionPayload {
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub description: Option<String>,
    pub date: Option<Date>,
    pub category_id: Option<String>,
    pub goal_id: Option<String>,
}

/// Transaction created from a goal's own route, so no `goal_id` field.
#[derive(Deserialize, Debug)]
pub struct CreateGoalTransactionPayload {
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub description: Option<String>,
    pub date: Option<Date>,
    pub category_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct GetTransactionsQuery {
    pub goal_id: Option<String>,
    pub category_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GetTransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub total_count: u32,
}

#[derive(Deserialize, Debug)]
pub struct CreateGoalPayload {
    pub title: String,
    pub target_amount: Decimal,
    pub current_amount: Option<Decimal>,
    pub start_date: Date,
    pub end_date: Date,
}

#[derive(Deserialize, Debug)]
pub struct UpdateGoalPayload {
    pub title: String,
    pub target_amount: Decimal,
    pub current_amount: Option<Decimal>,
    pub start_date: Date,
    pub end_date: Date,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GetGoalsResponse {
    pub goals: Vec<Goal>,
    pub total_count: u32,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DashboardResponse {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
    pub goals: Vec<GoalProgress>,
}
