use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

/// Whether a transaction brings money in or takes it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[serde(alias = "recette")]
    Income,
    #[serde(alias = "dépense", alias = "depense")]
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// The amount as it counts towards a balance: positive for income,
    /// negative for expenses.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Income => amount,
            TransactionType::Expense => -amount,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unknown transaction type \"{0}\"")]
pub struct UnknownTransactionType(pub String);

impl FromStr for TransactionType {
    type Err = UnknownTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" | "recette" => Ok(TransactionType::Income),
            "expense" | "dépense" | "depense" => Ok(TransactionType::Expense),
            other => Err(UnknownTransactionType(other.to_string())),
        }
    }
}

/// A single income or expense record.
///
/// The `goal_id` back-reference is only ever changed through
/// [`Goal::add_transaction`](super::Goal::add_transaction) and
/// [`Goal::remove_transaction`](super::Goal::remove_transaction), which keeps
/// it consistent with the goal's transaction collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: String,
    amount: Decimal,
    #[serde(rename = "type")]
    kind: TransactionType,
    description: Option<String>,
    date: Date,
    category_id: Option<String>,
    goal_id: Option<String>,
    user_id: String,
}

impl Transaction {
    /// Create a transaction with a fresh id, no category and no goal.
    pub fn new(user_id: impl Into<String>, amount: Decimal, kind: TransactionType, date: Date) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            amount,
            kind,
            description: None,
            date,
            category_id: None,
            goal_id: None,
            user_id: user_id.into(),
        }
    }

    /// Rebuild a transaction that was already persisted.
    pub(crate) fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Restore the stored back-reference when loading from the database.
    pub(crate) fn with_goal_id(mut self, goal_id: Option<String>) -> Self {
        self.goal_id = goal_id;
        self
    }

    pub(crate) fn set_goal_id(&mut self, goal_id: Option<String>) -> &mut Self {
        self.goal_id = goal_id;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn category_id(&self) -> Option<&str> {
        self.category_id.as_deref()
    }

    pub fn goal_id(&self) -> Option<&str> {
        self.goal_id.as_deref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Amount with the sign implied by the transaction type.
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }

    pub fn set_amount(&mut self, amount: Decimal) -> &mut Self {
        self.amount = amount;
        self
    }

    pub fn set_kind(&mut self, kind: TransactionType) -> &mut Self {
        self.kind = kind;
        self
    }

    pub fn set_description(&mut self, description: Option<String>) -> &mut Self {
        self.description = description;
        self
    }

    pub fn set_date(&mut self, date: Date) -> &mut Self {
        self.date = date;
        self
    }

    pub fn set_category_id(&mut self, category_id: Option<String>) -> &mut Self {
        self.category_id = category_id;
        self
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> &mut Self {
        self.user_id = user_id.into();
        self
    }
}
