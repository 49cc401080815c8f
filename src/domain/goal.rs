use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::Transaction;

/// A savings target with a date range.
///
/// The goal owns the ids of its transactions; each member transaction points
/// back at the goal through its `goal_id`. Both sides are updated together by
/// [`Goal::add_transaction`] and [`Goal::remove_transaction`].
///
/// `current_amount` is a stored value. Membership changes do not touch it;
/// call [`Goal::sync_current_amount`] to recompute it from the members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    id: String,
    title: String,
    target_amount: Decimal,
    current_amount: Decimal,
    start_date: Date,
    end_date: Date,
    transaction_ids: Vec<String>,
    user_id: String,
}

impl Goal {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        target_amount: Decimal,
        start_date: Date,
        end_date: Date,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            target_amount,
            current_amount: Decimal::ZERO,
            start_date,
            end_date,
            transaction_ids: Vec::new(),
            user_id: user_id.into(),
        }
    }

    pub(crate) fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub(crate) fn with_transaction_ids(mut self, transaction_ids: Vec<String>) -> Self {
        self.transaction_ids = transaction_ids;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn target_amount(&self) -> Decimal {
        self.target_amount
    }

    pub fn current_amount(&self) -> Decimal {
        self.current_amount
    }

    pub fn start_date(&self) -> Date {
        self.start_date
    }

    pub fn end_date(&self) -> Date {
        self.end_date
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn transaction_ids(&self) -> &[String] {
        &self.transaction_ids
    }

    pub fn contains(&self, transaction: &Transaction) -> bool {
        self.transaction_ids.iter().any(|id| id == transaction.id())
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = title.into();
        self
    }

    pub fn set_target_amount(&mut self, target_amount: Decimal) -> &mut Self {
        self.target_amount = target_amount;
        self
    }

    pub fn set_current_amount(&mut self, current_amount: Decimal) -> &mut Self {
        self.current_amount = current_amount;
        self
    }

    pub fn set_start_date(&mut self, start_date: Date) -> &mut Self {
        self.start_date = start_date;
        self
    }

    pub fn set_end_date(&mut self, end_date: Date) -> &mut Self {
        self.end_date = end_date;
        self
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> &mut Self {
        self.user_id = user_id.into();
        self
    }

    /// Add `transaction` to this goal and point it back here.
    ///
    /// Adding a transaction that is already a member does nothing.
    pub fn add_transaction(&mut self, transaction: &mut Transaction) -> &mut Self {
        if !self.contains(transaction) {
            self.transaction_ids.push(transaction.id().to_string());
            transaction.set_goal_id(Some(self.id.clone()));
        }
        self
    }

    /// Remove `transaction` from this goal.
    ///
    /// The back-reference is cleared only if it still names this goal.
    /// Removing a transaction that is not a member does nothing.
    pub fn remove_transaction(&mut self, transaction: &mut Transaction) -> &mut Self {
        let before = self.transaction_ids.len();
        self.transaction_ids.retain(|id| id != transaction.id());

        if self.transaction_ids.len() != before && transaction.goal_id() == Some(self.id.as_str()) {
            transaction.set_goal_id(None);
        }
        self
    }

    /// Net amount contributed by the members among `transactions`: income
    /// adds, expenses subtract. Non-members are ignored.
    ///
    /// Saturates at `Decimal::MAX` / `Decimal::MIN` instead of overflowing.
    pub fn contributed_amount(&self, transactions: &[Transaction]) -> Decimal {
        self.members(transactions)
            .fold(Decimal::ZERO, |total, amount| total.saturating_add(amount))
    }

    /// Like [`Goal::contributed_amount`], but `None` when the total does not
    /// fit in a `Decimal`.
    pub fn checked_contributed_amount(&self, transactions: &[Transaction]) -> Option<Decimal> {
        self.members(transactions)
            .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
    }

    fn members<'a>(&'a self, transactions: &'a [Transaction]) -> impl Iterator<Item = Decimal> + 'a {
        transactions
            .iter()
            .filter(|transaction| self.contains(transaction))
            .map(Transaction::signed_amount)
    }

    /// Overwrite `current_amount` with [`Goal::contributed_amount`].
    pub fn sync_current_amount(&mut self, transactions: &[Transaction]) -> &mut Self {
        self.current_amount = self.contributed_amount(transactions);
        self
    }
}
