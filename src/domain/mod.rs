//! Budget entities and the goal progress model. Nothing in here touches the
//! database or HTTP.

mod goal;
mod progress;
mod transaction;

pub use goal::Goal;
pub use progress::{GoalProgress, days_remaining, progress_percent, remaining};
pub use transaction::{Transaction, TransactionType, UnknownTransactionType};
