//! Display metrics derived from a goal snapshot.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use time::Date;

use super::Goal;

/// Percentage of `target` reached by `current`, rounded to the nearest whole
/// percent and clamped to `0..=100`. A zero or missing target gives 0.
pub fn progress_percent(current: Decimal, target: Option<Decimal>) -> u32 {
    let target = match target {
        Some(target) if !target.is_zero() => target,
        _ => return 0,
    };

    let percent = match current
        .checked_div(target)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
    {
        Some(percent) => percent,
        // Only a ratio far beyond 100% (or below 0%) can overflow.
        None if current.is_sign_negative() == target.is_sign_negative() => return 100,
        None => return 0,
    };

    percent
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
        .to_u32()
        .unwrap_or(0)
}

/// Amount still missing to reach `target`, never negative.
pub fn remaining(current: Decimal, target: Decimal) -> Decimal {
    target
        .checked_sub(current)
        .unwrap_or(Decimal::MAX)
        .max(Decimal::ZERO)
}

/// Whole days from `today` until `end_date`. Negative once the end date has
/// passed.
pub fn days_remaining(end_date: Date, today: Date) -> i64 {
    (end_date - today).whole_days()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub goal_id: String,
    pub title: String,
    pub start_date: Date,
    pub end_date: Date,
    pub current_amount: Decimal,
    pub target_amount: Decimal,
    pub progress: u32,
    pub remaining: Decimal,
    pub days_remaining: i64,
}

impl GoalProgress {
    pub fn for_goal(goal: &Goal, today: Date) -> Self {
        let current = goal.current_amount();
        let target = goal.target_amount();

        Self {
            goal_id: goal.id().to_string(),
            title: goal.title().to_string(),
            start_date: goal.start_date(),
            end_date: goal.end_date(),
            current_amount: current,
            target_amount: target,
            progress: progress_percent(current, Some(target)),
            remaining: remaining(current, target),
            days_remaining: days_remaining(goal.end_date(), today),
        }
    }
}
