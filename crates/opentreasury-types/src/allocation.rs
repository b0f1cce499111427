//! Allocation rule model.
//!
//! An allocation rule periodically carves a slice of the pooled balance out
//! to a recipient. The three kinds share one envelope (budget, priority,
//! cooldown, active flag) and differ only in how the amount is computed,
//! so eligibility and amount computation are a single dispatch over
//! [`AllocationKind`].

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{constants, AccountId, Result, RuleId, TreasuryError};

/// Compute `balance × bps / 10000`, quantized to stablecoin precision
/// toward zero (never allocates dust the vault cannot settle).
pub(crate) fn bps_share(balance: Decimal, bps: u32) -> Decimal {
    (balance * Decimal::from(bps) / Decimal::from(constants::BPS_DENOMINATOR))
        .round_dp_with_strategy(constants::AMOUNT_DP, RoundingStrategy::ToZero)
}

/// Seconds of cooldown still remaining at `now`, if any.
pub(crate) fn cooldown_remaining(
    cooldown_secs: u64,
    last_executed: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<u64> {
    let last = last_executed?;
    if cooldown_secs == 0 {
        return None;
    }
    let elapsed = now.signed_duration_since(last).num_seconds().max(0);
    let elapsed = u64::try_from(elapsed).unwrap_or(0);
    (elapsed < cooldown_secs).then(|| cooldown_secs - elapsed)
}

/// How an allocation rule computes its amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationKind {
    /// A percentage of the current balance, in basis points.
    Percentage { bps: u32 },
    /// A fixed amount per execution.
    FixedAmount { amount: Decimal },
    /// Everything above a balance floor (amount = balance − floor).
    BalanceThreshold { floor: Decimal },
}

impl AllocationKind {
    /// Validate kind-specific parameters at rule creation.
    ///
    /// # Errors
    /// - `InvalidBasisPoints` for bps outside `1..=10000`
    /// - `InvalidAmount` for a non-positive fixed amount or negative floor
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Percentage { bps } => {
                if *bps == 0 || *bps > constants::BPS_DENOMINATOR {
                    return Err(TreasuryError::InvalidBasisPoints { bps: *bps });
                }
            }
            Self::FixedAmount { amount } => {
                if *amount <= Decimal::ZERO {
                    return Err(TreasuryError::InvalidAmount {
                        reason: "fixed allocation amount must be positive".to_string(),
                    });
                }
            }
            Self::BalanceThreshold { floor } => {
                if *floor < Decimal::ZERO {
                    return Err(TreasuryError::InvalidAmount {
                        reason: "balance floor must not be negative".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A periodic allocation of pooled funds to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRule {
    /// Engine-assigned handle.
    pub id: RuleId,
    /// Payout recipient.
    pub recipient: AccountId,
    /// Amount computation.
    pub kind: AllocationKind,
    /// Lifetime cap on the amount this rule may move (`None` = unlimited).
    pub budget_limit: Option<Decimal>,
    /// Cumulative amount moved by this rule.
    pub spent: Decimal,
    /// Higher priorities execute first in eligible-batch execution.
    pub priority: u32,
    /// Minimum seconds between two successful executions.
    pub cooldown_secs: u64,
    /// When the rule last executed.
    pub last_executed: Option<DateTime<Utc>>,
    /// Deactivation is the only removal mechanism; history is preserved.
    pub active: bool,
}

impl AllocationRule {
    /// The amount this rule would move against `balance`, before budget
    /// clamping. `None` when the kind-specific predicate does not hold.
    #[must_use]
    pub fn eligible_amount(&self, balance: Decimal) -> Option<Decimal> {
        match self.kind {
            AllocationKind::Percentage { bps } => {
                (balance > Decimal::ZERO).then(|| bps_share(balance, bps))
            }
            AllocationKind::FixedAmount { amount } => (balance >= amount).then_some(amount),
            AllocationKind::BalanceThreshold { floor } => {
                (balance > floor).then(|| balance - floor)
            }
        }
    }

    /// Budget left before the cap (`None` = unlimited).
    #[must_use]
    pub fn remaining_budget(&self) -> Option<Decimal> {
        self.budget_limit
            .map(|limit| (limit - self.spent).max(Decimal::ZERO))
    }

    /// Seconds of cooldown still remaining at `now`, if any.
    #[must_use]
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        cooldown_remaining(self.cooldown_secs, self.last_executed, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rule(kind: AllocationKind) -> AllocationRule {
        AllocationRule {
            id: RuleId(1),
            recipient: AccountId::from_bytes([1; 20]),
            kind,
            budget_limit: None,
            spent: Decimal::ZERO,
            priority: 0,
            cooldown_secs: 0,
            last_executed: None,
            active: true,
        }
    }

    #[test]
    fn percentage_amount() {
        let r = rule(AllocationKind::Percentage { bps: 1_000 });
        assert_eq!(
            r.eligible_amount(Decimal::new(1_000, 0)),
            Some(Decimal::new(100, 0))
        );
        assert_eq!(r.eligible_amount(Decimal::ZERO), None);
    }

    #[test]
    fn percentage_amount_quantized_to_six_dp() {
        let r = rule(AllocationKind::Percentage { bps: 3_333 });
        // 1.000001 × 0.3333 = 0.3333003333 → truncated toward zero at 6 dp
        let amount = r.eligible_amount(Decimal::new(1_000_001, 6)).unwrap();
        assert_eq!(amount, Decimal::new(333_300, 6));
    }

    #[test]
    fn fixed_amount_requires_full_balance() {
        let r = rule(AllocationKind::FixedAmount {
            amount: Decimal::new(500, 0),
        });
        assert_eq!(
            r.eligible_amount(Decimal::new(500, 0)),
            Some(Decimal::new(500, 0))
        );
        assert_eq!(r.eligible_amount(Decimal::new(499, 0)), None);
    }

    #[test]
    fn balance_threshold_allocates_excess() {
        let r = rule(AllocationKind::BalanceThreshold {
            floor: Decimal::new(500, 0),
        });
        assert_eq!(
            r.eligible_amount(Decimal::new(800, 0)),
            Some(Decimal::new(300, 0))
        );
        assert_eq!(r.eligible_amount(Decimal::new(500, 0)), None);
    }

    #[test]
    fn remaining_budget_clamps_at_zero() {
        let mut r = rule(AllocationKind::Percentage { bps: 100 });
        r.budget_limit = Some(Decimal::new(100, 0));
        r.spent = Decimal::new(250, 0);
        assert_eq!(r.remaining_budget(), Some(Decimal::ZERO));
        r.budget_limit = None;
        assert_eq!(r.remaining_budget(), None);
    }

    #[test]
    fn cooldown_window() {
        let mut r = rule(AllocationKind::Percentage { bps: 100 });
        let now = Utc::now();
        r.cooldown_secs = 60;

        // Never executed: no cooldown.
        assert_eq!(r.cooldown_remaining(now), None);

        r.last_executed = Some(now);
        assert_eq!(r.cooldown_remaining(now + Duration::seconds(10)), Some(50));
        assert_eq!(r.cooldown_remaining(now + Duration::seconds(60)), None);
    }

    #[test]
    fn kind_validation() {
        assert!(AllocationKind::Percentage { bps: 10_000 }.validate().is_ok());
        assert!(AllocationKind::Percentage { bps: 0 }.validate().is_err());
        assert!(AllocationKind::Percentage { bps: 10_001 }.validate().is_err());
        assert!(AllocationKind::FixedAmount {
            amount: Decimal::ZERO
        }
        .validate()
        .is_err());
        assert!(AllocationKind::BalanceThreshold {
            floor: Decimal::NEGATIVE_ONE
        }
        .validate()
        .is_err());
        assert!(AllocationKind::BalanceThreshold {
            floor: Decimal::ZERO
        }
        .validate()
        .is_ok());
    }
}
