//! Distribution rule model.
//!
//! Distribution rules push pooled funds out on a trigger: elapsed time, a
//! balance condition, a percentage draw, or a multi-recipient batch. As
//! with allocations, the four kinds share one envelope and differ only in
//! eligibility and payout computation, dispatched over [`DistributionKind`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::allocation::{bps_share, cooldown_remaining};
use crate::{constants, AccountId, Result, RuleId, TreasuryError};

/// Balance comparison operator for condition-triggered rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Gt,
    Lt,
    Eq,
    Ge,
    Le,
}

impl Comparator {
    /// Whether `balance <op> threshold` holds.
    #[must_use]
    pub fn evaluate(&self, balance: Decimal, threshold: Decimal) -> bool {
        match self {
            Self::Gt => balance > threshold,
            Self::Lt => balance < threshold,
            Self::Eq => balance == threshold,
            Self::Ge => balance >= threshold,
            Self::Le => balance <= threshold,
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gt => write!(f, ">"),
            Self::Lt => write!(f, "<"),
            Self::Eq => write!(f, "="),
            Self::Ge => write!(f, ">="),
            Self::Le => write!(f, "<="),
        }
    }
}

/// Per-recipient amounts for a batch rule. The two modes are mutually
/// exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchAmounts {
    /// A fixed amount per recipient, parallel to the recipient list.
    Fixed(Vec<Decimal>),
    /// A share of the current balance per recipient, in basis points,
    /// parallel to the recipient list.
    Shares(Vec<u32>),
}

impl BatchAmounts {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Fixed(amounts) => amounts.len(),
            Self::Shares(shares) => shares.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a distribution rule triggers and what it pays out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionKind {
    /// A fixed amount to one recipient once per interval.
    TimeBased {
        recipient: AccountId,
        amount: Decimal,
        interval_secs: u64,
    },
    /// A fixed amount to one recipient whenever the balance satisfies a
    /// comparator against a threshold.
    BalanceCondition {
        recipient: AccountId,
        amount: Decimal,
        comparator: Comparator,
        threshold: Decimal,
    },
    /// A percentage of the current balance to one recipient.
    PercentageBased { recipient: AccountId, bps: u32 },
    /// A fixed recipient list paid fixed amounts or balance shares.
    Batch {
        recipients: Vec<AccountId>,
        amounts: BatchAmounts,
    },
}

impl DistributionKind {
    /// Validate kind-specific parameters at rule creation. Batch rules
    /// fail fast on length mismatch rather than silently truncating.
    ///
    /// # Errors
    /// Returns the specific validation error for the first violated
    /// constraint.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::TimeBased {
                recipient,
                amount,
                interval_secs,
            } => {
                validate_recipient(*recipient)?;
                validate_positive(*amount)?;
                if *interval_secs == 0 || *interval_secs > constants::MAX_INTERVAL_SECS {
                    return Err(TreasuryError::InvalidInterval {
                        reason: format!(
                            "time-based interval must be in 1..={}s",
                            constants::MAX_INTERVAL_SECS
                        ),
                    });
                }
            }
            Self::BalanceCondition {
                recipient,
                amount,
                threshold,
                ..
            } => {
                validate_recipient(*recipient)?;
                validate_positive(*amount)?;
                if *threshold < Decimal::ZERO {
                    return Err(TreasuryError::InvalidAmount {
                        reason: "condition threshold must not be negative".to_string(),
                    });
                }
            }
            Self::PercentageBased { recipient, bps } => {
                validate_recipient(*recipient)?;
                validate_bps(*bps)?;
            }
            Self::Batch {
                recipients,
                amounts,
            } => {
                if recipients.is_empty() {
                    return Err(TreasuryError::EmptyBatch);
                }
                if recipients.len() > constants::MAX_BATCH_RECIPIENTS {
                    return Err(TreasuryError::BatchTooLarge {
                        len: recipients.len(),
                        max: constants::MAX_BATCH_RECIPIENTS,
                    });
                }
                if recipients.len() != amounts.len() {
                    return Err(TreasuryError::LengthMismatch {
                        recipients: recipients.len(),
                        amounts: amounts.len(),
                    });
                }
                for recipient in recipients {
                    validate_recipient(*recipient)?;
                }
                match amounts {
                    BatchAmounts::Fixed(list) => {
                        for amount in list {
                            validate_positive(*amount)?;
                        }
                    }
                    BatchAmounts::Shares(shares) => {
                        let mut total: u32 = 0;
                        for bps in shares {
                            validate_bps(*bps)?;
                            total = total.saturating_add(*bps);
                        }
                        if total > constants::BPS_DENOMINATOR {
                            return Err(TreasuryError::InvalidBasisPoints { bps: total });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn validate_recipient(recipient: AccountId) -> Result<()> {
    if recipient.is_zero() {
        return Err(TreasuryError::InvalidRecipient);
    }
    Ok(())
}

fn validate_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(TreasuryError::InvalidAmount {
            reason: "distribution amount must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_bps(bps: u32) -> Result<()> {
    if bps == 0 || bps > constants::BPS_DENOMINATOR {
        return Err(TreasuryError::InvalidBasisPoints { bps });
    }
    Ok(())
}

/// A trigger-driven distribution of pooled funds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionRule {
    /// Engine-assigned handle.
    pub id: RuleId,
    /// Trigger and payout computation.
    pub kind: DistributionKind,
    /// Lifetime cap on the amount this rule may move (`None` = unlimited).
    pub max_total: Option<Decimal>,
    /// Cumulative amount moved by this rule.
    pub distributed_total: Decimal,
    /// Higher priorities execute first in eligible-batch execution.
    pub priority: u32,
    /// Minimum seconds between two successful executions.
    pub cooldown_secs: u64,
    /// When the rule last executed.
    pub last_executed: Option<DateTime<Utc>>,
    /// Deactivation is the only removal mechanism; history is preserved.
    pub active: bool,
}

impl DistributionRule {
    /// The per-recipient payouts this rule would make against `balance`
    /// at `now`, or `None` when the kind-specific trigger does not hold
    /// (or the computed total is zero).
    #[must_use]
    pub fn payouts(&self, balance: Decimal, now: DateTime<Utc>) -> Option<Vec<(AccountId, Decimal)>> {
        let payouts = match &self.kind {
            DistributionKind::TimeBased {
                recipient,
                amount,
                interval_secs,
            } => {
                // Elapsed-seconds comparison; never builds a Duration, so
                // an out-of-range interval cannot panic the engine.
                let due = self.last_executed.is_none_or(|last| {
                    let elapsed = now.signed_duration_since(last).num_seconds().max(0);
                    u64::try_from(elapsed).unwrap_or(0) >= *interval_secs
                });
                if !due {
                    return None;
                }
                vec![(*recipient, *amount)]
            }
            DistributionKind::BalanceCondition {
                recipient,
                amount,
                comparator,
                threshold,
            } => {
                if !comparator.evaluate(balance, *threshold) {
                    return None;
                }
                vec![(*recipient, *amount)]
            }
            DistributionKind::PercentageBased { recipient, bps } => {
                if balance <= Decimal::ZERO {
                    return None;
                }
                vec![(*recipient, bps_share(balance, *bps))]
            }
            DistributionKind::Batch {
                recipients,
                amounts,
            } => {
                let computed: Vec<Decimal> = match amounts {
                    BatchAmounts::Fixed(list) => list.clone(),
                    BatchAmounts::Shares(shares) => {
                        shares.iter().map(|bps| bps_share(balance, *bps)).collect()
                    }
                };
                let total: Decimal = computed.iter().sum();
                // Batch eligibility includes balance coverage of the full sum.
                if total > balance {
                    return None;
                }
                // A share that truncates to zero moves no funds and gets
                // no record this round.
                recipients
                    .iter()
                    .copied()
                    .zip(computed)
                    .filter(|(_, amount)| *amount > Decimal::ZERO)
                    .collect()
            }
        };

        let total: Decimal = payouts.iter().map(|(_, amount)| *amount).sum();
        (total > Decimal::ZERO).then_some(payouts)
    }

    /// Cap room left before `max_total` (`None` = unlimited).
    #[must_use]
    pub fn remaining_cap(&self) -> Option<Decimal> {
        self.max_total
            .map(|max| (max - self.distributed_total).max(Decimal::ZERO))
    }

    /// Seconds of cooldown still remaining at `now`, if any.
    #[must_use]
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        cooldown_remaining(self.cooldown_secs, self.last_executed, now)
    }
}
