//! Allocation rule engine.
//!
//! Allocations carve slices of the pooled balance out to recipients:
//! a percentage draw, a fixed amount, or everything above a balance floor.
//! Execution clamps to the rule's remaining lifetime budget; a rule whose
//! clamped amount is zero, or whose predicate fails against the current
//! balance, is skipped rather than failing the batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use opentreasury_ledger::{ComplianceLedger, Movement, TreasuryVault};
use opentreasury_types::{
    constants, AccountId, AllocationKind, AllocationRule, Result, RuleId, TransactionSource,
    TreasuryError, TxRef,
};

/// Engine for periodic allocation rules.
pub struct AllocationEngine {
    /// All rules ever created, keyed by id. Deactivated rules stay in the
    /// table for audit.
    rules: BTreeMap<RuleId, AllocationRule>,
    /// Monotonic id source, starting at 1.
    next_rule: u64,
    /// Bound on the rule table.
    max_rules: usize,
    /// Bound on caller-supplied id lists.
    max_batch: usize,
}

impl AllocationEngine {
    /// Create an engine with the library default bounds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(constants::MAX_RULES, constants::MAX_BATCH_SIZE)
    }

    /// Create an engine with custom bounds.
    #[must_use]
    pub fn with_limits(max_rules: usize, max_batch: usize) -> Self {
        Self {
            rules: BTreeMap::new(),
            next_rule: 1,
            max_rules,
            max_batch,
        }
    }

    /// Create an allocation rule.
    ///
    /// # Errors
    /// - `InvalidRecipient` for the zero address
    /// - kind-specific validation errors (bps range, non-positive amount)
    /// - `InvalidAmount` for a non-positive bounded budget
    /// - `TooManyRules` when the table is full
    pub fn create(
        &mut self,
        recipient: AccountId,
        kind: AllocationKind,
        budget_limit: Option<Decimal>,
        priority: u32,
        cooldown_secs: u64,
    ) -> Result<RuleId> {
        if recipient.is_zero() {
            return Err(TreasuryError::InvalidRecipient);
        }
        kind.validate()?;
        if let Some(limit) = budget_limit {
            if limit <= Decimal::ZERO {
                return Err(TreasuryError::InvalidAmount {
                    reason: "budget limit must be positive when bounded".to_string(),
                });
            }
        }
        if cooldown_secs > constants::MAX_INTERVAL_SECS {
            return Err(TreasuryError::InvalidInterval {
                reason: format!("cooldown must be at most {}s", constants::MAX_INTERVAL_SECS),
            });
        }
        if self.rules.len() >= self.max_rules {
            return Err(TreasuryError::TooManyRules {
                max: self.max_rules,
            });
        }

        let id = RuleId(self.next_rule);
        self.next_rule += 1;
        self.rules.insert(
            id,
            AllocationRule {
                id,
                recipient,
                kind,
                budget_limit,
                spent: Decimal::ZERO,
                priority,
                cooldown_secs,
                last_executed: None,
                active: true,
            },
        );
        info!(rule = %id, recipient = %recipient.short(), "allocation rule created");
        Ok(id)
    }

    /// Execute the given rules in the given order. Ineligible, unknown,
    /// cooling-down, budget-exhausted, or insufficiently-funded rules are
    /// skipped; the returned count is the number actually executed.
    ///
    /// # Errors
    /// `BatchTooLarge` when the id list exceeds the batch bound (checked
    /// before any effect).
    pub fn execute_allocations(
        &mut self,
        vault: &mut TreasuryVault,
        compliance: &mut ComplianceLedger,
        ids: &[RuleId],
        executor: AccountId,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if ids.len() > self.max_batch {
            return Err(TreasuryError::BatchTooLarge {
                len: ids.len(),
                max: self.max_batch,
            });
        }

        let mut executed = 0;
        for id in ids {
            let Some(rule) = self.rules.get_mut(id) else {
                debug!(rule = %id, "unknown allocation rule, skipped");
                continue;
            };
            match try_execute(rule, vault, compliance, executor, now) {
                Ok(Some(amount)) => {
                    executed += 1;
                    info!(rule = %id, amount = %amount, "allocation executed");
                }
                Ok(None) => debug!(rule = %id, "allocation not eligible, skipped"),
                Err(err) => debug!(rule = %id, %err, "allocation skipped"),
            }
        }
        Ok(executed)
    }

    /// Collect eligible rules, order by (priority descending, id
    /// ascending), and execute sequentially. Each step re-reads the
    /// balance mutated by earlier steps of the same call, so a
    /// lower-priority rule sees what its predecessors left behind.
    ///
    /// # Errors
    /// None in practice; the signature matches the explicit-list variant.
    pub fn execute_all_eligible(
        &mut self,
        vault: &mut TreasuryVault,
        compliance: &mut ComplianceLedger,
        executor: AccountId,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let ids = self.eligible_rules(vault.balance(), now);
        let mut executed = 0;
        for id in ids {
            let Some(rule) = self.rules.get_mut(&id) else {
                continue;
            };
            match try_execute(rule, vault, compliance, executor, now) {
                Ok(Some(amount)) => {
                    executed += 1;
                    info!(rule = %id, amount = %amount, "allocation executed");
                }
                Ok(None) => debug!(rule = %id, "allocation no longer eligible, skipped"),
                Err(err) => debug!(rule = %id, %err, "allocation skipped"),
            }
        }
        Ok(executed)
    }

    /// Rules whose predicate holds against `balance` at `now`, ordered by
    /// (priority descending, id ascending).
    #[must_use]
    pub fn eligible_rules(&self, balance: Decimal, now: DateTime<Utc>) -> Vec<RuleId> {
        let mut eligible: Vec<(u32, RuleId)> = self
            .rules
            .values()
            .filter(|rule| {
                rule.active
                    && rule.cooldown_remaining(now).is_none()
                    && rule
                        .eligible_amount(balance)
                        .is_some_and(|amount| amount > Decimal::ZERO)
            })
            .map(|rule| (rule.priority, rule.id))
            .collect();
        eligible.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        eligible.into_iter().map(|(_, id)| id).collect()
    }

    /// Activate or deactivate a rule. Deactivation is the only removal
    /// mechanism; the rule and its totals stay in the table.
    ///
    /// # Errors
    /// `RuleNotFound` for an unknown id.
    pub fn set_active(&mut self, id: RuleId, active: bool) -> Result<()> {
        let rule = self
            .rules
            .get_mut(&id)
            .ok_or(TreasuryError::RuleNotFound(id))?;
        rule.active = active;
        info!(rule = %id, active, "allocation rule toggled");
        Ok(())
    }

    /// Look up a rule by id.
    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<&AllocationRule> {
        self.rules.get(&id)
    }

    /// Number of rules in the table (active and deactivated).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for AllocationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute one rule against the current balance. `Ok(None)` means the
/// kind-specific predicate did not hold; `Err` carries the blocking
/// condition (both are soft-skips at the batch layer).
fn try_execute(
    rule: &mut AllocationRule,
    vault: &mut TreasuryVault,
    compliance: &mut ComplianceLedger,
    executor: AccountId,
    now: DateTime<Utc>,
) -> Result<Option<Decimal>> {
    if !rule.active {
        return Err(TreasuryError::RuleInactive(rule.id));
    }
    if let Some(remaining_secs) = rule.cooldown_remaining(now) {
        return Err(TreasuryError::CooldownActive {
            rule: rule.id,
            remaining_secs,
        });
    }

    // Balance read at point of use: earlier items of the same batch have
    // already moved funds.
    let balance = vault.balance();
    let Some(mut amount) = rule.eligible_amount(balance) else {
        return Ok(None);
    };
    if let Some(remaining) = rule.remaining_budget() {
        amount = amount.min(remaining);
        if amount <= Decimal::ZERO {
            return Err(TreasuryError::BudgetExceeded(rule.id));
        }
    }
    if amount <= Decimal::ZERO || amount > balance {
        return Ok(None);
    }

    vault.debit(amount)?;
    rule.spent += amount;
    rule.last_executed = Some(now);
    compliance.record_movement(
        Movement {
            external_ref: None,
            internal_ref: TxRef::derive("allocation", rule.id.0, compliance.next_sequence()),
            rule_id: Some(rule.id),
            source: TransactionSource::AllocationRule,
            recipient: rule.recipient,
            amount,
            executor,
        },
        now,
    )?;
    Ok(Some(amount))
}
