//! Distribution rule engine.
//!
//! Distributions push pooled funds out on a trigger: elapsed time, a
//! balance condition, a percentage draw, or a fixed recipient batch.
//! Unlike allocations, the lifetime cap never clamps — an execution that
//! would exceed `max_total` is skipped whole. A batch execution debits the
//! vault once for the full total and writes one compliance record per
//! recipient, all sharing the rule id.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use opentreasury_ledger::{ComplianceLedger, Movement, TreasuryVault};
use opentreasury_types::{
    constants, AccountId, BatchAmounts, Comparator, DistributionKind, DistributionRule, Result,
    RuleId, TransactionSource, TreasuryError, TxRef,
};

/// Engine for trigger-driven distribution rules.
pub struct DistributionEngine {
    /// All rules ever created, keyed by id. Deactivated rules stay in the
    /// table for audit.
    rules: BTreeMap<RuleId, DistributionRule>,
    /// Monotonic id source, starting at 1.
    next_rule: u64,
    /// Bound on the rule table.
    max_rules: usize,
    /// Bound on caller-supplied id lists.
    max_batch: usize,
}

impl DistributionEngine {
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

    // =====================================================================
    // Rule creation (one constructor per kind)
    // =====================================================================

    /// A fixed amount to one recipient once per interval.
    ///
    /// # Errors
    /// Kind validation errors, `InvalidAmount` for a non-positive bounded
    /// cap, or `TooManyRules`.
    pub fn create_time_based(
        &mut self,
        recipient: AccountId,
        amount: Decimal,
        interval_secs: u64,
        max_total: Option<Decimal>,
        priority: u32,
        cooldown_secs: u64,
    ) -> Result<RuleId> {
        self.create(
            DistributionKind::TimeBased {
                recipient,
                amount,
                interval_secs,
            },
            max_total,
            priority,
            cooldown_secs,
        )
    }

    /// A fixed amount to one recipient whenever the balance satisfies
    /// `comparator` against `threshold`.
    ///
    /// # Errors
    /// Kind validation errors, `InvalidAmount` for a non-positive bounded
    /// cap, or `TooManyRules`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_balance_condition(
        &mut self,
        recipient: AccountId,
        amount: Decimal,
        comparator: Comparator,
        threshold: Decimal,
        max_total: Option<Decimal>,
        priority: u32,
        cooldown_secs: u64,
    ) -> Result<RuleId> {
        self.create(
            DistributionKind::BalanceCondition {
                recipient,
                amount,
                comparator,
                threshold,
            },
            max_total,
            priority,
            cooldown_secs,
        )
    }

    /// A percentage of the current balance to one recipient.
    ///
    /// # Errors
    /// Kind validation errors, `InvalidAmount` for a non-positive bounded
    /// cap, or `TooManyRules`.
    pub fn create_percentage_based(
        &mut self,
        recipient: AccountId,
        bps: u32,
        max_total: Option<Decimal>,
        priority: u32,
        cooldown_secs: u64,
    ) -> Result<RuleId> {
        self.create(
            DistributionKind::PercentageBased { recipient, bps },
            max_total,
            priority,
            cooldown_secs,
        )
    }

    /// A fixed recipient list paid fixed amounts or balance shares.
    /// Fails fast on length mismatch or an empty recipient list.
    ///
    /// # Errors
    /// `LengthMismatch`, `EmptyBatch`, per-entry validation errors,
    /// `InvalidAmount` for a non-positive bounded cap, or `TooManyRules`.
    pub fn create_batch(
        &mut self,
        recipients: Vec<AccountId>,
        amounts: BatchAmounts,
        max_total: Option<Decimal>,
        priority: u32,
        cooldown_secs: u64,
    ) -> Result<RuleId> {
        self.create(
            DistributionKind::Batch {
                recipients,
                amounts,
            },
            max_total,
            priority,
            cooldown_secs,
        )
    }

    fn create(
        &mut self,
        kind: DistributionKind,
        max_total: Option<Decimal>,
        priority: u32,
        cooldown_secs: u64,
    ) -> Result<RuleId> {
        kind.validate()?;
        if let Some(max) = max_total {
            if max <= Decimal::ZERO {
                return Err(TreasuryError::InvalidAmount {
                    reason: "distribution cap must be positive when bounded".to_string(),
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
            DistributionRule {
                id,
                kind,
                max_total,
                distributed_total: Decimal::ZERO,
                priority,
                cooldown_secs,
                last_executed: None,
                active: true,
            },
        );
        info!(rule = %id, "distribution rule created");
        Ok(id)
    }

    // =====================================================================
    // Execution
    // =====================================================================

    /// Execute the given rules in the given order. Ineligible, unknown,
    /// cooling-down, cap-exceeding, or insufficiently-funded rules are
    /// skipped; the returned count is the number actually executed.
    ///
    /// # Errors
    /// `BatchTooLarge` when the id list exceeds the batch bound (checked
    /// before any effect).
    pub fn execute_distribution_rules(
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
                debug!(rule = %id, "unknown distribution rule, skipped");
                continue;
            };
            match try_execute(rule, vault, compliance, executor, now) {
                Ok(Some(total)) => {
                    executed += 1;
                    info!(rule = %id, total = %total, "distribution executed");
                }
                Ok(None) => debug!(rule = %id, "distribution not eligible, skipped"),
                Err(err) => debug!(rule = %id, %err, "distribution skipped"),
            }
        }
        Ok(executed)
    }

    /// Collect eligible rules, order by (priority descending, id
    /// ascending), and execute sequentially with per-step balance
    /// re-reads.
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
                Ok(Some(total)) => {
                    executed += 1;
                    info!(rule = %id, total = %total, "distribution executed");
                }
                Ok(None) => debug!(rule = %id, "distribution no longer eligible, skipped"),
                Err(err) => debug!(rule = %id, %err, "distribution skipped"),
            }
        }
        Ok(executed)
    }

    /// Rules whose trigger holds against `balance` at `now`, ordered by
    /// (priority descending, id ascending).
    #[must_use]
    pub fn eligible_rules(&self, balance: Decimal, now: DateTime<Utc>) -> Vec<RuleId> {
        let mut eligible: Vec<(u32, RuleId)> = self
            .rules
            .values()
            .filter(|rule| {
                rule.active
                    && rule.cooldown_remaining(now).is_none()
                    && rule.payouts(balance, now).is_some()
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
        info!(rule = %id, active, "distribution rule toggled");
        Ok(())
    }

    /// Look up a rule by id.
    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<&DistributionRule> {
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

impl Default for DistributionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute one rule against the current balance. `Ok(None)` means the
/// trigger did not hold; `Err` carries the blocking condition (both are
/// soft-skips at the batch layer).
fn try_execute(
    rule: &mut DistributionRule,
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

    let balance = vault.balance();
    let Some(payouts) = rule.payouts(balance, now) else {
        return Ok(None);
    };
    let total: Decimal = payouts.iter().map(|(_, amount)| *amount).sum();
    if let Some(remaining) = rule.remaining_cap() {
        // The cap never clamps a distribution; it skips it whole.
        if total > remaining {
            return Err(TreasuryError::BudgetExceeded(rule.id));
        }
    }
    if total > balance {
        return Ok(None);
    }

    vault.debit(total)?;
    rule.distributed_total += total;
    rule.last_executed = Some(now);

    // One debit, one record per recipient, all sharing the rule id and
    // the internal ref of this execution.
    let internal_ref = TxRef::derive("distribution", rule.id.0, compliance.next_sequence());
    for (recipient, amount) in payouts {
        compliance.record_movement(
            Movement {
                external_ref: None,
                internal_ref,
                rule_id: Some(rule.id),
                source: TransactionSource::DistributionRule,
                recipient,
                amount,
                executor,
            },
            now,
        )?;
    }
    Ok(Some(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account(byte: u8) -> AccountId {
        AccountId::from_bytes([byte; 20])
    }

    fn setup(balance: Decimal) -> (DistributionEngine, TreasuryVault, ComplianceLedger) {
        let engine = DistributionEngine::new();
        let mut vault = TreasuryVault::new("USDC");
        if balance > Decimal::ZERO {
            vault.deposit(balance).unwrap();
        }
        let compliance = ComplianceLedger::new(vec![account(50)]);
        (engine, vault, compliance)
    }

    #[test]
    fn time_based_executes_once_per_interval() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let now = Utc::now();
        let id = engine
            .create_time_based(account(1), Decimal::new(100, 0), 3_600, None, 0, 0)
            .unwrap();

        // Never executed: due immediately.
        let executed = engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        assert_eq!(executed, 1);
        assert_eq!(vault.balance(), Decimal::new(900, 0));

        // Interval not elapsed: skipped.
        let executed = engine
            .execute_distribution_rules(
                &mut vault,
                &mut compliance,
                &[id],
                account(9),
                now + Duration::seconds(1_800),
            )
            .unwrap();
        assert_eq!(executed, 0);

        let executed = engine
            .execute_distribution_rules(
                &mut vault,
                &mut compliance,
                &[id],
                account(9),
                now + Duration::seconds(3_600),
            )
            .unwrap();
        assert_eq!(executed, 1);
        assert_eq!(vault.balance(), Decimal::new(800, 0));
    }

    #[test]
    fn balance_condition_triggers_on_comparator() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(400, 0));
        let now = Utc::now();
        let id = engine
            .create_balance_condition(
                account(1),
                Decimal::new(50, 0),
                Comparator::Ge,
                Decimal::new(500, 0),
                None,
                0,
                0,
            )
            .unwrap();

        let executed = engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        assert_eq!(executed, 0, "condition not met at 400");

        vault.deposit(Decimal::new(100, 0)).unwrap();
        let executed = engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        assert_eq!(executed, 1);
        assert_eq!(vault.balance(), Decimal::new(450, 0));
    }

    #[test]
    fn percentage_based_draws_share_of_current_balance() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(2_000, 0));
        let now = Utc::now();
        let id = engine
            .create_percentage_based(account(1), 2_500, None, 0, 0)
            .unwrap();

        engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        assert_eq!(vault.balance(), Decimal::new(1_500, 0));
        assert_eq!(
            engine.get(id).unwrap().distributed_total,
            Decimal::new(500, 0)
        );
    }

    #[test]
    fn batch_writes_one_record_per_recipient_sharing_rule_id() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let now = Utc::now();
        let id = engine
            .create_batch(
                vec![account(1), account(2), account(3)],
                BatchAmounts::Fixed(vec![
                    Decimal::new(100, 0),
                    Decimal::new(200, 0),
                    Decimal::new(300, 0),
                ]),
                None,
                0,
                0,
            )
            .unwrap();

        let executed = engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        assert_eq!(executed, 1, "one rule executed, three movements");
        assert_eq!(vault.balance(), Decimal::new(400, 0));

        let records = compliance.records_for_rule(id);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.rule_id == Some(id)));
        assert!(records
            .iter()
            .all(|r| r.source == TransactionSource::DistributionRule));
        // All three records share the internal ref of this execution.
        assert!(records.iter().all(|r| r.internal_ref == records[0].internal_ref));
        assert_eq!(
            engine.get(id).unwrap().distributed_total,
            Decimal::new(600, 0)
        );
    }

    #[test]
    fn batch_shares_pay_out_of_one_balance_snapshot() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let now = Utc::now();
        let id = engine
            .create_batch(
                vec![account(1), account(2)],
                BatchAmounts::Shares(vec![5_000, 5_000]),
                None,
                0,
                0,
            )
            .unwrap();

        engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        // Both shares are computed against the same pre-debit balance.
        let records = compliance.records_for_rule(id);
        assert_eq!(records[0].amount, Decimal::new(500, 0));
        assert_eq!(records[1].amount, Decimal::new(500, 0));
        assert_eq!(vault.balance(), Decimal::ZERO);
    }

    #[test]
    fn batch_insufficient_balance_skips_whole_rule() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(500, 0));
        let now = Utc::now();
        let id = engine
            .create_batch(
                vec![account(1), account(2)],
                BatchAmounts::Fixed(vec![Decimal::new(300, 0), Decimal::new(300, 0)]),
                None,
                0,
                0,
            )
            .unwrap();

        let executed = engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        assert_eq!(executed, 0);
        assert_eq!(vault.balance(), Decimal::new(500, 0));
        assert!(compliance.is_empty(), "no partial payouts");
    }

    #[test]
    fn cap_skips_whole_execution_instead_of_clamping() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let now = Utc::now();
        let id = engine
            .create_time_based(
                account(1),
                Decimal::new(400, 0),
                1,
                Some(Decimal::new(500, 0)),
                0,
                0,
            )
            .unwrap();

        engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        assert_eq!(
            engine.get(id).unwrap().distributed_total,
            Decimal::new(400, 0)
        );

        // A second 400 would exceed the 500 cap: skipped whole, not
        // clamped to 100.
        let executed = engine
            .execute_distribution_rules(
                &mut vault,
                &mut compliance,
                &[id],
                account(9),
                now + Duration::seconds(2),
            )
            .unwrap();
        assert_eq!(executed, 0);
        assert_eq!(
            engine.get(id).unwrap().distributed_total,
            Decimal::new(400, 0)
        );
        assert_eq!(vault.balance(), Decimal::new(600, 0));
    }

    #[test]
    fn cooldown_applies_across_kinds() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let now = Utc::now();
        let id = engine
            .create_percentage_based(account(1), 1_000, None, 0, 600)
            .unwrap();

        engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        let executed = engine
            .execute_distribution_rules(
                &mut vault,
                &mut compliance,
                &[id],
                account(9),
                now + Duration::seconds(599),
            )
            .unwrap();
        assert_eq!(executed, 0);
        let executed = engine
            .execute_distribution_rules(
                &mut vault,
                &mut compliance,
                &[id],
                account(9),
                now + Duration::seconds(600),
            )
            .unwrap();
        assert_eq!(executed, 1);
    }

    #[test]
    fn priority_order_and_balance_reread_across_rules() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let now = Utc::now();
        // Priorities [5, 1, 3] → execution order 5, 3, 1.
        let p5 = engine
            .create_percentage_based(account(1), 5_000, None, 5, 0)
            .unwrap();
        let p1 = engine
            .create_percentage_based(account(2), 5_000, None, 1, 0)
            .unwrap();
        let p3 = engine
            .create_percentage_based(account(3), 5_000, None, 3, 0)
            .unwrap();

        let order = engine.eligible_rules(vault.balance(), now);
        assert_eq!(order, vec![p5, p3, p1]);

        let executed = engine
            .execute_all_eligible(&mut vault, &mut compliance, account(9), now)
            .unwrap();
        assert_eq!(executed, 3);
        // 1000 → 500 → 250 → 125: each step saw the previous step's debit.
        assert_eq!(
            engine.get(p5).unwrap().distributed_total,
            Decimal::new(500, 0)
        );
        assert_eq!(
            engine.get(p3).unwrap().distributed_total,
            Decimal::new(250, 0)
        );
        assert_eq!(
            engine.get(p1).unwrap().distributed_total,
            Decimal::new(125, 0)
        );
        assert_eq!(vault.balance(), Decimal::new(125, 0));
    }

    #[test]
    fn unknown_ids_and_oversized_batches() {
        let (_, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let mut engine = DistributionEngine::with_limits(10, 2);
        let now = Utc::now();

        let executed = engine
            .execute_distribution_rules(
                &mut vault,
                &mut compliance,
                &[RuleId(1), RuleId(2)],
                account(9),
                now,
            )
            .unwrap();
        assert_eq!(executed, 0, "unknown ids are silent skips");

        let err = engine
            .execute_distribution_rules(
                &mut vault,
                &mut compliance,
                &[RuleId(1), RuleId(2), RuleId(3)],
                account(9),
                now,
            )
            .unwrap_err();
        assert!(matches!(err, TreasuryError::BatchTooLarge { .. }));
    }

    #[test]
    fn deactivated_rule_is_skipped_and_preserved() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let now = Utc::now();
        let id = engine
            .create_percentage_based(account(1), 1_000, None, 0, 0)
            .unwrap();
        engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        engine.set_active(id, false).unwrap();

        let executed = engine
            .execute_distribution_rules(&mut vault, &mut compliance, &[id], account(9), now)
            .unwrap();
        assert_eq!(executed, 0);

        // History survives deactivation.
        let rule = engine.get(id).unwrap();
        assert!(!rule.active);
        assert_eq!(rule.distributed_total, Decimal::new(100, 0));
        assert_eq!(engine.len(), 1);
    }
}
