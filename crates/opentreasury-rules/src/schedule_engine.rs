//! Scheduled distribution engine.
//!
//! Schedules fire a fixed amount to a recipient once per interval. The
//! off-chain automation polls [`ScheduleEngine::due_schedules`] and feeds
//! the ids back into [`ScheduleEngine::execute_scheduled`], which
//! re-validates every id — stale or duplicated entries in the caller's
//! list are silent skips, so the poller can safely retry with
//! at-least-once delivery.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use opentreasury_ledger::{ComplianceLedger, Movement, TreasuryVault};
use opentreasury_types::{
    constants, AccountId, Result, ScheduleId, ScheduledDistribution, TransactionSource,
    TreasuryError, TxRef,
};

/// Engine for recurring, interval-based distributions.
pub struct ScheduleEngine {
    /// All schedules ever created, keyed by id. Deactivated schedules stay
    /// in the table for audit.
    schedules: BTreeMap<ScheduleId, ScheduledDistribution>,
    /// Monotonic id source, starting at 1.
    next_schedule: u64,
    /// Bound on the schedule table.
    max_schedules: usize,
    /// Bound on caller-supplied id lists.
    max_batch: usize,
}

impl ScheduleEngine {
    /// Create an engine with the library default bounds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(constants::MAX_SCHEDULES, constants::MAX_BATCH_SIZE)
    }

    /// Create an engine with custom bounds.
    #[must_use]
    pub fn with_limits(max_schedules: usize, max_batch: usize) -> Self {
        Self {
            schedules: BTreeMap::new(),
            next_schedule: 1,
            max_schedules,
            max_batch,
        }
    }

    /// Create a schedule; the first cycle becomes due one interval from
    /// `now`.
    ///
    /// # Errors
    /// - `InvalidRecipient` for the zero address
    /// - `InvalidAmount` for a non-positive amount
    /// - `InvalidInterval` for a zero interval
    /// - `TooManySchedules` when the table is full
    pub fn create(
        &mut self,
        recipient: AccountId,
        amount: Decimal,
        interval_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<ScheduleId> {
        if recipient.is_zero() {
            return Err(TreasuryError::InvalidRecipient);
        }
        if amount <= Decimal::ZERO {
            return Err(TreasuryError::InvalidAmount {
                reason: "scheduled amount must be positive".to_string(),
            });
        }
        if interval_secs == 0 || interval_secs > constants::MAX_INTERVAL_SECS {
            return Err(TreasuryError::InvalidInterval {
                reason: format!(
                    "schedule interval must be in 1..={}s",
                    constants::MAX_INTERVAL_SECS
                ),
            });
        }
        if self.schedules.len() >= self.max_schedules {
            return Err(TreasuryError::TooManySchedules {
                max: self.max_schedules,
            });
        }

        let id = ScheduleId(self.next_schedule);
        self.next_schedule += 1;
        let schedule = ScheduledDistribution {
            id,
            recipient,
            amount,
            interval_secs,
            // Interval is bounds-checked above, so the conversion is safe.
            next_due: now + chrono::Duration::seconds(i64::try_from(interval_secs).unwrap_or(0)),
            total_distributed: Decimal::ZERO,
            active: true,
        };
        info!(
            schedule = %id,
            recipient = %recipient.short(),
            amount = %amount,
            interval_secs,
            "scheduled distribution created"
        );
        self.schedules.insert(id, schedule);
        Ok(id)
    }

    /// Active schedules due at `now`, in id order.
    #[must_use]
    pub fn due_schedules(&self, now: DateTime<Utc>) -> Vec<ScheduleId> {
        self.schedules
            .values()
            .filter(|schedule| schedule.is_due(now))
            .map(|schedule| schedule.id)
            .collect()
    }

    /// Execute the given schedules. Every id is re-validated: unknown,
    /// inactive, or not-due entries are silent skips (the caller's list
    /// may be stale), as is a schedule the pool cannot cover. On success
    /// the vault is debited, `next_due` advances by exactly one interval
    /// **from its previous value** (late execution does not shift the
    /// cadence), and a compliance record is appended.
    ///
    /// # Errors
    /// `BatchTooLarge` when the id list exceeds the batch bound (checked
    /// before any effect).
    pub fn execute_scheduled(
        &mut self,
        vault: &mut TreasuryVault,
        compliance: &mut ComplianceLedger,
        ids: &[ScheduleId],
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
            let Some(schedule) = self.schedules.get_mut(id) else {
                debug!(schedule = %id, "unknown schedule, skipped");
                continue;
            };
            if !schedule.is_due(now) {
                debug!(schedule = %id, "schedule not due, skipped");
                continue;
            }
            if vault.balance() < schedule.amount {
                debug!(schedule = %id, "insufficient funds for schedule, skipped");
                continue;
            }

            vault.debit(schedule.amount)?;
            schedule.next_due += schedule.interval();
            schedule.total_distributed += schedule.amount;
            compliance.record_movement(
                Movement {
                    external_ref: None,
                    internal_ref: TxRef::derive("schedule", id.0, compliance.next_sequence()),
                    rule_id: None,
                    source: TransactionSource::ScheduledDistribution,
                    recipient: schedule.recipient,
                    amount: schedule.amount,
                    executor,
                },
                now,
            )?;
            executed += 1;
            info!(schedule = %id, amount = %schedule.amount, "scheduled distribution executed");
        }
        Ok(executed)
    }

    /// Activate or deactivate a schedule without touching `next_due`.
    ///
    /// # Errors
    /// `ScheduleNotFound` for an unknown id.
    pub fn set_active(&mut self, id: ScheduleId, active: bool) -> Result<()> {
        let schedule = self
            .schedules
            .get_mut(&id)
            .ok_or(TreasuryError::ScheduleNotFound(id))?;
        schedule.active = active;
        info!(schedule = %id, active, "schedule toggled");
        Ok(())
    }

    /// Look up a schedule by id.
    #[must_use]
    pub fn get(&self, id: ScheduleId) -> Option<&ScheduledDistribution> {
        self.schedules.get(&id)
    }

    /// Number of schedules in the table (active and deactivated).
    #[must_use]
    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}

impl Default for ScheduleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account(byte: u8) -> AccountId {
        AccountId::from_bytes([byte; 20])
    }

    fn setup(balance: Decimal) -> (ScheduleEngine, TreasuryVault, ComplianceLedger) {
        let engine = ScheduleEngine::new();
        let mut vault = TreasuryVault::new("USDC");
        if balance > Decimal::ZERO {
            vault.deposit(balance).unwrap();
        }
        let compliance = ComplianceLedger::new(vec![account(50)]);
        (engine, vault, compliance)
    }

    const DAY: i64 = 86_400;

    #[test]
    fn create_validates_inputs() {
        let (mut engine, _, _) = setup(Decimal::ZERO);
        let now = Utc::now();
        assert!(engine
            .create(AccountId::ZERO, Decimal::ONE, 60, now)
            .is_err());
        assert!(engine
            .create(account(1), Decimal::ZERO, 60, now)
            .is_err());
        assert!(engine.create(account(1), Decimal::ONE, 0, now).is_err());
        assert!(engine
            .create(account(1), Decimal::ONE, u64::MAX, now)
            .is_err());
    }

    #[test]
    fn next_due_starts_one_interval_out() {
        let (mut engine, _, _) = setup(Decimal::ZERO);
        let t0 = Utc::now();
        let id = engine
            .create(account(1), Decimal::new(200, 0), 30 * 86_400, t0)
            .unwrap();
        assert_eq!(
            engine.get(id).unwrap().next_due,
            t0 + Duration::seconds(30 * DAY)
        );
        assert!(engine.due_schedules(t0).is_empty());
        assert_eq!(
            engine.due_schedules(t0 + Duration::seconds(30 * DAY)),
            vec![id]
        );
    }

    #[test]
    fn execution_advances_next_due_from_previous_value() {
        // amount 200, interval 30 days, created at t0 → next_due t0+30d;
        // executed at t0+30d → balance −200, next_due t0+60d.
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let t0 = Utc::now();
        let id = engine
            .create(account(1), Decimal::new(200, 0), 30 * 86_400, t0)
            .unwrap();

        let due_at = t0 + Duration::seconds(30 * DAY);
        let executed = engine
            .execute_scheduled(&mut vault, &mut compliance, &[id], account(9), due_at)
            .unwrap();
        assert_eq!(executed, 1);
        assert_eq!(vault.balance(), Decimal::new(800, 0));
        assert_eq!(
            engine.get(id).unwrap().next_due,
            t0 + Duration::seconds(60 * DAY)
        );
        assert_eq!(
            engine.get(id).unwrap().total_distributed,
            Decimal::new(200, 0)
        );
    }

    #[test]
    fn late_execution_does_not_drift() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let t0 = Utc::now();
        let id = engine
            .create(account(1), Decimal::new(100, 0), 30 * 86_400, t0)
            .unwrap();

        // Executed 10 days late: the cadence stays anchored to t0, not to
        // the execution instant.
        let late = t0 + Duration::seconds(40 * DAY);
        engine
            .execute_scheduled(&mut vault, &mut compliance, &[id], account(9), late)
            .unwrap();
        assert_eq!(
            engine.get(id).unwrap().next_due,
            t0 + Duration::seconds(60 * DAY)
        );
    }

    #[test]
    fn missed_cycles_catch_up_one_interval_per_execution() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let t0 = Utc::now();
        let id = engine
            .create(account(1), Decimal::new(100, 0), 30 * 86_400, t0)
            .unwrap();

        // Three intervals have passed; each execution advances one
        // interval, so the poller drains the backlog across calls.
        let at = t0 + Duration::seconds(90 * DAY);
        engine
            .execute_scheduled(&mut vault, &mut compliance, &[id], account(9), at)
            .unwrap();
        assert_eq!(
            engine.get(id).unwrap().next_due,
            t0 + Duration::seconds(60 * DAY)
        );
        assert_eq!(engine.due_schedules(at), vec![id]);

        engine
            .execute_scheduled(&mut vault, &mut compliance, &[id], account(9), at)
            .unwrap();
        engine
            .execute_scheduled(&mut vault, &mut compliance, &[id], account(9), at)
            .unwrap();
        assert_eq!(
            engine.get(id).unwrap().next_due,
            t0 + Duration::seconds(120 * DAY)
        );
        assert!(engine.due_schedules(at).is_empty());
        assert_eq!(
            engine.get(id).unwrap().total_distributed,
            Decimal::new(300, 0)
        );
    }

    #[test]
    fn non_due_id_is_a_no_op() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let t0 = Utc::now();
        let id = engine
            .create(account(1), Decimal::new(200, 0), 30 * 86_400, t0)
            .unwrap();
        let before = engine.get(id).unwrap().clone();

        // Stale caller-supplied list: not due yet.
        let executed = engine
            .execute_scheduled(&mut vault, &mut compliance, &[id], account(9), t0)
            .unwrap();
        assert_eq!(executed, 0);
        let after = engine.get(id).unwrap();
        assert_eq!(after.next_due, before.next_due);
        assert_eq!(after.total_distributed, before.total_distributed);
        assert_eq!(vault.balance(), Decimal::new(1_000, 0));
        assert!(compliance.is_empty());
    }

    #[test]
    fn duplicate_ids_execute_at_most_per_due_cycle() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let t0 = Utc::now();
        let id = engine
            .create(account(1), Decimal::new(100, 0), 30 * 86_400, t0)
            .unwrap();

        // The same id supplied twice: the second pass sees next_due
        // already advanced and skips.
        let due_at = t0 + Duration::seconds(30 * DAY);
        let executed = engine
            .execute_scheduled(&mut vault, &mut compliance, &[id, id], account(9), due_at)
            .unwrap();
        assert_eq!(executed, 1);
        assert_eq!(vault.balance(), Decimal::new(900, 0));
    }

    #[test]
    fn insufficient_funds_skips_without_mutation() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(100, 0));
        let t0 = Utc::now();
        let id = engine
            .create(account(1), Decimal::new(500, 0), 60, t0)
            .unwrap();
        let due_at = t0 + Duration::seconds(60);

        let executed = engine
            .execute_scheduled(&mut vault, &mut compliance, &[id], account(9), due_at)
            .unwrap();
        assert_eq!(executed, 0);
        let schedule = engine.get(id).unwrap();
        assert_eq!(schedule.next_due, due_at, "next_due untouched on skip");
        assert_eq!(schedule.total_distributed, Decimal::ZERO);
    }

    #[test]
    fn toggle_pauses_without_touching_next_due() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let t0 = Utc::now();
        let id = engine
            .create(account(1), Decimal::new(100, 0), 60, t0)
            .unwrap();
        let original_due = engine.get(id).unwrap().next_due;

        engine.set_active(id, false).unwrap();
        let due_at = t0 + Duration::seconds(120);
        assert!(engine.due_schedules(due_at).is_empty());
        let executed = engine
            .execute_scheduled(&mut vault, &mut compliance, &[id], account(9), due_at)
            .unwrap();
        assert_eq!(executed, 0);

        engine.set_active(id, true).unwrap();
        assert_eq!(engine.get(id).unwrap().next_due, original_due);
        assert_eq!(engine.due_schedules(due_at), vec![id]);
    }

    #[test]
    fn record_carries_scheduled_source() {
        let (mut engine, mut vault, mut compliance) = setup(Decimal::new(1_000, 0));
        let t0 = Utc::now();
        let id = engine
            .create(account(7), Decimal::new(150, 0), 60, t0)
            .unwrap();
        engine
            .execute_scheduled(
                &mut vault,
                &mut compliance,
                &[id],
                account(9),
                t0 + Duration::seconds(60),
            )
            .unwrap();

        let records = compliance.records_for_recipient(account(7));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, TransactionSource::ScheduledDistribution);
        assert_eq!(records[0].rule_id, None);
        assert_eq!(records[0].amount, Decimal::new(150, 0));
    }
}
