//! Append-only compliance ledger.
//!
//! Records live in a growable arena in append order; secondary indexes
//! (by id, recipient, rule, reconciliation state, and record time) are
//! maintained incrementally at write time. Records are never removed, and
//! after append only the KYC/AML statuses, the external ids, and the
//! reconciliation pair may change.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use opentreasury_types::{
    AccountId, ComplianceRecord, ComplianceStatus, RecordId, Result, RuleId, TransactionSource,
    TreasuryError, TxRef,
};

/// One movement to be appended to the ledger.
#[derive(Debug, Clone)]
pub struct Movement {
    /// Reference in the external settlement system, when already known.
    pub external_ref: Option<TxRef>,
    /// Reference derived from the originating entity.
    pub internal_ref: TxRef,
    /// Triggering rule; `None` for manual (multisig) transfers.
    pub rule_id: Option<RuleId>,
    /// Originating subsystem.
    pub source: TransactionSource,
    /// Payout recipient.
    pub recipient: AccountId,
    /// Stablecoin amount moved.
    pub amount: Decimal,
    /// Account that triggered the execution.
    pub executor: AccountId,
}

/// Append-only audit trail of every treasury movement.
pub struct ComplianceLedger {
    /// Records in append order (the arena).
    records: Vec<ComplianceRecord>,
    /// O(1) id lookup into the arena.
    by_id: HashMap<RecordId, usize>,
    /// Arena positions per recipient.
    by_recipient: HashMap<AccountId, Vec<usize>>,
    /// Arena positions per triggering rule.
    by_rule: HashMap<RuleId, Vec<usize>>,
    /// Arena positions of records not yet reconciled.
    unreconciled: BTreeSet<usize>,
    /// (record time, sequence) → arena position, for range queries.
    by_time: BTreeMap<(DateTime<Utc>, u64), usize>,
    /// Block-height-equivalent counter, assigned per record.
    sequence: u64,
    /// Accounts allowed to update status and reconcile.
    approvers: BTreeSet<AccountId>,
}

impl ComplianceLedger {
    /// Create an empty ledger with the given approver set.
    #[must_use]
    pub fn new(approvers: Vec<AccountId>) -> Self {
        Self {
            records: Vec::new(),
            by_id: HashMap::new(),
            by_recipient: HashMap::new(),
            by_rule: HashMap::new(),
            unreconciled: BTreeSet::new(),
            by_time: BTreeMap::new(),
            sequence: 0,
            approvers: approvers.into_iter().collect(),
        }
    }

    /// Append one movement. Initializes KYC/AML to UNKNOWN; the off-chain
    /// verification flow fills them in later via [`Self::update_status`].
    ///
    /// # Errors
    /// - `InvalidAmount` for a non-positive amount
    /// - `InvalidRecipient` for the zero address
    pub fn record_movement(&mut self, movement: Movement, now: DateTime<Utc>) -> Result<RecordId> {
        if movement.amount <= Decimal::ZERO {
            return Err(TreasuryError::InvalidAmount {
                reason: "movement amount must be positive".to_string(),
            });
        }
        if movement.recipient.is_zero() {
            return Err(TreasuryError::InvalidRecipient);
        }

        let sequence = self.sequence;
        self.sequence += 1;

        let record_id = RecordId::derive(&movement.internal_ref, movement.recipient, sequence);
        let record = ComplianceRecord {
            record_id,
            external_ref: movement.external_ref,
            internal_ref: movement.internal_ref,
            rule_id: movement.rule_id,
            source: movement.source,
            recipient: movement.recipient,
            amount: movement.amount,
            kyc_status: ComplianceStatus::Unknown,
            aml_status: ComplianceStatus::Unknown,
            recorded_at: now,
            sequence,
            executor: movement.executor,
            gateway_id: None,
            transparency_id: None,
            reconciled: false,
            reconciled_at: None,
            metadata: None,
        };

        let pos = self.records.len();
        self.by_id.insert(record_id, pos);
        self.by_recipient
            .entry(record.recipient)
            .or_default()
            .push(pos);
        if let Some(rule_id) = record.rule_id {
            self.by_rule.entry(rule_id).or_default().push(pos);
        }
        self.unreconciled.insert(pos);
        self.by_time.insert((now, sequence), pos);

        debug!(
            record = %record_id,
            source = %record.source,
            recipient = %record.recipient.short(),
            amount = %record.amount,
            "movement recorded"
        );
        self.records.push(record);
        Ok(record_id)
    }

    /// Overwrite KYC/AML statuses and, when non-empty values are supplied,
    /// the external gateway/transparency ids. Restricted to approvers.
    ///
    /// # Errors
    /// - `NotAnApprover` for an unauthorized caller
    /// - `RecordNotFound` for an unknown id
    pub fn update_status(
        &mut self,
        caller: AccountId,
        record_id: RecordId,
        kyc: ComplianceStatus,
        aml: ComplianceStatus,
        gateway_id: Option<String>,
        transparency_id: Option<String>,
    ) -> Result<()> {
        self.check_approver(caller)?;
        let pos = *self
            .by_id
            .get(&record_id)
            .ok_or(TreasuryError::RecordNotFound(record_id))?;
        self.records[pos].update_status(kyc, aml, gateway_id, transparency_id);
        Ok(())
    }

    /// Mark a record as reconciled against external settlement.
    /// One-directional: a second call on the same record is rejected.
    ///
    /// # Errors
    /// - `NotAnApprover` for an unauthorized caller
    /// - `RecordNotFound` for an unknown id
    /// - `AlreadyReconciled` on repeat reconciliation
    pub fn reconcile(
        &mut self,
        caller: AccountId,
        record_id: RecordId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.check_approver(caller)?;
        let pos = *self
            .by_id
            .get(&record_id)
            .ok_or(TreasuryError::RecordNotFound(record_id))?;
        let record = &mut self.records[pos];
        if record.reconciled {
            return Err(TreasuryError::AlreadyReconciled(record_id));
        }
        record.reconciled = true;
        record.reconciled_at = Some(now);
        self.unreconciled.remove(&pos);
        debug!(record = %record_id, "record reconciled");
        Ok(())
    }

    fn check_approver(&self, caller: AccountId) -> Result<()> {
        if !self.approvers.contains(&caller) {
            return Err(TreasuryError::NotAnApprover(caller));
        }
        Ok(())
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, record_id: RecordId) -> Option<&ComplianceRecord> {
        self.by_id.get(&record_id).map(|pos| &self.records[*pos])
    }

    /// All records for a recipient, in append order.
    #[must_use]
    pub fn records_for_recipient(&self, recipient: AccountId) -> Vec<&ComplianceRecord> {
        self.by_recipient
            .get(&recipient)
            .map(|positions| positions.iter().map(|pos| &self.records[*pos]).collect())
            .unwrap_or_default()
    }

    /// All records produced by a rule, in append order. Batch executions
    /// contribute one record per recipient, all sharing the rule id.
    #[must_use]
    pub fn records_for_rule(&self, rule_id: RuleId) -> Vec<&ComplianceRecord> {
        self.by_rule
            .get(&rule_id)
            .map(|positions| positions.iter().map(|pos| &self.records[*pos]).collect())
            .unwrap_or_default()
    }

    /// Records filtered by reconciliation state. The unreconciled side is
    /// index-backed (it is the operationally hot query for the
    /// reporting pipeline).
    #[must_use]
    pub fn records_by_reconciliation(&self, reconciled: bool) -> Vec<&ComplianceRecord> {
        if reconciled {
            self.records.iter().filter(|r| r.reconciled).collect()
        } else {
            self.unreconciled
                .iter()
                .map(|pos| &self.records[*pos])
                .collect()
        }
    }

    /// Records whose record time falls in `[from, to]`, in time order.
    #[must_use]
    pub fn records_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&ComplianceRecord> {
        self.by_time
            .range((from, 0)..=(to, u64::MAX))
            .map(|(_, pos)| &self.records[*pos])
            .collect()
    }

    /// Sum of recorded amounts for one source subsystem.
    #[must_use]
    pub fn total_for_source(&self, source: TransactionSource) -> Decimal {
        self.records
            .iter()
            .filter(|r| r.source == source)
            .map(|r| r.amount)
            .sum()
    }

    /// The sequence number the next appended record will receive. Engines
    /// fold it into internal refs so each execution gets a distinct ref.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of records in the ledger.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
