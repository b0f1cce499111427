//! The multisig authorization ledger.
//!
//! Pending transactions follow an explicit state table:
//! PROPOSED --confirm (threshold met)--> EXECUTED;
//! PROPOSED --confirm (below threshold)--> PROPOSED;
//! PROPOSED --revoke--> PROPOSED; EXECUTED is terminal.
//!
//! Signer-set administration is restricted to the configuring authority
//! and never re-evaluates in-flight transactions: a proposal that already
//! meets a lowered threshold executes on the next `confirm` or `execute`
//! call, and a removed signer's confirmations are stripped so the
//! confirmations ⊆ signers invariant holds at all times.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use opentreasury_ledger::{ComplianceLedger, Movement, TreasuryVault};
use opentreasury_types::{
    constants, AccountId, PendingTransaction, Result, SignerSet, TransactionSource, TreasuryError,
    TxId, TxRef,
};

/// Multisignature propose/confirm/execute state machine for ad-hoc
/// treasury transfers.
pub struct AuthorizationLedger {
    /// The account allowed to administer the signer set.
    authority: AccountId,
    /// Current signers and confirmation threshold.
    signers: SignerSet,
    /// All transactions ever proposed, keyed by id. Executed transactions
    /// stay in the table for audit.
    transactions: BTreeMap<TxId, PendingTransaction>,
    /// Monotonic id source, starting at 1.
    next_tx: u64,
}

impl AuthorizationLedger {
    /// Create a ledger with the given authority and signer set.
    #[must_use]
    pub fn new(authority: AccountId, signers: SignerSet) -> Self {
        Self {
            authority,
            signers,
            transactions: BTreeMap::new(),
            next_tx: 1,
        }
    }

    // =====================================================================
    // Transaction lifecycle
    // =====================================================================

    /// Propose an ad-hoc transfer. The proposer's confirmation is **not**
    /// implicit; every confirmation goes through [`Self::confirm`].
    ///
    /// # Errors
    /// - `NotASigner` for a non-signer caller
    /// - `InvalidAmount` / `InvalidRecipient` / `PayloadTooLarge` on
    ///   validation failure
    pub fn propose(
        &mut self,
        caller: AccountId,
        recipient: AccountId,
        amount: Decimal,
        payload: Option<Vec<u8>>,
        now: DateTime<Utc>,
    ) -> Result<TxId> {
        self.check_signer(caller)?;
        if amount <= Decimal::ZERO {
            return Err(TreasuryError::InvalidAmount {
                reason: "proposed amount must be positive".to_string(),
            });
        }
        if recipient.is_zero() {
            return Err(TreasuryError::InvalidRecipient);
        }
        if let Some(bytes) = &payload {
            if bytes.len() > constants::MAX_PAYLOAD_BYTES {
                return Err(TreasuryError::PayloadTooLarge {
                    len: bytes.len(),
                    max: constants::MAX_PAYLOAD_BYTES,
                });
            }
        }

        let id = TxId(self.next_tx);
        self.next_tx += 1;
        self.transactions.insert(
            id,
            PendingTransaction {
                id,
                recipient,
                amount,
                payload,
                confirmations: std::collections::BTreeSet::new(),
                executed: false,
                proposed_by: caller,
                proposed_at: now,
                executed_at: None,
            },
        );

        info!(
            tx = %id,
            proposer = %caller.short(),
            recipient = %recipient.short(),
            amount = %amount,
            "transfer proposed"
        );
        Ok(id)
    }

    /// Record the caller's confirmation. When the confirmation reaches the
    /// threshold, execution happens inside this call — debit, compliance
    /// record, terminal state — atomically with the confirmation: if the
    /// debit would fail, the whole call fails and the confirmation is not
    /// recorded. Returns `true` iff the transaction executed in this call.
    ///
    /// # Errors
    /// - `NotASigner` / `TransactionNotFound`
    /// - `TransactionAlreadyExecuted` once terminal
    /// - `DuplicateConfirmation` for a repeat confirmation
    /// - `InsufficientFunds` when threshold-triggered execution cannot
    ///   cover the amount
    pub fn confirm(
        &mut self,
        caller: AccountId,
        vault: &mut TreasuryVault,
        compliance: &mut ComplianceLedger,
        tx_id: TxId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_signer(caller)?;
        let threshold = self.signers.threshold();
        let tx = self
            .transactions
            .get_mut(&tx_id)
            .ok_or(TreasuryError::TransactionNotFound(tx_id))?;
        if tx.executed {
            return Err(TreasuryError::TransactionAlreadyExecuted(tx_id));
        }
        if tx.confirmations.contains(&caller) {
            return Err(TreasuryError::DuplicateConfirmation(caller));
        }

        let reaches_threshold = tx.confirmation_count() + 1 >= threshold;
        if reaches_threshold {
            // Debit before recording the confirmation so a failed debit
            // leaves no partial effect.
            vault.debit(tx.amount)?;
            tx.confirmations.insert(caller);
            finalize(tx, compliance, caller, now)?;
            info!(tx = %tx_id, executor = %caller.short(), "transaction executed on threshold");
            return Ok(true);
        }

        tx.confirmations.insert(caller);
        debug!(
            tx = %tx_id,
            signer = %caller.short(),
            confirmations = tx.confirmation_count(),
            threshold,
            "confirmation recorded"
        );
        Ok(false)
    }

    /// Withdraw the caller's confirmation from a not-yet-executed
    /// transaction.
    ///
    /// # Errors
    /// - `NotASigner` / `TransactionNotFound`
    /// - `TransactionAlreadyExecuted` once terminal
    /// - `ConfirmationNotFound` when the caller never confirmed
    pub fn revoke(&mut self, caller: AccountId, tx_id: TxId) -> Result<()> {
        self.check_signer(caller)?;
        let tx = self
            .transactions
            .get_mut(&tx_id)
            .ok_or(TreasuryError::TransactionNotFound(tx_id))?;
        if tx.executed {
            return Err(TreasuryError::TransactionAlreadyExecuted(tx_id));
        }
        if !tx.confirmations.remove(&caller) {
            return Err(TreasuryError::ConfirmationNotFound(caller));
        }
        debug!(tx = %tx_id, signer = %caller.short(), "confirmation revoked");
        Ok(())
    }

    /// Explicitly execute a transaction whose threshold is already met
    /// (for hosts that lower the threshold after confirmations arrive, or
    /// prefer a separate execute step).
    ///
    /// # Errors
    /// - `NotASigner` / `TransactionNotFound`
    /// - `TransactionAlreadyExecuted` once terminal
    /// - `ThresholdNotMet` below the confirmation threshold
    /// - `InsufficientFunds` when the pool cannot cover the amount
    pub fn execute(
        &mut self,
        caller: AccountId,
        vault: &mut TreasuryVault,
        compliance: &mut ComplianceLedger,
        tx_id: TxId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.check_signer(caller)?;
        let threshold = self.signers.threshold();
        let tx = self
            .transactions
            .get_mut(&tx_id)
            .ok_or(TreasuryError::TransactionNotFound(tx_id))?;
        if tx.executed {
            return Err(TreasuryError::TransactionAlreadyExecuted(tx_id));
        }
        if tx.confirmation_count() < threshold {
            return Err(TreasuryError::ThresholdNotMet {
                confirmations: tx.confirmation_count(),
                threshold,
            });
        }

        vault.debit(tx.amount)?;
        finalize(tx, compliance, caller, now)?;
        info!(tx = %tx_id, executor = %caller.short(), "transaction executed");
        Ok(())
    }

    // =====================================================================
    // Signer administration (authority only)
    // =====================================================================

    /// Add a signer to the set.
    ///
    /// # Errors
    /// `NotConfiguringAuthority`, plus the signer-set validation errors.
    pub fn add_signer(&mut self, caller: AccountId, signer: AccountId) -> Result<()> {
        self.check_authority(caller)?;
        self.signers.add(signer)?;
        info!(signer = %signer.short(), "signer added");
        Ok(())
    }

    /// Remove a signer. Refused when it would leave fewer signers than the
    /// threshold requires. The removed signer's confirmations are stripped
    /// from unexecuted transactions; no transaction is re-evaluated for
    /// execution.
    ///
    /// # Errors
    /// `NotConfiguringAuthority`, `SignerNotFound`, or `InvalidThreshold`.
    pub fn remove_signer(&mut self, caller: AccountId, signer: AccountId) -> Result<()> {
        self.check_authority(caller)?;
        self.signers.remove(signer)?;
        for tx in self.transactions.values_mut() {
            if !tx.executed {
                tx.confirmations.remove(&signer);
            }
        }
        info!(signer = %signer.short(), "signer removed");
        Ok(())
    }

    /// Change the confirmation threshold. In-flight transactions are not
    /// re-evaluated; one that already meets a lowered threshold executes
    /// on its next `confirm` or `execute` call.
    ///
    /// # Errors
    /// `NotConfiguringAuthority` or `InvalidThreshold`.
    pub fn set_threshold(&mut self, caller: AccountId, threshold: u32) -> Result<()> {
        self.check_authority(caller)?;
        self.signers.set_threshold(threshold)?;
        info!(threshold, "confirmation threshold updated");
        Ok(())
    }

    // =====================================================================
    // Read views
    // =====================================================================

    /// Look up a transaction by id.
    #[must_use]
    pub fn transaction(&self, tx_id: TxId) -> Option<&PendingTransaction> {
        self.transactions.get(&tx_id)
    }

    /// Not-yet-executed transactions in id order.
    #[must_use]
    pub fn pending(&self) -> Vec<&PendingTransaction> {
        self.transactions.values().filter(|tx| !tx.executed).collect()
    }

    /// The current signer set.
    #[must_use]
    pub fn signer_set(&self) -> &SignerSet {
        &self.signers
    }

    fn check_signer(&self, caller: AccountId) -> Result<()> {
        if !self.signers.contains(&caller) {
            return Err(TreasuryError::NotASigner(caller));
        }
        Ok(())
    }

    fn check_authority(&self, caller: AccountId) -> Result<()> {
        if caller != self.authority {
            return Err(TreasuryError::NotConfiguringAuthority(caller));
        }
        Ok(())
    }
}

/// Append the compliance record and move the transaction to its terminal
/// state. The vault debit has already happened.
fn finalize(
    tx: &mut PendingTransaction,
    compliance: &mut ComplianceLedger,
    executor: AccountId,
    now: DateTime<Utc>,
) -> Result<()> {
    compliance.record_movement(
        Movement {
            external_ref: None,
            internal_ref: TxRef::derive("multisig", tx.id.0, 0),
            rule_id: None,
            source: TransactionSource::Multisig,
            recipient: tx.recipient,
            amount: tx.amount,
            executor,
        },
        now,
    )?;
    tx.executed = true;
    tx.executed_at = Some(now);
    Ok(())
}
