//! Multisig signer-set and pending-transaction types.
//!
//! State machine for a pending transaction:
//!
//! ```text
//! PROPOSED --confirm (threshold met)--> EXECUTED   (terminal)
//! PROPOSED --confirm (below threshold)--> PROPOSED
//! PROPOSED --revoke--> PROPOSED
//! ```
//!
//! Invariants enforced by the owning ledger: `1 ≤ threshold ≤ |signers|`,
//! confirmations ⊆ current signers, `executed` is write-once.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, AccountId, Result, TreasuryError, TxId};

/// The set of accounts allowed to confirm transactions, plus the number of
/// confirmations required for execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerSet {
    signers: BTreeSet<AccountId>,
    threshold: u32,
}

impl SignerSet {
    /// Build a signer set, validating the threshold invariant and
    /// rejecting duplicates and zero addresses.
    ///
    /// # Errors
    /// - `InvalidRecipient` for a zero signer address
    /// - `DuplicateSigner` for a repeated address
    /// - `TooManySigners` above [`constants::MAX_SIGNERS`]
    /// - `InvalidThreshold` unless `1 ≤ threshold ≤ |signers|`
    pub fn new(signers: Vec<AccountId>, threshold: u32) -> Result<Self> {
        if signers.len() > constants::MAX_SIGNERS {
            return Err(TreasuryError::TooManySigners {
                max: constants::MAX_SIGNERS,
            });
        }
        let mut set = BTreeSet::new();
        for signer in signers {
            if signer.is_zero() {
                return Err(TreasuryError::InvalidRecipient);
            }
            if !set.insert(signer) {
                return Err(TreasuryError::DuplicateSigner(signer));
            }
        }
        let built = Self {
            signers: set,
            threshold,
        };
        built.check_threshold(threshold)?;
        Ok(built)
    }

    fn check_threshold(&self, threshold: u32) -> Result<()> {
        let count = u32::try_from(self.signers.len()).unwrap_or(u32::MAX);
        if threshold == 0 || threshold > count {
            return Err(TreasuryError::InvalidThreshold {
                threshold,
                signer_count: count,
            });
        }
        Ok(())
    }

    /// Add a signer.
    ///
    /// # Errors
    /// `DuplicateSigner`, `InvalidRecipient`, or `TooManySigners`.
    pub fn add(&mut self, signer: AccountId) -> Result<()> {
        if signer.is_zero() {
            return Err(TreasuryError::InvalidRecipient);
        }
        if self.signers.len() >= constants::MAX_SIGNERS {
            return Err(TreasuryError::TooManySigners {
                max: constants::MAX_SIGNERS,
            });
        }
        if !self.signers.insert(signer) {
            return Err(TreasuryError::DuplicateSigner(signer));
        }
        Ok(())
    }

    /// Remove a signer. Refused when it would leave fewer signers than the
    /// current threshold requires, so no proposal can become permanently
    /// unreachable.
    ///
    /// # Errors
    /// `SignerNotFound` or `InvalidThreshold`.
    pub fn remove(&mut self, signer: AccountId) -> Result<()> {
        if !self.signers.contains(&signer) {
            return Err(TreasuryError::SignerNotFound(signer));
        }
        let remaining = u32::try_from(self.signers.len() - 1).unwrap_or(u32::MAX);
        if self.threshold > remaining {
            return Err(TreasuryError::InvalidThreshold {
                threshold: self.threshold,
                signer_count: remaining,
            });
        }
        self.signers.remove(&signer);
        Ok(())
    }

    /// Change the confirmation threshold.
    ///
    /// # Errors
    /// `InvalidThreshold` unless `1 ≤ threshold ≤ |signers|`.
    pub fn set_threshold(&mut self, threshold: u32) -> Result<()> {
        self.check_threshold(threshold)?;
        self.threshold = threshold;
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, account: &AccountId) -> bool {
        self.signers.contains(account)
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    /// Iterate signers in address order.
    pub fn iter(&self) -> impl Iterator<Item = &AccountId> {
        self.signers.iter()
    }
}

/// An ad-hoc transfer awaiting enough confirmations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// Ledger-assigned handle.
    pub id: TxId,
    /// Payout recipient.
    pub recipient: AccountId,
    /// Stablecoin amount to move.
    pub amount: Decimal,
    /// Opaque payload forwarded to the settlement layer.
    pub payload: Option<Vec<u8>>,
    /// Signers that have confirmed. Always a subset of the current
    /// signer set.
    pub confirmations: BTreeSet<AccountId>,
    /// Write-once terminal flag.
    pub executed: bool,
    /// Who proposed the transfer.
    pub proposed_by: AccountId,
    /// When it was proposed.
    pub proposed_at: DateTime<Utc>,
    /// When it was executed, once terminal.
    pub executed_at: Option<DateTime<Utc>>,
}

impl PendingTransaction {
    /// Number of confirmations on record.
    #[must_use]
    pub fn confirmation_count(&self) -> u32 {
        u32::try_from(self.confirmations.len()).unwrap_or(u32::MAX)
    }
}
