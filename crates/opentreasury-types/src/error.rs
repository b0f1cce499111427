//! Error types for the OpenTreasury core.
//!
//! All errors use the `TY_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Authorization / multisig errors
//! - 2xx: Vault / balance errors
//! - 3xx: Rule engine errors (allocation + distribution)
//! - 5xx: Schedule errors
//! - 6xx: Compliance ledger errors
//! - 9xx: Validation / general errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AccountId, RecordId, RuleId, ScheduleId, TxId};

/// Central error enum for all OpenTreasury operations.
#[derive(Debug, Error)]
pub enum TreasuryError {
    // =================================================================
    // Authorization / Multisig Errors (1xx)
    // =================================================================
    /// The caller is not a member of the current signer set.
    #[error("TY_ERR_100: Account {0} is not a signer")]
    NotASigner(AccountId),

    /// The caller has already confirmed this transaction.
    #[error("TY_ERR_101: Transaction already confirmed by {0}")]
    DuplicateConfirmation(AccountId),

    /// The transaction has already been executed (terminal state).
    #[error("TY_ERR_102: Transaction already executed: {0}")]
    TransactionAlreadyExecuted(TxId),

    /// Explicit execution was requested below the confirmation threshold.
    #[error("TY_ERR_103: Threshold not met: {confirmations} of {threshold} confirmations")]
    ThresholdNotMet { confirmations: u32, threshold: u32 },

    /// Revoke was called by a signer with no recorded confirmation.
    #[error("TY_ERR_104: No confirmation on record for {0}")]
    ConfirmationNotFound(AccountId),

    /// A signer-set administration call came from a non-authority account.
    #[error("TY_ERR_105: Account {0} is not the configuring authority")]
    NotConfiguringAuthority(AccountId),

    /// The account is already a member of the signer set.
    #[error("TY_ERR_106: Duplicate signer: {0}")]
    DuplicateSigner(AccountId),

    /// The account is not a member of the signer set.
    #[error("TY_ERR_107: Signer not found: {0}")]
    SignerNotFound(AccountId),

    /// The requested pending transaction does not exist.
    #[error("TY_ERR_108: Transaction not found: {0}")]
    TransactionNotFound(TxId),

    /// Threshold must stay within `1..=signer_count`.
    #[error("TY_ERR_109: Invalid threshold {threshold} for {signer_count} signers")]
    InvalidThreshold { threshold: u32, signer_count: u32 },

    /// The signer set is at its configured maximum.
    #[error("TY_ERR_110: Signer set full (max {max})")]
    TooManySigners { max: usize },

    // =================================================================
    // Vault / Balance Errors (2xx)
    // =================================================================
    /// Not enough pooled balance to perform the movement.
    #[error("TY_ERR_200: Insufficient treasury funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    /// Conservation invariant violated — critical safety alert.
    #[error("TY_ERR_201: Conservation violation: expected balance {expected}, found {actual}")]
    ConservationViolation { expected: Decimal, actual: Decimal },

    // =================================================================
    // Rule Engine Errors (3xx) — allocation and distribution
    // =================================================================
    /// The requested rule does not exist.
    #[error("TY_ERR_300: Rule not found: {0}")]
    RuleNotFound(RuleId),

    /// The rule has been deactivated.
    #[error("TY_ERR_301: Rule inactive: {0}")]
    RuleInactive(RuleId),

    /// The rule's cooldown window has not elapsed.
    #[error("TY_ERR_302: Cooldown active for {rule}: {remaining_secs}s remaining")]
    CooldownActive { rule: RuleId, remaining_secs: u64 },

    /// Executing would exceed the rule's lifetime budget cap.
    #[error("TY_ERR_303: Budget exceeded for {0}")]
    BudgetExceeded(RuleId),

    /// The engine's rule table is at its configured maximum.
    #[error("TY_ERR_304: Rule table full (max {max})")]
    TooManyRules { max: usize },

    // =================================================================
    // Schedule Errors (5xx)
    // =================================================================
    /// The requested scheduled distribution does not exist.
    #[error("TY_ERR_500: Schedule not found: {0}")]
    ScheduleNotFound(ScheduleId),

    /// The schedule table is at its configured maximum.
    #[error("TY_ERR_501: Schedule table full (max {max})")]
    TooManySchedules { max: usize },

    // =================================================================
    // Compliance Ledger Errors (6xx)
    // =================================================================
    /// The requested compliance record does not exist.
    #[error("TY_ERR_600: Compliance record not found: {0}")]
    RecordNotFound(RecordId),

    /// Reconciliation is one-directional; a second call is rejected.
    #[error("TY_ERR_601: Record already reconciled: {0}")]
    AlreadyReconciled(RecordId),

    /// Status and reconciliation updates are restricted to approvers.
    #[error("TY_ERR_602: Account {0} is not an authorized approver")]
    NotAnApprover(AccountId),

    // =================================================================
    // Validation / General (9xx)
    // =================================================================
    /// A movement or rule amount failed validation.
    #[error("TY_ERR_900: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// The zero sentinel address was supplied where a real account is required.
    #[error("TY_ERR_901: Invalid recipient: zero address")]
    InvalidRecipient,

    /// Batch rule recipient/amount arrays differ in length.
    #[error("TY_ERR_902: Length mismatch: {recipients} recipients, {amounts} amounts")]
    LengthMismatch { recipients: usize, amounts: usize },

    /// A batch rule was created with no recipients.
    #[error("TY_ERR_903: Batch recipient list is empty")]
    EmptyBatch,

    /// Basis points must be in `1..=10000`.
    #[error("TY_ERR_904: Basis points out of range: {bps}")]
    InvalidBasisPoints { bps: u32 },

    /// A caller-supplied id list exceeds the batch bound.
    #[error("TY_ERR_905: Batch too large: {len} ids (max {max})")]
    BatchTooLarge { len: usize, max: usize },

    /// A multisig transaction payload exceeds the configured bound.
    #[error("TY_ERR_906: Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// Intervals and cooldowns must be positive where required.
    #[error("TY_ERR_907: Invalid interval: {reason}")]
    InvalidInterval { reason: String },

    /// Unrecoverable internal error.
    #[error("TY_ERR_999: Internal error: {0}")]
    Internal(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TreasuryError>;
