//! Compliance record types for the treasury audit trail.
//!
//! Every executed movement produces exactly one [`ComplianceRecord`]
//! (batch distributions produce one per recipient, sharing the rule id).
//! Records are append-only: after creation only the KYC/AML statuses, the
//! external gateway/transparency ids, and the reconciliation pair may
//! change, and `reconciled` transitions false→true exactly once.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, RecordId, RuleId, TxRef};

/// Where a movement originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionSource {
    /// Ad-hoc transfer executed through the multisig authorization ledger.
    Multisig,
    /// Recurring scheduled distribution.
    ScheduledDistribution,
    /// Periodic allocation rule.
    AllocationRule,
    /// Distribution rule (any of the four kinds).
    DistributionRule,
}

impl std::fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Multisig => write!(f, "MULTISIG_TRANSACTION"),
            Self::ScheduledDistribution => write!(f, "SCHEDULED_DISTRIBUTION"),
            Self::AllocationRule => write!(f, "ALLOCATION_RULE"),
            Self::DistributionRule => write!(f, "DISTRIBUTION_RULE"),
        }
    }
}

/// KYC / AML verification status supplied by the external provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceStatus {
    /// Verification requested, outcome not yet known.
    Pending,
    /// Identity verified / screening passed.
    Verified,
    /// Verification failed or screening flagged.
    Rejected,
    /// Recipient is exempt from verification.
    Exempt,
    /// No verification attempted yet (initial state).
    Unknown,
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Verified => write!(f, "VERIFIED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Exempt => write!(f, "EXEMPT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Additional metadata for regulatory reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingMetadata {
    /// Jurisdiction code (ISO 3166-1 alpha-2, e.g. "US").
    pub jurisdiction: Option<String>,
    /// Regulatory category of the movement (e.g. "PAYROLL").
    pub category: Option<String>,
    /// Reporting period identifier (e.g. "2026-Q1").
    pub reporting_period: Option<String>,
    /// Free-form notes for compliance officers.
    pub notes: Option<String>,
}

/// One movement in the treasury audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRecord {
    /// Deterministic record identifier.
    pub record_id: RecordId,
    /// Reference in the external settlement system, when the host knows it
    /// at record time.
    pub external_ref: Option<TxRef>,
    /// Reference derived from the originating entity inside the treasury.
    pub internal_ref: TxRef,
    /// The rule that triggered the movement; `None` for manual (multisig)
    /// transfers.
    pub rule_id: Option<RuleId>,
    /// Which subsystem moved the funds.
    pub source: TransactionSource,
    /// Payout recipient.
    pub recipient: AccountId,
    /// Stablecoin amount moved.
    pub amount: Decimal,
    /// KYC verification status.
    pub kyc_status: ComplianceStatus,
    /// AML screening status.
    pub aml_status: ComplianceStatus,
    /// When the movement was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Monotonic position in the ledger (block-height equivalent).
    pub sequence: u64,
    /// The account that triggered the execution.
    pub executor: AccountId,
    /// Settlement gateway transaction id, once known.
    pub gateway_id: Option<String>,
    /// Opt-in transparency network id, once known.
    pub transparency_id: Option<String>,
    /// Whether the record has been reconciled against external settlement.
    pub reconciled: bool,
    /// When the record was reconciled.
    pub reconciled_at: Option<DateTime<Utc>>,
    /// Optional regulatory-reporting metadata.
    pub metadata: Option<ReportingMetadata>,
}

impl ComplianceRecord {
    /// Overwrite the KYC/AML statuses. An external id is written only when
    /// a non-empty value is supplied; the stored value is preserved
    /// otherwise.
    pub fn update_status(
        &mut self,
        kyc: ComplianceStatus,
        aml: ComplianceStatus,
        gateway_id: Option<String>,
        transparency_id: Option<String>,
    ) {
        self.kyc_status = kyc;
        self.aml_status = aml;
        if let Some(id) = gateway_id.filter(|id| !id.is_empty()) {
            self.gateway_id = Some(id);
        }
        if let Some(id) = transparency_id.filter(|id| !id.is_empty()) {
            self.transparency_id = Some(id);
        }
    }

    /// Serialize for regulatory export.
    ///
    /// # Errors
    /// Returns a serialization error if the record cannot be encoded
    /// (practically unreachable for this type).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
