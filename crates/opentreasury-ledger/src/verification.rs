//! External compliance-verification seam.
//!
//! The core never performs identity verification itself. The off-chain
//! automation calls a [`ComplianceVerifier`] before triggering execution
//! and feeds the outcome back through
//! [`ComplianceLedger::update_status`](crate::ComplianceLedger::update_status).
//! The provider is an opaque external collaborator behind this trait.

use rust_decimal::Decimal;

use opentreasury_types::{AccountId, ComplianceStatus, TransactionSource};

/// Outcome of a KYC/AML verification call.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    /// KYC verification status.
    pub kyc: ComplianceStatus,
    /// AML screening status.
    pub aml: ComplianceStatus,
    /// Provider risk score, 0 (clean) to 100.
    pub risk_score: u32,
    /// Provider-side transaction identifier, when issued.
    pub external_tx_id: Option<String>,
}

/// The external KYC/AML provider.
pub trait ComplianceVerifier {
    /// Verify a prospective movement of `amount` to `recipient`.
    fn verify(
        &self,
        recipient: AccountId,
        amount: Decimal,
        source: TransactionSource,
    ) -> VerificationOutcome;
}

/// Marks every movement exempt. Used in tests and closed-loop deployments
/// where all recipients are pre-vetted out of band.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExemptAllVerifier;

impl ComplianceVerifier for ExemptAllVerifier {
    fn verify(
        &self,
        _recipient: AccountId,
        _amount: Decimal,
        _source: TransactionSource,
    ) -> VerificationOutcome {
        VerificationOutcome {
            kyc: ComplianceStatus::Exempt,
            aml: ComplianceStatus::Exempt,
            risk_score: 0,
            external_tx_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exempt_verifier_marks_exempt() {
        let outcome = ExemptAllVerifier.verify(
            AccountId::from_bytes([1; 20]),
            Decimal::new(100, 0),
            TransactionSource::Multisig,
        );
        assert_eq!(outcome.kyc, ComplianceStatus::Exempt);
        assert_eq!(outcome.aml, ComplianceStatus::Exempt);
        assert_eq!(outcome.risk_score, 0);
        assert!(outcome.external_tx_id.is_none());
    }
}
