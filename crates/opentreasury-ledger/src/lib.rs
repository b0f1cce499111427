//! # opentreasury-ledger
//!
//! **Balance authority and audit plane**: the shared treasury vault and
//! the append-only compliance ledger.
//!
//! ## Architecture
//!
//! 1. **TreasuryVault**: single source of truth for the pooled balance —
//!    every movement in the system debits through it
//! 2. **ComplianceLedger**: append-only movement records with KYC/AML
//!    status and reconciliation tracking, indexed by recipient, rule,
//!    reconciliation state, and time
//! 3. **ComplianceVerifier**: the seam to the external KYC/AML provider
//!
//! ## Movement Flow
//!
//! ```text
//! Engine → TreasuryVault.debit() → ComplianceLedger.record_movement()
//!        → (off-chain) ComplianceVerifier.verify() → update_status()
//!        → reconcile()
//! ```
//!
//! Every successful movement appends exactly one record per recipient.

pub mod compliance_ledger;
pub mod vault;
pub mod verification;

pub use compliance_ledger::{ComplianceLedger, Movement};
pub use vault::TreasuryVault;
pub use verification::{ComplianceVerifier, ExemptAllVerifier, VerificationOutcome};
