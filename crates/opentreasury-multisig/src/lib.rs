//! # opentreasury-multisig
//!
//! **Authorization plane**: the multisignature propose/confirm/execute
//! state machine for ad-hoc treasury transfers.
//!
//! ## Transaction Flow
//!
//! ```text
//! propose() → PROPOSED → confirm() ... confirm()
//!                                        │ (threshold reached)
//!                                        ▼
//!                    vault.debit() + compliance.record_movement()
//!                                        │
//!                                        ▼
//!                                    EXECUTED (terminal)
//! ```
//!
//! Execution is atomic with the confirmation that reaches the threshold:
//! if the debit would fail, the confirmation is not recorded either.

pub mod authorization;

pub use authorization::AuthorizationLedger;
