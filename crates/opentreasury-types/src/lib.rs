//! # opentreasury-types
//!
//! Shared types, errors, and configuration for the **OpenTreasury**
//! stablecoin treasury core.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`TxId`], [`RuleId`], [`ScheduleId`], [`RecordId`], [`TxRef`]
//! - **Multisig model**: [`SignerSet`], [`PendingTransaction`]
//! - **Allocation model**: [`AllocationRule`], [`AllocationKind`]
//! - **Distribution model**: [`DistributionRule`], [`DistributionKind`], [`BatchAmounts`], [`Comparator`]
//! - **Schedule model**: [`ScheduledDistribution`]
//! - **Compliance model**: [`ComplianceRecord`], [`ComplianceStatus`], [`TransactionSource`], [`ReportingMetadata`]
//! - **Configuration**: [`TreasuryConfig`]
//! - **Errors**: [`TreasuryError`] with `TY_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod allocation;
pub mod compliance;
pub mod config;
pub mod constants;
pub mod distribution;
pub mod error;
pub mod ids;
pub mod multisig;
pub mod schedule;

// Re-export all primary types at crate root for ergonomic imports:
//   use opentreasury_types::{AllocationRule, ComplianceRecord, SignerSet, ...};

pub use allocation::*;
pub use compliance::*;
pub use config::*;
pub use distribution::*;
pub use error::*;
pub use ids::*;
pub use multisig::*;
pub use schedule::*;

// Constants are accessed via `opentreasury_types::constants::FOO`
// (not re-exported to avoid name collisions).
