//! # opentreasury-rules
//!
//! **Rule plane**: the allocation, distribution, and schedule engines.
//!
//! ## Architecture
//!
//! All three engines share one shape:
//! 1. A bounded rule table with monotonic ids; deactivation is the only
//!    removal mechanism
//! 2. Kind-specific eligibility as one dispatch over a tagged union
//! 3. **Soft-skip** batch execution: an ineligible, cooling-down,
//!    over-budget, unknown, or insufficiently-funded item is skipped and
//!    the batch continues — the returned count is the number actually
//!    executed
//! 4. Explicit context handles: every execute call takes
//!    `&mut TreasuryVault` and `&mut ComplianceLedger`, and each step
//!    re-reads the balance mutated by earlier steps of the same call
//!
//! ## Execution Flow
//!
//! ```text
//! poller → eligible_rules()/due_schedules() → execute_*([ids])
//!        → per id: eligibility → vault.debit() → compliance record
//! ```
//!
//! Eligible-batch execution orders by (priority descending, id ascending)
//! for deterministic tie-breaking.

pub mod allocation_engine;
pub mod distribution_engine;
pub mod schedule_engine;

pub use allocation_engine::AllocationEngine;
pub use distribution_engine::DistributionEngine;
pub use schedule_engine::ScheduleEngine;
