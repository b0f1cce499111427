//! Configuration for a treasury instance.

use serde::{Deserialize, Serialize};

use crate::{constants, AccountId};

/// Configuration for a single treasury instance.
///
/// The host deserializes this from its deployment config and uses it to
/// construct the authorization ledger, engines, and compliance ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryConfig {
    /// Stablecoin asset managed by this treasury (display only).
    pub asset: String,
    /// The account allowed to administer the signer set.
    pub authority: AccountId,
    /// Initial multisig signer set.
    pub signers: Vec<AccountId>,
    /// Confirmations required to execute a pending transaction.
    pub threshold: u32,
    /// Accounts allowed to update compliance status and reconcile records.
    pub approvers: Vec<AccountId>,
    /// Bound on ids accepted by a single batch-execute call.
    pub max_batch_size: usize,
    /// Bound on rules per engine.
    pub max_rules: usize,
    /// Bound on scheduled distributions.
    pub max_schedules: usize,
}

impl TreasuryConfig {
    /// A config with library defaults for the given authority.
    ///
    /// The authority doubles as the sole signer and approver until the
    /// host adds more; threshold starts at 1 so a fresh treasury is usable.
    #[must_use]
    pub fn single_signer(authority: AccountId) -> Self {
        Self {
            asset: constants::DEFAULT_ASSET.to_string(),
            authority,
            signers: vec![authority],
            threshold: 1,
            approvers: vec![authority],
            max_batch_size: constants::MAX_BATCH_SIZE,
            max_rules: constants::MAX_RULES,
            max_schedules: constants::MAX_SCHEDULES,
        }
    }
}
