//! System-wide constants for the OpenTreasury core.

/// Basis-point denominator: 10000 bps = 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Decimal places carried by stablecoin amounts (USDC has 6).
pub const AMOUNT_DP: u32 = 6;

/// Maximum ids accepted by a single batch-execute call.
pub const MAX_BATCH_SIZE: usize = 256;

/// Maximum rules per engine (allocation or distribution).
pub const MAX_RULES: usize = 10_000;

/// Maximum scheduled distributions.
pub const MAX_SCHEDULES: usize = 10_000;

/// Maximum recipients in a single batch distribution rule.
pub const MAX_BATCH_RECIPIENTS: usize = 256;

/// Maximum interval or cooldown accepted on any rule or schedule
/// (10 years in seconds). Keeps time arithmetic comfortably in range.
pub const MAX_INTERVAL_SECS: u64 = 315_360_000;

/// Maximum signers in the multisig signer set.
pub const MAX_SIGNERS: usize = 32;

/// Maximum payload bytes attached to a pending transaction.
pub const MAX_PAYLOAD_BYTES: usize = 4_096;

/// Default confirmation threshold for a fresh treasury.
pub const DEFAULT_THRESHOLD: u32 = 2;

/// Default stablecoin asset symbol.
pub const DEFAULT_ASSET: &str = "USDC";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "OpenTreasury";
