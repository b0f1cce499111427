//! Identifiers used throughout OpenTreasury.
//!
//! Entity handles (transactions, rules, schedules) are monotonic `u64`
//! newtypes assigned by their owning ledger or engine. Compliance record
//! ids are UUIDs derived deterministically from the record contents, and
//! transaction references are opaque 32-byte hashes.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A 20-byte account address: treasury signer, payout recipient, or executor.
///
/// The all-zero address is a sentinel and is rejected wherever a real
/// recipient or signer is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    /// The all-zero sentinel address.
    pub const ZERO: Self = Self([0u8; 20]);

    #[must_use]
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a `0x`-prefixed 40-hex-digit address. Returns `None` if the
    /// prefix is missing or the hex payload is not exactly 20 bytes.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let hex_part = s.strip_prefix("0x")?;
        let raw = hex::decode(hex_part).ok()?;
        let bytes: [u8; 20] = raw.try_into().ok()?;
        Some(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the zero sentinel (invalid as a recipient or signer).
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Short hex form for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Generate a random (non-zero) account for tests.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn random() -> Self {
        use rand::Rng;
        let mut bytes = [0u8; 20];
        rand::thread_rng().fill(&mut bytes);
        bytes[0] |= 1; // never the zero sentinel
        Self(bytes)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// TxId / RuleId / ScheduleId
// ---------------------------------------------------------------------------

/// Handle for a pending multisig transaction. Assigned monotonically by the
/// authorization ledger, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

/// Handle for an allocation or distribution rule. Assigned monotonically by
/// the owning engine, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule:{}", self.0)
    }
}

/// Handle for a scheduled distribution. Assigned monotonically by the
/// schedule engine, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ScheduleId(pub u64);

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sched:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// Unique identifier for a compliance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Deterministic `RecordId` from the record contents and the ledger's
    /// monotonic sequence number.
    ///
    /// Re-deriving with the same inputs always yields the same id, so a
    /// record can be re-identified from an external export without storing
    /// a separate mapping.
    #[must_use]
    pub fn derive(internal_ref: &TxRef, recipient: AccountId, sequence: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"opentreasury:record_id:v2:");
        hasher.update(internal_ref.as_bytes());
        hasher.update(recipient.as_bytes());
        hasher.update(sequence.to_le_bytes());
        let hash = hasher.finalize();
        let bytes: [u8; 16] = hash[..16].try_into().expect("SHA-256 produces 32 bytes");
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TxRef
// ---------------------------------------------------------------------------

/// Opaque 32-byte transaction reference.
///
/// Internal refs are derived by the engines from the originating entity;
/// external refs come from the settlement gateway when the host knows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TxRef(pub [u8; 32]);

impl TxRef {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a reference from a domain tag and an entity id.
    ///
    /// Every node deriving a ref for the same (tag, id, sequence) triple
    /// produces the same bytes.
    #[must_use]
    pub fn derive(tag: &str, entity_id: u64, sequence: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"opentreasury:tx_ref:v2:");
        hasher.update(tag.as_bytes());
        hasher.update(entity_id.to_le_bytes());
        hasher.update(sequence.to_le_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex form for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_parse_roundtrip() {
        let account = AccountId::from_bytes([0xab; 20]);
        let parsed = AccountId::parse(&account.to_string()).unwrap();
        assert_eq!(account, parsed);
    }

    #[test]
    fn account_id_parse_rejects_bad_input() {
        assert!(AccountId::parse("abcdef").is_none());
        assert!(AccountId::parse("0x1234").is_none());
        assert!(AccountId::parse("0xzz").is_none());
    }

    #[test]
    fn zero_account_is_sentinel() {
        assert!(AccountId::ZERO.is_zero());
        assert!(!AccountId::from_bytes([1; 20]).is_zero());
    }

    #[test]
    fn random_accounts_are_distinct() {
        let a = AccountId::random();
        let b = AccountId::random();
        assert_ne!(a, b);
        assert!(!a.is_zero());
    }

    #[test]
    fn record_id_deterministic() {
        let r = TxRef::derive("multisig", 1, 0);
        let a = RecordId::derive(&r, AccountId::from_bytes([1; 20]), 7);
        let b = RecordId::derive(&r, AccountId::from_bytes([1; 20]), 7);
        assert_eq!(a, b);
        let c = RecordId::derive(&r, AccountId::from_bytes([1; 20]), 8);
        assert_ne!(a, c);
    }

    #[test]
    fn tx_ref_derive_varies_by_tag() {
        let a = TxRef::derive("allocation", 1, 0);
        let b = TxRef::derive("distribution", 1, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn display_forms() {
        assert_eq!(format!("{}", TxId(9)), "tx:9");
        assert_eq!(format!("{}", RuleId(3)), "rule:3");
        assert_eq!(format!("{}", ScheduleId(5)), "sched:5");
        assert!(AccountId::ZERO.to_string().starts_with("0x0000"));
    }

    #[test]
    fn serde_roundtrips() {
        let account = AccountId::from_bytes([7; 20]);
        let json = serde_json::to_string(&account).unwrap();
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(account, back);

        let rid = RecordId::derive(&TxRef::derive("t", 0, 0), account, 1);
        let json = serde_json::to_string(&rid).unwrap();
        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(rid, back);
    }
}
