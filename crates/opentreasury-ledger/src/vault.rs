//! The treasury vault — single source of truth for pooled funds.
//!
//! All mutations are atomic: either the full operation succeeds or the
//! balance is unchanged. The vault also tracks lifetime inflow/outflow
//! totals so the conservation invariant
//! `available == total_deposited − total_debited` can be verified at any
//! point.

use rust_decimal::Decimal;
use tracing::warn;

use opentreasury_types::{Result, TreasuryError};

/// Pooled stablecoin balance shared by every engine.
///
/// The vault is the only globally shared mutable resource; engines read
/// the balance at point of use within the current call rather than
/// caching it across calls.
#[derive(Debug, Clone)]
pub struct TreasuryVault {
    /// Stablecoin asset held by this vault (display only).
    asset: String,
    /// Funds available for movement.
    available: Decimal,
    /// Lifetime inflow.
    total_deposited: Decimal,
    /// Lifetime outflow.
    total_debited: Decimal,
}

impl TreasuryVault {
    /// Create an empty vault for the given asset.
    #[must_use]
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            available: Decimal::ZERO,
            total_deposited: Decimal::ZERO,
            total_debited: Decimal::ZERO,
        }
    }

    /// Credit pooled funds (the host records a gateway deposit).
    ///
    /// # Errors
    /// Returns `InvalidAmount` for a non-positive deposit.
    pub fn deposit(&mut self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(TreasuryError::InvalidAmount {
                reason: "deposit must be positive".to_string(),
            });
        }
        self.available += amount;
        self.total_deposited += amount;
        Ok(())
    }

    /// Debit pooled funds for a movement.
    ///
    /// # Errors
    /// - `InvalidAmount` for a non-positive debit
    /// - `InsufficientFunds` when the pool cannot cover `amount`
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(TreasuryError::InvalidAmount {
                reason: "debit must be positive".to_string(),
            });
        }
        if self.available < amount {
            return Err(TreasuryError::InsufficientFunds {
                needed: amount,
                available: self.available,
            });
        }
        self.available -= amount;
        self.total_debited += amount;
        Ok(())
    }

    /// Current pooled balance.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.available
    }

    /// Lifetime inflow.
    #[must_use]
    pub fn total_deposited(&self) -> Decimal {
        self.total_deposited
    }

    /// Lifetime outflow.
    #[must_use]
    pub fn total_debited(&self) -> Decimal {
        self.total_debited
    }

    /// The asset symbol this vault holds.
    #[must_use]
    pub fn asset(&self) -> &str {
        &self.asset
    }

    /// Verify the conservation invariant. A violation means a movement
    /// bypassed `deposit`/`debit` and is a critical fault.
    ///
    /// # Errors
    /// Returns `ConservationViolation` with the expected and actual
    /// balances.
    pub fn verify_conservation(&self) -> Result<()> {
        let expected = self.total_deposited - self.total_debited;
        if self.available != expected {
            warn!(
                asset = %self.asset,
                expected = %expected,
                actual = %self.available,
                "treasury conservation violation"
            );
            return Err(TreasuryError::ConservationViolation {
                expected,
                actual: self.available,
            });
        }
        Ok(())
    }
}
