//! Conversion between decimal USDC prices and on-chain base units.
//!
//! Prices are stored and displayed as decimals (`9.99`); chains move integer
//! base units (`9_990_000` for 6 decimals).

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// An amount that cannot be expressed in token base units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// Negative prices are not payable.
    #[error("amount must not be negative: {0}")]
    Negative(Decimal),
    /// More fractional digits than the token has decimals.
    #[error("amount {amount} has more than {decimals} decimal places")]
    TooPrecise {
        /// The offending amount.
        amount: Decimal,
        /// Token decimals.
        decimals: u8,
    },
    /// Does not fit in a `u64` of base units.
    #[error("amount out of range: {0}")]
    Overflow(Decimal),
}

/// Converts a decimal token amount to integer base units.
///
/// # Errors
///
/// Fails for negative amounts, amounts with more fractional digits than
/// `decimals`, and amounts that overflow `u64`.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64, AmountError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative(amount));
    }
    let factor = Decimal::from(10u64.pow(u32::from(decimals)));
    let scaled = amount
        .checked_mul(factor)
        .ok_or(AmountError::Overflow(amount))?;
    if !scaled.fract().is_zero() {
        return Err(AmountError::TooPrecise { amount, decimals });
    }
    scaled.to_u64().ok_or(AmountError::Overflow(amount))
}

/// Converts integer base units back to a decimal token amount.
#[must_use]
pub fn from_base_units(units: u64, decimals: u8) -> Decimal {
    let factor = Decimal::from(10u64.pow(u32::from(decimals)));
    (Decimal::from(units) / factor).normalize()
}
