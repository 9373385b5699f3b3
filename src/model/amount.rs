use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseAmountError {
    /// Unable to parse decimal string.
    #[error("Unable to parse decimal string `{0}`")]
    Decimal(String, #[source] rust_decimal::Error),

    /// The string was empty after trimming.
    #[error("Empty amount")]
    Empty,
}

/// An amount of the traded asset, e.g. BTC.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Quantity(Decimal);

/// An amount of the quote currency. Prices, fees, proceeds and cost basis are all denominated in
/// the quote currency.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct UsdAmount(Decimal);

macro_rules! impl_math_ops {
    ($name:ident) => {
        impl ::std::ops::Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl ::std::ops::AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl ::std::ops::Neg for $name {
            type Output = Self;

            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl ::std::ops::Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl ::std::ops::SubAssign for $name {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }

        impl ::std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::ZERO, |acc, x| acc + x)
            }
        }

        impl FromStr for $name {
            type Err = ParseAmountError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_decimal(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.normalize(), f)
            }
        }

        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl $name {
            pub const ZERO: Self = Self(Decimal::ZERO);

            pub fn to_decimal(self) -> Decimal {
                self.0
            }

            pub fn is_zero(self) -> bool {
                self.0.is_zero()
            }

            pub fn is_positive(self) -> bool {
                self.0 > Decimal::ZERO
            }

            pub fn is_negative(self) -> bool {
                self.0 < Decimal::ZERO
            }

            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            pub(crate) fn checked_add(self, rhs: Self) -> Option<Self> {
                self.0.checked_add(rhs.0).map(Self)
            }

            pub(crate) fn checked_sub(self, rhs: Self) -> Option<Self> {
                self.0.checked_sub(rhs.0).map(Self)
            }
        }
    };
}

impl_math_ops!(Quantity);
impl_math_ops!(UsdAmount);

/// Parse a decimal string as exported by an exchange.
///
/// Exchanges are not consistent about notation, so scientific notation like `5.161e-05` is
/// accepted along with plain decimals.
fn parse_decimal(s: &str) -> Result<Decimal, ParseAmountError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    let res = if s.contains(['e', 'E']) {
        Decimal::from_scientific(s)
    } else {
        Decimal::from_str(s)
    };

    res.map_err(|err| ParseAmountError::Decimal(s.to_string(), err))
}

impl Quantity {
    /// The ratio of `self` to `whole`, used to prorate a lot's cost basis and fee.
    ///
    /// Returns zero when `whole` is zero.
    pub(crate) fn ratio_of(self, whole: Quantity) -> Decimal {
        if whole.is_zero() {
            Decimal::ZERO
        } else {
            self.0 / whole.0
        }
    }

    pub(crate) fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl UsdAmount {
    /// Multiply a unit price by a quantity of the asset.
    pub fn mul_quantity(self, quantity: Quantity) -> UsdAmount {
        Self(self.0 * quantity.0)
    }

    /// Like [`UsdAmount::mul_quantity`], returning `None` when the product does not fit.
    pub(crate) fn checked_mul_quantity(self, quantity: Quantity) -> Option<UsdAmount> {
        self.0.checked_mul(quantity.0).map(Self)
    }

    /// Scale this amount by a dimensionless ratio.
    pub(crate) fn prorate(self, ratio: Decimal) -> UsdAmount {
        Self(self.0 * ratio)
    }

    #[cfg(test)]
    pub(crate) fn round_dp(self, dp: u32) -> Self {
        Self(self.0.round_dp(dp))
    }
}
