//! Monetary value types used by pricing snapshots and order totals.
//!
//! Amounts are `rust_decimal::Decimal`; the currency is carried once on the
//! owning aggregate (checkout / order) rather than on every amount.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, Sub};

/// A tax-aware amount with separate net and gross components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxedMoney {
    pub net: Decimal,
    pub gross: Decimal,
}

impl TaxedMoney {
    pub const ZERO: TaxedMoney = TaxedMoney {
        net: Decimal::ZERO,
        gross: Decimal::ZERO,
    };

    pub fn new(net: Decimal, gross: Decimal) -> Self {
        Self { net, gross }
    }

    /// A tax-free amount: net equals gross.
    pub fn flat(amount: Decimal) -> Self {
        Self {
            net: amount,
            gross: amount,
        }
    }

    /// The tax portion of this amount.
    pub fn tax(&self) -> Decimal {
        self.gross - self.net
    }

    pub fn is_zero(&self) -> bool {
        self.gross.is_zero() && self.net.is_zero()
    }

    /// Picks the amount in the basis configured for the channel.
    pub fn in_basis(&self, prices_entered_with_tax: bool) -> Decimal {
        if prices_entered_with_tax {
            self.gross
        } else {
            self.net
        }
    }
}

impl Add for TaxedMoney {
    type Output = TaxedMoney;

    fn add(self, other: TaxedMoney) -> TaxedMoney {
        TaxedMoney {
            net: self.net + other.net,
            gross: self.gross + other.gross,
        }
    }
}

impl Sub for TaxedMoney {
    type Output = TaxedMoney;

    fn sub(self, other: TaxedMoney) -> TaxedMoney {
        TaxedMoney {
            net: self.net - other.net,
            gross: self.gross - other.gross,
        }
    }
}

impl Sum for TaxedMoney {
    fn sum<I: Iterator<Item = TaxedMoney>>(iter: I) -> TaxedMoney {
        iter.fold(TaxedMoney::ZERO, Add::add)
    }
}

impl Default for TaxedMoney {
    fn default() -> Self {
        TaxedMoney::ZERO
    }
}
