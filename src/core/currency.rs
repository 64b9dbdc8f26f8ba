use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported settlement currencies with their minor-unit precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Indonesian Rupiah (no decimal places)
    IDR,
    /// Malaysian Ringgit (2 decimal places)
    MYR,
    /// US Dollar (2 decimal places)
    USD,
}

impl Currency {
    /// Returns the decimal scale for this currency
    /// - IDR: 0 (no decimals)
    /// - MYR/USD: 2 (2 decimal places)
    pub fn scale(&self) -> u32 {
        match self {
            Currency::IDR => 0,
            Currency::MYR | Currency::USD => 2,
        }
    }

    /// Rounds half-to-even at the currency's minor unit.
    /// Keeps many small allocations free of systematic upward bias.
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.scale(), RoundingStrategy::MidpointNearestEven)
    }

    /// Validates that a decimal value has the correct scale for this currency
    pub fn validate_amount(&self, amount: Decimal) -> Result<(), String> {
        let scale = amount.normalize().scale();
        let expected_scale = self.scale();

        if scale > expected_scale {
            return Err(format!(
                "{} amounts must have at most {} decimal places, got {}",
                self, expected_scale, scale
            ));
        }

        if amount < Decimal::ZERO {
            return Err(format!("{} amount cannot be negative", self));
        }

        Ok(())
    }

    /// Returns the smallest unit for this currency
    pub fn smallest_unit(&self) -> Decimal {
        match self {
            Currency::IDR => Decimal::ONE,
            Currency::MYR | Currency::USD => Decimal::new(1, 2), // 0.01
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::IDR => write!(f, "IDR"),
            Currency::MYR => write!(f, "MYR"),
            Currency::USD => write!(f, "USD"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IDR" => Ok(Currency::IDR),
            "MYR" => Ok(Currency::MYR),
            "USD" => Ok(Currency::USD),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}
