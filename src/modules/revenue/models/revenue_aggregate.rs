use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{Currency, Period};
use crate::modules::allocations::models::AllocationResult;

/// Bucket used when an optional dimension is not tagged on a record
pub const UNCATEGORIZED: &str = "uncategorized";

/// Axis an aggregate can be sliced by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Partner,
    Merchant,
    Category,
    Device,
    Entity,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Partner => "partner",
            Dimension::Merchant => "merchant",
            Dimension::Category => "category",
            Dimension::Device => "device",
            Dimension::Entity => "entity",
        }
    }

    /// Value of this dimension on an allocation result
    pub fn value_of(&self, result: &AllocationResult) -> String {
        let value = match self {
            Dimension::Partner => result.partner_id.as_deref(),
            Dimension::Merchant => Some(result.merchant_id.as_str()),
            Dimension::Category => result.category.as_deref(),
            Dimension::Device => result.device_id.as_deref(),
            Dimension::Entity => Some(result.beneficiary.label()),
        };

        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(UNCATEGORIZED)
            .to_string()
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "partner" => Ok(Dimension::Partner),
            "merchant" => Ok(Dimension::Merchant),
            "category" => Ok(Dimension::Category),
            "device" => Ok(Dimension::Device),
            "entity" => Ok(Dimension::Entity),
            _ => Err(format!("Invalid dimension: {}", s)),
        }
    }
}

/// Ordered tuple of dimensions to group by; empty means period totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionSpec(Vec<Dimension>);

impl DimensionSpec {
    /// Duplicate dimensions are dropped, first occurrence wins
    pub fn new(dimensions: impl IntoIterator<Item = Dimension>) -> Self {
        let mut unique = Vec::new();
        for dimension in dimensions {
            if !unique.contains(&dimension) {
                unique.push(dimension);
            }
        }
        Self(unique)
    }

    pub fn total() -> Self {
        Self(Vec::new())
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.0
    }

    /// Whether aggregates keyed exactly by this spec
    pub fn matches(&self, aggregate: &RevenueAggregate) -> bool {
        aggregate.dimensions.len() == self.0.len()
            && aggregate
                .dimensions
                .iter()
                .zip(&self.0)
                .all(|(value, dimension)| value.dimension == *dimension)
    }

    fn key_for(&self, result: &AllocationResult) -> Vec<DimensionValue> {
        self.0
            .iter()
            .map(|dimension| DimensionValue {
                dimension: *dimension,
                value: dimension.value_of(result),
            })
            .collect()
    }
}

impl fmt::Display for DimensionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("total");
        }
        let names: Vec<&str> = self.0.iter().map(Dimension::as_str).collect();
        f.write_str(&names.join("+"))
    }
}

impl std::str::FromStr for DimensionSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() || s.trim() == "total" {
            return Ok(Self::total());
        }
        s.split(['+', ','])
            .map(str::parse::<Dimension>)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

/// One coordinate of an aggregate key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DimensionValue {
    pub dimension: Dimension,
    pub value: String,
}

/// Grouping key of an aggregate
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AggregateKey {
    pub period: Period,
    pub dimensions: Vec<DimensionValue>,
    pub currency: Currency,
}

impl AggregateKey {
    pub fn for_result(spec: &DimensionSpec, result: &AllocationResult) -> Self {
        Self {
            period: result.period,
            dimensions: spec.key_for(result),
            currency: result.currency,
        }
    }
}

/// Period rollup of allocated revenue for one dimension key and currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueAggregate {
    pub period: Period,
    pub dimensions: Vec<DimensionValue>,
    pub currency: Currency,
    pub total_amount: Decimal,
    /// Distinct transactions contributing to this bucket
    pub record_count: i64,
}

impl RevenueAggregate {
    pub fn key(&self) -> AggregateKey {
        AggregateKey {
            period: self.period,
            dimensions: self.dimensions.clone(),
            currency: self.currency,
        }
    }

    pub fn value_of(&self, dimension: Dimension) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|v| v.dimension == dimension)
            .map(|v| v.value.as_str())
    }
}
