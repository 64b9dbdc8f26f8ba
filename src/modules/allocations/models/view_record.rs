use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{Currency, Period};

/// Advertising display event supplied by the transaction source
///
/// Owned by the external feed; this crate only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    pub id: String,
    /// Missing merchant references are reported per record, never defaulted
    pub merchant_id: Option<String>,
    pub partner_id: Option<String>,
    pub advertisement_id: Option<String>,
    pub device_id: Option<String>,
    pub category: Option<String>,
    /// Base fee charged for the display
    pub amount: Decimal,
    pub currency: Currency,
    pub displayed_at: DateTime<Utc>,
}

impl ViewRecord {
    pub fn period(&self) -> Period {
        Period::containing(self.displayed_at)
    }

    /// Merchant reference, treating blank strings as missing
    pub fn merchant(&self) -> Option<&str> {
        self.merchant_id
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}
