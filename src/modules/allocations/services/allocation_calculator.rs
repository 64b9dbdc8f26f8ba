use rust_decimal::Decimal;
use tracing::debug;

use crate::core::{AppError, Currency, Result};
use crate::modules::allocations::models::{
    AllocationResult, Beneficiary, RemainderPolicy, TransactionAllocation, ViewRecord,
};
use crate::modules::fee_schemas::models::{FeeEntity, FeeSchema};

/// One computed share before it is attached to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Share {
    pub beneficiary: Beneficiary,
    pub schema_id: Option<i64>,
    pub amount: Decimal,
}

/// Splits transaction amounts between entities according to fee schemas
///
/// Shares use banker's rounding at the currency's minor unit. The entity
/// shares always sum to exactly `round(amount * total% / 100)`; the rounding
/// difference is absorbed by the reconciliation entity (or the largest share
/// when that entity has no schema). The entity total therefore never exceeds
/// the transaction amount.
#[derive(Debug, Clone, Copy)]
pub struct AllocationCalculator {
    remainder_policy: RemainderPolicy,
    reconciliation_entity: FeeEntity,
}

impl AllocationCalculator {
    pub fn new(remainder_policy: RemainderPolicy, reconciliation_entity: FeeEntity) -> Self {
        Self {
            remainder_policy,
            reconciliation_entity,
        }
    }

    pub fn remainder_policy(&self) -> RemainderPolicy {
        self.remainder_policy
    }

    /// Allocate one record against a schema set
    ///
    /// Only active schemas for the record's merchant are considered.
    ///
    /// # Errors
    /// * `RecordProcessing` - missing merchant, invalid amount, or a corrupt schema set
    /// * `SchemaNotFound` - the merchant has no active schema
    pub fn allocate(&self, record: &ViewRecord, schemas: &[FeeSchema]) -> Result<TransactionAllocation> {
        let merchant_id = record
            .merchant()
            .ok_or_else(|| AppError::record(&record.id, "missing merchant reference"))?;

        record
            .currency
            .validate_amount(record.amount)
            .map_err(|e| AppError::record(&record.id, e))?;

        let mut active: Vec<&FeeSchema> = schemas
            .iter()
            .filter(|s| s.applies_to(merchant_id))
            .collect();
        active.sort_by_key(|s| (s.entity, s.id));

        if active.is_empty() {
            return Err(AppError::SchemaNotFound {
                merchant_id: merchant_id.to_string(),
            });
        }

        let allocated_percentage: Decimal = active.iter().map(|s| s.amount).sum();
        if allocated_percentage > Decimal::ONE_HUNDRED {
            return Err(AppError::record(
                &record.id,
                format!(
                    "active schemas for merchant '{}' sum to {}%",
                    merchant_id, allocated_percentage
                ),
            ));
        }

        let shares = self.split(record.amount, record.currency, &active);

        debug!(
            transaction_id = %record.id,
            merchant_id = %merchant_id,
            amount = %record.amount,
            shares = shares.len(),
            "Transaction allocated"
        );

        let period = record.period();
        let shares = shares
            .into_iter()
            .map(|share| AllocationResult {
                transaction_id: record.id.clone(),
                beneficiary: share.beneficiary,
                schema_id: share.schema_id,
                amount_allocated: share.amount,
                currency: record.currency,
                period,
                merchant_id: merchant_id.to_string(),
                partner_id: record.partner_id.clone(),
                category: record.category.clone(),
                device_id: record.device_id.clone(),
            })
            .collect();

        Ok(TransactionAllocation {
            transaction_id: record.id.clone(),
            gross_amount: record.amount,
            currency: record.currency,
            allocated_percentage,
            shares,
        })
    }

    /// Split an amount across already-filtered active schemas
    ///
    /// Callers guarantee the percentages sum to at most 100.
    pub fn split(&self, amount: Decimal, currency: Currency, schemas: &[&FeeSchema]) -> Vec<Share> {
        let hundred = Decimal::ONE_HUNDRED;

        let mut shares: Vec<Share> = schemas
            .iter()
            .map(|s| Share {
                beneficiary: Beneficiary::Entity(s.entity),
                schema_id: Some(s.id),
                amount: currency.round(amount * s.amount / hundred),
            })
            .collect();

        let percentage: Decimal = schemas.iter().map(|s| s.amount).sum();
        let target = currency.round(amount * percentage / hundred);
        let rounded_sum: Decimal = shares.iter().map(|s| s.amount).sum();
        let difference = target - rounded_sum;

        if difference != Decimal::ZERO {
            self.reconcile(&mut shares, difference);
        }

        let remainder = amount - target;
        if remainder > Decimal::ZERO {
            match self.remainder_policy {
                RemainderPolicy::Unassigned => shares.push(Share {
                    beneficiary: Beneficiary::Unassigned,
                    schema_id: None,
                    amount: remainder,
                }),
                RemainderPolicy::RetainedByPlatform => {
                    let platform = Beneficiary::Entity(FeeEntity::Glassbox);
                    match shares.iter_mut().find(|s| s.beneficiary == platform) {
                        Some(share) => share.amount += remainder,
                        None => shares.push(Share {
                            beneficiary: platform,
                            schema_id: None,
                            amount: remainder,
                        }),
                    }
                }
            }
        }

        shares
    }

    /// Push a rounding difference onto the preferred share without going negative
    fn reconcile(&self, shares: &mut [Share], difference: Decimal) {
        let preferred = Beneficiary::Entity(self.reconciliation_entity);
        let mut order: Vec<usize> = (0..shares.len()).collect();
        // Preferred entity first, then largest shares, then original order
        order.sort_by(|&a, &b| {
            let a_pref = shares[a].beneficiary == preferred;
            let b_pref = shares[b].beneficiary == preferred;
            b_pref
                .cmp(&a_pref)
                .then(shares[b].amount.cmp(&shares[a].amount))
                .then(a.cmp(&b))
        });

        if difference > Decimal::ZERO {
            if let Some(&idx) = order.first() {
                shares[idx].amount += difference;
            }
            return;
        }

        let mut outstanding = -difference;
        for idx in order {
            if outstanding == Decimal::ZERO {
                break;
            }
            let taken = outstanding.min(shares[idx].amount);
            shares[idx].amount -= taken;
            outstanding -= taken;
        }
    }
}

impl Default for AllocationCalculator {
    fn default() -> Self {
        Self::new(RemainderPolicy::Unassigned, FeeEntity::Glassbox)
    }
}
