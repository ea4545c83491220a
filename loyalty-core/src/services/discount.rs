// File: loyalty-core/src/services/discount.rs

use serde::Serialize;

use crate::Error;
use crate::models::DiscountTerms;

/// Result of pricing a bill against a redemption's frozen terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountQuote {
    pub bill_amount: i64,
    pub applied_discount: i64,
    pub final_amount: i64,
    pub message: String,
    pub discount_percent: Option<i64>,
    pub discount_amount: Option<i64>,
    pub max_discount_amount: Option<i64>,
}

fn check_minimum(min_purchase_amount: Option<i64>, bill_amount: i64) -> Result<(), Error> {
    match min_purchase_amount {
        Some(minimum) if bill_amount < minimum => {
            Err(Error::BelowMinimumPurchase { minimum, bill_amount })
        }
        _ => Ok(()),
    }
}

/// Rejects terms that would give a negative discount or one above the bill.
pub fn validate_terms(terms: &DiscountTerms) -> Result<(), Error> {
    let non_negative = |value: Option<i64>, field: &str| match value {
        Some(v) if v < 0 => Err(Error::InvalidReward(format!("{} must not be negative, got {}", field, v))),
        _ => Ok(()),
    };

    match *terms {
        DiscountTerms::Coupon => Ok(()),
        DiscountTerms::PercentOff {
            discount_percent,
            max_discount_amount,
            min_purchase_amount,
        } => {
            if !(1..=100).contains(&discount_percent) {
                return Err(Error::InvalidReward(format!(
                    "discount percent must be within 1..=100, got {}",
                    discount_percent
                )));
            }
            non_negative(max_discount_amount, "max discount amount")?;
            non_negative(min_purchase_amount, "min purchase amount")
        }
        DiscountTerms::AmountOff {
            discount_amount,
            min_purchase_amount,
        } => {
            if discount_amount <= 0 {
                return Err(Error::InvalidReward(format!(
                    "discount amount must be positive, got {}",
                    discount_amount
                )));
            }
            non_negative(min_purchase_amount, "min purchase amount")
        }
    }
}

/// Prices `bill_amount` against `terms`. No state is read or written.
pub fn calculate(terms: &DiscountTerms, bill_amount: i64) -> Result<DiscountQuote, Error> {
    if bill_amount <= 0 {
        return Err(Error::MissingField("billAmount"));
    }
    validate_terms(terms)?;

    match *terms {
        DiscountTerms::Coupon => Err(Error::NotApplicable(
            "discount calculation does not apply to coupon rewards".to_string(),
        )),
        DiscountTerms::PercentOff {
            discount_percent,
            max_discount_amount,
            min_purchase_amount,
        } => {
            check_minimum(min_purchase_amount, bill_amount)?;

            // Widened so any i64 bill times a percent fits.
            let raw = i64::try_from(i128::from(bill_amount) * i128::from(discount_percent) / 100)
                .map_err(|_| Error::AmountOutOfRange(bill_amount))?;
            let applied = match max_discount_amount {
                Some(cap) => raw.min(cap),
                None => raw,
            };

            let mut message = format!("{}% discount applied ({} off)", discount_percent, applied);
            if raw > applied {
                message.push_str(&format!(" - capped at {}", applied));
            }

            Ok(DiscountQuote {
                bill_amount,
                applied_discount: applied,
                final_amount: bill_amount - applied,
                message,
                discount_percent: Some(discount_percent),
                discount_amount: None,
                max_discount_amount,
            })
        }
        DiscountTerms::AmountOff {
            discount_amount,
            min_purchase_amount,
        } => {
            check_minimum(min_purchase_amount, bill_amount)?;

            Ok(DiscountQuote {
                bill_amount,
                applied_discount: discount_amount,
                final_amount: bill_amount - discount_amount,
                message: format!("{} discount applied", discount_amount),
                discount_percent: None,
                discount_amount: Some(discount_amount),
                max_discount_amount: None,
            })
        }
    }
}
