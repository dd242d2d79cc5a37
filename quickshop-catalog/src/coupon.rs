use regex::Regex;
use serde::{Deserialize, Serialize};

/// A condition a cart must meet before a coupon applies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum CouponRequirement {
    /// Total quantity across all cart lines must be at least `amount`.
    #[serde(rename = "purchase_count")]
    MinPurchaseQuantity { amount: i64 },
    /// Buyer email must fully match the pattern `value`.
    #[serde(rename = "email")]
    EmailMatch { value: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum CouponDiscount {
    #[serde(rename = "percentage")]
    Percentage { amount: i64 },
}

impl CouponDiscount {
    pub fn percent(&self) -> i64 {
        match self {
            CouponDiscount::Percentage { amount } => *amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "couponCode")]
    pub code: String,
    /// Description shown on the payment provider's checkout page.
    #[serde(rename = "stripe_desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub discount: CouponDiscount,
    #[serde(default)]
    pub requirements: Vec<CouponRequirement>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(rename = "stripe_id", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Requirements collapsed to at most one of each kind, as they are stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementSet {
    pub min_purchase_quantity: Option<i64>,
    pub email_match: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CouponError {
    #[error("Coupon is disabled")]
    Disabled,

    #[error("Coupon requires at least {required} items (cart has {actual})")]
    BelowMinimumQuantity { required: i64, actual: i64 },

    #[error("Coupon is not available for this email")]
    EmailMismatch,

    #[error("Coupon email pattern {0:?} is invalid")]
    InvalidEmailPattern(String),

    #[error("Coupon may have at most one email requirement")]
    DuplicateEmailRequirement,

    #[error("Discount percentage must be between 1-100 (was {0})")]
    InvalidPercentage(i64),

    #[error("Purchase count requirement must be positive (was {0})")]
    InvalidPurchaseCount(i64),

    #[error("Coupon code must not be empty")]
    EmptyCode,
}

impl RequirementSet {
    /// Folds a requirement list. Repeated purchase counts keep the largest.
    pub fn collect(requirements: &[CouponRequirement]) -> Result<Self, CouponError> {
        let mut set = RequirementSet::default();
        for requirement in requirements {
            match requirement {
                CouponRequirement::MinPurchaseQuantity { amount } => {
                    if *amount < 1 {
                        return Err(CouponError::InvalidPurchaseCount(*amount));
                    }
                    set.min_purchase_quantity = Some(set.min_purchase_quantity.map_or(*amount, |n| n.max(*amount)));
                }
                CouponRequirement::EmailMatch { value } => {
                    if set.email_match.is_some() {
                        return Err(CouponError::DuplicateEmailRequirement);
                    }
                    set.email_match = Some(value.clone());
                }
            }
        }
        Ok(set)
    }

    pub fn into_requirements(self) -> Vec<CouponRequirement> {
        let mut out = Vec::new();
        if let Some(amount) = self.min_purchase_quantity {
            out.push(CouponRequirement::MinPurchaseQuantity { amount });
        }
        if let Some(value) = self.email_match {
            out.push(CouponRequirement::EmailMatch { value });
        }
        out
    }
}

impl Coupon {
    /// Checks the fields an admin-submitted coupon must satisfy.
    pub fn validate(&self) -> Result<RequirementSet, CouponError> {
        if self.code.trim().is_empty() {
            return Err(CouponError::EmptyCode);
        }
        let pct = self.discount.percent();
        if !(1..=100).contains(&pct) {
            return Err(CouponError::InvalidPercentage(pct));
        }
        let set = RequirementSet::collect(&self.requirements)?;
        if let Some(pattern) = &set.email_match {
            email_regex(pattern)?;
        }
        Ok(set)
    }

    pub fn min_purchase_quantity(&self) -> Option<i64> {
        self.requirements
            .iter()
            .filter_map(|r| match r {
                CouponRequirement::MinPurchaseQuantity { amount } => Some(*amount),
                _ => None,
            })
            .max()
    }

    /// Whether this coupon applies to a cart of `total_quantity` items bought by `email`.
    pub fn check_eligibility(&self, total_quantity: i64, email: &str) -> Result<(), CouponError> {
        if !self.enabled {
            return Err(CouponError::Disabled);
        }
        let set = RequirementSet::collect(&self.requirements)?;
        if let Some(required) = set.min_purchase_quantity {
            if total_quantity < required {
                return Err(CouponError::BelowMinimumQuantity { required, actual: total_quantity });
            }
        }
        if let Some(pattern) = &set.email_match {
            if !email_regex(pattern)?.is_match(email) {
                return Err(CouponError::EmailMismatch);
            }
        }
        Ok(())
    }

    /// Payable total after the discount, rounded up to the next cent.
    pub fn apply(&self, subtotal: i64) -> i64 {
        discounted_total(subtotal, self.discount.percent())
    }
}

pub fn discounted_total(subtotal: i64, percent: i64) -> i64 {
    let scaled = subtotal * (100 - percent);
    // Ceiling division for non-negative totals.
    (scaled + 99).div_euclid(100)
}

fn email_regex(pattern: &str) -> Result<Regex, CouponError> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|_| CouponError::InvalidEmailPattern(pattern.to_string()))
}
