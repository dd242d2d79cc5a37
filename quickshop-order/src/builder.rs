use quickshop_catalog::{Coupon, PricingEngine, PricingError, Product};
use quickshop_core::Buyer;
use regex::Regex;
use tracing::debug;

use crate::models::{CheckoutRequest, PricedOrder};

/// Client-facing reasons a checkout request is refused.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Invalid Name")]
    InvalidName,
    #[error("Invalid Matric Number")]
    InvalidMatricNumber,
    #[error("Invalid Email")]
    InvalidEmail,
    #[error("At least one item is required")]
    EmptyCart,
    #[error("Invalid coupon code")]
    InvalidCoupon,
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Turns a checkout request into a priced order, failing on the first problem.
pub struct OrderBuilder {
    matric_pattern: Regex,
    email_pattern: Regex,
}

impl OrderBuilder {
    pub fn new(matric_pattern: &str, email_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            matric_pattern: Regex::new(matric_pattern)?,
            email_pattern: Regex::new(email_pattern)?,
        })
    }

    /// `coupon` is the enabled coupon found for `request.coupon`, if any.
    pub fn build(
        &self,
        request: CheckoutRequest,
        catalog: &[Product],
        coupon: Option<Coupon>,
    ) -> Result<PricedOrder, OrderError> {
        if request.name.trim().is_empty() {
            return Err(OrderError::InvalidName);
        }
        if !self.matric_pattern.is_match(&request.matric_number) {
            return Err(OrderError::InvalidMatricNumber);
        }
        if !self.email_pattern.is_match(&request.email) {
            return Err(OrderError::InvalidEmail);
        }
        if request.items.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let coupon = match (&request.coupon, coupon) {
            (None, _) => None,
            (Some(_), None) => return Err(OrderError::InvalidCoupon),
            (Some(code), Some(coupon)) => {
                // Amounts are unchecked here; pricing rejects out-of-range ones below.
                let total_quantity = request.items.iter().fold(0i64, |acc, i| acc.saturating_add(i.amount));
                if let Err(reason) = coupon.check_eligibility(total_quantity, &request.email) {
                    debug!(code = %code, %reason, "coupon rejected");
                    return Err(OrderError::InvalidCoupon);
                }
                Some(coupon)
            }
        };

        let engine = PricingEngine::new(catalog);
        let items = request
            .items
            .iter()
            .map(|item| engine.price_item(item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PricedOrder {
            buyer: Buyer {
                name: request.name,
                matric_number: request.matric_number,
                email: request.email,
            },
            items,
            coupon,
        })
    }
}
