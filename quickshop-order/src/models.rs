use quickshop_catalog::{CartItem, Coupon, LineItem};
use quickshop_core::Buyer;
use serde::{Deserialize, Serialize};

/// Body of a checkout request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub matric_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub coupon: Option<String>,
}

/// A validated, fully priced order ready to be persisted.
#[derive(Debug, Clone)]
pub struct PricedOrder {
    pub buyer: Buyer,
    pub items: Vec<LineItem>,
    pub coupon: Option<Coupon>,
}

impl PricedOrder {
    pub fn subtotal(&self) -> i64 {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Amount payable after the coupon discount.
    pub fn total(&self) -> i64 {
        match &self.coupon {
            Some(coupon) => coupon.apply(self.subtotal()),
            None => self.subtotal(),
        }
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.amount).sum()
    }
}
