use chrono::{DateTime, Utc};
use quickshop_catalog::LineItem;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Buyer {
    pub name: String,
    pub matric_number: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Expired,
    Collected,
    Cancelled,
}

/// A persisted order. Items are snapshots and never change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub buyer: Buyer,
    pub payment_reference: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub collection_time: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub coupon_id: Option<i64>,
    /// Coupon the payment provider reported as applied, captured at fulfillment.
    pub provider_coupon_id: Option<String>,
    pub sale_period_id: Option<i64>,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn status(&self) -> OrderStatus {
        if self.cancelled {
            OrderStatus::Cancelled
        } else if self.collection_time.is_some() {
            OrderStatus::Collected
        } else if self.payment_time.is_some() {
            OrderStatus::Paid
        } else if self.expired_at.is_some() {
            OrderStatus::Expired
        } else {
            OrderStatus::PendingPayment
        }
    }

    pub fn subtotal(&self) -> i64 {
        self.items.iter().map(LineItem::line_total).sum()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.amount).sum()
    }
}

/// Everything needed to insert an order and its items in one transaction.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: String,
    pub buyer: Buyer,
    pub coupon_id: Option<i64>,
    pub sale_period_id: Option<i64>,
    pub items: Vec<LineItem>,
}

impl NewOrder {
    pub fn into_order(self, created_at: DateTime<Utc>) -> Order {
        Order {
            id: self.id,
            buyer: self.buyer,
            payment_reference: None,
            payment_time: None,
            collection_time: None,
            expired_at: None,
            cancelled: false,
            coupon_id: self.coupon_id,
            provider_coupon_id: None,
            sale_period_id: self.sale_period_id,
            items: self.items,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryLine {
    pub name: String,
    pub variant: String,
    #[serde(rename = "count")]
    pub quantity: i64,
}

/// Fulfillment overview of one sale period.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderSummary {
    #[serde(rename = "unfulfilled")]
    pub items: Vec<SummaryLine>,
    #[serde(rename = "order_id_samples")]
    pub unfulfilled_order_ids: Vec<String>,
    #[serde(rename = "unfulfilled_order_count")]
    pub unfulfilled_orders: i64,
    #[serde(rename = "fulfilled_order_count")]
    pub fulfilled_orders: i64,
}

/// Largest number of sample ids listed in an [`OrderSummary`].
pub const SUMMARY_SAMPLE_IDS: usize = 10;

impl OrderSummary {
    /// Builds a summary from the paid, uncancelled orders of one sale period.
    /// Item quantities skip collected orders unless `show_collected` is set.
    pub fn from_orders<'a, I>(orders: I, show_collected: bool) -> Self
    where
        I: IntoIterator<Item = &'a Order>,
    {
        let mut summary = OrderSummary::default();
        for order in orders {
            if order.cancelled || order.payment_time.is_none() {
                continue;
            }
            let collected = order.collection_time.is_some();
            if collected {
                summary.fulfilled_orders += 1;
            } else {
                summary.unfulfilled_orders += 1;
                if summary.unfulfilled_order_ids.len() < SUMMARY_SAMPLE_IDS {
                    summary.unfulfilled_order_ids.push(order.id.clone());
                }
            }
            if collected && !show_collected {
                continue;
            }
            for item in &order.items {
                match summary
                    .items
                    .iter_mut()
                    .find(|l| l.name == item.product_name && l.variant == item.variant)
                {
                    Some(line) => line.quantity += item.amount,
                    None => summary.items.push(SummaryLine {
                        name: item.product_name.clone(),
                        variant: item.variant.clone(),
                        quantity: item.amount,
                    }),
                }
            }
        }
        summary.items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.variant.cmp(&b.variant)));
        summary
    }
}
