use serde::{Deserialize, Serialize};

use crate::product::{CartItem, ImageUrlMapping, Product};

/// Largest quantity of a single cart line.
pub const MAX_QUANTITY: i64 = 100;

/// A priced order line.
///
/// Every field is a snapshot taken at checkout time, so later catalog edits
/// never change what an order says was bought or what it cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(rename = "id")]
    pub product_id: String,
    #[serde(rename = "name")]
    pub product_name: String,
    /// Chosen options joined with ", " in variant order.
    pub variant: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    pub amount: i64,
    /// Unit price in cents.
    pub unit_price: i64,
}

impl LineItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.amount
    }
}

/// Why a cart line could not be priced. Checks run in the order listed.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Invalid product ID {0:?}")]
    UnknownProduct(String),

    #[error("Variants for product ID {product_id:?} is invalid")]
    VariantCountMismatch { product_id: String },

    #[error("Amount must be between 1-100 (was {amount} for product ID {product_id:?})")]
    QuantityOutOfRange { product_id: String, amount: i64 },

    #[error("Variant {axis:?} was not chosen for product ID {product_id:?}")]
    MissingVariantSelection { product_id: String, axis: String },

    #[error("Variant {axis:?} has option {option:?} for product ID {product_id:?} which is invalid")]
    InvalidVariantOption { product_id: String, axis: String, option: String },
}

/// Prices cart lines against a snapshot of the enabled catalog. Pure: no I/O.
pub struct PricingEngine<'a> {
    catalog: &'a [Product],
}

impl<'a> PricingEngine<'a> {
    pub fn new(catalog: &'a [Product]) -> Self {
        Self { catalog }
    }

    pub fn price_item(&self, item: &CartItem) -> Result<LineItem, PricingError> {
        let product = self
            .catalog
            .iter()
            .find(|p| p.id == item.product_id)
            .ok_or_else(|| PricingError::UnknownProduct(item.product_id.clone()))?;

        if product.variants.len() != item.options.len() {
            return Err(PricingError::VariantCountMismatch { product_id: product.id.clone() });
        }
        if item.amount < 1 || item.amount > MAX_QUANTITY {
            return Err(PricingError::QuantityOutOfRange {
                product_id: product.id.clone(),
                amount: item.amount,
            });
        }

        let mut unit_price = product.base_price;
        let mut chosen: Vec<&str> = Vec::with_capacity(product.variants.len());
        for variant in &product.variants {
            let selection = item
                .options
                .iter()
                .find(|o| o.axis == variant.axis)
                .ok_or_else(|| PricingError::MissingVariantSelection {
                    product_id: product.id.clone(),
                    axis: variant.axis.clone(),
                })?;
            let option = variant.option(&selection.option).ok_or_else(|| {
                PricingError::InvalidVariantOption {
                    product_id: product.id.clone(),
                    axis: variant.axis.clone(),
                    option: selection.option.clone(),
                }
            })?;
            unit_price += option.additional_price;
            chosen.push(option.text.as_str());
        }

        Ok(LineItem {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            variant: chosen.join(", "),
            image_url: select_image(product, &chosen).to_string(),
            amount: item.amount,
            unit_price,
        })
    }
}

/// Picks the most specific image for a chosen option combination.
///
/// A mapping is a candidate only if none of its concrete positions disagree
/// with `chosen`. The candidate with the most concrete matches wins and the
/// earliest one wins a tie. Without candidates the default image is used.
pub fn select_image<'p>(product: &'p Product, chosen: &[&str]) -> &'p str {
    let mut best: Option<(&ImageUrlMapping, usize)> = None;
    for mapping in &product.image_urls {
        let Some(score) = match_score(mapping, chosen) else {
            continue;
        };
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((mapping, score));
        }
    }
    match best {
        Some((mapping, _)) => &mapping.url,
        None => &product.default_image_url,
    }
}

/// Number of concrete positions matching `chosen`, or `None` on any mismatch.
/// Positions past the end of the mapping count as wildcards.
fn match_score(mapping: &ImageUrlMapping, chosen: &[&str]) -> Option<usize> {
    let mut score = 0;
    for (i, option) in chosen.iter().enumerate() {
        match mapping.selected_options.get(i) {
            None | Some(None) => {}
            Some(Some(expected)) if expected == option => score += 1,
            Some(Some(_)) => return None,
        }
    }
    Some(score)
}
