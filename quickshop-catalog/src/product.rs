use serde::{Deserialize, Serialize};

/// A product listed in a sale period.
///
/// Variants are ordered: the order drives both the joined variant text on
/// order items and the positional matching of [`ImageUrlMapping`]s.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Base price in cents.
    pub base_price: i64,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(rename = "defaultImageURL", default)]
    pub default_image_url: String,
    #[serde(rename = "imageURLs", default)]
    pub image_urls: Vec<ImageUrlMapping>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub sale_period: i64,
}

/// A customization axis such as "Size" or "Colour".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variant {
    #[serde(rename = "type")]
    pub axis: String,
    #[serde(rename = "chart_url", default, skip_serializing_if = "Option::is_none")]
    pub chart_url: Option<String>,
    pub options: Vec<VariantOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VariantOption {
    pub text: String,
    /// Added to the base price when chosen. May be negative.
    #[serde(default)]
    pub additional_price: i64,
}

/// An image shown for a particular combination of options.
///
/// `selected_options` is positional, one entry per variant axis; `None` is a
/// wildcard that matches any option on that axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageUrlMapping {
    pub selected_options: Vec<Option<String>>,
    pub url: String,
}

/// One entry of a shopper's cart as submitted at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartItem {
    #[serde(rename = "id")]
    pub product_id: String,
    #[serde(rename = "variant", default)]
    pub options: Vec<ChosenOption>,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChosenOption {
    #[serde(rename = "type")]
    pub axis: String,
    pub option: String,
}

impl ChosenOption {
    pub fn new(axis: impl Into<String>, option: impl Into<String>) -> Self {
        Self { axis: axis.into(), option: option.into() }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("Product name must not be empty")]
    EmptyName,

    #[error("Base price must not be negative (was {0})")]
    NegativeBasePrice(i64),

    #[error("Variant {0:?} has no options")]
    EmptyVariant(String),

    #[error("Image mapping for {url:?} has {len} positions but the product has {axes} variants")]
    ImageMappingTooLong { url: String, len: usize, axes: usize },
}

impl Product {
    /// Checks the invariants an admin-submitted product must satisfy.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() {
            return Err(ProductError::EmptyName);
        }
        if self.base_price < 0 {
            return Err(ProductError::NegativeBasePrice(self.base_price));
        }
        if let Some(v) = self.variants.iter().find(|v| v.options.is_empty()) {
            return Err(ProductError::EmptyVariant(v.axis.clone()));
        }
        for mapping in &self.image_urls {
            if mapping.selected_options.len() > self.variants.len() {
                return Err(ProductError::ImageMappingTooLong {
                    url: mapping.url.clone(),
                    len: mapping.selected_options.len(),
                    axes: self.variants.len(),
                });
            }
        }
        Ok(())
    }

    pub fn variant(&self, axis: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.axis == axis)
    }
}

impl Variant {
    pub fn option(&self, text: &str) -> Option<&VariantOption> {
        self.options.iter().find(|o| o.text == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt() -> Product {
        Product {
            id: "1".to_string(),
            name: "T-Shirt".to_string(),
            base_price: 1000,
            variants: vec![Variant {
                axis: "Size".to_string(),
                chart_url: None,
                options: vec![VariantOption { text: "M".to_string(), additional_price: 200 }],
            }],
            default_image_url: "https://img/shirt.png".to_string(),
            image_urls: vec![],
            enabled: true,
            sale_period: 1,
        }
    }

    #[test]
    fn test_product_wire_format() {
        let json = serde_json::json!({
            "id": "7",
            "name": "Hoodie",
            "basePrice": 2500,
            "variants": [{"type": "Size", "options": [{"text": "L", "additionalPrice": -100}]}],
            "defaultImageURL": "https://img/hoodie.png",
            "imageURLs": [{"selectedOptions": [null], "url": "https://img/any.png"}],
            "enabled": true
        });
        let product: Product = serde_json::from_value(json).unwrap();
        assert_eq!(product.variants[0].axis, "Size");
        assert_eq!(product.variants[0].options[0].additional_price, -100);
        assert_eq!(product.image_urls[0].selected_options, vec![None]);
    }

    #[test]
    fn test_validate() {
        assert!(shirt().validate().is_ok());

        let mut negative = shirt();
        negative.base_price = -1;
        assert_eq!(negative.validate(), Err(ProductError::NegativeBasePrice(-1)));

        let mut long_mapping = shirt();
        long_mapping.image_urls.push(ImageUrlMapping {
            selected_options: vec![Some("M".to_string()), None],
            url: "x".to_string(),
        });
        assert!(matches!(long_mapping.validate(), Err(ProductError::ImageMappingTooLong { .. })));
    }
}
