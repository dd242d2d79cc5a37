pub mod product;
pub mod pricing;
pub mod coupon;

pub use product::{CartItem, ChosenOption, ImageUrlMapping, Product, ProductError, Variant, VariantOption};
pub use pricing::{LineItem, PricingEngine, PricingError, MAX_QUANTITY};
pub use coupon::{discounted_total, Coupon, CouponDiscount, CouponError, CouponRequirement, RequirementSet};
