pub mod auth;
pub mod rate_limit;

pub use auth::{authorize_admin, AdminClaims, ADMIN_ROLE};
pub use rate_limit::rate_limit_middleware;
