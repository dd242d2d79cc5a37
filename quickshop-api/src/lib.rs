use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod checkout;
pub mod closures;
pub mod coupons;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod products;
pub mod sales;
pub mod state;
pub mod webhooks;

pub use error::AppError;
pub use state::{AppState, Repositories};

pub const API_PREFIX: &str = "/api/v0";

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let checkout = checkout::routes().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::rate_limit_middleware,
    ));

    let api = Router::new()
        .merge(checkout)
        .merge(webhooks::routes())
        .merge(products::routes())
        .merge(coupons::routes())
        .merge(orders::routes())
        .merge(sales::routes())
        .merge(closures::routes());

    Router::new()
        .nest(API_PREFIX, api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
