use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use quickshop_api::middleware::AdminClaims;
use quickshop_api::{app, AppState, Repositories};
use quickshop_catalog::{Coupon, CouponDiscount, CouponRequirement, Product, Variant, VariantOption};
use quickshop_core::repository::{
    CouponRepository, OrderRepository, ProductRepository, SalePeriodRepository, StoreClosureRepository,
};
use quickshop_core::{SalePeriod, StoreClosure};
use quickshop_order::OfflinePaymentProvider;
use quickshop_store::app_config::{
    AuthConfig, Config, DatabaseConfig, PaymentConfig, RedisConfig, ServerConfig, ShopConfig,
};
use quickshop_store::MemoryStore;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

const JWT_SECRET: &str = "test-secret";
const WEBHOOK_SECRET: &str = "whsec_test";
const FRONTEND: &str = "http://shop.test";

struct TestShop {
    router: Router,
    store: Arc<MemoryStore>,
    product_id: String,
}

fn test_config() -> Config {
    Config {
        server: ServerConfig { port: 0 },
        database: DatabaseConfig::default(),
        redis: RedisConfig::default(),
        auth: AuthConfig { jwt_secret: JWT_SECRET.to_string() },
        payment: PaymentConfig {
            stripe_secret_key: None,
            webhook_secret: WEBHOOK_SECRET.to_string(),
            currency: "sgd".to_string(),
            timeout_seconds: 10,
            webhook_tolerance_seconds: 300,
        },
        shop: ShopConfig {
            frontend_url: FRONTEND.to_string(),
            matric_pattern: r"^[UG]\d{7}[A-Z]$".to_string(),
            email_pattern: r"^[A-Za-z\d]+@(e\.)?ntu\.edu\.sg$".to_string(),
            checkout_rate_limit_per_minute: 10,
            coupon_cache_capacity: 16,
            coupon_cache_ttl_seconds: 60,
        },
    }
}

async fn setup() -> TestShop {
    let store = Arc::new(MemoryStore::new());
    let sale_period = store
        .save_sale_period(&SalePeriod {
            id: None,
            name: "AY25 Sem 1".to_string(),
            start_time: Utc::now() - Duration::days(1),
        })
        .await
        .unwrap();
    let product_id = store
        .save_product(&Product {
            id: String::new(),
            name: "T-Shirt".to_string(),
            base_price: 1500,
            variants: vec![Variant {
                axis: "Size".to_string(),
                chart_url: None,
                options: vec![
                    VariantOption { text: "S".to_string(), additional_price: 0 },
                    VariantOption { text: "M".to_string(), additional_price: 200 },
                ],
            }],
            default_image_url: "https://img.test/shirt.png".to_string(),
            image_urls: vec![],
            enabled: true,
            sale_period,
        })
        .await
        .unwrap();
    store
        .save_coupon(&Coupon {
            id: 0,
            code: "SAVE10".to_string(),
            description: None,
            discount: CouponDiscount::Percentage { amount: 10 },
            requirements: vec![CouponRequirement::MinPurchaseQuantity { amount: 3 }],
            enabled: true,
            public: true,
            provider_id: Some("mock_stripe_coupon_SAVE10".to_string()),
        })
        .await
        .unwrap();

    let payments = Arc::new(OfflinePaymentProvider::new());
    let state = AppState::new(Repositories::in_memory(store.clone()), payments, None, &test_config()).unwrap();
    TestShop { router: app(state), store, product_id }
}

fn admin_token(role: &str) -> String {
    let claims = AdminClaims {
        sub: "admin-1".to_string(),
        email: Some("admin@e.ntu.edu.sg".to_string()),
        role: role.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

fn checkout_body(product_id: &str, amount: i64, coupon: Option<&str>) -> Value {
    json!({
        "name": "Alice Tan",
        "matricNumber": "U1234567A",
        "email": "alice@e.ntu.edu.sg",
        "items": [{"id": product_id, "variant": [{"type": "Size", "option": "M"}], "amount": amount}],
        "coupon": coupon,
    })
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn json_of(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

/// Runs a checkout and returns the session id from the redirect URL.
async fn place_order(shop: &TestShop) -> String {
    let (status, _, body) = send(&shop.router, post_json("/api/v0/checkout", &checkout_body(&shop.product_id, 1, None))).await;
    assert_eq!(status, StatusCode::OK);
    let url = json_of(&body)["checkoutURL"].as_str().unwrap().to_string();
    let (_, session_id) = url.split_once("session_id=").unwrap();
    session_id.to_string()
}

async fn complete(shop: &TestShop, session_id: &str) -> String {
    let uri = format!("/api/v0/checkout/complete?session_id={}", session_id);
    let (status, headers, _) = send(&shop.router, get(&uri, None)).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    headers[header::LOCATION].to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_checkout_returns_payment_url() {
    let shop = setup().await;
    let (status, _, body) = send(&shop.router, post_json("/api/v0/checkout", &checkout_body(&shop.product_id, 2, None))).await;

    assert_eq!(status, StatusCode::OK);
    let url = json_of(&body)["checkoutURL"].as_str().unwrap().to_string();
    assert!(url.starts_with(&format!("{}/api/v0/checkout/complete?session_id=nonstripe_mock_", FRONTEND)));
}

#[tokio::test]
async fn test_checkout_rejects_coupon_below_minimum_quantity() {
    let shop = setup().await;
    let (status, _, body) =
        send(&shop.router, post_json("/api/v0/checkout", &checkout_body(&shop.product_id, 2, Some("SAVE10")))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json_of(&body);
    assert_eq!(body["error"], "Invalid coupon code");
    assert_eq!(body["code"], "invalid_coupon");
}

#[tokio::test]
async fn test_checkout_rejects_empty_coupon_code() {
    let shop = setup().await;
    let (status, _, body) =
        send(&shop.router, post_json("/api/v0/checkout", &checkout_body(&shop.product_id, 3, Some("")))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json_of(&body);
    assert_eq!(body["error"], "Invalid coupon code");
    assert_eq!(body["code"], "invalid_coupon");
}

#[tokio::test]
async fn test_checkout_validation_messages() {
    let shop = setup().await;
    let mut body = checkout_body(&shop.product_id, 1, None);
    body["matricNumber"] = json!("A0000000Z");
    let (status, _, response) = send(&shop.router, post_json("/api/v0/checkout", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&response)["error"], "Invalid Matric Number");

    let body = checkout_body(&shop.product_id, 101, None);
    let (status, _, response) = send(&shop.router, post_json("/api/v0/checkout", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&response)["code"], "invalid_request");

    let request = Request::builder()
        .method("POST")
        .uri("/api/v0/checkout")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, response) = send(&shop.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&response)["error"], "Invalid Body");
}

#[tokio::test]
async fn test_checkout_complete_is_idempotent() {
    let shop = setup().await;
    let session_id = place_order(&shop).await;

    let first = complete(&shop, &session_id).await;
    let second = complete(&shop, &session_id).await;
    assert_eq!(first, second);
    assert!(first.starts_with(&format!("{}/orders/", FRONTEND)));

    let order_id = first.rsplit('/').next().unwrap();
    let (status, _, body) = send(&shop.router, get(&format!("/api/v0/orders/{}", order_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    let order = &json_of(&body)["orders"][0];
    assert_eq!(order["status"], "paid");
    assert_eq!(order["total"], 1700);
    assert_eq!(order["name"], "Alice ***");
}

#[tokio::test]
async fn test_checkout_complete_without_session_is_rejected() {
    let shop = setup().await;
    let (status, _, body) = send(&shop.router, get("/api/v0/checkout/complete", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&body)["error"], "Session ID not provided");
}

fn sign(payload: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn webhook(payload: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v0/checkout/stripe")
        .header("Stripe-Signature", signature)
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let shop = setup().await;
    let payload = json!({"type": "checkout.session.completed", "data": {"object": {"id": "cs_1"}}}).to_string();
    let (status, _, body) = send(&shop.router, webhook(&payload, "t=1,v1=deadbeef")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&body)["code"], "invalid_signature");
}

#[tokio::test]
async fn test_webhook_marks_order_paid() {
    let shop = setup().await;
    let session_id = place_order(&shop).await;
    let payload =
        json!({"type": "checkout.session.completed", "data": {"object": {"id": session_id}}}).to_string();
    let signature = sign(&payload, Utc::now().timestamp());

    let (status, _, _) = send(&shop.router, webhook(&payload, &signature)).await;
    assert_eq!(status, StatusCode::OK);
    // Redelivery is harmless.
    let (status, _, _) = send(&shop.router, webhook(&payload, &signature)).await;
    assert_eq!(status, StatusCode::OK);

    let location = complete(&shop, &session_id).await;
    assert!(location.starts_with(&format!("{}/orders/", FRONTEND)));
}

#[tokio::test]
async fn test_redirect_then_webhook_keeps_payment_time() {
    let shop = setup().await;
    let session_id = place_order(&shop).await;
    let location = complete(&shop, &session_id).await;
    let order_id = location.rsplit('/').next().unwrap().to_string();

    let paid_at = shop.store.get_order(&order_id).await.unwrap().unwrap().payment_time;
    assert!(paid_at.is_some());

    let payload =
        json!({"type": "checkout.session.completed", "data": {"object": {"id": session_id}}}).to_string();
    let signature = sign(&payload, Utc::now().timestamp());
    let (status, _, _) = send(&shop.router, webhook(&payload, &signature)).await;
    assert_eq!(status, StatusCode::OK);

    let order = shop.store.get_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_time, paid_at);
}

#[tokio::test]
async fn test_webhook_for_unknown_session_asks_for_redelivery() {
    let shop = setup().await;
    let payload =
        json!({"type": "checkout.session.completed", "data": {"object": {"id": "nonstripe_mock_UNKNOWN"}}}).to_string();
    let signature = sign(&payload, Utc::now().timestamp());

    let (status, _, body) = send(&shop.router, webhook(&payload, &signature)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_of(&body)["code"], "order_not_associated");
}

#[tokio::test]
async fn test_store_closure_blocks_checkout() {
    let shop = setup().await;
    shop.store
        .save_closure(&StoreClosure {
            id: None,
            start_time: Utc::now() - Duration::hours(1),
            end_time: Utc::now() + Duration::hours(2),
            message: "Back after recess week".to_string(),
            show_order_check: true,
        })
        .await
        .unwrap();

    let (status, _, body) = send(&shop.router, post_json("/api/v0/checkout", &checkout_body(&shop.product_id, 1, None))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body = json_of(&body);
    assert_eq!(body["type"], "store_closure");
    assert_eq!(body["code"], "store_closed");
    assert_eq!(body["show_order_check"], true);
    assert!(body["end_time"].as_i64().unwrap() > 3600);

    let (status, _, _) = send(&shop.router, get("/api/v0/sales/current/products", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let shop = setup().await;

    let (status, _, body) = send(&shop.router, get("/api/v0/closures", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_of(&body)["code"], "unauthorized");

    let (status, _, _) = send(&shop.router, get("/api/v0/closures", Some(&admin_token("USER")))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(&shop.router, get("/api/v0/closures", Some(&admin_token("ADMIN")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["closures"], json!([]));

    let (status, _, _) = send(&shop.router, get("/api/v0/sales/1/products", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_listings() {
    let shop = setup().await;

    let (status, _, body) = send(&shop.router, get("/api/v0/sales/current/products", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["products"][0]["name"], "T-Shirt");

    let (status, _, body) = send(&shop.router, get("/api/v0/sales/current/coupons", None)).await;
    assert_eq!(status, StatusCode::OK);
    let coupon = &json_of(&body)["coupons"][0];
    assert_eq!(coupon["couponCode"], "SAVE10");
    assert!(coupon.get("stripe_id").is_none());

    let (status, _, _) = send(&shop.router, get("/api/v0/sales/current/coupons/SAVE10", None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, body) = send(&shop.router, get("/api/v0/sales/current/coupons/NOPE", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_of(&body)["error"], "Invalid coupon ID");
}

#[tokio::test]
async fn test_admin_saves_coupon_with_provider_description() {
    let shop = setup().await;
    let token = admin_token("ADMIN");
    let coupon = json!({
        "couponCode": "WELCOME",
        "discount": {"type": "percentage", "amount": 15},
        "requirements": [{"type": "purchase_count", "amount": 1}, {"type": "purchase_count", "amount": 2}],
        "enabled": true,
        "public": false,
        "stripe_desc": "Welcome 15% off",
    });
    let mut request = post_json("/api/v0/sales/current/coupons", &coupon);
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
    let (status, _, body) = send(&shop.router, request).await;
    assert_eq!(status, StatusCode::OK);
    let saved = json_of(&body);
    assert!(saved["stripe_id"].as_str().unwrap().starts_with("mock_stripe_coupon_"));
    assert_eq!(saved["requirements"], json!([{"type": "purchase_count", "amount": 2}]));

    let (status, _, body) =
        send(&shop.router, get("/api/v0/sales/current/coupons?include_disabled=1", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let coupons = json_of(&body)["coupons"].as_array().unwrap().clone();
    let welcome = coupons.iter().find(|c| c["couponCode"] == "WELCOME").unwrap();
    assert_eq!(welcome["stripe_desc"], "Welcome 15% off");

    let missing_desc = json!({
        "couponCode": "NODESC",
        "discount": {"type": "percentage", "amount": 5},
        "enabled": true,
    });
    let mut request = post_json("/api/v0/sales/current/coupons", &missing_desc);
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
    let (status, _, body) = send(&shop.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&body)["error"], "Invalid Body: Missing Stripe Desc");
}

#[tokio::test]
async fn test_admin_cancel_hides_order() {
    let shop = setup().await;
    let session_id = place_order(&shop).await;
    let location = complete(&shop, &session_id).await;
    let order_id = location.rsplit('/').next().unwrap().to_string();
    let token = admin_token("ADMIN");

    let cancel = |id: &str| {
        Request::builder()
            .method("POST")
            .uri(format!("/api/v0/orders/{}/cancel", id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _, _) = send(&shop.router, cancel(&order_id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = send(&shop.router, cancel(&order_id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, body) = send(&shop.router, cancel("XXXXXX")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_of(&body)["error"], "Invalid order ID");

    let (status, _, _) = send(&shop.router, get(&format!("/api/v0/orders/{}", order_id), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/api/v0/orders/{}?include_cancelled=1", order_id);
    let (status, _, _) = send(&shop.router, get(&uri, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, body) = send(&shop.router, get(&uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["orders"][0]["status"], "cancelled");
}

#[tokio::test]
async fn test_order_summary_counts_paid_orders() {
    let shop = setup().await;
    let token = admin_token("ADMIN");
    for _ in 0..2 {
        let session_id = place_order(&shop).await;
        complete(&shop, &session_id).await;
    }
    // Never completed, so not counted.
    place_order(&shop).await;

    let (status, _, body) = send(&shop.router, get("/api/v0/sales/current/order_summary", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let summary = json_of(&body);
    assert_eq!(summary["unfulfilled_order_count"], 2);
    assert_eq!(summary["fulfilled_order_count"], 0);
    assert_eq!(summary["unfulfilled"][0]["name"], "T-Shirt");
    assert_eq!(summary["unfulfilled"][0]["variant"], "M");
    assert_eq!(summary["unfulfilled"][0]["count"], 2);
    assert_eq!(summary["order_id_samples"].as_array().unwrap().len(), 2);
}
