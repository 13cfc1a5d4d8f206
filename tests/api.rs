//! End-to-end tests driving the full router over in-memory stores.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use storefront::config::AppConfig;
use storefront::payments::InMemoryGateway;
use storefront::publisher::EventPublisher;
use storefront::store::Stores;
use storefront::{app, AppState};

struct TestApp {
    router: Router,
    state: AppState,
    gateway: Arc<InMemoryGateway>,
}

impl TestApp {
    fn new(auto_confirm: bool) -> Self {
        let gateway = Arc::new(InMemoryGateway::new(auto_confirm));
        let state = AppState::new(AppConfig::default(), Stores::in_memory(), gateway.clone(), EventPublisher::disabled(), None);
        Self { router: app(state.clone()), state, gateway }
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder.header("content-type", "application/json").body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    async fn admin_token(&self) -> String {
        self.state.accounts.ensure_admin("Admin", "admin@example.com", "admin-secret").await.unwrap();
        let (status, body) = self
            .send("POST", "/api/auth/login-admin", None, Some(json!({"email": "admin@example.com", "password": "admin-secret"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn register(&self, name: &str, email: &str) -> String {
        let (status, body) = self
            .send("POST", "/api/auth/register", None, Some(json!({"name": name, "email": email, "password": "hunter22"})))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_product(&self, admin: &str, name: &str, price: f64, stock: u32) -> String {
        let (status, body) = self
            .send("POST", "/api/products", Some(admin), Some(json!({"name": name, "price": price, "countInStock": stock})))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_reports_service() {
    let app = TestApp::new(true);
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "storefront"}));
}

#[tokio::test]
async fn cart_requires_a_bearer_token() {
    let app = TestApp::new(true);
    let (status, body) = app.send("GET", "/api/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app.send("GET", "/api/cart", Some("sf_v1_garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_cart_has_the_empty_shape() {
    let app = TestApp::new(true);
    let token = app.register("Jane", "jane@example.com").await;
    let (status, body) = app.send("GET", "/api/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"items": [], "total": 0.0}));
}

#[tokio::test]
async fn adding_items_sums_quantities_and_prices_from_the_catalog() {
    let app = TestApp::new(true);
    let admin = app.admin_token().await;
    let product = app.create_product(&admin, "Airpods Pro", 249.99, 10).await;
    let token = app.register("Jane", "jane@example.com").await;

    let (status, _) = app.send("POST", "/api/cart", Some(&token), Some(json!({"productId": product}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) =
        app.send("POST", "/api/cart", Some(&token), Some(json!({"productId": product, "quantity": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["quantity"], 3);
    assert_eq!(body["items"][0]["product"]["name"], "Airpods Pro");
    assert_eq!(body["total"], 749.97);
}

#[tokio::test]
async fn cart_rejects_bad_quantities_and_unknown_products() {
    let app = TestApp::new(true);
    let admin = app.admin_token().await;
    let product = app.create_product(&admin, "Echo Dot", 29.99, 2).await;
    let token = app.register("Jane", "jane@example.com").await;

    let (status, body) =
        app.send("POST", "/api/cart", Some(&token), Some(json!({"productId": product, "quantity": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, _) =
        app.send("POST", "/api/cart", Some(&token), Some(json!({"productId": product, "quantity": 3}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::now_v7();
    let (status, body) = app.send("POST", "/api/cart", Some(&token), Some(json!({"productId": missing}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = app.send("POST", "/api/cart", Some(&token), Some(json!({"quantity": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_and_remove_items() {
    let app = TestApp::new(true);
    let admin = app.admin_token().await;
    let a = app.create_product(&admin, "Cable", 10.0, 5).await;
    let b = app.create_product(&admin, "Charger", 20.0, 5).await;
    let token = app.register("Jane", "jane@example.com").await;

    let (status, _) = app.send("DELETE", &format!("/api/cart/{a}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "no cart yet");

    app.send("POST", "/api/cart", Some(&token), Some(json!({"productId": a}))).await;
    app.send("POST", "/api/cart", Some(&token), Some(json!({"productId": b}))).await;

    let (status, body) =
        app.send("PUT", "/api/cart", Some(&token), Some(json!({"productId": a, "quantity": 7}))).await;
    assert_eq!(status, StatusCode::OK, "quantity updates are not bounded by stock");
    assert_eq!(body["total"], 90.0);

    let (status, body) = app.send("DELETE", &format!("/api/cart/{b}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["total"], 70.0);

    let (status, body) = app.send("DELETE", &format!("/api/cart/{b}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "removing an absent item is a no-op");
    assert_eq!(body["total"], 70.0);

    let (status, _) =
        app.send("PUT", "/api/cart", Some(&token), Some(json!({"productId": b, "quantity": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_turns_the_cart_into_one_order() {
    let app = TestApp::new(true);
    let admin = app.admin_token().await;
    let product = app.create_product(&admin, "Keyboard", 89.5, 4).await;
    let token = app.register("Jane", "jane@example.com").await;

    let (status, body) = app.send("POST", "/api/payments/create-payment-intent", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "empty cart");
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    app.send("POST", "/api/cart", Some(&token), Some(json!({"productId": product, "quantity": 2}))).await;
    let (status, intent) = app.send("POST", "/api/payments/create-payment-intent", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent["amount"], 17900);
    assert_eq!(intent["currency"], "eur");
    assert!(intent["clientSecret"].as_str().is_some());
    let intent_id = intent["paymentIntentId"].as_str().unwrap().to_string();

    let (status, body) = app
        .send("POST", "/api/payments/payment-success", Some(&token), Some(json!({"paymentIntentId": intent_id})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let order = &body["order"];
    assert_eq!(order["isPaid"], true);
    assert_eq!(order["totalPrice"], 179.0);
    assert_eq!(order["orderItems"][0]["name"], "Keyboard");
    assert_eq!(order["orderItems"][0]["quantity"], 2);
    let order_id = order["id"].as_str().unwrap().to_string();

    let (_, cart) = app.send("GET", "/api/cart", Some(&token), None).await;
    assert_eq!(cart, json!({"items": [], "total": 0.0}));

    let (_, product) = app.send("GET", &format!("/api/products/{product}"), None, None).await;
    assert_eq!(product["countInStock"], 2);

    let (status, again) = app
        .send("POST", "/api/payments/payment-success", Some(&token), Some(json!({"paymentIntentId": intent_id})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["order"]["id"], order_id.as_str());

    let (_, mine) = app.send("GET", "/api/orders/myorders", Some(&token), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["user"]["email"], "jane@example.com");
}

#[tokio::test]
async fn unconfirmed_payment_is_402_until_the_processor_confirms() {
    let app = TestApp::new(false);
    let admin = app.admin_token().await;
    let product = app.create_product(&admin, "Mouse", 25.0, 3).await;
    let token = app.register("Jane", "jane@example.com").await;
    app.send("POST", "/api/cart", Some(&token), Some(json!({"productId": product}))).await;

    let (_, intent) = app.send("POST", "/api/payments/create-payment-intent", Some(&token), None).await;
    let intent_id = intent["paymentIntentId"].as_str().unwrap().to_string();
    let body = json!({"paymentIntentId": intent_id});

    let (status, err) = app.send("POST", "/api/payments/payment-success", Some(&token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(err["error"]["code"], "PAYMENT_NOT_CONFIRMED");

    let (_, cart) = app.send("GET", "/api/cart", Some(&token), None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1, "cart untouched");

    assert!(app.gateway.confirm(&intent_id));
    let (status, _) = app.send("POST", "/api/payments/payment-success", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send("POST", "/api/payments/payment-success", Some(&token), Some(json!({"paymentIntentId": "pi_missing"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn orders_are_private_and_delivery_is_admin_only() {
    let app = TestApp::new(true);
    let admin = app.admin_token().await;
    let product = app.create_product(&admin, "Monitor", 199.0, 2).await;
    let jane = app.register("Jane", "jane@example.com").await;
    let john = app.register("John", "john@example.com").await;

    app.send("POST", "/api/cart", Some(&jane), Some(json!({"productId": product}))).await;
    let (_, intent) = app.send("POST", "/api/payments/create-payment-intent", Some(&jane), None).await;
    let (_, paid) = app
        .send("POST", "/api/payments/payment-success", Some(&jane), Some(json!({"paymentIntentId": intent["paymentIntentId"]})))
        .await;
    let order_id = paid["order"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/orders/{order_id}");

    let (status, _) = app.send("GET", &uri, Some(&john), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send("GET", &uri, Some(&jane), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send("GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("GET", "/api/orders", Some(&jane), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, all) = app.send("GET", "/api/orders", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, _) = app.send("PUT", &uri, Some(&jane), Some(json!({"isDelivered": true}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, delivered) = app.send("PUT", &uri, Some(&admin), Some(json!({"isDelivered": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["isDelivered"], true);
    assert!(delivered["deliveredAt"].is_string());

    let (status, _) = app.send("PUT", &uri, Some(&admin), Some(json!({"isDelivered": false}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = format!("/api/orders/{}", uuid::Uuid::now_v7());
    let (status, _) = app.send("PUT", &missing, Some(&admin), Some(json!({"isDelivered": true}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_administration() {
    let app = TestApp::new(true);
    let admin = app.admin_token().await;
    let jane = app.register("Jane", "jane@example.com").await;

    let (status, _) = app
        .send("POST", "/api/products", Some(&jane), Some(json!({"name": "Phone", "price": 599.0})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) =
        app.send("POST", "/api/products", Some(&admin), Some(json!({"name": "", "price": 1.0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = app.create_product(&admin, "Phone", 599.0, 1).await;
    let (status, updated) = app
        .send("PUT", &format!("/api/products/{id}"), Some(&admin), Some(json!({"price": 549.0, "countInStock": 8})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], 549.0);
    assert_eq!(updated["countInStock"], 8);
    assert_eq!(updated["name"], "Phone");

    let (_, list) = app.send("GET", "/api/products", None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, body) = app.send("DELETE", &format!("/api/products/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.send("GET", &format!("/api/products/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send("DELETE", &format!("/api/products/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn accounts_and_sessions() {
    let app = TestApp::new(true);
    let admin = app.admin_token().await;
    let token = app.register("Jane", "jane@example.com").await;

    let (status, body) = app
        .send("POST", "/api/auth/register", None, Some(json!({"name": "J", "email": "JANE@example.com", "password": "hunter22"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = app
        .send("POST", "/api/auth/login", None, Some(json!({"email": "jane@example.com", "password": "wrong-pass"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send("POST", "/api/auth/login-admin", None, Some(json!({"email": "jane@example.com", "password": "hunter22"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, profile) = app.send("GET", "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "jane@example.com");
    assert!(profile.get("passwordHash").is_none());

    let (status, profile) =
        app.send("PUT", "/api/auth/profile", Some(&token), Some(json!({"name": "Jane Doe"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["name"], "Jane Doe");
    let jane_id = profile["id"].as_str().unwrap().to_string();

    let (status, users) = app.send("GET", "/api/auth/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let (status, user) = app
        .send("PUT", &format!("/api/auth/users/{jane_id}/role"), Some(&admin), Some(json!({"isAdmin": true})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["isAdmin"], true);

    let (status, _) = app.send("POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("GET", "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send("DELETE", &format!("/api/auth/users/{jane_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("DELETE", &format!("/api/auth/users/{jane_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_json_is_invalid_input() {
    let app = TestApp::new(true);
    let token = app.register("Jane", "jane@example.com").await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/cart")
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_ids_are_invalid_input_in_the_error_shape() {
    let app = TestApp::new(true);
    let admin = app.admin_token().await;
    let token = app.register("Jane", "jane@example.com").await;

    let (status, err) = app.send("GET", "/api/products/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "INVALID_INPUT");

    let (status, err) = app.send("DELETE", "/api/cart/42", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "INVALID_INPUT");

    let (status, err) = app
        .send("PUT", "/api/orders/nope", Some(&admin), Some(json!({"isDelivered": true})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "INVALID_INPUT");

    for id in ["../charges/ch_1", "pi_1/../../v1/charges", ""] {
        let (status, err) = app
            .send("POST", "/api/payments/payment-success", Some(&token), Some(json!({"paymentIntentId": id})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{id}");
        assert_eq!(err["error"]["code"], "INVALID_INPUT");
    }
}

#[tokio::test]
async fn prices_finer_than_a_cent_are_refused() {
    let app = TestApp::new(true);
    let admin = app.admin_token().await;

    let (status, err) = app
        .send("POST", "/api/products", Some(&admin), Some(json!({"name": "Cable", "price": 10.005})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "INVALID_INPUT");

    let product = app.create_product(&admin, "Cable", 10.5, 5).await;
    let (status, _) = app
        .send("PUT", &format!("/api/products/{product}"), Some(&admin), Some(json!({"price": 3.333})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
