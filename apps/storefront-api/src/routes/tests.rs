use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::ServiceExt;

use storefront_payments::{CapturedPayment, MockPaymentGateway, RemoteOrder};

use super::build_router;
use crate::test_support::{product, state, state_with};

async fn body_json(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookies(resp: &Response) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn cookie_from(resp: &Response, name: &str) -> Option<String> {
    set_cookies(resp)
        .into_iter()
        .find(|c| c.starts_with(&format!("{}=", name)))
        .and_then(|c| c.split(';').next().map(str::to_string))
}

fn json_request(method: &str, uri: &str, cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = build_router(state().await);
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(set_cookies(&resp).is_empty());
    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["database"], true);
}

#[tokio::test]
async fn test_new_visitor_gets_session_cart_cookie() {
    let app = build_router(state().await);
    let resp = app
        .oneshot(Request::builder().uri("/api/cart").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let cookie = set_cookies(&resp)
        .into_iter()
        .find(|c| c.starts_with("sessionCartId="))
        .unwrap();
    assert!(cookie.contains("Max-Age=2592000"));

    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], Value::Null);
}

#[tokio::test]
async fn test_returning_visitor_keeps_cookie() {
    let app = build_router(state().await);
    let resp = app.oneshot(get("/api/cart", "sessionCartId=known")).await.unwrap();
    assert!(cookie_from(&resp, "sessionCartId").is_none());
}

#[tokio::test]
async fn test_access_gate() {
    let state = state().await;

    let resp = build_router(state.clone())
        .oneshot(get("/api/access?path=/place-order", "sessionCartId=s"))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["data"]["allowed"], false);
    assert_eq!(json["redirectTo"], "/sign-in?callbackUrl=%2Fplace-order");

    let resp = build_router(state)
        .oneshot(get("/api/access?path=/cart", "sessionCartId=s"))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["data"]["allowed"], true);
    assert!(json.get("redirectTo").is_none());
}

#[tokio::test]
async fn test_cart_errors_map_to_status() {
    let state = state().await;
    state.db.products().insert(&product("p1", 2500, 1)).await.unwrap();
    let cookie = "sessionCartId=guest-1";

    let resp = build_router(state.clone())
        .oneshot(json_request("POST", "/api/cart/items", cookie, json!({ "productId": "p1" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["message"], "Product p1 added to cart successfully");
    assert_eq!(json["data"]["itemsPrice"], "25.00");
    assert_eq!(json["data"]["totalPrice"], "38.75");

    let resp = build_router(state.clone())
        .oneshot(json_request("POST", "/api/cart/items", cookie, json!({ "productId": "p1" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "INSUFFICIENT_STOCK");

    let resp = build_router(state)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/cart/items/p9")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["message"], "Item not found");
}

#[tokio::test]
async fn test_checkout_requires_session() {
    let resp = build_router(state().await)
        .oneshot(json_request("POST", "/api/orders", "sessionCartId=g", json!({})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(resp).await;
    assert_eq!(json["code"], "UNAUTHENTICATED");
    assert_eq!(json["redirectTo"], "/sign-in");
}

#[tokio::test]
async fn test_guest_to_paid_order() {
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_create_remote_order().times(1).returning(|amount| {
        assert_eq!(amount.to_decimal_string(), "143.75");
        Ok(RemoteOrder {
            id: "REMOTE-1".to_string(),
            status: "CREATED".to_string(),
        })
    });
    gateway.expect_capture_remote_order().times(1).returning(|id: &str| {
        Ok(CapturedPayment {
            remote_order_id: id.to_string(),
            status: "COMPLETED".to_string(),
            payer_email: "buyer@example.com".to_string(),
            captured_amount: "143.75".parse().unwrap(),
        })
    });

    let state = state_with(gateway).await;
    state.db.products().insert(&product("p1", 2500, 10)).await.unwrap();
    let guest = "sessionCartId=guest-1";

    for _ in 0..5 {
        let resp = build_router(state.clone())
            .oneshot(json_request("POST", "/api/cart/items", guest, json!({ "productId": "p1" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/auth/sign-up",
            guest,
            json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "password": "secret123",
                "confirmPassword": "secret123"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let session = cookie_from(&resp, "session").unwrap();
    let cookie = format!("{}; {}", guest, session);

    // The guest cart now belongs to the new account
    let json = body_json(build_router(state.clone()).oneshot(get("/api/cart", &cookie)).await.unwrap()).await;
    assert_eq!(json["data"]["items"][0]["qty"], 5);
    assert_eq!(json["data"]["totalPrice"], "143.75");

    let resp = build_router(state.clone())
        .oneshot(json_request("POST", "/api/orders", &cookie, json!({})))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["redirectTo"], "/shipping-address");

    let address = json!({
        "fullName": "Jane Doe",
        "streetAddress": "1 Main St",
        "city": "Springfield",
        "postalCode": "12345",
        "country": "USA"
    });
    let resp = build_router(state.clone())
        .oneshot(json_request("PUT", "/api/user/address", &cookie, address))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = build_router(state.clone())
        .oneshot(json_request("PUT", "/api/user/payment-method", &cookie, json!({ "paymentMethod": "PayPal" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = build_router(state.clone())
        .oneshot(json_request("POST", "/api/orders", &cookie, json!({})))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["message"], "Order successfully created");
    let order_id = json["data"].as_str().unwrap().to_string();
    assert_eq!(json["redirectTo"], format!("/order/{}", order_id));

    let resp = build_router(state.clone())
        .oneshot(json_request("POST", &format!("/api/orders/{}/paypal", order_id), &cookie, json!({})))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"], "REMOTE-1");

    let resp = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            &format!("/api/orders/{}/paypal/capture", order_id),
            &cookie,
            json!({ "remoteOrderId": "REMOTE-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["data"]["isPaid"], true);
    assert_eq!(json["data"]["paymentResult"]["status"], "COMPLETED");

    let p1 = state.db.products().get_by_id("p1").await.unwrap().unwrap();
    assert_eq!(p1.stock, 5);

    // Admin routes stay closed to customers
    let resp = build_router(state)
        .oneshot(json_request("POST", &format!("/api/admin/orders/{}/delivered", order_id), &cookie, json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(resp).await["redirectTo"], "/unauthorized");
}

#[tokio::test]
async fn test_bearer_token_and_sign_out() {
    let state = state().await;

    let resp = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/auth/sign-up",
            "sessionCartId=g",
            json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "password": "secret123",
                "confirmPassword": "secret123"
            }),
        ))
        .await
        .unwrap();
    let token = body_json(resp).await["data"]["token"].as_str().unwrap().to_string();

    let resp = build_router(state.clone())
        .oneshot(
            Request::builder()
                .uri("/api/orders")
                .header(header::COOKIE, "sessionCartId=g")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"], json!([]));

    let resp = build_router(state)
        .oneshot(json_request("POST", "/api/auth/sign-out", "sessionCartId=g", json!({})))
        .await
        .unwrap();
    let cleared = cookie_from(&resp, "session").unwrap();
    assert_eq!(cleared, "session=");
    assert!(set_cookies(&resp).iter().any(|c| c.contains("Max-Age=0")));
}
