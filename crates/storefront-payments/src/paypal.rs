//! # PayPal REST Client
//!
//! Implements [`PaymentGateway`] against the PayPal Orders v2 API.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PayPal Client Flow                               │
//! │                                                                         │
//! │  ┌────────────────┐                          ┌─────────────────────┐   │
//! │  │ PayPalClient   │                          │ PayPal REST API     │   │
//! │  └───────┬────────┘                          └──────────┬──────────┘   │
//! │          │  1. POST /v1/oauth2/token (basic auth)       │              │
//! │          │─────────────────────────────────────────────►│              │
//! │          │◄─────────────────────────────────────────────│              │
//! │          │     access_token, expires_in  (cached)       │              │
//! │          │                                              │              │
//! │          │  2. POST /v2/checkout/orders                 │              │
//! │          │     Bearer token, PayPal-Request-Id          │              │
//! │          │─────────────────────────────────────────────►│              │
//! │          │◄─────────────────────────────────────────────│              │
//! │          │     { id, status: CREATED }                  │              │
//! │          │                                              │              │
//! │          │  3. POST /v2/checkout/orders/{id}/capture    │              │
//! │          │─────────────────────────────────────────────►│              │
//! │          │◄─────────────────────────────────────────────│              │
//! │          │     { id, status: COMPLETED, payer, ... }    │              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Idempotency
//! Every attempt of one operation sends the same `PayPal-Request-Id`, so a
//! retried create or capture after a lost response is answered with the
//! original result instead of a second order or a second capture.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::PaymentsConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{CapturedPayment, PaymentGateway, RemoteOrder};
use crate::retry::{retry_with_backoff, RetryPolicy};
use storefront_core::{Money, PaymentResult};

/// Margin before token expiration to trigger refresh (5 minutes)
const REFRESH_MARGIN_SECS: u64 = 300;

const REQUEST_ID_HEADER: &str = "PayPal-Request-Id";

// =============================================================================
// Token Cache
// =============================================================================

/// Access token stored after authentication.
#[derive(Debug, Clone)]
struct TokenInfo {
    access_token: String,
    expires_at: Instant,
}

impl TokenInfo {
    fn needs_refresh(&self) -> bool {
        Instant::now() + Duration::from_secs(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

// =============================================================================
// Wire Shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    id: String,
    status: String,
    #[serde(default)]
    payer: Option<Payer>,
    #[serde(default)]
    purchase_units: Vec<CaptureUnit>,
}

#[derive(Debug, Deserialize)]
struct Payer {
    #[serde(default)]
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct CaptureUnit {
    #[serde(default)]
    payments: Option<UnitPayments>,
}

#[derive(Debug, Deserialize)]
struct UnitPayments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    amount: CaptureAmount,
}

#[derive(Debug, Deserialize)]
struct CaptureAmount {
    value: Money,
}

impl From<CaptureResponse> for CapturedPayment {
    fn from(resp: CaptureResponse) -> Self {
        let captured_amount = resp
            .purchase_units
            .iter()
            .filter_map(|unit| unit.payments.as_ref())
            .flat_map(|payments| payments.captures.iter())
            .map(|capture| capture.amount.value)
            .sum();

        CapturedPayment {
            remote_order_id: resp.id,
            status: resp.status,
            payer_email: resp.payer.map(|p| p.email_address).unwrap_or_default(),
            captured_amount,
        }
    }
}

impl From<CapturedPayment> for PaymentResult {
    fn from(captured: CapturedPayment) -> Self {
        PaymentResult {
            id: captured.remote_order_id,
            status: captured.status,
            email_address: captured.payer_email,
            amount_captured: captured.captured_amount,
        }
    }
}

/// Error body shapes of the REST API (`/v2` and `/v1/oauth2`).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    issue: String,
}

/// Condenses an error body into one line for logs and `GatewayError::Api`.
fn describe_error(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    if let Some(detail) = parsed.details.first() {
        return detail.issue.clone();
    }
    if let Some(description) = parsed.error_description.or(parsed.message) {
        return description;
    }
    if let Some(name) = parsed.name.or(parsed.error) {
        return name;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

// =============================================================================
// Client
// =============================================================================

/// PayPal Orders v2 client with a cached access token.
pub struct PayPalClient {
    http: reqwest::Client,
    base_url: Url,
    client_id: String,
    app_secret: String,
    currency: String,
    policy: RetryPolicy,
    token: Arc<RwLock<Option<TokenInfo>>>,
}

impl PayPalClient {
    /// Creates a client from validated configuration.
    ///
    /// Missing credentials are not an error here; calls fail with
    /// `MissingCredentials` so non-PayPal checkouts keep working.
    pub fn new(config: &PaymentsConfig) -> GatewayResult<Self> {
        config.validate()?;
        let policy = RetryPolicy::from(&config.http);

        let http = reqwest::Client::builder()
            .timeout(policy.call_timeout)
            .build()
            .map_err(|e| GatewayError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http,
            base_url: Url::parse(&config.paypal.api_url)?,
            client_id: config.paypal.client_id.clone(),
            app_secret: config.paypal.app_secret.clone(),
            currency: config.paypal.currency.clone(),
            policy,
            token: Arc::new(RwLock::new(None)),
        })
    }

    fn endpoint(&self, path: &str) -> GatewayResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Returns the cached token, fetching a fresh one when it is near expiry.
    async fn access_token(&self) -> GatewayResult<String> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if !token.needs_refresh() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut guard = self.token.write().await;

        // Double-check after acquiring write lock
        if let Some(token) = guard.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> GatewayResult<TokenInfo> {
        if self.client_id.trim().is_empty() || self.app_secret.trim().is_empty() {
            return Err(GatewayError::MissingCredentials);
        }

        debug!(url = %self.base_url, "Requesting PayPal access token");
        let resp = self
            .http
            .post(self.endpoint("/v1/oauth2/token")?)
            .basic_auth(&self.client_id, Some(&self.app_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: describe_error(&body),
            });
        }

        let token: TokenResponse = resp.json().await?;
        info!(expires_in_secs = token.expires_in, "Obtained PayPal access token");

        Ok(TokenInfo {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    /// Decodes a success body; 401 drops the cached token.
    async fn read_json<T: DeserializeOwned>(&self, resp: Response) -> GatewayResult<T> {
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("PayPal rejected the cached access token");
            self.invalidate_token().await;
            return Err(GatewayError::TokenRejected);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: describe_error(&body),
            });
        }

        Ok(resp.json().await?)
    }

    async fn create_once(&self, amount: Money, request_id: &str) -> GatewayResult<RemoteOrder> {
        let token = self.access_token().await?;

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": self.currency,
                    "value": amount.to_decimal_string(),
                }
            }]
        });

        let resp = self
            .http
            .post(self.endpoint("/v2/checkout/orders")?)
            .bearer_auth(token)
            .header(REQUEST_ID_HEADER, request_id)
            .json(&body)
            .send()
            .await?;

        let order: OrderResponse = self.read_json(resp).await?;
        Ok(RemoteOrder {
            id: order.id,
            status: order.status,
        })
    }

    async fn capture_once(&self, remote_order_id: &str) -> GatewayResult<CapturedPayment> {
        let token = self.access_token().await?;

        let mut url = self.endpoint("/v2/checkout/orders/")?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidConfig("api_url cannot be a base URL".into()))?
            .pop_if_empty()
            .push(remote_order_id)
            .push("capture");

        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(REQUEST_ID_HEADER, format!("capture-{}", remote_order_id))
            .json(&json!({}))
            .send()
            .await?;

        let captured: CaptureResponse = self.read_json(resp).await?;
        Ok(captured.into())
    }
}

#[async_trait::async_trait]
impl PaymentGateway for PayPalClient {
    async fn authenticate(&self) -> GatewayResult<String> {
        let this = self;
        retry_with_backoff(&self.policy, "authenticate", move || this.access_token()).await
    }

    async fn create_remote_order(&self, amount: Money) -> GatewayResult<RemoteOrder> {
        let this = self;
        let request_id = Uuid::new_v4().to_string();
        let request_id = request_id.as_str();

        let order = retry_with_backoff(&self.policy, "create_remote_order", move || {
            this.create_once(amount, request_id)
        })
        .await?;

        info!(remote_order_id = %order.id, amount = %amount, "Created PayPal order");
        Ok(order)
    }

    async fn capture_remote_order(&self, remote_order_id: &str) -> GatewayResult<CapturedPayment> {
        let this = self;
        let captured = retry_with_backoff(&self.policy, "capture_remote_order", move || {
            this.capture_once(remote_order_id)
        })
        .await?;

        info!(
            remote_order_id = %captured.remote_order_id,
            status = %captured.status,
            amount = %captured.captured_amount,
            "Captured PayPal order"
        );
        Ok(captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    /// In-process stand-in for the PayPal REST API.
    #[derive(Default)]
    struct FakePayPal {
        token_calls: AtomicU32,
        reject_next_create: AtomicBool,
        request_ids: Mutex<Vec<String>>,
        last_order_body: Mutex<Option<Value>>,
    }

    async fn token(
        State(fake): State<Arc<FakePayPal>>,
        headers: HeaderMap,
        body: String,
    ) -> AxumResponse {
        let basic = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Basic "));
        if !basic || body != "grant_type=client_credentials" {
            return (
                axum::http::StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid_client", "error_description": "Client Authentication failed"})),
            )
                .into_response();
        }

        let n = fake.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Json(json!({
            "access_token": format!("token-{}", n),
            "token_type": "Bearer",
            "expires_in": 32400
        }))
        .into_response()
    }

    async fn create_order(
        State(fake): State<Arc<FakePayPal>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> AxumResponse {
        if let Some(id) = headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
            fake.request_ids.lock().unwrap().push(id.to_string());
        }
        if fake.reject_next_create.swap(false, Ordering::SeqCst) {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }

        *fake.last_order_body.lock().unwrap() = Some(body);
        (
            axum::http::StatusCode::CREATED,
            Json(json!({"id": "5O190127TN364715T", "status": "CREATED"})),
        )
            .into_response()
    }

    async fn capture_order(Path(id): Path<String>) -> AxumResponse {
        if id == "UNAPPROVED" {
            return (
                axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "name": "UNPROCESSABLE_ENTITY",
                    "message": "The requested action could not be performed",
                    "details": [{"issue": "ORDER_NOT_APPROVED"}]
                })),
            )
                .into_response();
        }

        Json(json!({
            "id": id,
            "status": "COMPLETED",
            "payer": {"email_address": "buyer@example.com"},
            "purchase_units": [{
                "payments": {"captures": [{"amount": {"currency_code": "USD", "value": "143.75"}}]}
            }]
        }))
        .into_response()
    }

    async fn spawn_fake(fake: Arc<FakePayPal>) -> String {
        let app = Router::new()
            .route("/v1/oauth2/token", post(token))
            .route("/v2/checkout/orders", post(create_order))
            .route("/v2/checkout/orders/{id}/capture", post(capture_order))
            .with_state(fake);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn test_config(api_url: &str) -> PaymentsConfig {
        let mut config = PaymentsConfig::default();
        config.paypal.api_url = api_url.to_string();
        config.paypal.client_id = "client".into();
        config.paypal.app_secret = "secret".into();
        config.http.initial_backoff_ms = 1;
        config.http.max_backoff_ms = 2;
        config.http.request_timeout_secs = 5;
        config
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let fake = Arc::new(FakePayPal::default());
        let client = PayPalClient::new(&test_config(&spawn_fake(fake.clone()).await)).unwrap();

        let first = client.authenticate().await.unwrap();
        let second = client.authenticate().await.unwrap();

        assert_eq!(first, "token-1");
        assert_eq!(second, "token-1");
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_remote_order_sends_amount() {
        let fake = Arc::new(FakePayPal::default());
        let client = PayPalClient::new(&test_config(&spawn_fake(fake.clone()).await)).unwrap();

        let order = client
            .create_remote_order(Money::from_cents(14375))
            .await
            .unwrap();

        assert_eq!(order.id, "5O190127TN364715T");
        assert_eq!(order.status, "CREATED");

        let body = fake.last_order_body.lock().unwrap().clone().unwrap();
        assert_eq!(body["intent"], "CAPTURE");
        assert_eq!(body["purchase_units"][0]["amount"]["value"], "143.75");
        assert_eq!(body["purchase_units"][0]["amount"]["currency_code"], "USD");
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_with_same_request_id() {
        let fake = Arc::new(FakePayPal::default());
        fake.reject_next_create.store(true, Ordering::SeqCst);
        let client = PayPalClient::new(&test_config(&spawn_fake(fake.clone()).await)).unwrap();

        client
            .create_remote_order(Money::from_cents(1000))
            .await
            .unwrap();

        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
        let ids = fake.request_ids.lock().unwrap().clone();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn test_capture_parses_payer_and_amount() {
        let fake = Arc::new(FakePayPal::default());
        let client = PayPalClient::new(&test_config(&spawn_fake(fake).await)).unwrap();

        let captured = client.capture_remote_order("REMOTE-42").await.unwrap();
        assert_eq!(captured.remote_order_id, "REMOTE-42");
        assert!(captured.is_completed());
        assert_eq!(captured.payer_email, "buyer@example.com");
        assert_eq!(captured.captured_amount, Money::from_cents(14375));

        let result = PaymentResult::from(captured);
        assert_eq!(result.id, "REMOTE-42");
        assert!(result.is_completed());
    }

    #[tokio::test]
    async fn test_unapproved_capture_is_not_retried() {
        let fake = Arc::new(FakePayPal::default());
        let client = PayPalClient::new(&test_config(&spawn_fake(fake).await)).unwrap();

        let err = client.capture_remote_order("UNAPPROVED").await.unwrap_err();
        match err {
            GatewayError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "ORDER_NOT_APPROVED");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let mut config = test_config("http://127.0.0.1:9");
        config.paypal.client_id.clear();
        let client = PayPalClient::new(&config).unwrap();

        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingCredentials));
    }

    #[test]
    fn test_describe_error_shapes() {
        assert_eq!(
            describe_error(r#"{"error":"invalid_client","error_description":"Client Authentication failed"}"#),
            "Client Authentication failed"
        );
        assert_eq!(
            describe_error(r#"{"name":"RESOURCE_NOT_FOUND","details":[{"issue":"INVALID_RESOURCE_ID"}]}"#),
            "INVALID_RESOURCE_ID"
        );
        assert_eq!(describe_error(""), "empty response body");
        assert_eq!(describe_error("Bad Gateway"), "Bad Gateway");
    }
}
