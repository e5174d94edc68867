//! Integration test support for the DaniThur storefront.
//!
//! Tests drive the real router in-process with `tower::ServiceExt::oneshot`.
//! The dealership backend and the postal code service are replaced by the
//! fakes below, so no network or server is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p danithur-integration-tests
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, BodyDataStream};
use axum::http::{Method, Request, Response, StatusCode, header};
use danithur_core::{OrderId, PaymentMethod, PostalCode};
use danithur_storefront::backend::{
    BackendError, BoletoDocument, CreateOrderRequest, CreateOrderResponse, DealershipApi,
    PixCharge, PixPaymentStatus, api_error,
};
use danithur_storefront::config::StorefrontConfig;
use danithur_storefront::middleware::SESSION_COOKIE_NAME;
use danithur_storefront::postal::{PostalCodeLookup, PostalLookupError, ResolvedAddress};
use danithur_storefront::state::AppState;
use futures::StreamExt;
use serde_json::Value;
use tower::ServiceExt;

/// Order id every fake order gets.
pub const FAKE_ORDER_ID: i32 = 501;

/// 1x1 transparent PNG.
pub const FAKE_QR_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Pix expiry the fake backend sends unless told otherwise.
pub const FAKE_PIX_EXPIRY_SECS: u64 = 1800;

/// In-memory dealership backend.
pub struct FakeDealershipApi {
    requests: Mutex<Vec<CreateOrderRequest>>,
    reject_with: Mutex<Option<(u16, String)>>,
    paid: AtomicBool,
    status_checks: AtomicU32,
    pix_expiry_secs: AtomicU64,
}

impl Default for FakeDealershipApi {
    fn default() -> Self {
        Self {
            requests: Mutex::default(),
            reject_with: Mutex::default(),
            paid: AtomicBool::new(false),
            status_checks: AtomicU32::new(0),
            pix_expiry_secs: AtomicU64::new(FAKE_PIX_EXPIRY_SECS),
        }
    }
}

impl FakeDealershipApi {
    /// Orders received so far.
    pub fn requests(&self) -> Vec<CreateOrderRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make the next orders fail with `status` and `body`.
    pub fn reject_orders(&self, status: u16, body: &str) {
        *self
            .reject_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((status, body.to_string()));
    }

    /// Report every Pix charge as paid from now on.
    pub fn mark_pix_paid(&self) {
        self.paid.store(true, Ordering::SeqCst);
    }

    /// Expiry sent with the next Pix charges.
    pub fn expire_pix_after(&self, secs: u64) {
        self.pix_expiry_secs.store(secs, Ordering::SeqCst);
    }

    pub fn status_checks(&self) -> u32 {
        self.status_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DealershipApi for FakeDealershipApi {
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, BackendError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let rejection = self
            .reject_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some((status, body)) = rejection {
            return Err(api_error(status, &body));
        }

        let method = PaymentMethod::from_code(request.payment_method);
        Ok(CreateOrderResponse {
            order_id: OrderId::new(FAKE_ORDER_ID),
            pix: (method == Some(PaymentMethod::Pix)).then(|| PixCharge {
                qr_code_base64: Some(format!("data:image/png;base64,{FAKE_QR_PNG_BASE64}")),
                copy_paste: "00020126580014br.gov.bcb.pix0136danithur".to_string(),
                transaction_id: "tx-501".to_string(),
                expires_in_seconds: Some(self.pix_expiry_secs.load(Ordering::SeqCst)),
            }),
            boleto: (method == Some(PaymentMethod::Boleto)).then(|| BoletoDocument {
                document_url: "https://boletos.danithur.test/501.pdf".to_string(),
            }),
        })
    }

    async fn pix_payment_status(
        &self,
        _transaction_id: &str,
    ) -> Result<PixPaymentStatus, BackendError> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        Ok(PixPaymentStatus {
            paid: self.paid.load(Ordering::SeqCst),
        })
    }
}

/// Postal code service that knows a single CEP.
pub struct FakePostalLookup;

#[async_trait]
impl PostalCodeLookup for FakePostalLookup {
    async fn lookup(&self, code: &PostalCode) -> Result<ResolvedAddress, PostalLookupError> {
        match code.digits() {
            "01310930" => Ok(ResolvedAddress {
                street: "Avenida Paulista".to_string(),
                neighborhood: "Bela Vista".to_string(),
                city: "São Paulo".to_string(),
                region: "SP".to_string(),
            }),
            other => Err(PostalLookupError::NotFound(other.to_string())),
        }
    }
}

/// A response reduced to what the tests look at.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Body parsed as JSON, `Null` when empty.
    ///
    /// # Panics
    ///
    /// Panics if the body is not valid JSON.
    pub fn json(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// How long a test waits for the next server-sent event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// One server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: Value,
}

/// Events read off an open SSE response.
pub struct EventStream {
    body: BodyDataStream,
    buffer: String,
}

impl EventStream {
    /// The next event, or `None` once the server closed the stream.
    ///
    /// Keep-alive comments are skipped.
    ///
    /// # Panics
    ///
    /// Panics if nothing arrives within [`EVENT_TIMEOUT`] or an event's data
    /// is not JSON.
    pub async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                if let Some(event) = parse_event(&block) {
                    return Some(event);
                }
                continue;
            }

            let chunk = tokio::time::timeout(EVENT_TIMEOUT, self.body.next())
                .await
                .expect("no server-sent event before the timeout")?
                .expect("readable event stream");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    /// Read events until the server closes the stream.
    pub async fn collect_until_closed(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }
}

fn parse_event(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data = String::new();
    for line in block.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim().to_string());
        } else if let Some(chunk) = line.strip_prefix("data:") {
            data.push_str(chunk.strip_prefix(' ').unwrap_or(chunk));
        }
    }
    let event = event?;
    let data = serde_json::from_str(&data).expect("event data is not JSON");
    Some(SseEvent { event, data })
}

/// The storefront router plus its fakes, acting as one browser.
///
/// The session cookie set by the first response is sent on every later
/// request, like a browser would.
pub struct TestContext {
    pub app: Router,
    pub api: Arc<FakeDealershipApi>,
    cookie: Mutex<Option<String>>,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let api = Arc::new(FakeDealershipApi::default());
        let config = StorefrontConfig::with_api_url("http://dealership.test/api");
        let state = AppState::with_services(config, api.clone(), Arc::new(FakePostalLookup));

        Self {
            app: danithur_storefront::app(state),
            api,
            cookie: Mutex::new(None),
        }
    }

    /// Another browser on the same server, with no cookie yet.
    #[must_use]
    pub fn other_visitor(&self) -> Self {
        Self {
            app: self.app.clone(),
            api: self.api.clone(),
            cookie: Mutex::new(None),
        }
    }

    /// Send a request, with `body` as JSON when given.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let response = self.send(method, uri, body).await;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body")
            .to_vec();

        TestResponse {
            status,
            content_type,
            body,
        }
    }

    /// Open an SSE endpoint and follow its events.
    ///
    /// # Panics
    ///
    /// Panics unless the endpoint answers `200 text/event-stream`.
    pub async fn events(&self, uri: &str) -> EventStream {
        let response = self.send(Method::GET, uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("text/event-stream"), "{content_type}");

        EventStream {
            body: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    /// Send a request and keep the session cookie it sets.
    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);

        let cookie = self
            .cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {});

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .filter(|pair| pair.starts_with(SESSION_COOKIE_NAME))
        {
            *self.cookie.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(set_cookie.to_string());
        }

        response
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Option<Value>) -> TestResponse {
        self.request(Method::POST, uri, body).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None).await
    }

    /// Sign in as buyer 3 with a one-vehicle cart and start checkout.
    ///
    /// # Panics
    ///
    /// Panics if checkout does not start.
    pub async fn start_checkout(&self) -> Value {
        self.put("/session/buyer", serde_json::json!({ "buyerId": 3 }))
            .await;
        self.put("/session/cart", serde_json::json!({ "cart": sample_cart() }))
            .await;

        let response = self.post("/checkout", None).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()
    }

    /// Fill a valid delivery address through the postal code lookup.
    pub async fn fill_address(&self) -> TestResponse {
        self.post(
            "/checkout/postal-code",
            Some(serde_json::json!({ "postalCode": "01310-930" })),
        )
        .await;
        self.patch(
            "/checkout/form",
            serde_json::json!({ "number": "1578", "complement": "Loja 2" }),
        )
        .await
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A cart holding one vehicle at R$ 159.900,00.
#[must_use]
pub fn sample_cart() -> Value {
    serde_json::json!({
        "cartId": 7,
        "items": [{
            "vehicleId": 42,
            "name": "Jeep Compass Longitude",
            "unitPrice": { "amount": "159900.00", "currency_code": "BRL" },
            "quantity": 1,
            "color": "Prata",
            "modelYear": 2022,
            "plate": "ABC1D23"
        }]
    })
}
