//! HTTP transport implementation.
//!
//! This module maps HTTP responses of the sync endpoint onto delivery
//! outcomes. The actual HTTP client is abstracted via a trait so tests and
//! embedders can supply their own; [`ReqwestClient`] is the default.

use crate::error::{SyncError, SyncResult};
use crate::transport::{DeliveryOutcome, SyncTransport};
use async_trait::async_trait;
use offsync_protocol::{ConflictBody, SyncRequest};
use parking_lot::RwLock;

/// Header carrying the operation ID so the server can drop replays.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Longest response body kept in a rejection message.
const MAX_ERROR_BODY: usize = 512;

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. An `Err` means
/// no response was received at all (DNS, connect, timeout, reset).
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a JSON `POST` request and returns the response.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: Vec<u8>,
    ) -> Result<HttpResponse, String>;
}

/// HTTP-based sync transport.
///
/// Status mapping:
/// - `2xx` - accepted, body ignored
/// - `409` - conflict, body must be `{"data": ...}`
/// - anything else - rejected, retried on a later pass
pub struct HttpTransport<C: HttpClient> {
    endpoint: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>, client: C) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the last transport-level error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn interpret(response: HttpResponse) -> SyncResult<DeliveryOutcome> {
        match response.status {
            200..=299 => Ok(DeliveryOutcome::Accepted),
            409 => {
                let body = ConflictBody::decode(&response.body).map_err(|e| {
                    SyncError::Protocol(format!("malformed conflict response: {e}"))
                })?;
                Ok(DeliveryOutcome::Conflict {
                    server_data: body.data,
                })
            }
            status => {
                let mut message = String::from_utf8_lossy(&response.body).into_owned();
                if message.len() > MAX_ERROR_BODY {
                    let mut cut = MAX_ERROR_BODY;
                    while !message.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    message.truncate(cut);
                }
                if message.is_empty() {
                    message = format!("HTTP {status}");
                }
                Ok(DeliveryOutcome::Rejected { status, message })
            }
        }
    }
}

#[async_trait]
impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    async fn submit(&self, request: &SyncRequest) -> SyncResult<DeliveryOutcome> {
        let body = request
            .encode()
            .map_err(|e| SyncError::Codec(format!("failed to encode request: {e}")))?;

        let mut headers = Vec::with_capacity(1);
        if let Some(id) = request.idempotency_key {
            headers.push((IDEMPOTENCY_HEADER, id.to_string()));
        }

        let response = self
            .client
            .post_json(&self.endpoint, &headers, body)
            .await
            .map_err(|e| {
                *self.last_error.write() = Some(e.clone());
                SyncError::transport_retryable(e)
            })?;

        *self.last_error.write() = None;
        Self::interpret(response)
    }
}

/// [`HttpClient`] backed by `reqwest`.
#[cfg(feature = "reqwest")]
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestClient {
    /// Creates a client with the given request timeout.
    pub fn new(timeout: std::time::Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "reqwest")]
#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: Vec<u8>,
    ) -> Result<HttpResponse, String> {
        let mut builder = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use offsync_protocol::{OperationKind, QueuedOperation};
    use parking_lot::Mutex;
    use serde_json::json;

    struct TestClient {
        response: Mutex<Result<HttpResponse, String>>,
        seen: Mutex<Vec<(String, Vec<(String, String)>, Vec<u8>)>>,
    }

    impl TestClient {
        fn replying(response: Result<HttpResponse, String>) -> Self {
            Self {
                response: Mutex::new(response),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn post_json(
            &self,
            url: &str,
            headers: &[(&str, String)],
            body: Vec<u8>,
        ) -> Result<HttpResponse, String> {
            self.seen.lock().push((
                url.to_string(),
                headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                body,
            ));
            self.response.lock().clone()
        }
    }

    fn request() -> SyncRequest {
        let op = QueuedOperation::new(
            OperationKind::Create,
            "invoice/9",
            json!({"total": 400}),
            Utc::now(),
        );
        SyncRequest::from_operation(&op)
    }

    #[tokio::test]
    async fn success_status_is_accepted() {
        let client = TestClient::replying(Ok(HttpResponse::new(201, b"ignored".to_vec())));
        let transport = HttpTransport::new("https://api.example.com/sync", client);

        let outcome = transport.submit(&request()).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Accepted);
        assert_eq!(transport.endpoint(), "https://api.example.com/sync");
    }

    #[tokio::test]
    async fn sends_body_and_idempotency_key() {
        let client = TestClient::replying(Ok(HttpResponse::new(200, Vec::new())));
        let transport = HttpTransport::new("https://api.example.com/sync", client);
        let request = request();

        transport.submit(&request).await.unwrap();

        let seen = transport.client.seen.lock();
        let (url, headers, body) = &seen[0];
        assert_eq!(url, "https://api.example.com/sync");
        assert_eq!(
            headers[0],
            (
                IDEMPOTENCY_HEADER.to_string(),
                request.idempotency_key.unwrap().to_string()
            )
        );
        let body: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(body["operation"], "Create");
        assert_eq!(body["data"]["total"], 400);
    }

    #[tokio::test]
    async fn conflict_status_parses_server_state() {
        let client = TestClient::replying(Ok(HttpResponse::new(
            409,
            br#"{"data": {"total": 500}}"#.to_vec(),
        )));
        let transport = HttpTransport::new("https://api.example.com/sync", client);

        let outcome = transport.submit(&request()).await.unwrap();
        assert_eq!(
            outcome,
            DeliveryOutcome::Conflict {
                server_data: json!({"total": 500})
            }
        );
    }

    #[tokio::test]
    async fn malformed_conflict_is_protocol_error() {
        let client = TestClient::replying(Ok(HttpResponse::new(409, b"conflict".to_vec())));
        let transport = HttpTransport::new("https://api.example.com/sync", client);

        let err = transport.submit(&request()).await.unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
        assert!(err.is_pass_fault());
    }

    #[tokio::test]
    async fn other_statuses_are_rejected() {
        for status in [400u16, 404, 422, 500, 503] {
            let client = TestClient::replying(Ok(HttpResponse::new(status, Vec::new())));
            let transport = HttpTransport::new("https://api.example.com/sync", client);

            match transport.submit(&request()).await.unwrap() {
                DeliveryOutcome::Rejected { status: s, message } => {
                    assert_eq!(s, status);
                    assert_eq!(message, format!("HTTP {status}"));
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn long_error_bodies_are_truncated() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let client = TestClient::replying(Ok(HttpResponse::new(500, body.into_bytes())));
        let transport = HttpTransport::new("https://api.example.com/sync", client);

        match transport.submit(&request()).await.unwrap() {
            DeliveryOutcome::Rejected { message, .. } => assert!(message.len() <= MAX_ERROR_BODY),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_error_is_retryable_transport_error() {
        let client = TestClient::replying(Err("connection refused".into()));
        let transport = HttpTransport::new("https://api.example.com/sync", client);

        let err = transport.submit(&request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transport.last_error().as_deref(), Some("connection refused"));
    }
}
