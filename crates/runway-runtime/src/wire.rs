use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::endpoint::REQUEST_ID_HEADER;
use crate::error::RuntimeError;

/// Response to a runtime API call, fully buffered.
#[derive(Debug, Clone, Default)]
pub struct WireResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl WireResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Append a header. Names or values that are not valid HTTP are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid header"),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of a header, in the order received.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Facade over the HTTP calls the runtime makes.
///
/// Implementations carry no protocol knowledge: URLs come from
/// [`RuntimeEndpoint`](crate::endpoint::RuntimeEndpoint) and bodies are
/// already encoded. `get` on the next-invocation URL may block for as long
/// as the platform has no event to hand out.
pub trait WireClient: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<WireResponse, RuntimeError>> + Send + 'a>>;

    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<WireResponse, RuntimeError>> + Send + 'a>>;
}

/// reqwest-backed client used against the real runtime API.
#[derive(Debug, Clone, Default)]
pub struct HttpWireClient {
    http: reqwest::Client,
}

impl HttpWireClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn buffer(resp: reqwest::Response) -> Result<WireResponse, RuntimeError> {
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp
            .text()
            .await
            .map_err(|e| RuntimeError::Transport(format!("Failed to read response body: {e}")))?;
        Ok(WireResponse {
            status,
            headers,
            body,
        })
    }
}

impl WireClient for HttpWireClient {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<WireResponse, RuntimeError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| RuntimeError::Transport(format!("GET {url} failed: {e}")))?;
            Self::buffer(resp).await
        })
    }

    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<WireResponse, RuntimeError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .http
                .post(url)
                .body(body.to_owned())
                .send()
                .await
                .map_err(|e| RuntimeError::Transport(format!("POST {url} failed: {e}")))?;
            Self::buffer(resp).await
        })
    }
}

/// A request observed by [`StubWireClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<String>,
}

/// Scripted client for tests.
///
/// GETs pop queued responses in order; once the queue is empty a GET never
/// completes, like a long-poll with no event waiting. POSTs are recorded
/// and answered with `202 Accepted` unless a status was set.
pub struct StubWireClient {
    queued: Mutex<VecDeque<Result<WireResponse, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    post_status: u16,
}

impl Default for StubWireClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StubWireClient {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            post_status: 202,
        }
    }

    /// Answer every POST with this status.
    pub fn with_post_status(mut self, status: u16) -> Self {
        self.post_status = status;
        self
    }

    pub fn push_response(&self, response: WireResponse) {
        lock(&self.queued).push_back(Ok(response));
    }

    /// Queue an event the way the platform hands one out.
    pub fn push_event(&self, request_id: &str, body: &str) {
        self.push_response(
            WireResponse::new(200)
                .with_header(REQUEST_ID_HEADER, request_id)
                .with_body(body),
        );
    }

    /// Queue a transport failure for the next GET.
    pub fn push_failure(&self, message: &str) {
        lock(&self.queued).push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn posts(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "POST")
            .collect()
    }

    fn record(&self, method: &'static str, url: &str, body: Option<&str>) {
        lock(&self.requests).push(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.map(str::to_string),
        });
    }
}

impl WireClient for StubWireClient {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<WireResponse, RuntimeError>> + Send + 'a>> {
        self.record("GET", url, None);
        let next = lock(&self.queued).pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(RuntimeError::Transport(message)),
                None => std::future::pending().await,
            }
        })
    }

    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<WireResponse, RuntimeError>> + Send + 'a>> {
        self.record("POST", url, Some(body));
        let status = self.post_status;
        Box::pin(async move { Ok(WireResponse::new(status)) })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
