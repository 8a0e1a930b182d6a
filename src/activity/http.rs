// src/activity/http.rs
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;

use crate::activity::types::FetchError;

/// Outgoing GET request against one of the upstream services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub source: &'static str, // "lastfm" | "letterboxd" | "github" | "image"
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub accept: Option<&'static str>,
}

impl UpstreamRequest {
    pub fn get(source: &'static str, url: impl Into<String>) -> Self {
        Self {
            source,
            url: url.into(),
            query: Vec::new(),
            bearer: None,
            accept: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn accept(mut self, mime: &'static str) -> Self {
        self.accept = Some(mime);
        self
    }

    /// Value of a query parameter, if set.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw upstream response; status checks are left to the caller.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fails with `FetchError::Status` on non-2xx.
    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status(self.status))
        }
    }

    pub fn text(&self) -> Result<&str, FetchError> {
        std::str::from_utf8(&self.body).map_err(FetchError::malformed)
    }
}

/// Transport seam between the activity service and the network.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, FetchError>;
}

/// Production transport backed by `reqwest` with connect/request timeouts.
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, FetchError> {
        counter!("upstream_requests_total", "source" => request.source).increment(1);

        let mut builder = self.client.get(&request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(accept) = request.accept {
            builder = builder.header(reqwest::header::ACCEPT, accept);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .to_vec();

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

// --- Test helper ---

/// Canned reply served by [`StubFetch`].
#[derive(Debug, Clone)]
pub enum StubReply {
    Body {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },
    Fail(String),
}

impl StubReply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        StubReply::Body {
            status: 200,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn ok_typed(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        StubReply::Body {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        StubReply::Body {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }
}

/// In-memory transport: replies are matched by URL prefix (first match wins)
/// and every request is recorded.
pub struct StubFetch {
    routes: Mutex<Vec<(String, StubReply)>>,
    pub calls: Mutex<Vec<UpstreamRequest>>,
}

impl StubFetch {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_route(self, url_prefix: &str, reply: StubReply) -> Self {
        self.set_route(url_prefix, reply);
        self
    }

    /// Replace (or add) the reply for a prefix.
    pub fn set_route(&self, url_prefix: &str, reply: StubReply) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|(p, _)| p == url_prefix) {
            Some(slot) => slot.1 = reply,
            None => routes.push((url_prefix.to_string(), reply)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, source: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.source == source)
            .count()
    }

    pub fn last_call(&self) -> Option<UpstreamRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl Default for StubFetch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpFetch for StubFetch {
    async fn get(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, FetchError> {
        self.calls.lock().unwrap().push(request.clone());
        let reply = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map(|(_, r)| r.clone());

        match reply {
            Some(StubReply::Body {
                status,
                content_type,
                body,
            }) => Ok(UpstreamResponse {
                status,
                content_type,
                body,
            }),
            Some(StubReply::Fail(msg)) => Err(FetchError::Transport(msg)),
            None => Ok(UpstreamResponse {
                status: 404,
                content_type: None,
                body: Vec::new(),
            }),
        }
    }
}
