//! HTTP transport used for every outbound Google call
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic. Non-2xx statuses come
//! back as ordinary [`HttpResponse`] values so callers can classify them; only
//! failures to get a response at all are a [`TransportError`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// The request could not be completed (DNS, connect, TLS, timeout, ...)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HTTP request failed: {0}")]
pub struct TransportError(pub String);

/// Minimal HTTP surface the Google layer needs
///
/// Every call that needs authorization receives the bearer token explicitly.
pub trait HttpTransport: Send + Sync {
    /// GET `url`, optionally with a bearer token
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, TransportError>;

    /// POST a JSON body to `url`, optionally with a bearer token
    fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpResponse, TransportError>;

    /// POST an `application/x-www-form-urlencoded` body to `url`
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a shared ureq agent
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    const TIMEOUT: Duration = Duration::from_secs(30);
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Self::TIMEOUT))
            .timeout_connect(Some(Self::CONNECT_TIMEOUT))
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    fn read(
        result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> Result<HttpResponse, TransportError> {
        let mut response = result.map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError(format!("Failed to read response body: {}", e)))?;
        Ok(HttpResponse { status, body })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, TransportError> {
        let mut request = self.agent.get(url);
        if let Some(token) = bearer {
            request = request.header("Authorization", &format!("Bearer {}", token));
        }
        Self::read(request.call())
    }

    fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.agent.post(url);
        if let Some(token) = bearer {
            request = request.header("Authorization", &format!("Bearer {}", token));
        }
        Self::read(request.send_json(body))
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        Self::read(self.agent.post(url).send_form(form.iter().copied()))
    }
}

/// A request seen by [`StaticTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
enum Reply {
    Respond(HttpResponse),
    Fail(String),
}

#[derive(Debug)]
struct Route {
    method: &'static str,
    url_prefix: String,
    replies: VecDeque<Reply>,
}

/// Transport that answers from canned replies and records every request
///
/// Replies are matched by method and the longest registered URL prefix.
/// Registering several replies for the same route queues them; the last one
/// keeps answering once the queue is drained. Used by tests and offline runs.
#[derive(Debug, Default)]
pub struct StaticTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` requests under `url_prefix` with `status` and `body`
    pub fn respond(
        &self,
        method: &'static str,
        url_prefix: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> &Self {
        self.push(method, url_prefix.into(), Reply::Respond(HttpResponse::new(status, body)))
    }

    /// Fail `method` requests under `url_prefix` before any response
    pub fn fail(
        &self,
        method: &'static str,
        url_prefix: impl Into<String>,
        message: impl Into<String>,
    ) -> &Self {
        self.push(method, url_prefix.into(), Reply::Fail(message.into()))
    }

    /// All requests seen so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests seen so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Requests whose URL starts with `url_prefix`
    pub fn requests_to(&self, url_prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.starts_with(url_prefix))
            .collect()
    }

    fn push(&self, method: &'static str, url_prefix: String, reply: Reply) -> &Self {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.url_prefix == url_prefix)
        {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                method,
                url_prefix,
                replies: VecDeque::from([reply]),
            }),
        }
        self
    }

    fn dispatch(&self, request: RecordedRequest) -> Result<HttpResponse, TransportError> {
        let reply = {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            routes
                .iter_mut()
                .filter(|r| r.method == request.method && request.url.starts_with(&r.url_prefix))
                .max_by_key(|r| r.url_prefix.len())
                .and_then(|route| {
                    if route.replies.len() > 1 {
                        route.replies.pop_front()
                    } else {
                        route.replies.front().cloned()
                    }
                })
        };

        let method = request.method;
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(TransportError(message)),
            None => Err(TransportError(format!("no route for {} {}", method, url))),
        }
    }
}

impl HttpTransport for StaticTransport {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, TransportError> {
        self.dispatch(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            bearer: bearer.map(str::to_string),
            body: None,
        })
    }

    fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpResponse, TransportError> {
        self.dispatch(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            bearer: bearer.map(str::to_string),
            body: Some(body.to_string()),
        })
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        let body = form
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        self.dispatch(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            bearer: None,
            body: Some(body),
        })
    }
}
