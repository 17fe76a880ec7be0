//! Interactive consent and one-shot grant delivery
//!
//! Each sign-in registers a listener keyed by its correlation id (the OAuth
//! `state` parameter) before the consent screen is shown. Whatever receives
//! the provider's redirect hands it to [`GrantResponder::respond`], which
//! resolves exactly that listener and no other.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{mpsc, Arc, Mutex, PoisonError};

use crate::error::SessionError;

/// What the provider sent back to the redirect URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantResponse {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// Redirect URI the code was issued for; the token exchange must repeat it
    pub redirect_uri: String,
}

impl GrantResponse {
    pub fn authorized(code: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            error: None,
            error_description: None,
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn denied(
        error: impl Into<String>,
        description: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            code: None,
            error: Some(error.into()),
            error_description: description,
            redirect_uri: redirect_uri.into(),
        }
    }
}

/// Pending sign-ins waiting for the provider's answer
#[derive(Debug, Default)]
pub struct GrantRegistry {
    pending: Mutex<HashMap<String, mpsc::Sender<GrantResponse>>>,
}

impl GrantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a one-time listener for `state`
    ///
    /// Returns the responder to hand to the consent prompt and the receiving
    /// end the caller waits on.
    pub fn register(
        self: &Arc<Self>,
        state: impl Into<String>,
    ) -> (GrantResponder, mpsc::Receiver<GrantResponse>) {
        let state = state.into();
        let (tx, rx) = mpsc::channel();
        self.lock().insert(state.clone(), tx);
        debug!("Registered grant listener {}", state);

        let responder = GrantResponder {
            state: Some(state),
            registry: Arc::clone(self),
        };
        (responder, rx)
    }

    /// Deliver a response to the listener registered for `state`
    ///
    /// Returns `false` when no listener is waiting (unknown or already answered).
    pub fn complete(&self, state: &str, response: GrantResponse) -> bool {
        match self.lock().remove(state) {
            Some(tx) => tx.send(response).is_ok(),
            None => {
                warn!("Dropping grant response for unknown request {}", state);
                false
            }
        }
    }

    /// Drop the listener for `state`; its receiver observes a disconnect
    pub fn cancel(&self, state: &str) {
        if self.lock().remove(state).is_some() {
            debug!("Cancelled grant listener {}", state);
        }
    }

    /// Number of sign-ins still waiting
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::Sender<GrantResponse>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle that answers one registered sign-in
///
/// Dropping it without responding cancels the sign-in.
#[derive(Debug)]
pub struct GrantResponder {
    state: Option<String>,
    registry: Arc<GrantRegistry>,
}

impl GrantResponder {
    /// Correlation id to send as the OAuth `state` parameter
    pub fn state(&self) -> &str {
        self.state.as_deref().unwrap_or_default()
    }

    /// Resolve the waiting sign-in with `response`
    pub fn respond(mut self, response: GrantResponse) -> bool {
        match self.state.take() {
            Some(state) => self.registry.complete(&state, response),
            None => false,
        }
    }
}

impl Drop for GrantResponder {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            self.registry.cancel(&state);
        }
    }
}

/// Parameters of an interactive authorization request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    pub authorization_endpoint: String,
    pub client_id: String,
    pub scopes: Vec<String>,
}

impl ConsentRequest {
    /// Authorization URL for a redirect target and correlation id
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&include_granted_scopes=true",
            self.authorization_endpoint,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.scopes.join(" ")),
            urlencoding::encode(state),
        )
    }
}

/// Presents the provider's consent screen
pub trait ConsentPrompt: Send + Sync {
    /// Start the interactive grant for `request`
    ///
    /// The prompt must eventually pass the provider's answer to `responder`
    /// (or drop it, which cancels the sign-in). It may return before the
    /// answer arrives.
    fn present(&self, request: &ConsentRequest, responder: GrantResponder)
    -> Result<(), SessionError>;
}

/// Query parameters of an OAuth redirect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Whether this request carries a provider answer
    pub fn is_answer(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// Parse an HTTP request line such as `GET /?code=abc&state=xyz HTTP/1.1`
pub fn parse_callback(request_line: &str) -> Option<CallbackParams> {
    let target = request_line.split_whitespace().nth(1)?;
    let url = url::Url::parse(&format!("http://localhost{}", target)).ok()?;

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        let value = value.into_owned();
        match key.as_ref() {
            "code" => params.code = Some(value),
            "state" => params.state = Some(value),
            "error" => params.error = Some(value),
            "error_description" => params.error_description = Some(value),
            _ => {}
        }
    }
    Some(params)
}

/// Consent through the system browser with a loopback redirect
///
/// Binds a local port, opens the authorization URL, and answers the sign-in
/// from a background thread once the browser is redirected back.
#[derive(Debug, Clone)]
pub struct LoopbackConsent {
    open_browser: bool,
}

impl LoopbackConsent {
    /// Port range to try for the local redirect server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    pub fn new() -> Self {
        Self { open_browser: true }
    }

    /// Only print the authorization URL instead of launching a browser
    pub fn without_browser() -> Self {
        Self {
            open_browser: false,
        }
    }

    fn start_local_server() -> Result<(TcpListener, u16), SessionError> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
                return Ok((listener, port));
            }
        }
        Err(SessionError::Unknown {
            detail: format!(
                "Could not bind to any port in range {}-{}",
                Self::PORT_RANGE_START,
                Self::PORT_RANGE_END
            ),
        })
    }

    /// Accept connections until one carries the provider's answer
    fn wait_for_callback(listener: &TcpListener) -> std::io::Result<CallbackParams> {
        loop {
            let (mut stream, _) = listener.accept()?;

            let mut request_line = String::new();
            BufReader::new(&stream).read_line(&mut request_line)?;

            let params = parse_callback(&request_line).unwrap_or_default();
            let (status, body) = if params.code.is_some() {
                ("200 OK", "Sign-in complete. You can close this window.")
            } else if params.error.is_some() {
                ("200 OK", "Sign-in was not completed. You can close this window.")
            } else {
                ("404 Not Found", "Not found.")
            };

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
                status, body
            );
            if let Err(e) = stream.write_all(response.as_bytes()) {
                debug!("Failed to answer redirect request: {}", e);
            }

            if params.is_answer() {
                return Ok(params);
            }
        }
    }
}

impl Default for LoopbackConsent {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsentPrompt for LoopbackConsent {
    fn present(
        &self,
        request: &ConsentRequest,
        responder: GrantResponder,
    ) -> Result<(), SessionError> {
        let (listener, port) = Self::start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);
        let auth_url = request.authorization_url(&redirect_uri, responder.state());

        println!("\n=== Google Sign-In ===");
        if self.open_browser {
            println!("Opening browser for authentication...");
            if let Err(e) = open::that(&auth_url) {
                warn!("Failed to open browser: {}", e);
            }
        }
        println!("If the browser doesn't open, visit: {}", auth_url);
        info!("Waiting for authorization on port {}", port);

        std::thread::Builder::new()
            .name("oauth-redirect".to_string())
            .spawn(move || {
                let response = match Self::wait_for_callback(&listener) {
                    Ok(params) if params.state.as_deref() != Some(responder.state()) => {
                        GrantResponse::denied(
                            "state_mismatch",
                            Some("Redirect did not match this sign-in request".to_string()),
                            redirect_uri,
                        )
                    }
                    Ok(CallbackParams {
                        code: Some(code), ..
                    }) => GrantResponse::authorized(code, redirect_uri),
                    Ok(params) => GrantResponse::denied(
                        params.error.unwrap_or_else(|| "unknown_error".to_string()),
                        params.error_description,
                        redirect_uri,
                    ),
                    Err(e) => GrantResponse::denied(
                        "redirect_failed",
                        Some(e.to_string()),
                        redirect_uri,
                    ),
                };
                responder.respond(response);
            })
            .map_err(|e| SessionError::Unknown {
                detail: format!("Failed to start redirect listener: {}", e),
            })?;

        Ok(())
    }
}
