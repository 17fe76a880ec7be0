//! Google session management
//!
//! Owns the OAuth session lifecycle: initialization against the loaded
//! libraries, interactive sign-in through a [`ConsentPrompt`], token exchange,
//! profile lookup and revocation on sign-out.
//! Uses synchronous HTTP through [`HttpTransport`] to be executor-agnostic.

use log::{debug, error, info, warn};
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::api::{DiscoveryDocument, OpenIdConfiguration, TokenResponse, UserInfo};
use super::client::{GoogleApiClient, ServiceEndpoints};
use super::consent::{ConsentPrompt, ConsentRequest, GrantRegistry};
use super::loader::Libraries;
use super::scopes;
use crate::config::GoogleCredentials;
use crate::error::{RemoteFailure, SessionError};
use crate::http::HttpTransport;
use crate::models::{Profile, Session};

/// Client registration and requested scopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scopes: Vec<String>,
}

impl SessionSettings {
    /// Settings requesting every scope the drafts workflows use
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id,
            client_secret,
            scopes: scopes::ALL.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Settings from loaded credentials, if any were found
    pub fn from_credentials(credentials: Option<&GoogleCredentials>) -> Self {
        match credentials {
            Some(creds) => Self::new(Some(creds.client_id.clone()), creds.client_secret.clone()),
            None => Self::new(None, None),
        }
    }

    fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Lifecycle of a [`GoogleSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    /// Ready, nobody signed in
    SignedOut,
    /// Ready, with a live session
    SignedIn,
}

impl SessionState {
    fn is_ready(self) -> bool {
        matches!(self, SessionState::SignedOut | SessionState::SignedIn)
    }
}

/// Identity endpoints required for sign-in
#[derive(Debug, Clone)]
struct IdentityEndpoints {
    authorization: String,
    token: String,
    userinfo: Option<String>,
    revocation: Option<String>,
}

impl IdentityEndpoints {
    fn from_configuration(config: &OpenIdConfiguration) -> Result<Self, SessionError> {
        let (Some(authorization), Some(token)) = (
            config.authorization_endpoint.clone(),
            config.token_endpoint.clone(),
        ) else {
            return Err(SessionError::LibraryUnavailable {
                detail: "Identity configuration has no authorization or token endpoint".to_string(),
            });
        };

        Ok(Self {
            authorization,
            token,
            userinfo: config.userinfo_endpoint.clone(),
            revocation: config.revocation_endpoint.clone(),
        })
    }
}

struct Inner {
    state: SessionState,
    identity: Option<IdentityEndpoints>,
    api: Option<Arc<GoogleApiClient>>,
    session: Option<Session>,
}

/// The single authority over the user's Google session
///
/// Construct one per application and share it by reference or `Arc`.
pub struct GoogleSession {
    settings: SessionSettings,
    transport: Arc<dyn HttpTransport>,
    consent: Arc<dyn ConsentPrompt>,
    grants: Arc<GrantRegistry>,
    inner: Mutex<Inner>,
}

impl GoogleSession {
    pub fn new(
        settings: SessionSettings,
        transport: Arc<dyn HttpTransport>,
        consent: Arc<dyn ConsentPrompt>,
    ) -> Self {
        Self {
            settings,
            transport,
            consent,
            grants: Arc::new(GrantRegistry::new()),
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                identity: None,
                api: None,
                session: None,
            }),
        }
    }

    /// Prepare the session against the loaded libraries
    ///
    /// Returns `Ok(None)` on first initialization (no session is restored).
    /// Calling it again once ready changes nothing and returns the current
    /// profile, if signed in. On error the state stays `Initializing`.
    pub fn initialize(&self, libraries: &Libraries) -> Result<Option<Profile>, SessionError> {
        {
            let mut inner = self.lock();
            if inner.state.is_ready() {
                debug!("Session already initialized");
                return Ok(inner.session.as_ref().map(|s| s.profile().clone()));
            }
            inner.state = SessionState::Initializing;
        }

        info!("Initializing Google session");
        let (identity, api) = self.prepare(libraries).inspect_err(|e| error!("{}", e))?;

        let mut inner = self.lock();
        inner.identity = Some(identity);
        inner.api = Some(Arc::new(api));
        inner.state = SessionState::SignedOut;
        info!("Google session ready");
        Ok(None)
    }

    fn prepare(
        &self,
        libraries: &Libraries,
    ) -> Result<(IdentityEndpoints, GoogleApiClient), SessionError> {
        if self.settings.client_id().is_none() {
            return Err(SessionError::MissingConfiguration {
                detail: "Google OAuth client ID is not configured (set GOOGLE_CLIENT_ID or provide google-credentials.json)".to_string(),
            });
        }

        let identity = IdentityEndpoints::from_configuration(&libraries.identity)?;

        let gmail = self
            .discover(libraries, "gmail", "v1")
            .map_err(|detail| SessionError::LibraryUnavailable { detail })?;

        let drive = match self.discover(libraries, "drive", "v3") {
            Ok(doc) => Some(doc),
            Err(detail) => {
                warn!("Drive API unavailable, document titles will need manual entry: {}", detail);
                None
            }
        };

        let endpoints = ServiceEndpoints::from_discovery(&gmail, drive.as_ref()).map_err(|e| {
            SessionError::LibraryUnavailable {
                detail: e.to_string(),
            }
        })?;

        Ok((identity, GoogleApiClient::new(Arc::clone(&self.transport), endpoints)))
    }

    /// Fetch a service description listed in the discovery directory
    fn discover(
        &self,
        libraries: &Libraries,
        name: &str,
        version: &str,
    ) -> Result<DiscoveryDocument, String> {
        let url = libraries
            .directory
            .discovery_url(name, version)
            .ok_or_else(|| format!("{} {} is not listed in the discovery directory", name, version))?;

        debug!("Loading {} {} discovery document", name, version);
        let response = self
            .transport
            .get(url, None)
            .map_err(|e| format!("Failed to load {} {}: {}", name, version, e))?;
        if !response.is_success() {
            return Err(format!(
                "Failed to load {} {}: HTTP {}",
                name, version, response.status
            ));
        }
        response
            .json()
            .map_err(|e| format!("Invalid {} {} discovery document: {}", name, version, e))
    }

    /// Run the interactive grant and establish a session
    ///
    /// Blocks until the consent prompt delivers the provider's answer for this
    /// particular request. Other sign-ins may be in flight at the same time.
    pub fn sign_in(&self) -> Result<Profile, SessionError> {
        let identity = {
            let inner = self.lock();
            match (&inner.identity, inner.state.is_ready()) {
                (Some(identity), true) => identity.clone(),
                _ => {
                    return Err(SessionError::Unknown {
                        detail: "Session is not initialized".to_string(),
                    });
                }
            }
        };
        let client_id = self
            .settings
            .client_id()
            .ok_or_else(|| SessionError::MissingConfiguration {
                detail: "Google OAuth client ID is not configured".to_string(),
            })?
            .to_string();

        let (responder, grant) = self.grants.register(correlation_id());
        let request = ConsentRequest {
            authorization_endpoint: identity.authorization.clone(),
            client_id: client_id.clone(),
            scopes: self.settings.scopes.clone(),
        };

        info!("Starting Google sign-in");
        self.consent.present(&request, responder)?;

        let response = grant.recv().map_err(|_| SessionError::Unknown {
            detail: "Sign-in was abandoned before the provider answered".to_string(),
        })?;

        if let Some(code) = response.error {
            let detail = match response.error_description {
                Some(description) => format!("{}: {}", code, description),
                None => code,
            };
            warn!("Sign-in denied: {}", detail);
            return Err(SessionError::TokenDenied { detail });
        }
        let code = response.code.ok_or_else(|| SessionError::Unknown {
            detail: "Provider answered without an authorization code".to_string(),
        })?;

        let token = self.exchange_code(&identity, &client_id, &code, &response.redirect_uri)?;
        let profile = self.fetch_profile(&identity, &token.access_token);
        let session = Session::from_grant(
            token.access_token,
            token.expires_in,
            token.scope.as_deref(),
            &self.settings.scopes,
            profile.clone(),
        );

        let mut inner = self.lock();
        inner.session = Some(session);
        inner.state = SessionState::SignedIn;
        info!("Signed in as {}", profile.display_name());
        Ok(profile)
    }

    fn exchange_code(
        &self,
        identity: &IdentityEndpoints,
        client_id: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, SessionError> {
        debug!("Exchanging authorization code for tokens");
        let mut form = vec![("client_id", client_id)];
        if let Some(secret) = self.settings.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        form.extend([
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ]);

        let response = self
            .transport
            .post_form(&identity.token, &form)
            .map_err(|e| SessionError::Unknown {
                detail: format!("Failed to exchange authorization code: {}", e),
            })?;

        if !response.is_success() {
            let failure = RemoteFailure::from_response(response.status, &response.body);
            warn!("Token exchange rejected: {}", failure);
            return Err(SessionError::TokenDenied {
                detail: failure.message,
            });
        }

        response.json().map_err(|e| SessionError::Unknown {
            detail: format!("Failed to parse token response: {}", e),
        })
    }

    /// Read the user's profile, falling back to a placeholder
    fn fetch_profile(&self, identity: &IdentityEndpoints, token: &str) -> Profile {
        let Some(url) = identity.userinfo.as_deref() else {
            warn!("Identity configuration has no userinfo endpoint, using placeholder profile");
            return Profile::placeholder();
        };

        let info = self
            .transport
            .get(url, Some(token))
            .map_err(|e| e.to_string())
            .and_then(|response| {
                if response.is_success() {
                    response.json::<UserInfo>().map_err(|e| e.to_string())
                } else {
                    Err(format!("HTTP {}", response.status))
                }
            });

        match info {
            Ok(info) => Profile {
                name: info.name,
                email: info.email,
                image_url: info.picture,
            },
            Err(e) => {
                warn!("Failed to fetch user profile, using placeholder: {}", e);
                Profile::placeholder()
            }
        }
    }

    /// End the session
    ///
    /// Revocation is best-effort; the local session is cleared regardless.
    /// Safe to call when nobody is signed in.
    pub fn sign_out(&self) {
        let (session, revocation) = {
            let mut inner = self.lock();
            let session = inner.session.take();
            if inner.state == SessionState::SignedIn {
                inner.state = SessionState::SignedOut;
            }
            let revocation = inner.identity.as_ref().and_then(|i| i.revocation.clone());
            (session, revocation)
        };

        let Some(session) = session else {
            debug!("Sign-out requested with no active session");
            return;
        };
        info!("Signing out {}", session.profile().display_name());

        let Some(url) = revocation else {
            warn!("No revocation endpoint, token left to expire");
            return;
        };
        match self.transport.post_form(&url, &[("token", session.access_token())]) {
            Ok(response) if response.is_success() => debug!("Token revoked"),
            Ok(response) => warn!("Token revocation returned HTTP {}", response.status),
            Err(e) => warn!("Token revocation failed: {}", e),
        }
    }

    /// Current access token, without checking expiry
    pub fn access_token(&self) -> Option<String> {
        self.lock()
            .session
            .as_ref()
            .map(|s| s.access_token().to_string())
    }

    /// Read-only snapshot of the current session
    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    pub fn is_active(&self) -> bool {
        self.lock().session.is_some()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Structured API client, available once initialized
    pub fn api(&self) -> Option<Arc<GoogleApiClient>> {
        self.lock().api.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fresh correlation id for one sign-in request
fn correlation_id() -> String {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);

    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(sequence);
    format!("{:016x}{:x}", hasher.finish(), sequence)
}
