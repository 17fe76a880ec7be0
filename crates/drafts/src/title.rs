//! Document title lookup with a raw-request fallback
//!
//! The structured Drive call is tried first. When it fails for a reason other
//! than the API being disabled, a plain bearer-token request is made against
//! the public Drive endpoint before giving up.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::error::RemoteFailure;
use crate::google::GoogleApiClient;
use crate::google::api::DriveFile;
use crate::models::Session;

/// Drive v3 `files` collection used by the fallback request
pub const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

/// Outcome of a title lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleLookupOutcome {
    Resolved(String),
    ApiDisabled,
    PermissionDenied,
    NetworkFailure,
    NotFound,
}

impl TitleLookupOutcome {
    /// Whether the user has to type the title in
    pub fn needs_manual_entry(&self) -> bool {
        !matches!(self, TitleLookupOutcome::Resolved(_))
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            TitleLookupOutcome::Resolved(title) => Some(title),
            _ => None,
        }
    }

    /// Explanation suitable for showing next to a manual-entry prompt
    pub fn explanation(&self) -> &'static str {
        match self {
            TitleLookupOutcome::Resolved(_) => "Document title retrieved.",
            TitleLookupOutcome::ApiDisabled => {
                "The Google Drive API is not enabled for this project. Enter the document title manually."
            }
            TitleLookupOutcome::PermissionDenied => {
                "You do not have permission to read this document. Enter the document title manually."
            }
            TitleLookupOutcome::NetworkFailure => {
                "The document title could not be retrieved. Enter the document title manually."
            }
            TitleLookupOutcome::NotFound => {
                "The document has no title. Enter the document title manually."
            }
        }
    }
}

impl From<DriveFile> for TitleLookupOutcome {
    fn from(file: DriveFile) -> Self {
        match file.name {
            Some(name) => TitleLookupOutcome::Resolved(name),
            None => TitleLookupOutcome::NotFound,
        }
    }
}

/// Resolves a document id to its title on behalf of a signed-in session
pub struct TitleResolver {
    api: Option<Arc<GoogleApiClient>>,
    fallback_url: String,
}

impl TitleResolver {
    /// `api` is `None` when the session never initialized its API client
    pub fn new(api: Option<Arc<GoogleApiClient>>) -> Self {
        Self::with_fallback_url(api, DRIVE_FILES_URL)
    }

    /// Resolver whose raw fallback targets a custom `files` collection
    pub fn with_fallback_url(api: Option<Arc<GoogleApiClient>>, fallback_url: impl Into<String>) -> Self {
        Self {
            api,
            fallback_url: fallback_url.into(),
        }
    }

    /// Look up the title of `document_id`
    ///
    /// Never fails; every failure is folded into the outcome. Nothing is
    /// retried or cached.
    pub fn resolve_title(&self, document_id: &str, session: &Session) -> TitleLookupOutcome {
        let api = match &self.api {
            Some(api) if api.has_drive() => api,
            _ => {
                info!("Drive API not loaded, title lookup skipped");
                return TitleLookupOutcome::ApiDisabled;
            }
        };

        let token = session.access_token();
        let failure = match api.get_file_name(document_id, token) {
            Ok(file) => return file.into(),
            Err(failure) => failure,
        };

        if failure.indicates_api_disabled() || failure.status == Some(403) {
            warn!("Drive API rejected title lookup: {}", failure);
            return TitleLookupOutcome::ApiDisabled;
        }

        debug!("Structured title lookup failed ({}), trying direct request", failure);
        self.fetch_directly(api, document_id, token)
    }

    fn fetch_directly(&self, api: &GoogleApiClient, document_id: &str, token: &str) -> TitleLookupOutcome {
        let url = format!(
            "{}/{}?fields=name",
            self.fallback_url,
            urlencoding::encode(document_id)
        );

        let response = match api.get_raw(&url, token) {
            Ok(response) => response,
            Err(failure) => {
                warn!("Direct title lookup failed: {}", failure);
                return TitleLookupOutcome::NetworkFailure;
            }
        };

        match response.status {
            200 => match response.json::<DriveFile>() {
                Ok(file) => file.into(),
                Err(e) => {
                    warn!("Direct title lookup returned an unreadable body: {}", e);
                    TitleLookupOutcome::NetworkFailure
                }
            },
            403 => {
                let failure = RemoteFailure::from_response(response.status, &response.body);
                warn!("No permission to read document {}: {}", document_id, failure.message);
                TitleLookupOutcome::PermissionDenied
            }
            status => {
                warn!("Direct title lookup returned HTTP {}", status);
                TitleLookupOutcome::NetworkFailure
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::ServiceEndpoints;
    use crate::http::StaticTransport;
    use crate::models::Profile;
    use chrono::{Duration, Utc};

    const FILES_GET: &str = "https://drive.test/drive/v3/files/{fileId}";
    const FALLBACK: &str = "https://fallback.test/files";

    fn resolver(transport: &Arc<StaticTransport>, drive: bool) -> TitleResolver {
        let endpoints = ServiceEndpoints {
            drafts_create: "https://gmail.test/drafts".to_string(),
            files_get: drive.then(|| FILES_GET.to_string()),
        };
        let api = GoogleApiClient::new(transport.clone(), endpoints);
        TitleResolver::with_fallback_url(Some(Arc::new(api)), FALLBACK)
    }

    fn session() -> Session {
        Session::new("tok", Utc::now() + Duration::hours(1), ["scope"], Profile::default())
    }

    #[test]
    fn test_outcome_helpers() {
        let resolved = TitleLookupOutcome::Resolved("Doc".to_string());
        assert!(!resolved.needs_manual_entry());
        assert_eq!(resolved.title(), Some("Doc"));

        for outcome in [
            TitleLookupOutcome::ApiDisabled,
            TitleLookupOutcome::PermissionDenied,
            TitleLookupOutcome::NetworkFailure,
            TitleLookupOutcome::NotFound,
        ] {
            assert!(outcome.needs_manual_entry());
            assert_eq!(outcome.title(), None);
            assert!(outcome.explanation().contains("manually"));
        }
    }

    #[test]
    fn test_resolved_through_structured_call() {
        let transport = Arc::new(StaticTransport::new());
        transport.respond("GET", "https://drive.test/", 200, r#"{"name": "【指示書】Episode 12"}"#);

        let outcome = resolver(&transport, true).resolve_title("abc", &session());
        assert_eq!(outcome, TitleLookupOutcome::Resolved("【指示書】Episode 12".to_string()));
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_structured_call_without_name() {
        let transport = Arc::new(StaticTransport::new());
        transport.respond("GET", "https://drive.test/", 200, "{}");

        let outcome = resolver(&transport, true).resolve_title("abc", &session());
        assert_eq!(outcome, TitleLookupOutcome::NotFound);
    }

    #[test]
    fn test_no_api_client() {
        let outcome = TitleResolver::new(None).resolve_title("abc", &session());
        assert_eq!(outcome, TitleLookupOutcome::ApiDisabled);
    }

    #[test]
    fn test_fallback_unreadable_body() {
        let transport = Arc::new(StaticTransport::new());
        transport
            .respond("GET", "https://drive.test/", 500, "")
            .respond("GET", FALLBACK, 200, "<html>");

        let outcome = resolver(&transport, true).resolve_title("abc", &session());
        assert_eq!(outcome, TitleLookupOutcome::NetworkFailure);

        let fallback = transport.requests_to(FALLBACK);
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback[0].url, "https://fallback.test/files/abc?fields=name");
        assert_eq!(fallback[0].bearer.as_deref(), Some("tok"));
    }

    #[test]
    fn test_fallback_other_status() {
        let transport = Arc::new(StaticTransport::new());
        transport
            .fail("GET", "https://drive.test/", "timed out")
            .respond("GET", FALLBACK, 404, r#"{"error": {"code": 404, "message": "File not found"}}"#);

        let outcome = resolver(&transport, true).resolve_title("abc", &session());
        assert_eq!(outcome, TitleLookupOutcome::NetworkFailure);
    }
}
