//! REST client for the Gmail and Drive calls made on behalf of a session

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

use super::api::{DiscoveryDocument, DraftResponse, DriveFile};
use crate::error::{Error, RemoteFailure};
use crate::http::{HttpResponse, HttpTransport};

/// Method URLs resolved from the discovery documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    /// Gmail `users.drafts.create`, `{userId}` already bound to `me`
    pub drafts_create: String,
    /// Drive `files.get` template with a `{fileId}` placeholder; absent when Drive is unavailable
    pub files_get: Option<String>,
}

impl ServiceEndpoints {
    /// Resolve the endpoints from the Gmail and (optional) Drive descriptions
    pub fn from_discovery(
        gmail: &DiscoveryDocument,
        drive: Option<&DiscoveryDocument>,
    ) -> Result<Self, Error> {
        let drafts_create = gmail
            .method_url(&["users", "drafts"], "create")
            .ok_or_else(|| Error::Format {
                message: "Gmail discovery document has no users.drafts.create method".to_string(),
            })?
            .replace("{userId}", "me");

        let files_get = drive.and_then(|doc| {
            let url = doc.method_url(&["files"], "get");
            if url.is_none() {
                warn!("Drive discovery document has no files.get method");
            }
            url
        });

        Ok(Self {
            drafts_create,
            files_get,
        })
    }
}

/// Structured client over the discovered Gmail and Drive endpoints
pub struct GoogleApiClient {
    transport: Arc<dyn HttpTransport>,
    endpoints: ServiceEndpoints,
}

impl GoogleApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: ServiceEndpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    /// Whether the Drive service was loaded
    pub fn has_drive(&self) -> bool {
        self.endpoints.files_get.is_some()
    }

    /// Drive `files.get` restricted to the `name` field
    pub fn get_file_name(&self, file_id: &str, token: &str) -> Result<DriveFile, RemoteFailure> {
        let template = self.endpoints.files_get.as_deref().ok_or_else(|| RemoteFailure {
            status: None,
            reason: Some(RemoteFailure::NOT_CONFIGURED.to_string()),
            message: "Drive API is not available".to_string(),
        })?;

        let url = format!(
            "{}?fields=name",
            template.replace("{fileId}", &urlencoding::encode(file_id))
        );
        debug!("Fetching Drive file name for {}", file_id);
        self.get_json(&url, token)
    }

    /// Gmail `users.drafts.create` with an already-encoded raw message
    pub fn create_draft(&self, raw: &str, token: &str) -> Result<DraftResponse, RemoteFailure> {
        let body = json!({ "message": { "raw": raw } });
        debug!("Creating Gmail draft ({} bytes encoded)", raw.len());
        let response = self
            .transport
            .post_json(&self.endpoints.drafts_create, Some(token), &body)
            .map_err(|e| RemoteFailure::transport(e.to_string()))?;
        Self::decode(response)
    }

    /// Authorized GET of an arbitrary URL, returning the response as-is
    pub fn get_raw(&self, url: &str, token: &str) -> Result<HttpResponse, RemoteFailure> {
        self.transport
            .get(url, Some(token))
            .map_err(|e| RemoteFailure::transport(e.to_string()))
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, RemoteFailure> {
        let response = self.get_raw(url, token)?;
        Self::decode(response)
    }

    fn decode<T: DeserializeOwned>(response: HttpResponse) -> Result<T, RemoteFailure> {
        if !response.is_success() {
            return Err(RemoteFailure::from_response(response.status, &response.body));
        }
        response
            .json()
            .map_err(|e| RemoteFailure::malformed(response.status, format!("Failed to parse response: {}", e)))
    }
}
