//! Google API integration
//!
//! This module provides:
//! - Loading of the API client and identity libraries (discovery documents)
//! - OAuth2 session management with a loopback consent flow
//! - A REST client for the Gmail and Drive calls the drafts workflows need

mod auth;
mod client;
mod consent;
mod loader;

pub use auth::{GoogleSession, SessionSettings, SessionState};
pub use client::{GoogleApiClient, ServiceEndpoints};
pub use consent::{
    parse_callback, CallbackParams, ConsentPrompt, ConsentRequest, GrantRegistry, GrantResponder,
    GrantResponse, LoopbackConsent,
};
pub use loader::{Libraries, LibraryLoader};

/// OAuth scopes requested at sign-in
pub mod scopes {
    pub const GMAIL_COMPOSE: &str = "https://www.googleapis.com/auth/gmail.compose";
    pub const DRIVE_READONLY: &str = "https://www.googleapis.com/auth/drive.readonly";
    pub const USERINFO_PROFILE: &str = "https://www.googleapis.com/auth/userinfo.profile";
    pub const USERINFO_EMAIL: &str = "https://www.googleapis.com/auth/userinfo.email";

    /// Every scope the session asks for
    pub const ALL: [&str; 4] = [GMAIL_COMPOSE, DRIVE_READONLY, USERINFO_PROFILE, USERINFO_EMAIL];
}

/// Google API response types
pub mod api {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    /// Google API discovery directory (`discovery/v1/apis`)
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct DiscoveryDirectory {
        #[serde(default)]
        pub items: Vec<DirectoryItem>,
    }

    impl DiscoveryDirectory {
        /// Discovery document URL for an API name and version
        pub fn discovery_url(&self, name: &str, version: &str) -> Option<&str> {
            self.items
                .iter()
                .find(|item| item.name == name && item.version == version)
                .map(|item| item.discovery_rest_url.as_str())
        }
    }

    /// One API listed in the discovery directory
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DirectoryItem {
        pub name: String,
        pub version: String,
        pub discovery_rest_url: String,
        #[serde(default)]
        pub preferred: bool,
    }

    /// REST description of a single API
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DiscoveryDocument {
        pub name: String,
        pub version: String,
        pub root_url: String,
        #[serde(default)]
        pub service_path: String,
        #[serde(default)]
        pub resources: Value,
    }

    impl DiscoveryDocument {
        /// Absolute URL template of a method, e.g. `["users", "drafts"]` + `"create"`
        ///
        /// Path parameters (`{userId}`, `{fileId}`) are left in place.
        pub fn method_url(&self, resource_path: &[&str], method: &str) -> Option<String> {
            let (last, parents) = resource_path.split_last()?;
            let mut node = &self.resources;
            for name in parents {
                node = node.get(*name)?.get("resources")?;
            }
            let path = node
                .get(*last)?
                .get("methods")?
                .get(method)?
                .get("path")?
                .as_str()?;
            Some(format!("{}{}{}", self.root_url, self.service_path, path))
        }
    }

    /// OpenID provider configuration (`.well-known/openid-configuration`)
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct OpenIdConfiguration {
        pub issuer: Option<String>,
        pub authorization_endpoint: Option<String>,
        pub token_endpoint: Option<String>,
        pub userinfo_endpoint: Option<String>,
        pub revocation_endpoint: Option<String>,
    }

    /// Token endpoint response
    #[derive(Debug, Deserialize)]
    pub struct TokenResponse {
        pub access_token: String,
        pub expires_in: Option<i64>,
        pub scope: Option<String>,
        pub token_type: Option<String>,
    }

    /// OpenID userinfo response
    #[derive(Debug, Deserialize)]
    pub struct UserInfo {
        pub name: Option<String>,
        pub email: Option<String>,
        pub picture: Option<String>,
    }

    /// Drive file metadata restricted to the `name` field
    #[derive(Debug, Deserialize)]
    pub struct DriveFile {
        pub name: Option<String>,
    }

    /// Gmail `drafts.create` response
    #[derive(Debug, Deserialize)]
    pub struct DraftResponse {
        pub id: Option<String>,
        pub message: Option<MessageRef>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: Option<String>,
        pub thread_id: Option<String>,
    }
}
