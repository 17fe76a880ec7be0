//! Configuration loading for the drafts workflows
//!
//! Supports loading OAuth credentials from (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)
//!
//! Recipient lists live in their own file next to the credentials.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Credentials filename in the draftdesk config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Recipient lists filename in the draftdesk config directory
const RECIPIENTS_FILE: &str = "recipients.json";

const CLIENT_ID_ENV: &str = "GOOGLE_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "GOOGLE_CLIENT_SECRET";

/// OAuth client registration for Google sign-in
///
/// Installed-app clients may omit the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: Option<String>,
}

impl GoogleCredentials {
    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials
    /// 2. JSON file (~/.config/draftdesk/google-credentials.json)
    /// 3. Runtime environment variables
    ///
    /// Returns `Ok(None)` when none of them is present; a present but
    /// unreadable credentials file is an error.
    pub fn load() -> Result<Option<Self>> {
        if let Some(creds) = Self::from_compile_time() {
            debug!("Using compile-time Google credentials");
            return Ok(Some(creds));
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            debug!("Using Google credentials from {}", CREDENTIALS_FILE);
            return Self::from_credential_file(creds).map(Some);
        }

        Ok(Self::from_env())
    }

    /// Credentials embedded at build time.
    /// Build with: GOOGLE_CLIENT_ID=xxx cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID").filter(|id| !id.is_empty())?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")
            .filter(|secret| !secret.is_empty())
            .map(str::to_string);

        Some(Self {
            client_id: client_id.to_string(),
            client_secret,
        })
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        let section = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret.filter(|s| !s.is_empty()),
        })
    }

    /// Credentials from `GOOGLE_CLIENT_ID` (and optional `GOOGLE_CLIENT_SECRET`)
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var(CLIENT_ID_ENV).ok().filter(|id| !id.is_empty())?;
        let client_secret = std::env::var(CLIENT_SECRET_ENV)
            .ok()
            .filter(|secret| !secret.is_empty());

        Some(Self {
            client_id,
            client_secret,
        })
    }

    /// Get the default credentials file path (~/.config/draftdesk/google-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// Fixed recipient lists for generated drafts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipients {
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
}

impl Recipients {
    /// Load ~/.config/draftdesk/recipients.json, or empty lists if it does not exist
    pub fn load() -> Result<Self> {
        config::load_json_or_default(RECIPIENTS_FILE)
    }

    /// Load recipient lists from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    pub fn default_path() -> Option<PathBuf> {
        config::config_path(RECIPIENTS_FILE)
    }

    pub fn is_empty(&self) -> bool {
        self.to.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_installed_credentials() {
        let json = r#"{
            "installed": {
                "client_id": "test-client-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;

        let creds = GoogleCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret.as_deref(), Some("test-secret"));
    }

    #[test]
    fn test_parse_web_credentials_without_secret() {
        let json = r#"{ "web": { "client_id": "web-client-id.apps.googleusercontent.com" } }"#;

        let creds = GoogleCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, None);
    }

    #[test]
    fn test_invalid_json() {
        assert!(GoogleCredentials::from_json(r#"{ "other": {} }"#).is_err());
        assert!(GoogleCredentials::from_json("not json").is_err());
    }

    #[test]
    fn test_credentials_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, r#"{"installed": {"client_id": "file-id", "client_secret": ""}}"#).unwrap();

        let creds = GoogleCredentials::from_file(&path).unwrap();
        assert_eq!(creds.client_id, "file-id");
        assert_eq!(creds.client_secret, None);
    }

    #[test]
    fn test_recipients_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recipients.json");
        std::fs::write(&path, r#"{"to": ["a@example.com", "b@example.com"]}"#).unwrap();

        let recipients = Recipients::from_file(&path).unwrap();
        assert_eq!(recipients.to, vec!["a@example.com", "b@example.com"]);
        assert!(recipients.cc.is_empty());
        assert!(!recipients.is_empty());
        assert!(Recipients::default().is_empty());
    }
}
