//! Application wiring: transport, libraries, session and draft services

use anyhow::{Context, Result, bail};
use drafts::google::ConsentPrompt;
use drafts::{
    DraftComposer, DraftResult, EmailContent, GoogleCredentials, GoogleSession, HttpTransport,
    LibraryLoader, LoopbackConsent, Profile, Recipients, SessionSettings, TitleLookupOutcome,
    TitleResolver, UreqTransport,
};
use log::{debug, info};
use std::sync::Arc;

/// Composition root shared by the subcommands
///
/// Dropping the app signs out, revoking any token obtained during the run.
pub struct App {
    loader: LibraryLoader,
    session: GoogleSession,
    recipients: Recipients,
}

impl App {
    pub fn new(open_browser: bool) -> Result<Self> {
        let credentials = GoogleCredentials::load().context("Failed to load Google credentials")?;
        if credentials.is_none() {
            debug!(
                "No Google credentials found (expected {:?} or GOOGLE_CLIENT_ID)",
                GoogleCredentials::default_credentials_path()
            );
        }
        let recipients = Recipients::load().context("Failed to load recipients")?;

        let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::new());
        let consent: Arc<dyn ConsentPrompt> = if open_browser {
            Arc::new(LoopbackConsent::new())
        } else {
            Arc::new(LoopbackConsent::without_browser())
        };

        Ok(Self {
            loader: LibraryLoader::new(Arc::clone(&transport)),
            session: GoogleSession::new(
                SessionSettings::from_credentials(credentials.as_ref()),
                transport,
                consent,
            ),
            recipients,
        })
    }

    /// Load the libraries, initialize the session and sign in
    pub fn sign_in(&self) -> Result<Profile> {
        let libraries = self.loader.ensure_loaded()?;
        if let Some(profile) = self.session.initialize(&libraries)? {
            return Ok(profile);
        }
        let profile = self.session.sign_in()?;
        println!("Signed in as {}", profile.display_name());
        Ok(profile)
    }

    /// Look up a document title for the signed-in user
    pub fn resolve_title(&self, document_id: &str) -> Result<TitleLookupOutcome> {
        let Some(session) = self.session.session() else {
            bail!("Not signed in");
        };
        Ok(TitleResolver::new(self.session.api()).resolve_title(document_id, &session))
    }

    /// Create a draft addressed to the configured recipients
    pub fn create_draft(&self, content: EmailContent) -> Result<DraftResult> {
        if self.recipients.is_empty() {
            bail!(
                "No recipients configured; add a \"to\" list to {}",
                Recipients::default_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "recipients.json".to_string())
            );
        }
        let Some(session) = self.session.session() else {
            bail!("Not signed in");
        };

        let request = content.into_request(&self.recipients);
        let result = DraftComposer::new(self.session.api()).create_draft(&request, &session)?;
        info!("Draft {} created", result.id);
        Ok(result)
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.session.sign_out();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drafts::google::{ConsentRequest, GrantResponder, GrantResponse};
    use drafts::{SessionError, StaticTransport};

    const DIRECTORY_URL: &str = "https://discovery.test/apis";
    const IDENTITY_URL: &str = "https://accounts.test/openid";
    const REVOKE_URL: &str = "https://accounts.test/revoke";

    /// Grants consent as soon as it is asked
    struct InstantConsent;

    impl ConsentPrompt for InstantConsent {
        fn present(&self, _request: &ConsentRequest, responder: GrantResponder) -> Result<(), SessionError> {
            let code = format!("code-{}", responder.state());
            responder.respond(GrantResponse::authorized(code, "http://localhost:8080"));
            Ok(())
        }
    }

    fn transport() -> Arc<StaticTransport> {
        let transport = Arc::new(StaticTransport::new());
        transport
            .respond(
                "GET",
                DIRECTORY_URL,
                200,
                r#"{"items": [{ "name": "gmail", "version": "v1", "discoveryRestUrl": "https://discovery.test/gmail", "preferred": true }]}"#,
            )
            .respond(
                "GET",
                IDENTITY_URL,
                200,
                r#"{
                    "authorization_endpoint": "https://accounts.test/auth",
                    "token_endpoint": "https://accounts.test/token",
                    "userinfo_endpoint": "https://accounts.test/userinfo",
                    "revocation_endpoint": "https://accounts.test/revoke"
                }"#,
            )
            .respond(
                "GET",
                "https://discovery.test/gmail",
                200,
                r#"{
                    "name": "gmail", "version": "v1",
                    "rootUrl": "https://gmail.test/", "servicePath": "",
                    "resources": { "users": { "resources": { "drafts": { "methods": {
                        "create": { "path": "gmail/v1/users/{userId}/drafts", "httpMethod": "POST" }
                    } } } } }
                }"#,
            )
            .respond(
                "POST",
                "https://accounts.test/token",
                200,
                r#"{"access_token": "ya29.app", "expires_in": 3599, "token_type": "Bearer"}"#,
            )
            .respond("GET", "https://accounts.test/userinfo", 200, r#"{"name": "Editor"}"#)
            .respond("POST", REVOKE_URL, 200, "");
        transport
    }

    fn app(transport: &Arc<StaticTransport>, recipients: Recipients) -> App {
        App {
            loader: LibraryLoader::with_urls(transport.clone(), DIRECTORY_URL, IDENTITY_URL),
            session: GoogleSession::new(
                SessionSettings::new(Some("client-id".to_string()), None),
                transport.clone(),
                Arc::new(InstantConsent),
            ),
            recipients,
        }
    }

    #[test]
    fn test_drop_revokes_after_failed_step() {
        let transport = transport();
        let app = app(&transport, Recipients::default());

        let profile = app.sign_in().unwrap();
        assert_eq!(profile.display_name(), "Editor");

        let content = EmailContent {
            subject: "Hello".to_string(),
            body: "Body".to_string(),
        };
        assert!(app.create_draft(content).is_err());
        assert!(transport.requests_to(REVOKE_URL).is_empty());

        drop(app);
        let revocations = transport.requests_to(REVOKE_URL);
        assert_eq!(revocations.len(), 1);
        assert_eq!(revocations[0].body.as_deref(), Some("token=ya29.app"));
    }

    #[test]
    fn test_drop_without_sign_in_sends_nothing() {
        let transport = transport();
        drop(app(&transport, Recipients::default()));
        assert_eq!(transport.request_count(), 0);
    }
}
