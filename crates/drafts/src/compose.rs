//! RFC 2822 draft construction and submission
//!
//! Messages are plain-text UTF-8. Non-ASCII subjects use an RFC 2047
//! encoded-word; the whole message is base64url-encoded (no padding) for the
//! Gmail `raw` field.

use base64::prelude::*;
use log::{debug, info};
use std::borrow::Cow;
use std::sync::Arc;

use crate::error::{Error, RemoteFailure};
use crate::google::GoogleApiClient;
use crate::models::{DraftRequest, DraftResult, Session};

/// Encode a subject for a message header
///
/// Printable ASCII passes through unchanged; anything else becomes
/// `=?UTF-8?B?<base64>?=` over the UTF-8 bytes.
pub fn encode_subject(subject: &str) -> Cow<'_, str> {
    if subject.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        Cow::Borrowed(subject)
    } else {
        Cow::Owned(format!("=?UTF-8?B?{}?=", BASE64_STANDARD.encode(subject)))
    }
}

/// Assemble the CRLF-delimited message text for a draft
pub fn build_message(request: &DraftRequest) -> String {
    [
        format!("To: {}", request.to().join(",")),
        format!("Cc: {}", request.cc().join(",")),
        format!("Subject: {}", encode_subject(request.subject())),
        "Content-Type: text/plain; charset=UTF-8".to_string(),
        "MIME-Version: 1.0".to_string(),
        String::new(),
        request.body().to_string(),
    ]
    .join("\r\n")
}

/// Base64url (no padding) over the UTF-8 bytes of `message`
pub fn encode_raw(message: &str) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(message)
}

/// Creates Gmail drafts for a signed-in session
pub struct DraftComposer {
    api: Option<Arc<GoogleApiClient>>,
}

impl DraftComposer {
    /// `api` is `None` when the session never initialized its API client
    pub fn new(api: Option<Arc<GoogleApiClient>>) -> Self {
        Self { api }
    }

    /// Create one draft; nothing is retried
    pub fn create_draft(&self, request: &DraftRequest, session: &Session) -> Result<DraftResult, Error> {
        if session.access_token().is_empty() || session.is_expired() {
            return Err(Error::Auth {
                message: "Session has expired, sign in again".to_string(),
            });
        }
        validate_recipients(request)?;

        let api = self.api.as_ref().ok_or_else(|| Error::Configuration {
            message: "Gmail API client is not initialized".to_string(),
        })?;

        let raw = encode_raw(&build_message(request));
        debug!(
            "Creating draft for {} recipient(s), {} cc",
            request.to().len(),
            request.cc().len()
        );

        let response = api
            .create_draft(&raw, session.access_token())
            .map_err(|failure| failure.classify())?;

        let id = response.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            RemoteFailure::malformed(200, "Draft response did not include an id").classify()
        })?;
        let thread_id = response
            .message
            .and_then(|m| m.thread_id)
            .unwrap_or_default();

        info!("Created draft {}", id);
        Ok(DraftResult { id, thread_id })
    }
}

fn validate_recipients(request: &DraftRequest) -> Result<(), Error> {
    if request.to().is_empty() {
        return Err(Error::Configuration {
            message: "No recipients configured".to_string(),
        });
    }

    let header_break = request
        .to()
        .iter()
        .chain(request.cc())
        .find(|address| address.contains(['\r', '\n']));
    if let Some(address) = header_break {
        return Err(Error::Configuration {
            message: format!("Recipient contains a line break: {:?}", address),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::ServiceEndpoints;
    use crate::http::StaticTransport;
    use crate::models::Profile;
    use chrono::{Duration, Utc};

    const DRAFTS_URL: &str = "https://gmail.test/gmail/v1/users/me/drafts";

    fn composer(transport: &Arc<StaticTransport>) -> DraftComposer {
        let endpoints = ServiceEndpoints {
            drafts_create: DRAFTS_URL.to_string(),
            files_get: None,
        };
        DraftComposer::new(Some(Arc::new(GoogleApiClient::new(transport.clone(), endpoints))))
    }

    fn session() -> Session {
        Session::new("tok", Utc::now() + Duration::hours(1), ["scope"], Profile::default())
    }

    fn request(to: &[&str], cc: &[&str]) -> DraftRequest {
        DraftRequest::new(
            to.iter().map(|s| s.to_string()).collect(),
            cc.iter().map(|s| s.to_string()).collect(),
            "Hello",
            "Body",
        )
    }

    #[test]
    fn test_encode_subject_ascii_unchanged() {
        assert!(matches!(encode_subject("Weekly update"), Cow::Borrowed("Weekly update")));
        assert_eq!(encode_subject(""), "");
    }

    #[test]
    fn test_encode_subject_non_ascii() {
        assert_eq!(encode_subject("テスト"), "=?UTF-8?B?44OG44K544OI?=");

        let encoded = encode_subject("動画チェック依頼: 第1話");
        let inner = encoded
            .strip_prefix("=?UTF-8?B?")
            .and_then(|s| s.strip_suffix("?="))
            .unwrap();
        let decoded = BASE64_STANDARD.decode(inner).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "動画チェック依頼: 第1話");
    }

    #[test]
    fn test_encode_subject_control_characters() {
        assert!(encode_subject("tab\there").starts_with("=?UTF-8?B?"));
    }

    #[test]
    fn test_build_message() {
        let request = DraftRequest::new(
            vec!["a@x.com".to_string(), "b@x.com".to_string()],
            vec!["c@x.com".to_string()],
            "Hi",
            "Line 1\nLine 2",
        );
        assert_eq!(
            build_message(&request),
            "To: a@x.com,b@x.com\r\nCc: c@x.com\r\nSubject: Hi\r\n\
             Content-Type: text/plain; charset=UTF-8\r\nMIME-Version: 1.0\r\n\r\nLine 1\nLine 2"
        );
    }

    #[test]
    fn test_build_message_keeps_empty_cc_header() {
        let message = build_message(&request(&["a@x.com"], &[]));
        assert!(message.starts_with("To: a@x.com\r\nCc: \r\nSubject: Hello\r\n"));
        assert!(message.lines().any(|line| line.starts_with("Cc:")));
    }

    #[test]
    fn test_encode_raw_is_url_safe_without_padding() {
        let raw = encode_raw("Subject: ??>>\r\n\r\nテスト");
        assert!(!raw.contains(['+', '/', '=']));

        let decoded = BASE64_URL_SAFE_NO_PAD.decode(&raw).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "Subject: ??>>\r\n\r\nテスト");
    }

    #[test]
    fn test_create_draft() {
        let transport = Arc::new(StaticTransport::new());
        transport.respond(
            "POST",
            DRAFTS_URL,
            200,
            r#"{"id": "r-99", "message": {"id": "m-1", "threadId": "t-7"}}"#,
        );

        let result = composer(&transport)
            .create_draft(&request(&["a@x.com"], &["c@x.com"]), &session())
            .unwrap();
        assert_eq!(
            result,
            DraftResult {
                id: "r-99".to_string(),
                thread_id: "t-7".to_string()
            }
        );

        let requests = transport.requests();
        let body: serde_json::Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        let raw = body["message"]["raw"].as_str().unwrap();
        let message = String::from_utf8(BASE64_URL_SAFE_NO_PAD.decode(raw).unwrap()).unwrap();
        assert!(message.starts_with("To: a@x.com\r\nCc: c@x.com\r\n"));
        assert_eq!(requests[0].bearer.as_deref(), Some("tok"));
    }

    #[test]
    fn test_create_draft_missing_thread_id() {
        let transport = Arc::new(StaticTransport::new());
        transport.respond("POST", DRAFTS_URL, 200, r#"{"id": "r-1"}"#);

        let result = composer(&transport)
            .create_draft(&request(&["a@x.com"], &[]), &session())
            .unwrap();
        assert_eq!(result.thread_id, "");
    }

    #[test]
    fn test_create_draft_missing_id() {
        let transport = Arc::new(StaticTransport::new());
        transport.respond("POST", DRAFTS_URL, 200, r#"{"message": {"threadId": "t"}}"#);

        let err = composer(&transport)
            .create_draft(&request(&["a@x.com"], &[]), &session())
            .unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_create_draft_preconditions() {
        let transport = Arc::new(StaticTransport::new());
        let composer = composer(&transport);

        let expired = Session::new("tok", Utc::now() - Duration::seconds(5), ["scope"], Profile::default());
        let err = composer.create_draft(&request(&["a@x.com"], &[]), &expired).unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));

        let err = composer.create_draft(&request(&[], &[]), &session()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        let err = composer
            .create_draft(&request(&["a@x.com\r\nBcc: evil@x.com"], &[]), &session())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_create_draft_failures_are_classified() {
        let cases = [
            (401, r#"{"error": {"code": 401, "message": "Invalid Credentials"}}"#),
            (403, r#"{"error": {"code": 403, "message": "Insufficient Permission"}}"#),
            (500, r#"{"error": {"code": 500, "message": "Backend Error"}}"#),
        ];

        let mut errors = Vec::new();
        for (status, body) in cases {
            let transport = Arc::new(StaticTransport::new());
            transport.respond("POST", DRAFTS_URL, status, body);
            errors.push(
                composer(&transport)
                    .create_draft(&request(&["a@x.com"], &[]), &session())
                    .unwrap_err(),
            );
        }

        assert_eq!(
            errors,
            vec![
                Error::Auth {
                    message: "Invalid Credentials".to_string()
                },
                Error::Permission {
                    message: "Insufficient Permission".to_string()
                },
                Error::Network {
                    message: "Backend Error".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_create_draft_transport_failure() {
        let transport = Arc::new(StaticTransport::new());
        transport.fail("POST", DRAFTS_URL, "connection reset");

        let err = composer(&transport)
            .create_draft(&request(&["a@x.com"], &[]), &session())
            .unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
    }
}
