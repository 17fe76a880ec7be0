//! Draft request and result values

use serde::{Deserialize, Serialize};

/// A plain-text draft to be created, consumed once by the composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRequest {
    to: Vec<String>,
    cc: Vec<String>,
    subject: String,
    body: String,
}

impl DraftRequest {
    pub fn new(
        to: Vec<String>,
        cc: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to,
            cc,
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn cc(&self) -> &[String] {
        &self.cc
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Identifiers of a draft created by Gmail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftResult {
    pub id: String,
    pub thread_id: String,
}

impl DraftResult {
    /// Prefix of the Gmail web link that opens a draft
    pub const OPEN_URL_PREFIX: &'static str = "https://mail.google.com/mail/u/0/#drafts?draft=";

    /// Link that opens this draft in Gmail
    pub fn url(&self) -> String {
        format!("{}{}", Self::OPEN_URL_PREFIX, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_url() {
        let result = DraftResult {
            id: "r-4242".to_string(),
            thread_id: "18c0".to_string(),
        };
        assert_eq!(result.url(), "https://mail.google.com/mail/u/0/#drafts?draft=r-4242");
    }

    #[test]
    fn test_request_accessors() {
        let request = DraftRequest::new(
            vec!["a@x.com".to_string()],
            vec![],
            "Subject",
            "Body",
        );
        assert_eq!(request.to(), ["a@x.com".to_string()]);
        assert!(request.cc().is_empty());
        assert_eq!(request.subject(), "Subject");
        assert_eq!(request.body(), "Body");
    }
}
