//! Draft templates for the two request workflows
//!
//! - `video_check`: ask reviewers to check an edited video
//! - `shooting_plan`: share the plan list for the next shoot

pub mod shooting_plan;
pub mod video_check;

pub use shooting_plan::ShootingPlan;
pub use video_check::{VideoCheck, VideoLinks};

use chrono::Weekday;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::config::Recipients;
use crate::models::DraftRequest;

static YOUTUBE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com/watch\?v=|youtu\.be/)[A-Za-z0-9_-]+(\S+)?$")
        .expect("YouTube URL pattern")
});

static GOOGLE_DOCS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(docs\.google\.com/document/d/)[A-Za-z0-9_-]+(\S+)?$")
        .expect("Google Docs URL pattern")
});

static DOCUMENT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/document/d/([a-zA-Z0-9_-]+)").expect("document id pattern"));

/// Input rejected before any draft is built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("全てのフィールドを入力してください。 (Please fill in all fields.)")]
    MissingFields,

    #[error("有効なYouTube動画URLを入力してください。 (Please enter a valid YouTube video URL.)")]
    InvalidVideoUrl,

    #[error("有効なGoogleドキュメントURLを入力してください。 (Please enter a valid Google Docs URL.)")]
    InvalidDocumentUrl,

    #[error("企画を最低1つ入力してください。 (Please enter at least one project.)")]
    NoProjects,
}

/// Whether `url` is a YouTube watch or short link
pub fn is_youtube_url(url: &str) -> bool {
    YOUTUBE_PATTERN.is_match(url)
}

/// Whether `url` is a Google Docs document link
pub fn is_google_docs_url(url: &str) -> bool {
    GOOGLE_DOCS_PATTERN.is_match(url)
}

/// Document id from a `/document/d/<id>` link
pub fn extract_document_id(url: &str) -> Option<&str> {
    DOCUMENT_ID_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Short Japanese weekday name (`日`, `月`, ...)
pub fn weekday_ja(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sun => "日",
        Weekday::Mon => "月",
        Weekday::Tue => "火",
        Weekday::Wed => "水",
        Weekday::Thu => "木",
        Weekday::Fri => "金",
        Weekday::Sat => "土",
    }
}

/// Rendered subject and body, not yet addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

impl EmailContent {
    /// Address the content to the configured recipients
    pub fn into_request(self, recipients: &Recipients) -> DraftRequest {
        DraftRequest::new(
            recipients.to.clone(),
            recipients.cc.clone(),
            self.subject,
            self.body,
        )
    }
}
