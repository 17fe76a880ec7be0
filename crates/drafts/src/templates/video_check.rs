//! Video check request
//!
//! Reviewers get the video link, the editing instructions and a deadline two
//! days out. The title comes from the instruction document's name.

use chrono::{Datelike, Duration, NaiveDate};
use log::info;

use super::{EmailContent, FormError, extract_document_id, is_google_docs_url, is_youtube_url, weekday_ja};

/// Marker stripped from instruction document names
const INSTRUCTION_MARKER: &str = "【指示書】";

/// Days between today and the review deadline
const DEADLINE_DAYS: i64 = 2;

/// Validated video and instruction links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLinks {
    video_url: String,
    instruction_url: String,
}

impl VideoLinks {
    /// Validate both links
    ///
    /// Inputs are trimmed. When the two links were entered the wrong way
    /// round they are swapped back.
    pub fn parse(video_url: &str, instruction_url: &str) -> Result<Self, FormError> {
        let mut video_url = video_url.trim();
        let mut instruction_url = instruction_url.trim();
        if video_url.is_empty() || instruction_url.is_empty() {
            return Err(FormError::MissingFields);
        }

        if is_youtube_url(instruction_url) && is_google_docs_url(video_url) {
            info!("Video and instruction links were swapped, correcting");
            std::mem::swap(&mut video_url, &mut instruction_url);
        }

        if !is_youtube_url(video_url) {
            return Err(FormError::InvalidVideoUrl);
        }
        if !is_google_docs_url(instruction_url) {
            return Err(FormError::InvalidDocumentUrl);
        }

        Ok(Self {
            video_url: video_url.to_string(),
            instruction_url: instruction_url.to_string(),
        })
    }

    pub fn video_url(&self) -> &str {
        &self.video_url
    }

    pub fn instruction_url(&self) -> &str {
        &self.instruction_url
    }

    /// Drive id of the instruction document
    pub fn document_id(&self) -> Option<&str> {
        extract_document_id(&self.instruction_url)
    }
}

/// A video check request ready to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCheck {
    links: VideoLinks,
    title: String,
    deadline: NaiveDate,
}

impl VideoCheck {
    /// Build the request from the instruction document's name
    pub fn new(links: VideoLinks, document_name: &str, today: NaiveDate) -> Result<Self, FormError> {
        let title = derive_title(document_name);
        if document_name.trim().is_empty() {
            return Err(FormError::MissingFields);
        }

        Ok(Self {
            links,
            title,
            deadline: today + Duration::days(DEADLINE_DAYS),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Deadline as `MM/DD (曜)`
    pub fn formatted_deadline(&self) -> String {
        format!(
            "{} ({})",
            self.deadline.format("%m/%d"),
            weekday_ja(self.deadline.weekday())
        )
    }

    pub fn render(&self) -> EmailContent {
        let title = &self.title;
        let body = format!(
            "皆さま\n\
             \n\
             いつもお世話になっております。\n\
             \n\
             ーーー\n\
             {title}\n\
             ーーー\n\
             \n\
             動画チェックお願いいたします！\n\
             \n\
             ーーー\n\
             ▼{title}\n\
             ◆動画：{video}\n\
             ◆編集指示書：{instruction}\n\
             ◆補足：\n\
             ーーー\n\
             \n\
             お忙しいところ恐縮ですが、{deadline}中までにご確認いただけますと幸いです。よろしくお願いいたします。",
            video = self.links.video_url(),
            instruction = self.links.instruction_url(),
            deadline = self.formatted_deadline(),
        );

        EmailContent {
            subject: format!("動画チェック依頼: {}", title),
            body,
        }
    }
}

/// Title shown in the request: the document name without the instruction marker
pub fn derive_title(document_name: &str) -> String {
    document_name.replace(INSTRUCTION_MARKER, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO: &str = "https://youtu.be/abc123";
    const DOC: &str = "https://docs.google.com/document/d/1DocId_x/edit";

    #[test]
    fn test_parse_links() {
        let links = VideoLinks::parse(&format!("  {} ", VIDEO), DOC).unwrap();
        assert_eq!(links.video_url(), VIDEO);
        assert_eq!(links.document_id(), Some("1DocId_x"));
    }

    #[test]
    fn test_parse_swapped_links() {
        let links = VideoLinks::parse(DOC, VIDEO).unwrap();
        assert_eq!(links.video_url(), VIDEO);
        assert_eq!(links.instruction_url(), DOC);
    }

    #[test]
    fn test_parse_invalid_links() {
        assert_eq!(VideoLinks::parse("", DOC), Err(FormError::MissingFields));
        assert_eq!(
            VideoLinks::parse("https://vimeo.com/1", DOC),
            Err(FormError::InvalidVideoUrl)
        );
        assert_eq!(
            VideoLinks::parse(VIDEO, "https://example.com/doc"),
            Err(FormError::InvalidDocumentUrl)
        );
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("【指示書】 第12話 "), "第12話");
        assert_eq!(derive_title("前編【指示書】後編【指示書】"), "前編後編");
        assert_eq!(derive_title("Plain"), "Plain");
    }

    #[test]
    fn test_deadline_is_two_days_out() {
        let links = VideoLinks::parse(VIDEO, DOC).unwrap();
        // 2024-03-08 is a Friday
        let today = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let check = VideoCheck::new(links, "Doc", today).unwrap();
        assert_eq!(check.formatted_deadline(), "03/10 (日)");
    }

    #[test]
    fn test_empty_document_name() {
        let links = VideoLinks::parse(VIDEO, DOC).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        assert_eq!(
            VideoCheck::new(links, "  ", today),
            Err(FormError::MissingFields)
        );
    }

    #[test]
    fn test_render() {
        let links = VideoLinks::parse(VIDEO, DOC).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let content = VideoCheck::new(links, "【指示書】新春企画", today).unwrap().render();

        assert_eq!(content.subject, "動画チェック依頼: 新春企画");
        assert!(content.body.starts_with("皆さま\n\nいつもお世話になっております。\n\nーーー\n新春企画\nーーー\n"));
        assert!(content.body.contains(&format!("▼新春企画\n◆動画：{}\n◆編集指示書：{}\n◆補足：\n", VIDEO, DOC)));
        assert!(content.body.ends_with("01/01 (水)中までにご確認いただけますと幸いです。よろしくお願いいたします。"));
    }
}
