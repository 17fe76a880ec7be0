//! Drafts crate - Google session and Gmail draft construction
//!
//! This crate provides:
//! - Loading of the Google API client and identity libraries
//! - OAuth2 session management with pluggable consent prompts
//! - Document title lookup through the Drive API with a direct-request fallback
//! - RFC 2822 draft construction and Gmail draft creation
//! - Templates for the video-check and shooting-plan requests
//!
//! All network access goes through [`http::HttpTransport`]; calls are
//! blocking and executor-agnostic.

pub mod compose;
pub mod config;
pub mod error;
pub mod google;
pub mod http;
pub mod models;
pub mod templates;
pub mod title;

pub use crate::config::{GoogleCredentials, Recipients};
pub use compose::{DraftComposer, build_message, encode_raw, encode_subject};
pub use error::{Error, Library, RemoteFailure, SessionError};
pub use google::{
    ConsentPrompt, GoogleApiClient, GoogleSession, Libraries, LibraryLoader, LoopbackConsent,
    SessionSettings, SessionState,
};
pub use http::{HttpResponse, HttpTransport, StaticTransport, TransportError, UreqTransport};
pub use models::{DraftRequest, DraftResult, Profile, Session};
pub use templates::{EmailContent, FormError, ShootingPlan, VideoCheck, VideoLinks};
pub use title::{TitleLookupOutcome, TitleResolver};
