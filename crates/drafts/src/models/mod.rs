//! Domain models for sessions and drafts

mod draft;
mod session;

pub use draft::{DraftRequest, DraftResult};
pub use session::{Profile, Session};
