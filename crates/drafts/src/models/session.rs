//! Session model holding the signed-in user's access token

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Basic profile of the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
}

impl Profile {
    /// Profile used when the userinfo endpoint could not be read
    pub fn placeholder() -> Self {
        Self {
            name: Some("User".to_string()),
            email: None,
            image_url: None,
        }
    }

    /// Name for display: the profile name, else the email, else "User"
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("User")
    }
}

/// A live OAuth session
///
/// Owned by [`crate::google::GoogleSession`]; other components only ever see
/// read-only snapshots.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
    expiry: DateTime<Utc>,
    granted_scopes: BTreeSet<String>,
    profile: Profile,
}

impl Session {
    /// Token lifetime assumed when the provider omits `expires_in`
    pub const DEFAULT_LIFETIME_SECS: i64 = 3600;

    pub fn new<I, S>(
        access_token: impl Into<String>,
        expiry: DateTime<Utc>,
        granted_scopes: I,
        profile: Profile,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            access_token: access_token.into(),
            expiry,
            granted_scopes: granted_scopes.into_iter().map(Into::into).collect(),
            profile,
        }
    }

    /// Build a session from a token grant issued now
    ///
    /// `scope` is the space-separated scope string returned by the provider;
    /// when absent, `requested` is assumed granted. A missing or
    /// unrepresentable lifetime falls back to one hour.
    pub fn from_grant(
        access_token: impl Into<String>,
        expires_in: Option<i64>,
        scope: Option<&str>,
        requested: &[String],
        profile: Profile,
    ) -> Self {
        let now = Utc::now();
        let expiry = expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or_else(|| now + Duration::seconds(Self::DEFAULT_LIFETIME_SECS));
        match scope {
            Some(scope) => Self::new(access_token, expiry, scope.split_whitespace(), profile),
            None => Self::new(access_token, expiry, requested.iter().cloned(), profile),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn granted_scopes(&self) -> &BTreeSet<String> {
        &self.granted_scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.granted_scopes.contains(scope)
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Whether the token's expiry has passed
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("granted_scopes", &self.granted_scopes)
            .field("profile", &self.profile)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_grant_splits_scopes() {
        let session = Session::from_grant(
            "ya29.token",
            Some(1800),
            Some("openid https://www.googleapis.com/auth/gmail.compose"),
            &[],
            Profile::placeholder(),
        );
        assert_eq!(session.access_token(), "ya29.token");
        assert_eq!(session.granted_scopes().len(), 2);
        assert!(session.has_scope("https://www.googleapis.com/auth/gmail.compose"));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_from_grant_defaults() {
        let requested = vec!["scope-a".to_string(), "scope-b".to_string()];
        let session = Session::from_grant("tok", None, None, &requested, Profile::default());
        assert!(session.has_scope("scope-a"));
        assert!(session.has_scope("scope-b"));

        let remaining = session.expiry() - Utc::now();
        assert!(remaining.num_seconds() > 3500);
    }

    #[test]
    fn test_from_grant_out_of_range_lifetime() {
        for expires_in in [i64::MAX, i64::MIN] {
            let session = Session::from_grant("tok", Some(expires_in), None, &[], Profile::default());
            let remaining = session.expiry() - Utc::now();
            assert!(remaining.num_seconds() > 3500);
            assert!(remaining.num_seconds() <= 3600);
        }
    }

    #[test]
    fn test_expired_session() {
        let session = Session::new(
            "tok",
            Utc::now() - Duration::seconds(1),
            ["scope"],
            Profile::default(),
        );
        assert!(session.is_expired());
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::new("secret-token", Utc::now(), ["scope"], Profile::default());
        let debug = format!("{:?}", session);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut profile = Profile::default();
        assert_eq!(profile.display_name(), "User");

        profile.email = Some("me@example.com".to_string());
        assert_eq!(profile.display_name(), "me@example.com");

        profile.name = Some("Me".to_string());
        assert_eq!(profile.display_name(), "Me");
    }
}
