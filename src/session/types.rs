use serde::{Deserialize, Serialize};

/// The client's authentication state.
///
/// `is_authenticated()` is derived from the access token, so it can never
/// disagree with it. Only the token store constructs non-empty sessions.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub(crate) access_token: Option<String>,
    pub(crate) refresh_token: Option<String>,
}

impl Session {
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub(crate) fn from_persisted(tokens: PersistedTokens) -> Self {
        Self {
            access_token: tokens.token.filter(|t| !t.is_empty()),
            refresh_token: tokens.refresh_token.filter(|t| !t.is_empty()),
        }
    }
}

// Token values stay out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("is_authenticated", &self.is_authenticated())
            .finish()
    }
}

/// On-disk shape of the session, keyed by the fixed storage names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(
        rename = "refreshToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<String>,
}

impl From<&Session> for PersistedTokens {
    fn from(session: &Session) -> Self {
        Self {
            token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
        }
    }
}
