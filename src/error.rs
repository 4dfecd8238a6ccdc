use serde::Serialize;
use thiserror::Error;

/// Failure of a single outbound request, as classified by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// 401 with `code: "token_not_valid"`. The only failure that triggers a refresh.
    #[error("Access token expired")]
    TokenExpired,

    #[error("Request failed ({status}): {reason}")]
    RequestFailed { status: u16, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("Session expired, please log in again")]
    SessionExpired,
}

/// Failure reading or writing persisted tokens.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keychain(String),
}

/// One form field and its server-provided messages, in server order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn single(field: &str, message: &str) -> Self {
        Self(vec![FieldError {
            field: field.to_string(),
            messages: vec![message.to_string()],
        }])
    }

    /// Every message, flattened in field order.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .flat_map(|f| f.messages.iter().map(String::as_str))
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.messages.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<&str> = self.messages().collect();
        write!(f, "{}", joined.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Validation failed: {0}")]
    ValidationFailed(FieldErrors),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
}

impl From<RefreshError> for ClientError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::SessionExpired => ClientError::SessionExpired,
        }
    }
}

impl ClientError {
    /// True when the caller should send the user back to the login entry point.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired)
    }
}

impl From<ClientError> for String {
    fn from(err: ClientError) -> Self {
        err.to_string()
    }
}
