//! Unauthenticated account endpoints: login and registration.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::executor::{classify_failure, decode_json, ApiRequest, RequestExecutor};
use crate::error::{ClientError, FieldError, FieldErrors};
use crate::session::TokenStore;

pub const LOGIN_PATH: &str = "api/auth/login/";
pub const REGISTER_PATH: &str = "api/auth/register/";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

/// Signup form input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Exchange credentials for a token pair and store it as the session.
pub async fn login(
    executor: &RequestExecutor,
    store: &TokenStore,
    username: &str,
    password: &str,
) -> Result<(), ClientError> {
    info!("Logging in as {}", username);
    let request = ApiRequest::post_json(
        LOGIN_PATH,
        json!({ "username": username, "password": password }),
    );

    let response = executor.send(&request, None).await?;
    if !response.status().is_success() {
        warn!("Login rejected for {} ({})", username, response.status());
        return Err(ClientError::InvalidCredentials);
    }

    let tokens: LoginResponse = decode_json(response).await?;
    store.set_session(&tokens.access, &tokens.refresh);
    info!("Login successful for {}", username);
    Ok(())
}

/// Create an account. Does not log in.
///
/// Mismatched passwords are rejected before any request is sent.
pub async fn register(
    executor: &RequestExecutor,
    registration: &Registration,
) -> Result<(), ClientError> {
    if registration.password != registration.confirm_password {
        return Err(ClientError::ValidationFailed(FieldErrors::single(
            "password2",
            "Passwords do not match!",
        )));
    }

    info!("Registering user {}", registration.username);
    let body = json!({
        "username": registration.username,
        "email": registration.email,
        "password": registration.password,
        "password2": registration.confirm_password,
    });
    let response = executor
        .send(&ApiRequest::post_json(REGISTER_PATH, body), None)
        .await?;

    let status = response.status();
    if status.is_success() {
        info!("Registered user {}", registration.username);
        return Ok(());
    }

    let text = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::BAD_REQUEST {
        if let Some(errors) = parse_field_errors(&text) {
            warn!(
                "Registration for {} rejected: {}",
                registration.username, errors
            );
            return Err(ClientError::ValidationFailed(errors));
        }
    }

    Err(ClientError::Request(classify_failure(status, &text)))
}

/// Parse `{ field: [message, ...] }` in server order. A bare string value
/// counts as a single message; anything else is not a validation body.
pub fn parse_field_errors(body: &str) -> Option<FieldErrors> {
    let map = match serde_json::from_str::<Value>(body).ok()? {
        Value::Object(map) => map,
        _ => return None,
    };

    let mut errors = Vec::with_capacity(map.len());
    for (field, value) in map {
        let messages = match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            Value::String(s) => vec![s],
            _ => continue,
        };
        errors.push(FieldError { field, messages });
    }

    if errors.is_empty() {
        None
    } else {
        Some(FieldErrors(errors))
    }
}
