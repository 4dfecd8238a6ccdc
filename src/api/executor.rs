use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::RequestError;

/// Error `code` the server sends with a 401 when the access token is expired or invalid.
pub const TOKEN_NOT_VALID: &str = "token_not_valid";

/// A file sent as one multipart form field.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// The content type (with boundary) is set by the form encoder, never by hand.
    Multipart(FilePart),
}

/// A request relative to the API base URL. Cloneable so it can be re-sent
/// after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn post_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: RequestBody::Json(body),
        }
    }

    pub fn put_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: RequestBody::Json(body),
        }
    }

    pub fn post_multipart(path: impl Into<String>, file: FilePart) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: RequestBody::Multipart(file),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Classify a non-success response from its status and raw body.
///
/// Only a 401 whose JSON body carries `code: "token_not_valid"` is
/// `TokenExpired`; any other 401 shape is an ordinary failure.
pub fn classify_failure(status: StatusCode, body: &str) -> RequestError {
    let decoded: Option<ErrorBody> = serde_json::from_str(body).ok();

    if status == StatusCode::UNAUTHORIZED
        && decoded
            .as_ref()
            .and_then(|b| b.code.as_deref())
            .map_or(false, |code| code == TOKEN_NOT_VALID)
    {
        return RequestError::TokenExpired;
    }

    let reason = decoded
        .and_then(|b| b.detail)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

    RequestError::RequestFailed {
        status: status.as_u16(),
        reason,
    }
}

/// Sends API requests and classifies their failures. Holds no session state;
/// the access token is passed in per call.
pub struct RequestExecutor {
    client: reqwest::Client,
    base: Url,
}

impl RequestExecutor {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()?;

        let mut base = config.base()?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { client, base })
    }

    pub fn url(&self, path: &str) -> Result<Url, RequestError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| RequestError::InvalidRequest(format!("Bad path '{}': {}", path, e)))
    }

    /// Send the request and return the raw response, whatever its status.
    /// Fails only when no response was received.
    pub async fn send(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<Response, RequestError> {
        let url = self.url(&request.path)?;
        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), url.clone());
        if let Some(token) = access_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(file) => {
                let part = Part::bytes(file.bytes.clone())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.mime)
                    .map_err(|e| {
                        RequestError::InvalidRequest(format!(
                            "Bad content type '{}': {}",
                            file.mime, e
                        ))
                    })?;
                builder.multipart(Form::new().part(file.field.clone(), part))
            }
        };

        builder.send().await.map_err(|e| {
            warn!("Request to {} failed: {}", url, e);
            RequestError::Network(e.to_string())
        })
    }

    /// Send the request and classify any non-success status.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<Response, RequestError> {
        let response = self.send(request, access_token).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_failure(status, &body);
        warn!("{} {} returned {}: {}", request.method, request.path, status, err);
        Err(err)
    }

    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<T, RequestError> {
        let response = self.execute(request, access_token).await?;
        decode_json(response).await
    }
}

/// Decode a success response body.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, RequestError> {
    response
        .json()
        .await
        .map_err(|e| RequestError::InvalidResponse(format!("Failed to parse response: {}", e)))
}
