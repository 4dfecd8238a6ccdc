use std::sync::Arc;

use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::executor::{decode_json, ApiRequest, RequestExecutor};
use super::refresh::RefreshCoordinator;
use crate::error::{ClientError, RequestError};
use crate::session::TokenStore;

/// Steps of one protected call.
///
/// `RetryOnce` is terminal: whatever the retried request returns is the
/// result, so a call can refresh at most once.
enum CallState {
    Attempt(String),
    Refreshing,
    RetryOnce(String),
}

/// Executes protected requests with automatic recovery from an expired
/// access token.
pub struct AuthorizedClient {
    executor: Arc<RequestExecutor>,
    store: Arc<TokenStore>,
    refresher: RefreshCoordinator,
}

impl AuthorizedClient {
    pub fn new(executor: Arc<RequestExecutor>, store: Arc<TokenStore>) -> Self {
        let refresher = RefreshCoordinator::new(executor.clone(), store.clone());
        Self {
            executor,
            store,
            refresher,
        }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub async fn execute(
        &self,
        request: &ApiRequest,
        access_token: &str,
    ) -> Result<Response, ClientError> {
        let mut state = CallState::Attempt(access_token.to_string());
        loop {
            state = match state {
                CallState::Attempt(token) => {
                    match self.executor.execute(request, Some(&token)).await {
                        Ok(response) => return Ok(response),
                        Err(RequestError::TokenExpired) => {
                            info!("Access token expired for {} {}", request.method, request.path);
                            CallState::Refreshing
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                CallState::Refreshing => {
                    let Some((refresh_token, generation)) = self.store.refresh_ticket() else {
                        warn!("No refresh token stored, ending session");
                        self.store.clear_session();
                        return Err(ClientError::SessionExpired);
                    };
                    let access = self.refresher.refresh(&refresh_token, generation).await?;
                    CallState::RetryOnce(access)
                }
                CallState::RetryOnce(token) => {
                    return self
                        .executor
                        .execute(request, Some(&token))
                        .await
                        .map_err(|e| {
                            warn!("Retry after refresh failed for {}: {}", request.path, e);
                            e.into()
                        });
                }
            };
        }
    }

    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        access_token: &str,
    ) -> Result<T, ClientError> {
        let response = self.execute(request, access_token).await?;
        Ok(decode_json(response).await?)
    }
}
