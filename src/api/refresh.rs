use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::executor::{ApiRequest, RequestExecutor};
use crate::error::RefreshError;
use crate::session::TokenStore;

pub const REFRESH_PATH: &str = "api/auth/token/refresh/";

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Exchanges the refresh token for a new access token.
///
/// One attempt per call, no backoff. Success stores the new access token
/// next to the unchanged refresh token; any failure clears the session.
/// Both writes only apply if the session is still the one the refresh
/// started from, so a logout during the request stays a logout.
pub struct RefreshCoordinator {
    executor: Arc<RequestExecutor>,
    store: Arc<TokenStore>,
}

impl RefreshCoordinator {
    pub fn new(executor: Arc<RequestExecutor>, store: Arc<TokenStore>) -> Self {
        Self { executor, store }
    }

    /// Refresh using `refresh_token`, read from the store at `generation`.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        generation: u64,
    ) -> Result<String, RefreshError> {
        info!("Refreshing access token");
        let request = ApiRequest::post_json(REFRESH_PATH, json!({ "refresh": refresh_token }));

        match self
            .executor
            .execute_json::<RefreshResponse>(&request, None)
            .await
        {
            Ok(body) => {
                if !self
                    .store
                    .set_session_if(generation, &body.access, refresh_token)
                {
                    warn!("Session ended while refreshing, dropping new access token");
                    return Err(RefreshError::SessionExpired);
                }
                info!("Access token refreshed");
                Ok(body.access)
            }
            Err(e) => {
                warn!("Token refresh failed, ending session: {}", e);
                self.store.clear_session_if(generation);
                Err(RefreshError::SessionExpired)
            }
        }
    }
}
