use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::authorized::AuthorizedClient;
use super::executor::ApiRequest;
use crate::error::ClientError;

pub const USER_INFO_PATH: &str = "api/user/info/";

/// Account details. `username` and `email` are read-only on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

pub async fn fetch_profile(
    api: &AuthorizedClient,
    access_token: &str,
) -> Result<UserProfile, ClientError> {
    let profile: UserProfile = api
        .execute_json(&ApiRequest::get(USER_INFO_PATH), access_token)
        .await?;
    info!("Fetched profile for {}", profile.username);
    Ok(profile)
}

pub async fn update_profile(
    api: &AuthorizedClient,
    profile: &UserProfile,
    access_token: &str,
) -> Result<(), ClientError> {
    let body = json!({
        "username": profile.username,
        "email": profile.email,
        "first_name": profile.first_name,
        "last_name": profile.last_name,
    });
    api.execute(&ApiRequest::put_json(USER_INFO_PATH, body), access_token)
        .await?;
    info!("Updated profile for {}", profile.username);
    Ok(())
}
