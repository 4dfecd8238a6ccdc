use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::api::{auth, profile, AuthorizedClient, Registration, RequestExecutor, UserProfile};
use crate::config::ClientConfig;
use crate::error::{ClientError, RequestError};
use crate::events::{ClientEvent, EventBus};
use crate::images::{
    upload, CollectionManager, ImageResource, LoadState, PollOutcome, PollState, StatusPoller,
    UploadFile, UploadedImage,
};
use crate::session::{backend_from_config, Session, SessionGate, TokenStore};

/// Entry point for the presentation layer.
///
/// Owns the token store, the image collection and the status poller, and
/// reports every outcome both as a return value and as a `ClientEvent`.
pub struct AizenClient {
    config: ClientConfig,
    store: Arc<TokenStore>,
    executor: Arc<RequestExecutor>,
    api: Arc<AuthorizedClient>,
    collection: Arc<CollectionManager>,
    poller: StatusPoller,
    events: EventBus,
}

impl AizenClient {
    /// Build a client whose session is loaded from the configured storage backend.
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let store = Arc::new(TokenStore::load(backend_from_config(&config)));
        Self::with_store(config, store)
    }

    pub fn with_store(config: ClientConfig, store: Arc<TokenStore>) -> anyhow::Result<Self> {
        let executor = Arc::new(RequestExecutor::new(&config)?);
        let api = Arc::new(AuthorizedClient::new(executor.clone(), store.clone()));
        let collection = Arc::new(CollectionManager::new(api.clone()));
        let events = EventBus::new();
        let poller = StatusPoller::new(
            api.clone(),
            collection.clone(),
            events.clone(),
            config.polling.clone(),
        );

        info!("Client ready for {}", config.base_url);
        Ok(Self {
            config,
            store,
            executor,
            api,
            collection,
            poller,
            events,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.store.session()
    }

    pub fn gate(&self) -> SessionGate {
        SessionGate::new(self.store.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn images(&self) -> Vec<ImageResource> {
        self.collection.snapshot()
    }

    pub fn image(&self, id: i64) -> Option<ImageResource> {
        self.collection.get(id)
    }

    pub fn load_state(&self) -> LoadState {
        self.collection.load_state()
    }

    // === Account ===

    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        match auth::login(&self.executor, &self.store, username, password).await {
            Ok(()) => {
                self.events.publish(ClientEvent::SessionStarted);
                self.events.success("Login successful!");
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    ClientError::InvalidCredentials => "Invalid username or password!",
                    ClientError::Request(RequestError::Network(_)) => {
                        "Network error. Please try again later."
                    }
                    _ => "Login failed. Please try again.",
                };
                self.events.error(message);
                Err(e)
            }
        }
    }

    pub async fn register(&self, registration: &Registration) -> Result<(), ClientError> {
        match auth::register(&self.executor, registration).await {
            Ok(()) => {
                self.events.success("Registration successful! Please login.");
                Ok(())
            }
            Err(ClientError::ValidationFailed(errors)) => {
                for message in errors.messages() {
                    self.events.error(message);
                }
                Err(ClientError::ValidationFailed(errors))
            }
            Err(e) => {
                self.events.error("Something went wrong. Please try again.");
                Err(e)
            }
        }
    }

    /// End the session. Stops polling first so nothing merges afterwards.
    pub fn logout(&self) {
        self.poller.stop();
        self.store.clear_session();
        self.events.publish(ClientEvent::SessionEnded { expired: false });
    }

    pub async fn fetch_profile(&self) -> Result<UserProfile, ClientError> {
        let token = self.access_token()?;
        let result = profile::fetch_profile(&self.api, &token).await;
        self.report(result, "Failed to load profile")
    }

    pub async fn update_profile(&self, update: &UserProfile) -> Result<(), ClientError> {
        let token = self.access_token()?;
        let result = profile::update_profile(&self.api, update, &token).await;
        let result = self.report(result, "Failed to update profile");
        if result.is_ok() {
            self.events.success("Profile updated successfully!");
        }
        result
    }

    // === Images ===

    pub async fn fetch_images(&self) -> Result<Vec<ImageResource>, ClientError> {
        let token = self.access_token()?;
        let result = self.collection.fetch_all(&token).await;
        if let Ok(images) = &result {
            self.events
                .publish(ClientEvent::ImagesLoaded { count: images.len() });
        }
        self.report(result, "Failed to load images")
    }

    /// Delete an image. A poll tracking that image is stopped as well.
    pub async fn delete_image(&self, id: i64) -> Result<(), ClientError> {
        let token = self.access_token()?;
        let result = self.collection.delete_one(id, &token).await;
        let result = self.report(result, "Failed to delete image");
        if result.is_ok() {
            if self.poller.stop_if_targeting(id) {
                info!("Stopped polling deleted image {}", id);
            }
            self.events.publish(ClientEvent::ImageDeleted { id });
            self.events.success("Image deleted successfully");
        }
        result
    }

    pub async fn upload_image(&self, path: &Path) -> Result<UploadedImage, ClientError> {
        let file = read_upload(path.to_path_buf()).await?;
        self.upload(&file).await
    }

    pub async fn upload_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedImage, ClientError> {
        let file = UploadFile::from_bytes(file_name, bytes)?;
        self.upload(&file).await
    }

    /// Upload and immediately start polling the new image's status.
    pub async fn upload_and_track(&self, file: &UploadFile) -> Result<UploadedImage, ClientError> {
        let uploaded = self.upload(file).await?;
        self.poller.start(uploaded.id);
        Ok(uploaded)
    }

    pub async fn upload(&self, file: &UploadFile) -> Result<UploadedImage, ClientError> {
        let token = self.access_token()?;
        let result = upload::upload_image(&self.api, file, &token).await;
        let result = self.report(result, "Failed to upload image");
        if result.is_ok() {
            self.events.success("Image uploaded successfully");
        }
        result
    }

    // === Polling ===

    /// Poll `id` until it has a description, replacing any active poll.
    pub fn start_polling(&self, id: i64) {
        self.poller.start(id);
    }

    pub fn stop_polling(&self) {
        self.poller.stop();
    }

    pub fn poll_state(&self) -> Option<PollState> {
        self.poller.state()
    }

    /// Whether the pending indicator should show for `id`.
    pub fn is_polling(&self, id: i64) -> bool {
        self.poller
            .state()
            .map_or(false, |s| s.active && s.target_id == id)
    }

    pub async fn wait_for_poll(&self) -> Option<PollOutcome> {
        self.poller.wait().await
    }

    // === Internals ===

    fn access_token(&self) -> Result<String, ClientError> {
        self.store.access_token().ok_or(ClientError::NotAuthenticated)
    }

    /// Publish the failure side of `result`. An expired session also stops
    /// polling so the caller can route to login with nothing left running.
    fn report<T>(&self, result: Result<T, ClientError>, failure: &str) -> Result<T, ClientError> {
        match &result {
            Err(ClientError::SessionExpired) => {
                self.poller.stop();
                self.events.publish(ClientEvent::SessionEnded { expired: true });
                self.events.error("Session expired, please log in again");
            }
            Err(_) => self.events.error(failure),
            Ok(_) => {}
        }
        result
    }
}

async fn read_upload(path: PathBuf) -> Result<UploadFile, ClientError> {
    tokio::task::spawn_blocking(move || UploadFile::from_path(&path))
        .await
        .map_err(|e| ClientError::InvalidUpload(format!("Upload read task failed: {}", e)))?
}
