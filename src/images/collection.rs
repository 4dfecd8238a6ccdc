use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::types::{ImageResource, ImageUpdate, LoadState};
use crate::api::{ApiRequest, AuthorizedClient};
use crate::error::ClientError;

pub const IMAGES_PATH: &str = "api/images/";

pub fn image_path(id: i64) -> String {
    format!("{}{}/", IMAGES_PATH, id)
}

struct CollectionState {
    images: Vec<ImageResource>,
    load_state: LoadState,
}

/// In-memory cache of the user's images, in server order and unique by id.
///
/// Membership grows only through `fetch_all` and shrinks only through
/// `delete_one`; `merge_partial` edits fields of entries already present.
pub struct CollectionManager {
    api: Arc<AuthorizedClient>,
    state: Mutex<CollectionState>,
}

impl CollectionManager {
    pub fn new(api: Arc<AuthorizedClient>) -> Self {
        Self {
            api,
            state: Mutex::new(CollectionState {
                images: Vec::new(),
                load_state: LoadState::Loading,
            }),
        }
    }

    pub fn snapshot(&self) -> Vec<ImageResource> {
        self.state.lock().unwrap().images.clone()
    }

    pub fn get(&self, id: i64) -> Option<ImageResource> {
        self.state
            .lock()
            .unwrap()
            .images
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load_state(&self) -> LoadState {
        self.state.lock().unwrap().load_state
    }

    /// Replace the whole collection with the server's current listing.
    ///
    /// On failure the previous contents stay; a failed first load leaves the
    /// collection empty and marked `Failed`.
    pub async fn fetch_all(&self, access_token: &str) -> Result<Vec<ImageResource>, ClientError> {
        let result: Result<Vec<ImageResource>, ClientError> = self
            .api
            .execute_json(&ApiRequest::get(IMAGES_PATH), access_token)
            .await;

        let mut state = self.state.lock().unwrap();
        match result {
            Ok(listing) => {
                state.images = dedup_by_id(listing);
                state.load_state = LoadState::Ready;
                info!("Loaded {} images", state.images.len());
                Ok(state.images.clone())
            }
            Err(e) => {
                if state.load_state != LoadState::Ready {
                    state.load_state = LoadState::Failed;
                }
                warn!("Failed to load images: {}", e);
                Err(e)
            }
        }
    }

    /// Delete on the server, then drop the entry locally. Nothing is removed
    /// until the server confirms.
    pub async fn delete_one(&self, id: i64, access_token: &str) -> Result<(), ClientError> {
        if let Err(e) = self
            .api
            .execute(&ApiRequest::delete(image_path(id)), access_token)
            .await
        {
            warn!("Failed to delete image {}: {}", id, e);
            return Err(e);
        }

        self.state.lock().unwrap().images.retain(|i| i.id != id);
        info!("Deleted image {}", id);
        Ok(())
    }

    /// Overlay `update` onto the cached entry with the same id and return the
    /// merged record. A no-op returning `None` when the id is not cached.
    pub fn merge_partial(&self, update: &ImageUpdate) -> Option<ImageResource> {
        let mut state = self.state.lock().unwrap();
        match state.images.iter_mut().find(|i| i.id == update.id) {
            Some(image) => {
                image.apply(update);
                Some(image.clone())
            }
            None => {
                info!("Ignoring update for image {} (not in collection)", update.id);
                None
            }
        }
    }
}

/// Keep the first occurrence of each id, preserving order.
fn dedup_by_id(listing: Vec<ImageResource>) -> Vec<ImageResource> {
    let mut seen = HashSet::with_capacity(listing.len());
    let total = listing.len();
    let unique: Vec<ImageResource> = listing.into_iter().filter(|i| seen.insert(i.id)).collect();
    if unique.len() != total {
        warn!(
            "Server listing had {} duplicate image ids, keeping first occurrences",
            total - unique.len()
        );
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RequestExecutor;
    use crate::config::ClientConfig;
    use crate::session::TokenStore;
    use chrono::Utc;

    fn image(id: i64, name: &str) -> ImageResource {
        ImageResource {
            id,
            name: name.to_string(),
            upload_date: Utc::now(),
            description: None,
            signed_url: None,
        }
    }

    fn offline_manager() -> CollectionManager {
        let config = ClientConfig::with_base_url("http://127.0.0.1:9");
        let executor = Arc::new(RequestExecutor::new(&config).unwrap());
        let store = Arc::new(TokenStore::in_memory());
        CollectionManager::new(Arc::new(AuthorizedClient::new(executor, store)))
    }

    fn seeded(images: Vec<ImageResource>) -> CollectionManager {
        let manager = offline_manager();
        {
            let mut state = manager.state.lock().unwrap();
            state.images = images;
            state.load_state = LoadState::Ready;
        }
        manager
    }

    #[test]
    fn test_merge_into_absent_id_is_noop() {
        let manager = seeded(vec![image(1, "a.jpg"), image(2, "b.jpg")]);
        let before = manager.snapshot();

        for _ in 0..3 {
            let merged = manager.merge_partial(&ImageUpdate {
                id: 99,
                description: Some("ghost".to_string()),
                ..Default::default()
            });
            assert!(merged.is_none());
        }

        assert_eq!(manager.snapshot(), before);
    }

    #[test]
    fn test_merge_updates_only_target() {
        let manager = seeded(vec![image(1, "a.jpg"), image(2, "b.jpg")]);
        let merged = manager
            .merge_partial(&ImageUpdate {
                id: 2,
                description: Some("a dog".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(merged.description.as_deref(), Some("a dog"));
        assert_eq!(manager.get(2).unwrap().description.as_deref(), Some("a dog"));
        assert!(manager.get(1).unwrap().description.is_none());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let listing = vec![image(1, "first"), image(2, "b"), image(1, "second")];
        let unique = dedup_by_id(listing);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].name, "first");
        assert_eq!(unique[1].id, 2);
    }

    #[test]
    fn test_new_collection_is_loading_and_empty() {
        let manager = offline_manager();
        assert_eq!(manager.load_state(), LoadState::Loading);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_failed_first_load_marks_failed() {
        let manager = offline_manager();
        let result = manager.fetch_all("token").await;
        assert!(result.is_err());
        assert_eq!(manager.load_state(), LoadState::Failed);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_cache() {
        let manager = seeded(vec![image(1, "a.jpg")]);
        let result = manager.fetch_all("token").await;
        assert!(matches!(
            result,
            Err(ClientError::Request(crate::error::RequestError::Network(_)))
        ));
        assert_eq!(manager.load_state(), LoadState::Ready);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_entry() {
        let manager = seeded(vec![image(1, "a.jpg")]);
        assert!(manager.delete_one(1, "token").await.is_err());
        assert!(manager.get(1).is_some());
    }
}
