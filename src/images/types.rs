use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded image and its server-computed metadata.
///
/// `description` stays absent until server-side processing finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResource {
    pub id: i64,
    pub name: String,
    pub upload_date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub signed_url: Option<String>,
}

impl ImageResource {
    pub fn has_description(&self) -> bool {
        self.description.as_deref().map_or(false, |d| !d.is_empty())
    }

    /// Overlay the fields present in `update`. Absent and null fields are left alone.
    pub(crate) fn apply(&mut self, update: &ImageUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(date) = update.upload_date {
            self.upload_date = date;
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        if let Some(url) = &update.signed_url {
            self.signed_url = Some(url.clone());
        }
    }
}

/// A partial record keyed by `id`, as returned by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageUpdate {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub upload_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub signed_url: Option<String>,
}

impl ImageUpdate {
    pub fn has_description(&self) -> bool {
        self.description.as_deref().map_or(false, |d| !d.is_empty())
    }
}

/// Body of a successful upload. Only the id is relied on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedImage {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Whether the collection has been loaded, distinct from being empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Loading,
    Ready,
    Failed,
}
