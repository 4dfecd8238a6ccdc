//! The user's image collection: cache, uploads, and status polling.

pub mod collection;
pub mod poller;
pub mod types;
pub mod upload;

pub use collection::CollectionManager;
pub use poller::{PollOutcome, PollState, StatusPoller};
pub use types::{ImageResource, ImageUpdate, LoadState, UploadedImage};
pub use upload::UploadFile;
