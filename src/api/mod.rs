//! Remote API access: request execution, token refresh, and the account endpoints.

pub mod auth;
pub mod authorized;
pub mod executor;
pub mod profile;
pub mod refresh;

pub use auth::Registration;
pub use authorized::AuthorizedClient;
pub use executor::{classify_failure, ApiRequest, FilePart, RequestBody, RequestExecutor};
pub use profile::UserProfile;
pub use refresh::RefreshCoordinator;
