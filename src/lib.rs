pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod images;
pub mod session;

pub use client::AizenClient;
pub use config::{default_config, load_config, ClientConfig};
pub use error::{ClientError, FieldError, FieldErrors, RefreshError, RequestError};
pub use events::{ClientEvent, EventBus, NoticeLevel};
pub use images::{ImageResource, ImageUpdate, LoadState, PollOutcome, PollState, UploadFile};
pub use session::{Access, Destination, GateDecision, Session, SessionGate, TokenStore};

/// Install the global `tracing` subscriber. Filter comes from `RUST_LOG`,
/// defaulting to `info`. Later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
