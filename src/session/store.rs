use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keyring::Entry;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::types::{PersistedTokens, Session};
use crate::config::{ClientConfig, StorageBackend};
use crate::error::StoreError;

/// Keychain service name for the persisted tokens.
const KEYRING_SERVICE: &str = "aizen";
const ACCESS_KEY: &str = "token";
const REFRESH_KEY: &str = "refreshToken";

/// Durable storage for the two session tokens.
pub trait TokenBackend: Send + Sync {
    fn load(&self) -> Result<PersistedTokens, StoreError>;
    fn save(&self, tokens: &PersistedTokens) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// JSON file backend. Writes go through a temp file in the same directory
/// and an atomic rename, so an interrupted write never leaves a partial file.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenBackend for FileBackend {
    fn load(&self) -> Result<PersistedTokens, StoreError> {
        if !self.path.exists() {
            return Ok(PersistedTokens::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, tokens: &PersistedTokens) -> Result<(), StoreError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(tokens)?;
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(json.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// OS keychain backend: one entry per token under the `aizen` service.
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key).map_err(|e| {
            warn!("Failed to create keyring entry for {}: {}", key, e);
            StoreError::Keychain(e.to_string())
        })
    }

    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keychain(e.to_string())),
        }
    }

    fn write(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        let entry = self.entry(key)?;
        match value {
            Some(v) => entry
                .set_password(v)
                .map_err(|e| StoreError::Keychain(e.to_string())),
            None => match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(StoreError::Keychain(e.to_string())),
            },
        }
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBackend for KeyringBackend {
    fn load(&self) -> Result<PersistedTokens, StoreError> {
        Ok(PersistedTokens {
            token: self.read(ACCESS_KEY)?,
            refresh_token: self.read(REFRESH_KEY)?,
        })
    }

    fn save(&self, tokens: &PersistedTokens) -> Result<(), StoreError> {
        self.write(ACCESS_KEY, tokens.token.as_deref())?;
        self.write(REFRESH_KEY, tokens.refresh_token.as_deref())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.write(ACCESS_KEY, None)?;
        self.write(REFRESH_KEY, None)
    }
}

/// Process-local backend. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    tokens: Mutex<PersistedTokens>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that starts out holding `tokens`, as if persisted by an earlier run.
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        Self {
            tokens: Mutex::new(PersistedTokens {
                token: Some(access.to_string()),
                refresh_token: Some(refresh.to_string()),
            }),
        }
    }
}

impl TokenBackend for MemoryBackend {
    fn load(&self) -> Result<PersistedTokens, StoreError> {
        Ok(self.tokens.lock().unwrap().clone())
    }

    fn save(&self, tokens: &PersistedTokens) -> Result<(), StoreError> {
        *self.tokens.lock().unwrap() = tokens.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.tokens.lock().unwrap() = PersistedTokens::default();
        Ok(())
    }
}

/// Whether this platform has a native credential store compiled in.
/// Elsewhere keyring only offers its in-process mock, which would lose the
/// session on restart.
pub fn keyring_supported() -> bool {
    cfg!(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "linux",
        target_os = "windows"
    ))
}

/// Build the backend selected in the config.
pub fn backend_from_config(config: &ClientConfig) -> Box<dyn TokenBackend> {
    match config.storage.backend {
        StorageBackend::File => file_backend(config),
        StorageBackend::Keyring if keyring_supported() => Box::new(KeyringBackend::new()),
        StorageBackend::Keyring => {
            warn!("No native keychain on this platform, storing the session in a file");
            file_backend(config)
        }
        StorageBackend::Memory => Box::new(MemoryBackend::new()),
    }
}

fn file_backend(config: &ClientConfig) -> Box<dyn TokenBackend> {
    match config.session_path() {
        Some(path) => Box::new(FileBackend::new(path)),
        None => {
            warn!("No data directory available, session will not persist");
            Box::new(MemoryBackend::new())
        }
    }
}

/// The single owner of the process-wide session.
///
/// Mutation goes through `set_session` and `clear_session`, plus the
/// generation-checked variants used by token refresh. The in-memory session
/// is authoritative: a persistence failure is logged and never leaves the
/// process in a half-updated state. Persistence happens under the same lock
/// as the in-memory update, so the backend always ends up matching the last
/// mutation.
pub struct TokenStore {
    state: Mutex<StoreState>,
    backend: Box<dyn TokenBackend>,
}

struct StoreState {
    session: Session,
    /// Bumped by every login and every clear. A refresh that started under
    /// an older generation must not write its result.
    generation: u64,
}

impl TokenStore {
    /// Load the persisted session, or start empty if nothing usable is stored.
    pub fn load(backend: Box<dyn TokenBackend>) -> Self {
        let session = match backend.load() {
            Ok(tokens) => Session::from_persisted(tokens),
            Err(e) => {
                warn!("Failed to load persisted session, starting empty: {}", e);
                Session::default()
            }
        };
        info!(
            "Loaded session (authenticated: {})",
            session.is_authenticated()
        );
        Self {
            state: Mutex::new(StoreState {
                session,
                generation: 0,
            }),
            backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::load(Box::new(MemoryBackend::new()))
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.state.lock().unwrap().session.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.lock().unwrap().session.access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.lock().unwrap().session.refresh_token.clone()
    }

    /// The refresh token together with the generation it belongs to.
    pub fn refresh_ticket(&self) -> Option<(String, u64)> {
        let state = self.state.lock().unwrap();
        state
            .session
            .refresh_token
            .clone()
            .map(|token| (token, state.generation))
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().unwrap().session.is_authenticated()
    }

    /// Store both tokens and mark the session authenticated. Starts a new
    /// generation.
    pub fn set_session(&self, access: &str, refresh: &str) {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        self.write_tokens(&mut state, access, refresh);
        info!("Session set");
    }

    /// Store refreshed tokens only if no login or clear happened since
    /// `generation` was read. Returns whether the write happened.
    pub fn set_session_if(&self, generation: u64, access: &str, refresh: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            info!("Discarding refreshed token from a superseded session");
            return false;
        }
        self.write_tokens(&mut state, access, refresh);
        info!("Session updated");
        true
    }

    /// Erase both tokens.
    pub fn clear_session(&self) {
        let mut state = self.state.lock().unwrap();
        self.erase(&mut state);
    }

    /// Erase both tokens only if the session is still at `generation`.
    pub fn clear_session_if(&self, generation: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            return false;
        }
        self.erase(&mut state);
        true
    }

    fn write_tokens(&self, state: &mut StoreState, access: &str, refresh: &str) {
        state.session.access_token = Some(access.to_string());
        state.session.refresh_token = Some(refresh.to_string());
        if let Err(e) = self.backend.save(&PersistedTokens::from(&state.session)) {
            warn!("Failed to persist session: {}", e);
        }
    }

    fn erase(&self, state: &mut StoreState) {
        state.session = Session::default();
        state.generation += 1;
        if let Err(e) = self.backend.clear() {
            warn!("Failed to erase persisted session: {}", e);
        }
        info!("Session cleared");
    }
}
