//! Bounded status polling for a freshly uploaded image.
//!
//! One poll is active at a time. Each tick waits `interval`, gives up once
//! `max_attempts` requests have been made, otherwise asks the status
//! endpoint and merges the answer into the shared collection. A non-empty
//! description ends the poll early. Transient failures are reported and the
//! loop carries on; only a failed token refresh or exhaustion ends it.
//!
//! Stopping is cooperative: an in-flight request is allowed to finish but
//! its result is discarded and no further tick is scheduled.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::collection::CollectionManager;
use super::types::ImageUpdate;
use crate::api::{ApiRequest, AuthorizedClient};
use crate::config::PollingConfig;
use crate::error::ClientError;
use crate::events::{ClientEvent, EventBus};

pub fn status_path(id: i64) -> String {
    format!("api/images/status/{}/", id)
}

/// Progress of one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollState {
    pub target_id: i64,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub interval: Duration,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    /// A non-empty description arrived and was merged.
    Completed,
    /// `max_attempts` requests were made without a description.
    TimedOut,
    /// Stopped by the owner (unmount, logout, delete, or a newer poll).
    Stopped,
    /// Token refresh failed; the session has been cleared.
    SessionExpired,
}

struct ActivePoll {
    state: Arc<Mutex<PollState>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<PollOutcome>>,
}

/// Owns at most one running poll loop.
pub struct StatusPoller {
    api: Arc<AuthorizedClient>,
    collection: Arc<CollectionManager>,
    events: EventBus,
    config: PollingConfig,
    current: Mutex<Option<ActivePoll>>,
}

impl StatusPoller {
    pub fn new(
        api: Arc<AuthorizedClient>,
        collection: Arc<CollectionManager>,
        events: EventBus,
        config: PollingConfig,
    ) -> Self {
        Self {
            api,
            collection,
            events,
            config,
            current: Mutex::new(None),
        }
    }

    /// Start polling `target_id`, stopping any poll already running.
    pub fn start(&self, target_id: i64) {
        let state = Arc::new(Mutex::new(PollState {
            target_id,
            attempts_made: 0,
            max_attempts: self.config.max_attempts,
            interval: self.config.interval(),
            active: true,
        }));
        let cancel = CancellationToken::new();

        let worker = PollWorker {
            api: self.api.clone(),
            collection: self.collection.clone(),
            events: self.events.clone(),
            state: state.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(worker.run());

        let previous = self.current.lock().unwrap().replace(ActivePoll {
            state,
            cancel,
            handle: Some(handle),
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
            previous.state.lock().unwrap().active = false;
        }
        info!(
            "Polling status of image {} every {:?} (max {} attempts)",
            target_id,
            self.config.interval(),
            self.config.max_attempts
        );
    }

    /// Stop the active poll, if any. No merge happens after this returns:
    /// a merge already underway holds the poll state lock taken here.
    pub fn stop(&self) {
        if let Some(poll) = self.current.lock().unwrap().as_ref() {
            if !poll.cancel.is_cancelled() {
                info!("Stopping status poll");
                poll.cancel.cancel();
            }
            poll.state.lock().unwrap().active = false;
        }
    }

    /// Stop only if the active poll targets `id`.
    pub fn stop_if_targeting(&self, id: i64) -> bool {
        let targeting = self
            .state()
            .map_or(false, |s| s.active && s.target_id == id);
        if targeting {
            self.stop();
        }
        targeting
    }

    /// Snapshot of the most recent poll, active or finished.
    pub fn state(&self) -> Option<PollState> {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.state.lock().unwrap().clone())
    }

    pub fn is_active(&self) -> bool {
        self.state().map_or(false, |s| s.active)
    }

    /// Wait for the most recent poll to finish. `None` if there is none or
    /// another caller is already waiting on it.
    pub async fn wait(&self) -> Option<PollOutcome> {
        let handle = self
            .current
            .lock()
            .unwrap()
            .as_mut()
            .and_then(|p| p.handle.take())?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("Status poll task failed: {}", e);
                None
            }
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        if let Ok(current) = self.current.lock() {
            if let Some(poll) = current.as_ref() {
                poll.cancel.cancel();
            }
        }
    }
}

struct PollWorker {
    api: Arc<AuthorizedClient>,
    collection: Arc<CollectionManager>,
    events: EventBus,
    state: Arc<Mutex<PollState>>,
    cancel: CancellationToken,
}

impl PollWorker {
    async fn run(self) -> PollOutcome {
        let (target_id, interval, max_attempts) = {
            let s = self.state.lock().unwrap();
            (s.target_id, s.interval, s.max_attempts)
        };

        let outcome = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break PollOutcome::Stopped,
                _ = tokio::time::sleep(interval) => {}
            }

            let attempt = {
                let mut s = self.state.lock().unwrap();
                if s.attempts_made >= max_attempts {
                    None
                } else {
                    s.attempts_made += 1;
                    Some(s.attempts_made)
                }
            };
            let Some(attempt) = attempt else {
                info!(
                    "Image {} still processing after {} attempts, giving up",
                    target_id, max_attempts
                );
                break PollOutcome::TimedOut;
            };

            let Some(token) = self.api.store().access_token() else {
                warn!("Session ended while polling image {}", target_id);
                break PollOutcome::SessionExpired;
            };

            let result: Result<ImageUpdate, ClientError> = self
                .api
                .execute_json(&ApiRequest::get(status_path(target_id)), &token)
                .await;

            // `stop()` cancels and then takes this lock, so the check and the
            // merge either both finish before it returns or the merge never runs.
            let checked = {
                let _state = self.state.lock().unwrap();
                if self.cancel.is_cancelled() {
                    None
                } else {
                    Some(result.map(|update| {
                        let merged = self.collection.merge_partial(&update);
                        (update, merged)
                    }))
                }
            };
            let Some(result) = checked else {
                break PollOutcome::Stopped;
            };

            match result {
                Ok((update, merged)) => {
                    if merged.is_some() {
                        self.events.publish(ClientEvent::ImageUpdated { id: update.id });
                    }
                    let complete = merged
                        .as_ref()
                        .map_or(update.has_description(), |m| m.has_description());
                    info!(
                        "Status poll {}/{} for image {}: {}",
                        attempt,
                        max_attempts,
                        target_id,
                        if complete { "complete" } else { "pending" }
                    );
                    if complete {
                        break PollOutcome::Completed;
                    }
                }
                Err(ClientError::SessionExpired) => {
                    warn!("Session expired while polling image {}", target_id);
                    break PollOutcome::SessionExpired;
                }
                Err(e) => {
                    warn!(
                        "Status poll {}/{} for image {} failed: {}",
                        attempt, max_attempts, target_id, e
                    );
                    self.events.error("Failed to fetch image status");
                }
            }
        };

        self.state.lock().unwrap().active = false;
        if outcome == PollOutcome::SessionExpired {
            self.events.publish(ClientEvent::SessionEnded { expired: true });
        }
        self.events.publish(ClientEvent::PollFinished { target_id, outcome });
        info!("Status poll for image {} finished: {:?}", target_id, outcome);
        outcome
    }
}
