//! Background catalog refresh
//!
//! Refetches the catalog on a fixed interval and reports each outcome over a
//! tokio channel, so a long-running consumer sees new categories without
//! asking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use crate::data::{CatalogSource, CategoryTreeNode};
use crate::service::{CatalogService, CatalogStatus};

/// Messages sent from the background refresh to the consumer
#[derive(Debug, Clone)]
pub enum RefreshMessage {
    /// A refetch succeeded
    Refreshed {
        tree: Arc<[CategoryTreeNode]>,
        fetched_at: DateTime<Utc>,
    },
    /// A refetch failed; the cached catalog from `fetched_at` is still served
    ServedStale { fetched_at: DateTime<Utc> },
    /// A refetch failed and nothing is cached
    RefreshError(String),
}

/// Configuration for the refresh loop
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between refetches
    pub interval: Duration,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            enabled: true,
        }
    }
}

/// Handle for controlling the background refresh
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    shutdown_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Spawns the refresh loop for `service`
    ///
    /// The first refetch happens one interval after spawning. With refresh
    /// disabled nothing is spawned and the channel stays empty.
    pub fn spawn<S: CatalogSource>(service: Arc<CatalogService<S>>, config: RefreshConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let view = service.refetch().await;
                            let message = match view.status {
                                CatalogStatus::Refreshed | CatalogStatus::Fresh => RefreshMessage::Refreshed {
                                    tree: view.data,
                                    fetched_at: view.fetched_at.unwrap_or_else(Utc::now),
                                },
                                CatalogStatus::Stale => RefreshMessage::ServedStale {
                                    fetched_at: view.fetched_at.unwrap_or_else(Utc::now),
                                },
                                CatalogStatus::Unavailable => RefreshMessage::RefreshError(
                                    view.error.map(|err| err.to_string()).unwrap_or_default(),
                                ),
                            };
                            if msg_tx.send(message).await.is_err() {
                                debug!("refresh receiver dropped, stopping");
                                break;
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Waits for the next refresh message
    pub async fn recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.recv().await
    }

    /// Shuts down the background refresh task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Checks for pending refresh messages without blocking
///
/// # Returns
/// * `Some(RefreshMessage)` if a message was available
/// * `None` if no messages are pending
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}
