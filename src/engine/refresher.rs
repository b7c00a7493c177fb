//! Proactive refresh.
//!
//! Background task that renews the token when it enters the buffer window, so
//! foreground callers keep hitting the cache.

use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::TokenLifecycleEngine;

/// Wait before retrying after a transient refresh failure.
pub const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Handle to the background refresh task. Dropping it stops the task.
#[derive(Debug)]
pub struct ProactiveRefresh {
    handle: JoinHandle<()>,
}

impl ProactiveRefresh {
    /// Stop the task.
    pub fn stop(self) {}

    /// Check if the task has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ProactiveRefresh {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl TokenLifecycleEngine {
    /// Start refreshing in the background ahead of expiry.
    ///
    /// The task stops when the handle is dropped. After a refresh reports that
    /// re-authorization is required it idles until a new credential is committed.
    pub fn spawn_proactive_refresh(&self) -> ProactiveRefresh {
        ProactiveRefresh {
            handle: tokio::spawn(run(self.clone(), RETRY_DELAY)),
        }
    }
}

async fn run(engine: TokenLifecycleEngine, retry_delay: Duration) {
    let mut changes = engine.watch_changes();

    loop {
        let Some(deadline) = engine.next_refresh_at() else {
            debug!("Nothing to refresh, waiting for a credential");
            if changes.changed().await.is_err() {
                return;
            }
            continue;
        };

        let wait = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = changes.changed() => {
                if changed.is_err() {
                    return;
                }
                continue;
            }
        }

        match engine.get_valid_token().await {
            Ok(_) => {}
            Err(e) if e.needs_reauth() => {
                info!(error = %e, "Proactive refresh paused until the next sign-in");
                if changes.changed().await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?retry_delay, "Proactive refresh failed");
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}
