//! Persistence actor.
//!
//! Saves and clears are queued in commit order and applied one at a time by a
//! dedicated task, so the engine never waits on store latency and a clear can
//! never be overtaken by an older save.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::store::TokenStore;
use crate::telemetry::TokenMetrics;
use crate::types::Credential;

enum PersistCommand {
    Save(Credential),
    Clear,
    Flush(oneshot::Sender<()>),
}

/// Handle to the persistence task. The task exits once the handle is dropped
/// and the queue has drained.
pub(crate) struct Persister {
    sender: mpsc::UnboundedSender<PersistCommand>,
}

impl Persister {
    /// Spawn the actor on the current runtime.
    pub(crate) fn spawn(store: Arc<dyn TokenStore>, metrics: Arc<dyn TokenMetrics>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(command) = receiver.recv().await {
                match command {
                    PersistCommand::Save(credential) => {
                        if let Err(e) = store.save(&credential).await {
                            warn!(error = %e, "Failed to persist credential");
                            metrics.record_persistence_failure("save");
                        }
                    }
                    PersistCommand::Clear => {
                        if let Err(e) = store.clear().await {
                            warn!(error = %e, "Failed to clear persisted credential");
                            metrics.record_persistence_failure("clear");
                        }
                    }
                    PersistCommand::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!("Persistence task stopped");
        });

        Self { sender }
    }

    pub(crate) fn save(&self, credential: Credential) {
        self.enqueue(PersistCommand::Save(credential));
    }

    pub(crate) fn clear(&self) {
        self.enqueue(PersistCommand::Clear);
    }

    /// Wait until everything queued before this call has been applied.
    pub(crate) async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        self.enqueue(PersistCommand::Flush(ack));
        let _ = done.await;
    }

    fn enqueue(&self, command: PersistCommand) {
        if self.sender.send(command).is_err() {
            warn!("Persistence task is gone, dropping store operation");
        }
    }
}
