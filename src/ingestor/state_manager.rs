use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::models::{IngestPhase, IngestProgress};

/// Single overwritten progress slot for one ingestion at a time
///
/// Observers read the latest value and never block the publisher. Published
/// overall fractions never decrease until the slot is cleared.
#[derive(Clone)]
pub struct IngestionStateManager {
    progress_tx: Arc<watch::Sender<Option<IngestProgress>>>,
}

impl IngestionStateManager {
    pub fn new() -> Self {
        let (progress_tx, _) = watch::channel(None);
        Self {
            progress_tx: Arc::new(progress_tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<IngestProgress>> {
        self.progress_tx.subscribe()
    }

    /// Progress updates as a stream, starting with the current value
    pub fn progress_stream(&self) -> WatchStream<Option<IngestProgress>> {
        WatchStream::new(self.subscribe())
    }

    pub fn current(&self) -> Option<IngestProgress> {
        self.progress_tx.borrow().clone()
    }

    /// Publish progress within `phase`, clamped so the overall fraction never goes backwards
    pub fn update_progress(&self, phase: IngestPhase, phase_fraction: f64, label: impl Into<String>) {
        let overall = phase.overall(phase_fraction);
        let label = label.into();
        self.progress_tx.send_modify(|slot| {
            let floor = slot.as_ref().map(|p| p.overall_fraction).unwrap_or(0.0);
            *slot = Some(IngestProgress {
                label,
                overall_fraction: overall.max(floor),
                phase,
            });
        });
    }

    pub fn clear(&self) {
        self.progress_tx.send_replace(None);
    }
}

impl Default for IngestionStateManager {
    fn default() -> Self {
        Self::new()
    }
}
