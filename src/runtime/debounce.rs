//! Debounced persistence writes.
//!
//! Edits can arrive in bursts; the saver coalesces save requests into one
//! write per debounce window and compares snapshots so an unchanged space is
//! never written at all. A failed write is logged and the pending snapshot
//! kept, so the next mutation's save request carries the retry.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::store::SpaceStore;
use crate::errors::{ErrorDetail, ErrorEvent, pretty_print_with_mode};
use crate::graph::FlowSnapshot;
use crate::telemetry::FormatterMode;
use crate::types::SpaceId;

struct SaverState {
    pending: Option<FlowSnapshot>,
    last_saved: Option<FlowSnapshot>,
    timer: Option<JoinHandle<()>>,
}

/// Coalesces snapshot save requests into debounced store writes.
pub struct DebouncedSaver {
    space_id: SpaceId,
    store: Arc<dyn SpaceStore>,
    window: Duration,
    state: Mutex<SaverState>,
}

impl DebouncedSaver {
    pub fn new(space_id: SpaceId, store: Arc<dyn SpaceStore>, window: Duration) -> Arc<Self> {
        Arc::new(Self {
            space_id,
            store,
            window,
            state: Mutex::new(SaverState {
                pending: None,
                last_saved: None,
                timer: None,
            }),
        })
    }

    /// Ask for `snapshot` to be persisted after the debounce window.
    ///
    /// A request identical to the last successfully saved snapshot is
    /// dropped; later requests within the window replace earlier ones.
    pub fn request_save(self: &Arc<Self>, snapshot: FlowSnapshot) {
        let mut state = self.state.lock();
        if state.pending.is_none() && state.last_saved.as_ref() == Some(&snapshot) {
            tracing::debug!(space_id = %self.space_id, "snapshot unchanged; save skipped");
            return;
        }
        state.pending = Some(snapshot);

        let timer_done = state
            .timer
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true);
        if timer_done {
            let saver = Arc::clone(self);
            state.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(saver.window).await;
                saver.flush().await;
            }));
        }
    }

    /// Write the pending snapshot now, if there is one.
    ///
    /// On failure the snapshot stays pending; the write is retried when the
    /// next mutation requests a save.
    pub async fn flush(self: &Arc<Self>) {
        let snapshot = {
            let mut state = self.state.lock();
            match state.pending.take() {
                Some(snapshot) => snapshot,
                None => return,
            }
        };

        match self.store.save(&self.space_id, &snapshot).await {
            Ok(()) => {
                let mut state = self.state.lock();
                state.last_saved = Some(snapshot);
                tracing::debug!(space_id = %self.space_id, "space saved");
            }
            Err(err) => {
                let event = ErrorEvent::persistence(
                    self.space_id.as_str(),
                    ErrorDetail::msg(err.to_string()),
                )
                .with_tag("retry");
                tracing::error!(
                    space_id = %self.space_id,
                    detail = %pretty_print_with_mode(&[event], FormatterMode::Plain),
                    "space save failed; will retry on next mutation"
                );
                let mut state = self.state.lock();
                // A newer request may have landed while the write was in
                // flight; it supersedes the failed one.
                if state.pending.is_none() {
                    state.pending = Some(snapshot);
                }
            }
        }
    }

    /// Whether a write is waiting for its window (or a retry).
    pub fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

impl Drop for DebouncedSaver {
    fn drop(&mut self) {
        if let Some(timer) = self.state.lock().timer.take() {
            timer.abort();
        }
    }
}
