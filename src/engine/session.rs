//! Session controller
//!
//! A session is one execution of a frozen descriptor: one cursor, one fetch
//! buffer, one queue. Its scheduler runs as a spawned worker fed through an
//! unbounded channel. Cancelling a session makes it discard every queued and
//! future request without completing them.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::observability::{log_event_with_fields, Event};
use crate::query::QueryDescriptor;
use crate::search::SearchError;
use crate::source::RemoteCursorAdapter;

use super::request::PendingRequest;
use super::scheduler::{CancelFlag, Scheduler};

/// Handle to one running session
pub struct Session {
    sender: mpsc::UnboundedSender<PendingRequest>,
    cancel: CancelFlag,
    worker: JoinHandle<()>,
    adapter: RemoteCursorAdapter,
    descriptor: QueryDescriptor,
    existing_id: Option<String>,
}

impl Session {
    /// Spawn the worker for a fresh session. No remote call happens until the
    /// first request arrives.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(
        adapter: RemoteCursorAdapter,
        descriptor: QueryDescriptor,
        existing_id: Option<String>,
    ) -> Self {
        let (sender, inbox) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();
        let scheduler = Scheduler::new(
            adapter.clone(),
            descriptor.clone(),
            existing_id.clone(),
            cancel.clone(),
        )
        .with_inbox(inbox);
        let worker = tokio::spawn(scheduler.run());

        adapter.metrics().increment_sessions();
        let window = adapter.window_size().to_string();
        log_event_with_fields(
            Event::SessionStart,
            &[
                ("type", descriptor.search_type()),
                ("window_size", window.as_str()),
            ],
        );

        Self {
            sender,
            cancel,
            worker,
            adapter,
            descriptor,
            existing_id,
        }
    }

    /// Queue a request for the worker
    ///
    /// A cancelled session drops the request uncalled. If the worker is gone
    /// the request completes with `SearchError::Closed`.
    pub fn enqueue(&self, request: PendingRequest) {
        if self.cancel.is_cancelled() {
            self.adapter.metrics().add_discarded(1);
            return;
        }
        if let Err(mpsc::error::SendError(request)) = self.sender.send(request) {
            request.complete(Err(SearchError::Closed));
        }
    }

    /// Discard everything queued now or later
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the worker task is still alive
    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    /// Begin a new session over the same descriptor
    ///
    /// With `cancel_existing` the old session's outstanding requests are
    /// discarded. Otherwise it keeps serving what it already holds and its
    /// worker stops once this handle is dropped.
    pub fn restart(&self, cancel_existing: bool) -> Session {
        if cancel_existing {
            self.cancel_all();
        }
        let cancelled = if cancel_existing { "true" } else { "false" };
        log_event_with_fields(
            Event::SessionRestart,
            &[
                ("cancel_existing", cancelled),
                ("type", self.descriptor.search_type()),
            ],
        );
        Session::start(
            self.adapter.clone(),
            self.descriptor.clone(),
            self.existing_id.clone(),
        )
    }
}
