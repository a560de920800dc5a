//! Request queue and drain loop
//!
//! The scheduler owns a session's fetch buffer and queue. Requests are served
//! strictly in arrival order; a remote window is fetched only when the head
//! request cannot be answered from the buffer.
//!
//! Running as a session worker, it receives requests over a channel, yields
//! once so every request issued in the same tick is queued, then drains.
//! Only the worker touches the buffer, so a drain never overlaps another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::observability::{log_event_with_fields, Event};
use crate::query::QueryDescriptor;
use crate::search::{SearchError, SearchResult};
use crate::source::{RemoteCursorAdapter, ResultCursor};

use super::buffer::FetchBuffer;
use super::request::PendingRequest;

/// Whether a drain pass is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Idle,
    Draining,
}

/// Shared cancellation flag, set by the session and read by the drain loop
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Fetch buffer, queue and cursor of one session
pub struct Scheduler {
    adapter: RemoteCursorAdapter,
    descriptor: QueryDescriptor,
    existing_id: Option<String>,
    cursor: Option<ResultCursor>,
    buffer: FetchBuffer,
    task_queue: VecDeque<PendingRequest>,
    state: DrainState,
    cancel: CancelFlag,
    inbox: Option<mpsc::UnboundedReceiver<PendingRequest>>,
}

impl Scheduler {
    pub fn new(
        adapter: RemoteCursorAdapter,
        descriptor: QueryDescriptor,
        existing_id: Option<String>,
        cancel: CancelFlag,
    ) -> Self {
        let buffer = FetchBuffer::new(adapter.window_size());
        Self {
            adapter,
            descriptor,
            existing_id,
            cursor: None,
            buffer,
            task_queue: VecDeque::new(),
            state: DrainState::Idle,
            cancel,
            inbox: None,
        }
    }

    /// Receive requests from `inbox` while running as a worker
    pub fn with_inbox(mut self, inbox: mpsc::UnboundedReceiver<PendingRequest>) -> Self {
        self.inbox = Some(inbox);
        self
    }

    pub fn buffer(&self) -> &FetchBuffer {
        &self.buffer
    }

    pub fn queue_len(&self) -> usize {
        self.task_queue.len()
    }

    pub fn state(&self) -> DrainState {
        self.state
    }

    pub fn has_cursor(&self) -> bool {
        self.cursor.is_some()
    }

    /// Queue a request without draining
    pub fn enqueue(&mut self, request: PendingRequest) {
        self.adapter.metrics().increment_enqueued();
        self.task_queue.push_back(request);
    }

    /// Worker loop: wait for a request, let the tick settle, drain
    ///
    /// Ends when every sender is gone and the queue is empty, or after a
    /// drain observes cancellation.
    pub async fn run(mut self) {
        loop {
            let Some(inbox) = self.inbox.as_mut() else {
                break;
            };
            let Some(request) = inbox.recv().await else {
                break;
            };
            self.enqueue(request);

            // Coalesce everything issued in the same tick into one pass
            tokio::task::yield_now().await;
            self.drain().await;

            if self.cancel.is_cancelled() {
                break;
            }
        }
    }

    /// Serve queued requests, fetching windows until the head cannot be
    /// helped by more data or the queue is empty
    pub async fn drain(&mut self) {
        if self.state == DrainState::Draining {
            return;
        }
        self.state = DrainState::Draining;

        loop {
            self.absorb_inbox();
            if self.cancel.is_cancelled() {
                self.discard_all();
                break;
            }

            self.serve_ready();
            if self.task_queue.is_empty() {
                break;
            }

            if let Err(e) = self.fetch_next_window().await {
                if self.cancel.is_cancelled() {
                    self.discard_all();
                } else {
                    self.fail_all(e);
                }
                break;
            }
        }

        self.state = DrainState::Idle;
    }

    fn absorb_inbox(&mut self) {
        let Some(inbox) = self.inbox.as_mut() else {
            return;
        };
        while let Ok(request) = inbox.try_recv() {
            self.adapter.metrics().increment_enqueued();
            self.task_queue.push_back(request);
        }
    }

    /// Pop and complete every head request the buffer can answer
    fn serve_ready(&mut self) {
        while self
            .task_queue
            .front()
            .map_or(false, |head| self.buffer.can_satisfy(head.amount()))
        {
            let Some(request) = self.task_queue.pop_front() else {
                break;
            };
            let rows = self.buffer.take(request.amount());
            self.adapter.metrics().increment_served();
            request.complete(Ok(rows));
        }
    }

    async fn fetch_next_window(&mut self) -> SearchResult<()> {
        let cursor = match &self.cursor {
            Some(cursor) => cursor.clone(),
            None => {
                let cursor = self
                    .adapter
                    .open_cursor(&self.descriptor, self.existing_id.as_deref())
                    .await?;
                self.cursor = Some(cursor.clone());
                cursor
            }
        };
        if self.cancel.is_cancelled() {
            return Ok(());
        }

        let window = self.buffer.next_window_index();
        let rows = self.adapter.fetch_window(&cursor, window).await?;

        // Results of a fetch that straddled cancellation are dropped
        if self.cancel.is_cancelled() {
            return Ok(());
        }

        if self.buffer.append_window(rows) {
            let windows = self.buffer.next_window_index().to_string();
            let buffered = self.buffer.len().to_string();
            log_event_with_fields(
                Event::SourceExhausted,
                &[("buffered", buffered.as_str()), ("windows", windows.as_str())],
            );
        }
        Ok(())
    }

    /// Hand the same error to every queued request, including those that
    /// arrived while the failed call was in flight
    fn fail_all(&mut self, error: SearchError) {
        self.absorb_inbox();
        let failed = self.task_queue.len();
        for request in self.task_queue.drain(..) {
            request.complete(Err(error.clone()));
        }
        self.adapter.metrics().add_failed(failed);
    }

    /// Drop every queued request without completing it
    fn discard_all(&mut self) {
        self.absorb_inbox();
        let discarded = self.task_queue.len();
        self.task_queue.clear();
        if discarded > 0 {
            self.adapter.metrics().add_discarded(discarded);
            let count = discarded.to_string();
            log_event_with_fields(Event::RequestsDiscarded, &[("count", count.as_str())]);
        }
    }
}
