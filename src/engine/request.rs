//! Pending requests and their completions
//!
//! A request carries how many rows it wants and a completion to call with
//! the outcome. The future form, `Batch`, is a completion that feeds a
//! oneshot channel.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::search::SearchResult;
use crate::source::Row;

/// How many rows a request wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amount {
    Count(usize),
    /// Everything up to exhaustion
    Unbounded,
}

impl Amount {
    /// Whether `available` rows are enough
    pub fn fits(&self, available: usize) -> bool {
        match self {
            Amount::Count(n) => *n <= available,
            Amount::Unbounded => false,
        }
    }

    /// Rows to hand out when `available` are buffered
    pub fn clamp(&self, available: usize) -> usize {
        match self {
            Amount::Count(n) => (*n).min(available),
            Amount::Unbounded => available,
        }
    }
}

impl From<usize> for Amount {
    fn from(n: usize) -> Self {
        Amount::Count(n)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Count(n) => write!(f, "{}", n),
            Amount::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Called exactly once with the outcome, or dropped uncalled on cancellation
pub type Completion = Box<dyn FnOnce(SearchResult<Vec<Row>>) + Send + 'static>;

/// A queued consumer request
pub struct PendingRequest {
    amount: Amount,
    completion: Completion,
}

impl PendingRequest {
    pub fn new<F>(amount: Amount, completion: F) -> Self
    where
        F: FnOnce(SearchResult<Vec<Row>>) + Send + 'static,
    {
        Self {
            amount,
            completion: Box::new(completion),
        }
    }

    /// A request whose outcome is delivered to the returned `Batch`
    pub fn channel(amount: Amount) -> (Self, Batch) {
        let (tx, rx) = oneshot::channel();
        let request = Self::new(amount, move |result| {
            // Receiver may have been dropped; nobody is listening then
            let _ = tx.send(result);
        });
        (request, Batch { rx: Some(rx) })
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Deliver the outcome
    pub fn complete(self, result: SearchResult<Vec<Row>>) {
        (self.completion)(result)
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// Future resolving to one request's rows
///
/// A request discarded by cancellation never completes, so its `Batch` never
/// resolves. Drop it or bound it with a timeout.
#[derive(Debug)]
pub struct Batch {
    rx: Option<oneshot::Receiver<SearchResult<Vec<Row>>>>,
}

impl Future for Batch {
    type Output = SearchResult<Vec<Row>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(rx).poll(cx) {
            Poll::Ready(Ok(result)) => {
                this.rx = None;
                Poll::Ready(result)
            }
            // Completion dropped uncalled: the request was discarded
            Poll::Ready(Err(_)) => {
                this.rx = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchError;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_amount_fits_and_clamp() {
        assert!(Amount::Count(3).fits(3));
        assert!(!Amount::Count(4).fits(3));
        assert!(!Amount::Unbounded.fits(usize::MAX));
        assert_eq!(Amount::Count(10).clamp(4), 4);
        assert_eq!(Amount::Unbounded.clamp(4), 4);
        assert_eq!(Amount::from(7usize), Amount::Count(7));
        assert_eq!(Amount::Unbounded.to_string(), "unbounded");
    }

    #[test]
    fn test_callback_completion() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let request = PendingRequest::new(Amount::Count(1), move |r| {
            *sink.lock().unwrap() = Some(r);
        });

        request.complete(Ok(vec![json!(1)]));
        assert_eq!(*seen.lock().unwrap(), Some(Ok(vec![json!(1)])));
    }

    #[tokio::test]
    async fn test_batch_resolves() {
        let (request, batch) = PendingRequest::channel(Amount::Count(2));
        request.complete(Err(SearchError::Closed));
        assert_eq!(batch.await, Err(SearchError::Closed));
    }

    #[tokio::test]
    async fn test_discarded_batch_never_resolves() {
        let (request, batch) = PendingRequest::channel(Amount::Count(2));
        drop(request);

        let waited = tokio::time::timeout(Duration::from_millis(20), batch).await;
        assert!(waited.is_err());
    }
}
