//! Remote Cursor Adapter
//!
//! Thin layer over a `RemoteSource` that speaks in windows instead of raw
//! ranges. After every remote call it refreshes the usage gauge. It never
//! retries; remote errors come back unchanged.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::observability::{log_event_with_fields, EngineMetrics, Event};
use crate::query::QueryDescriptor;
use crate::search::{SearchError, SearchResult};

use super::errors::SourceError;
use super::remote::{RemoteSource, ResultCursor, Row, SearchHandle};
use super::usage::UsageGauge;

/// Window-oriented view of a remote source
#[derive(Clone)]
pub struct RemoteCursorAdapter {
    source: Arc<dyn RemoteSource>,
    window_size: usize,
    open_timeout: Duration,
    low_usage_threshold: u64,
    usage: UsageGauge,
    metrics: Arc<EngineMetrics>,
}

impl RemoteCursorAdapter {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        config: &EngineConfig,
        usage: UsageGauge,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            source,
            window_size: config.window_size,
            open_timeout: config.open_timeout(),
            low_usage_threshold: config.low_usage_threshold,
            usage,
            metrics,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Obtain a search handle: load when an id is given, create otherwise
    pub async fn open(
        &self,
        descriptor: &QueryDescriptor,
        existing_id: Option<&str>,
    ) -> SearchResult<SearchHandle> {
        let result = match existing_id {
            Some(id) => self.source.load(id, descriptor).await,
            None => self.source.create(descriptor).await,
        };
        self.refresh_usage();
        Ok(result?)
    }

    pub async fn run(&self, handle: &SearchHandle) -> SearchResult<ResultCursor> {
        let result = self.source.run(handle).await;
        self.refresh_usage();
        Ok(result?)
    }

    /// Open and run under the configured timeout
    pub async fn open_cursor(
        &self,
        descriptor: &QueryDescriptor,
        existing_id: Option<&str>,
    ) -> SearchResult<ResultCursor> {
        let opening = async {
            let handle = self.open(descriptor, existing_id).await?;
            self.run(&handle).await
        };

        let outcome = match tokio::time::timeout(self.open_timeout, opening).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SearchError::Timeout(self.open_timeout.as_millis() as u64)),
        };

        match &outcome {
            Ok(cursor) => {
                self.metrics.increment_cursors();
                log_event_with_fields(
                    Event::CursorOpen,
                    &[
                        ("cursor", cursor.token()),
                        ("type", descriptor.search_type()),
                    ],
                );
            }
            Err(e) => {
                let reason = e.to_string();
                log_event_with_fields(
                    Event::CursorOpenFailed,
                    &[("reason", reason.as_str()), ("type", descriptor.search_type())],
                );
            }
        }
        outcome
    }

    /// Fetch window `window_index`, i.e. rows `[k*W, (k+1)*W)`
    ///
    /// Fewer than `W` rows means the source is exhausted at that offset.
    pub async fn fetch_window(
        &self,
        cursor: &ResultCursor,
        window_index: usize,
    ) -> SearchResult<Vec<Row>> {
        let overflow = || SourceError::RangeOverflow {
            window: window_index,
            window_size: self.window_size,
        };
        let start = window_index
            .checked_mul(self.window_size)
            .ok_or_else(overflow)?;
        let end = start.checked_add(self.window_size).ok_or_else(overflow)?;

        let result = self.source.fetch_range(cursor, start, end).await;
        self.refresh_usage();

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                self.metrics.increment_fetch_failures();
                let reason = e.to_string();
                let window = window_index.to_string();
                log_event_with_fields(
                    Event::WindowFetchFailed,
                    &[("reason", reason.as_str()), ("window", window.as_str())],
                );
                return Err(e.into());
            }
        };

        if rows.len() > self.window_size {
            self.metrics.increment_fetch_failures();
            return Err(SourceError::WindowOverflow {
                window: window_index,
                returned: rows.len(),
                window_size: self.window_size,
            }
            .into());
        }

        self.metrics.record_window(rows.len());
        let window = window_index.to_string();
        let count = rows.len().to_string();
        log_event_with_fields(
            Event::WindowFetch,
            &[("rows", count.as_str()), ("window", window.as_str())],
        );
        Ok(rows)
    }

    /// Persist the search definition, returning its id
    pub async fn save(
        &self,
        descriptor: &QueryDescriptor,
        existing_id: Option<&str>,
    ) -> SearchResult<String> {
        let handle = self.open(descriptor, existing_id).await?;
        let result = self.source.save(&handle).await;
        self.refresh_usage();
        Ok(result?)
    }

    /// Single-record lookup, one round trip
    pub async fn lookup_fields(
        &self,
        record_type: &str,
        id: &str,
        columns: &[String],
    ) -> SearchResult<Map<String, Value>> {
        let result = self.source.lookup_fields(record_type, id, columns).await;
        self.refresh_usage();
        Ok(result?)
    }

    fn refresh_usage(&self) {
        let remaining = self.source.remaining_usage();
        let previous = self.usage.get();
        self.usage.record(remaining);

        // Warn once per crossing
        let was_low = previous.map_or(false, |p| p < self.low_usage_threshold);
        if remaining < self.low_usage_threshold && !was_low {
            let value = remaining.to_string();
            log_event_with_fields(Event::UsageLow, &[("remaining", value.as_str())]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use serde_json::json;
    use std::time::Duration;

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| json!({"id": i})).collect()
    }

    fn adapter_over(source: InMemorySource, config: &EngineConfig) -> (RemoteCursorAdapter, UsageGauge) {
        let usage = UsageGauge::new();
        let adapter = RemoteCursorAdapter::new(
            Arc::new(source),
            config,
            usage.clone(),
            Arc::new(EngineMetrics::new()),
        );
        (adapter, usage)
    }

    #[tokio::test]
    async fn test_fetch_window_ranges() {
        let config = EngineConfig::default().with_window_size(4);
        let (adapter, _) = adapter_over(InMemorySource::new().with_records("item", rows(6)), &config);
        let descriptor = QueryDescriptor::new("item");

        let cursor = adapter.open_cursor(&descriptor, None).await.unwrap();
        assert_eq!(adapter.fetch_window(&cursor, 0).await.unwrap().len(), 4);
        assert_eq!(adapter.fetch_window(&cursor, 1).await.unwrap(), vec![json!({"id": 4}), json!({"id": 5})]);
        assert!(adapter.fetch_window(&cursor, 2).await.unwrap().is_empty());

        let snapshot = adapter.metrics().snapshot();
        assert_eq!(snapshot.cursors_opened, 1);
        assert_eq!(snapshot.windows_fetched, 3);
        assert_eq!(snapshot.rows_fetched, 6);
    }

    #[tokio::test]
    async fn test_usage_gauge_follows_every_call() {
        let source = InMemorySource::new()
            .with_records("item", rows(2))
            .with_usage(100, 10);
        let (adapter, usage) = adapter_over(source, &EngineConfig::default());
        assert_eq!(usage.get(), None);

        let handle = adapter.open(&QueryDescriptor::new("item"), None).await.unwrap();
        assert_eq!(usage.get(), Some(90));
        adapter.run(&handle).await.unwrap();
        assert_eq!(usage.get(), Some(80));
    }

    #[tokio::test]
    async fn test_open_with_unknown_id_fails() {
        let (adapter, _) = adapter_over(InMemorySource::new(), &EngineConfig::default());
        let err = adapter
            .open_cursor(&QueryDescriptor::new("item"), Some("customsearch_404"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::RemoteFetch(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_open_cursor_times_out() {
        let source = InMemorySource::new().with_delay(Duration::from_millis(200));
        let config = EngineConfig::default().with_open_timeout_ms(10);
        let (adapter, _) = adapter_over(source, &config);

        let err = adapter
            .open_cursor(&QueryDescriptor::new("item"), None)
            .await
            .unwrap_err();
        assert_eq!(err, SearchError::Timeout(10));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_counted_and_verbatim() {
        let fault = SourceError::remote("SSS_USAGE_LIMIT_EXCEEDED", "Script Execution Usage Limit Exceeded");
        let source = InMemorySource::new().with_records("item", rows(3));
        source.fail_next_fetches(1, fault.clone());
        let (adapter, _) = adapter_over(source, &EngineConfig::default());
        let cursor = adapter
            .open_cursor(&QueryDescriptor::new("item"), None)
            .await
            .unwrap();

        assert_eq!(
            adapter.fetch_window(&cursor, 0).await,
            Err(SearchError::RemoteFetch(fault))
        );
        assert_eq!(adapter.metrics().snapshot().fetch_failures, 1);
        assert_eq!(adapter.fetch_window(&cursor, 0).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unaddressable_window_is_an_error() {
        let config = EngineConfig::default().with_window_size(usize::MAX / 2);
        let (adapter, _) = adapter_over(InMemorySource::new().with_records("item", rows(1)), &config);
        let cursor = adapter
            .open_cursor(&QueryDescriptor::new("item"), None)
            .await
            .unwrap();

        let err = adapter.fetch_window(&cursor, 3).await.unwrap_err();
        assert_eq!(
            err,
            SearchError::RemoteFetch(SourceError::RangeOverflow {
                window: 3,
                window_size: usize::MAX / 2,
            })
        );
    }

    #[tokio::test]
    async fn test_save_returns_id() {
        let (adapter, _) = adapter_over(InMemorySource::new(), &EngineConfig::default());
        let id = adapter.save(&QueryDescriptor::new("item"), None).await.unwrap();
        assert_eq!(id, "customsearch_1");
    }
}
