//! Search facade
//!
//! The object callers hold: a descriptor to build, then a stream of result
//! batches pulled from the current session.

use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use serde_json::{Map, Value};

use crate::config::{ConfigResult, EngineConfig};
use crate::engine::{Amount, Batch, PendingRequest, Session};
use crate::observability::{log_event_with_fields, EngineMetrics, Event, MetricsSnapshot};
use crate::query::{ColumnHandle, ColumnSpec, FilterHandle, FilterSpec, QueryDescriptor};
use crate::source::{RemoteCursorAdapter, RemoteSource, Row, UsageGauge};

use super::errors::SearchResult;

/// A paginated search over a remote source
///
/// Filters and columns may be added until the first result request. From
/// then on the descriptor is frozen and builder calls fail with
/// `SearchError::UsageOrder`.
///
/// Sessions are spawned on the ambient tokio runtime, so result requests
/// must be issued from inside one.
pub struct Search {
    adapter: RemoteCursorAdapter,
    descriptor: QueryDescriptor,
    existing_id: Option<String>,
    session: Option<Session>,
    usage: UsageGauge,
    metrics: Arc<EngineMetrics>,
    low_usage_threshold: u64,
}

impl Search {
    /// New search over records of `search_type`
    pub fn create(source: Arc<dyn RemoteSource>, search_type: impl Into<String>) -> Self {
        Self::build(
            source,
            QueryDescriptor::new(search_type),
            None,
            &EngineConfig::default(),
        )
    }

    /// New search with explicit engine settings; rejects an invalid config
    pub fn create_with_config(
        source: Arc<dyn RemoteSource>,
        search_type: impl Into<String>,
        config: &EngineConfig,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(source, QueryDescriptor::new(search_type), None, config))
    }

    /// Search based on a saved definition
    ///
    /// Filters and columns added here refine the saved ones.
    pub fn load(
        source: Arc<dyn RemoteSource>,
        search_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self::build(
            source,
            QueryDescriptor::new(search_type),
            Some(id.into()),
            &EngineConfig::default(),
        )
    }

    pub fn load_with_config(
        source: Arc<dyn RemoteSource>,
        search_type: impl Into<String>,
        id: impl Into<String>,
        config: &EngineConfig,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(
            source,
            QueryDescriptor::new(search_type),
            Some(id.into()),
            config,
        ))
    }

    fn build(
        source: Arc<dyn RemoteSource>,
        descriptor: QueryDescriptor,
        existing_id: Option<String>,
        config: &EngineConfig,
    ) -> Self {
        let usage = UsageGauge::new();
        let metrics = Arc::new(EngineMetrics::new());
        let adapter = RemoteCursorAdapter::new(source, config, usage.clone(), Arc::clone(&metrics));
        Self {
            adapter,
            descriptor,
            existing_id,
            session: None,
            usage,
            metrics,
            low_usage_threshold: config.low_usage_threshold,
        }
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Id of the saved search this was loaded from
    pub fn existing_id(&self) -> Option<&str> {
        self.existing_id.as_deref()
    }

    pub fn add_filter(&mut self, filter: FilterSpec) -> SearchResult<FilterHandle<'_>> {
        Ok(self.descriptor.add_filter(filter)?)
    }

    pub fn add_column(&mut self, column: ColumnSpec) -> SearchResult<ColumnHandle<'_>> {
        Ok(self.descriptor.add_column(column)?)
    }

    pub fn add_filters(&mut self, filters: impl IntoIterator<Item = FilterSpec>) -> SearchResult<()> {
        Ok(self.descriptor.add_filters(filters)?)
    }

    pub fn add_columns(&mut self, columns: impl IntoIterator<Item = ColumnSpec>) -> SearchResult<()> {
        Ok(self.descriptor.add_columns(columns)?)
    }

    /// The current session, started on first use
    fn session(&mut self) -> &Session {
        if self.session.is_none() {
            self.descriptor.freeze();
        }
        let (adapter, descriptor, existing_id) = (&self.adapter, &self.descriptor, &self.existing_id);
        self.session.get_or_insert_with(|| {
            Session::start(adapter.clone(), descriptor.clone(), existing_id.clone())
        })
    }

    /// Request the next `amount` rows, delivering the outcome to `callback`
    ///
    /// The callback runs on the session worker. If the session is cancelled
    /// before the request is served it is never called.
    pub fn get_next_with<F>(&mut self, amount: usize, callback: F)
    where
        F: FnOnce(SearchResult<Vec<Row>>) + Send + 'static,
    {
        let request = PendingRequest::new(Amount::Count(amount), callback);
        self.session().enqueue(request);
    }

    /// Request the next `amount` rows
    ///
    /// Fewer rows come back only once the source is exhausted; an empty
    /// batch means there is nothing left.
    pub fn get_next(&mut self, amount: usize) -> Batch {
        self.request(Amount::Count(amount))
    }

    /// Request a single row; `None` once the source is exhausted
    pub fn get_one(&mut self) -> impl Future<Output = SearchResult<Option<Row>>> + Send {
        let batch = self.get_next(1);
        async move { Ok(batch.await?.into_iter().next()) }
    }

    /// Every remaining row
    pub fn get_rest(&mut self) -> Batch {
        self.request(Amount::Unbounded)
    }

    fn request(&mut self, amount: Amount) -> Batch {
        let (request, batch) = PendingRequest::channel(amount);
        self.session().enqueue(request);
        batch
    }

    /// Call `per_item` on every remaining row, one window at a time
    pub async fn for_each<F>(&mut self, mut per_item: F) -> SearchResult<()>
    where
        F: FnMut(Row),
    {
        let window_size = self.adapter.window_size();
        loop {
            let batch = self.get_next(window_size).await?;
            if batch.is_empty() {
                return Ok(());
            }
            batch.into_iter().for_each(&mut per_item);
        }
    }

    /// Remaining rows as a stream, pulled one window at a time
    ///
    /// The stream ends after the first error.
    pub fn stream(&mut self) -> impl Stream<Item = SearchResult<Row>> + '_ {
        let window_size = self.adapter.window_size();
        stream::unfold(
            (self, Vec::<Row>::new().into_iter(), false),
            move |(search, mut pending, done)| async move {
                if let Some(row) = pending.next() {
                    return Some((Ok(row), (search, pending, done)));
                }
                if done {
                    return None;
                }
                match search.get_next(window_size).await {
                    Ok(batch) => {
                        let mut rows = batch.into_iter();
                        let row = rows.next()?;
                        Some((Ok(row), (search, rows, false)))
                    }
                    Err(e) => Some((Err(e), (search, Vec::new().into_iter(), true))),
                }
            },
        )
    }

    /// Begin again from the first row
    ///
    /// With `cancel_existing` every outstanding request of the current
    /// session is discarded and never completes. Without it they are still
    /// served from the old session. Does nothing before the first request.
    pub fn start_over(&mut self, cancel_existing: bool) {
        if let Some(session) = self.session.take() {
            self.session = Some(session.restart(cancel_existing));
        }
    }

    /// Persist the search definition remotely, returning its id
    pub async fn save(&self) -> SearchResult<String> {
        let id = self
            .adapter
            .save(&self.descriptor, self.existing_id.as_deref())
            .await?;
        log_event_with_fields(
            Event::SearchSaved,
            &[("id", id.as_str()), ("type", self.descriptor.search_type())],
        );
        Ok(id)
    }

    /// Fetch selected fields of a single record
    pub async fn lookup_fields(
        &self,
        record_type: &str,
        id: &str,
        columns: &[String],
    ) -> SearchResult<Map<String, Value>> {
        let fields = self.adapter.lookup_fields(record_type, id, columns).await?;
        log_event_with_fields(Event::FieldsLookedUp, &[("id", id), ("type", record_type)]);
        Ok(fields)
    }

    /// Usage units left as of the last remote call; `None` before any call
    pub fn remaining_usage(&self) -> Option<u64> {
        self.usage.get()
    }

    /// Whether the last observed usage is below the configured threshold
    pub fn usage_is_low(&self) -> bool {
        self.usage
            .get()
            .map_or(false, |remaining| remaining < self.low_usage_threshold)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::query::{Operator, SortOrder};
    use crate::search::SearchError;
    use crate::source::InMemorySource;
    use futures_util::StreamExt;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| json!({"id": i, "even": i % 2 == 0})).collect()
    }

    fn search_over(n: usize, window_size: usize) -> (Arc<InMemorySource>, Search) {
        let source = Arc::new(InMemorySource::new().with_records("item", rows(n)));
        let config = EngineConfig::default().with_window_size(window_size);
        let search = Search::create_with_config(Arc::clone(&source) as Arc<dyn RemoteSource>, "item", &config)
            .unwrap();
        (source, search)
    }

    #[test]
    fn test_zero_window_rejected_at_construction() {
        let source = Arc::new(InMemorySource::new().with_records("item", rows(3)));
        let config = EngineConfig::default().with_window_size(0);

        let created = Search::create_with_config(Arc::clone(&source) as Arc<dyn RemoteSource>, "item", &config);
        assert!(matches!(
            created,
            Err(ConfigError::Invalid { field: "window_size", .. })
        ));
        let loaded = Search::load_with_config(source, "item", "42", &config);
        assert!(matches!(
            loaded,
            Err(ConfigError::Invalid { field: "window_size", .. })
        ));
    }

    #[tokio::test]
    async fn test_builder_fails_after_first_request() {
        let (_, mut search) = search_over(3, 10);
        search.add_filter(FilterSpec::is("even", true)).unwrap();

        let batch = search.get_next(5).await.unwrap();
        assert_eq!(batch.len(), 2);

        let err = search.add_column(ColumnSpec::new("id")).unwrap_err();
        assert_eq!(err.code(), "PAGED_USAGE_ORDER");
        assert!(matches!(
            search.add_filter(FilterSpec::new("id", Operator::IsEmpty, Vec::new())),
            Err(SearchError::UsageOrder(_))
        ));
    }

    #[tokio::test]
    async fn test_get_one_unwraps_and_ends_with_none() {
        let (_, mut search) = search_over(2, 10);
        assert_eq!(search.get_one().await.unwrap(), Some(json!({"id": 0, "even": true})));
        assert_eq!(search.get_one().await.unwrap().unwrap()["id"], 1);
        assert_eq!(search.get_one().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_for_each_visits_every_row_in_order() {
        let (source, mut search) = search_over(23, 10);
        let mut seen = Vec::new();
        search
            .for_each(|row| seen.push(row["id"].as_u64().unwrap()))
            .await
            .unwrap();

        assert_eq!(seen, (0..23).collect::<Vec<_>>());
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_stream_yields_rows_then_ends() {
        let (_, mut search) = search_over(12, 5);
        let ids: Vec<_> = search
            .stream()
            .map(|row| row.unwrap()["id"].as_u64().unwrap())
            .collect()
            .await;
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_start_over_before_any_request_is_a_no_op() {
        let (source, mut search) = search_over(3, 10);
        search.start_over(true);
        assert!(!search.descriptor().is_frozen());
        assert_eq!(source.open_count(), 0);

        search.add_column(ColumnSpec::new("even")).unwrap().set_sort(SortOrder::Asc);
        assert_eq!(search.get_next(3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_callback_form() {
        let (_, mut search) = search_over(4, 10);
        let (tx, rx) = tokio::sync::oneshot::channel();
        search.get_next_with(3, move |result| {
            let _ = tx.send(result);
        });
        assert_eq!(rx.await.unwrap().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_usage_gauge_tracks_remote_calls() {
        let source = Arc::new(
            InMemorySource::new()
                .with_records("item", rows(3))
                .with_usage(40, 10),
        );
        let mut search = Search::create(Arc::clone(&source) as Arc<dyn RemoteSource>, "item");
        assert_eq!(search.remaining_usage(), None);
        assert!(!search.usage_is_low());

        search.get_rest().await.unwrap();
        // create, run and one fetch
        assert_eq!(search.remaining_usage(), Some(10));
        assert!(search.usage_is_low());
    }

    #[tokio::test]
    async fn test_save_then_load_refines() {
        let (source, mut search) = search_over(6, 10);
        search.add_filter(FilterSpec::is("even", true)).unwrap();
        let id = search.save().await.unwrap();
        assert!(!search.descriptor().is_frozen());

        let mut loaded = Search::load(Arc::clone(&source) as Arc<dyn RemoteSource>, "item", id);
        loaded
            .add_filter(FilterSpec::new("id", Operator::GreaterThan, vec![json!(1)]))
            .unwrap();
        let ids: Vec<_> = loaded
            .get_rest()
            .await
            .unwrap()
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_lookup_fields() {
        let (_, search) = search_over(3, 10);
        let fields = search
            .lookup_fields("item", "2", &["even".to_string()])
            .await
            .unwrap();
        assert_eq!(fields["even"], true);
        assert_eq!(search.metrics().sessions_started, 0);
    }
}
