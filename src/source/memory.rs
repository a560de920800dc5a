//! In-memory remote source
//!
//! A `RemoteSource` over rows held in memory, grouped by record type. It
//! evaluates filters, applies column sorts and projections, keeps saved
//! searches, and records every range fetch so callers can assert on the
//! exact remote traffic. Faults and delays can be injected.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::query::{ColumnSpec, FilterSpec, Operator, QueryDescriptor, SortOrder};

use super::errors::{SourceError, SourceResult};
use super::remote::{RemoteSource, ResultCursor, Row, SearchHandle, SourceFuture};

/// Starting usage budget, matching a fresh client script
pub const DEFAULT_USAGE_BUDGET: u64 = 1000;

/// Usage units charged per remote call
pub const DEFAULT_USAGE_COST: u64 = 10;

/// One recorded `fetch_range` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub cursor: String,
    pub start: usize,
    pub end: usize,
}

/// Releases held range fetches one at a time
#[derive(Debug, Clone)]
pub struct FetchGate {
    permits: Arc<Semaphore>,
}

impl FetchGate {
    /// Let `n` more fetches through
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }
}

#[derive(Default)]
struct MemoryState {
    records: HashMap<String, Vec<Row>>,
    searches: HashMap<String, QueryDescriptor>,
    saved: HashMap<String, QueryDescriptor>,
    cursors: HashMap<String, Vec<Row>>,
    fetch_log: Vec<FetchCall>,
    opens: usize,
    runs: usize,
    fail_fetches: usize,
    fail_opens: usize,
    fault: Option<SourceError>,
}

/// In-memory `RemoteSource`
pub struct InMemorySource {
    state: Mutex<MemoryState>,
    usage: AtomicU64,
    usage_cost: u64,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            usage: AtomicU64::new(DEFAULT_USAGE_BUDGET),
            usage_cost: DEFAULT_USAGE_COST,
            delay: None,
            gate: None,
        }
    }

    /// Add rows for a record type
    pub fn with_records(self, record_type: impl Into<String>, rows: Vec<Row>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.records.entry(record_type.into()).or_default().extend(rows);
        }
        self
    }

    /// Set the usage budget and per-call cost
    pub fn with_usage(mut self, budget: u64, cost: u64) -> Self {
        self.usage = AtomicU64::new(budget);
        self.usage_cost = cost;
        self
    }

    /// Delay every remote call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every range fetch until the returned gate releases it
    pub fn gated(mut self) -> (Self, FetchGate) {
        let permits = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&permits));
        (self, FetchGate { permits })
    }

    /// Fail the next `count` range fetches with `error`
    pub fn fail_next_fetches(&self, count: usize, error: SourceError) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_fetches = count;
            state.fault = Some(error);
        }
    }

    /// Fail the next `count` create/load calls with `error`
    pub fn fail_next_opens(&self, count: usize, error: SourceError) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_opens = count;
            state.fault = Some(error);
        }
    }

    /// Every range fetch so far, in call order
    pub fn fetch_calls(&self) -> Vec<FetchCall> {
        self.state
            .lock()
            .map(|s| s.fetch_log.clone())
            .unwrap_or_default()
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().map(|s| s.fetch_log.len()).unwrap_or(0)
    }

    /// Number of create/load calls
    pub fn open_count(&self) -> usize {
        self.state.lock().map(|s| s.opens).unwrap_or(0)
    }

    pub fn run_count(&self) -> usize {
        self.state.lock().map(|s| s.runs).unwrap_or(0)
    }

    fn lock(&self) -> SourceResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| SourceError::remote("INTERNAL", "Lock poisoned"))
    }

    fn charge(&self) {
        let cost = self.usage_cost;
        let _ = self
            .usage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |u| {
                Some(u.saturating_sub(cost))
            });
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn register_search(&self, descriptor: QueryDescriptor) -> SourceResult<SearchHandle> {
        let mut state = self.lock()?;
        state.opens += 1;
        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(state.fault.clone().unwrap_or_else(default_fault));
        }
        let token = Uuid::new_v4().to_string();
        state.searches.insert(token.clone(), descriptor);
        Ok(SearchHandle::new(token))
    }
}

fn default_fault() -> SourceError {
    SourceError::remote("UNEXPECTED_ERROR", "injected fault")
}

impl RemoteSource for InMemorySource {
    fn create(&self, descriptor: &QueryDescriptor) -> SourceFuture<'_, SearchHandle> {
        let descriptor = descriptor.clone();
        Box::pin(async move {
            self.pause().await;
            self.charge();
            self.register_search(descriptor)
        })
    }

    fn load(&self, id: &str, descriptor: &QueryDescriptor) -> SourceFuture<'_, SearchHandle> {
        let id = id.to_string();
        let extra = descriptor.clone();
        Box::pin(async move {
            self.pause().await;
            self.charge();
            let saved = {
                let state = self.lock()?;
                state.saved.get(&id).cloned()
            };
            let saved = saved.ok_or_else(|| SourceError::not_found(format!("saved search {}", id)))?;

            let merged = QueryDescriptor::from_parts(
                saved.search_type(),
                saved.filters().iter().chain(extra.filters()).cloned().collect(),
                saved.columns().iter().chain(extra.columns()).cloned().collect(),
            );
            self.register_search(merged)
        })
    }

    fn run(&self, handle: &SearchHandle) -> SourceFuture<'_, ResultCursor> {
        let token = handle.token().to_string();
        Box::pin(async move {
            self.pause().await;
            self.charge();
            let mut state = self.lock()?;
            state.runs += 1;
            let descriptor = state
                .searches
                .get(&token)
                .cloned()
                .ok_or_else(|| SourceError::not_found(format!("search handle {}", token)))?;
            let rows = state
                .records
                .get(descriptor.search_type())
                .map(|rows| evaluate(&descriptor, rows))
                .unwrap_or_default();

            let cursor = Uuid::new_v4().to_string();
            state.cursors.insert(cursor.clone(), rows);
            Ok(ResultCursor::new(cursor))
        })
    }

    fn fetch_range(
        &self,
        cursor: &ResultCursor,
        start: usize,
        end: usize,
    ) -> SourceFuture<'_, Vec<Row>> {
        let token = cursor.token().to_string();
        Box::pin(async move {
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            self.pause().await;
            self.charge();

            let mut state = self.lock()?;
            state.fetch_log.push(FetchCall {
                cursor: token.clone(),
                start,
                end,
            });
            if state.fail_fetches > 0 {
                state.fail_fetches -= 1;
                return Err(state.fault.clone().unwrap_or_else(default_fault));
            }

            let rows = state
                .cursors
                .get(&token)
                .ok_or_else(|| SourceError::not_found(format!("cursor {}", token)))?;
            let start = start.min(rows.len());
            let end = end.min(rows.len());
            Ok(rows[start..end].to_vec())
        })
    }

    fn save(&self, handle: &SearchHandle) -> SourceFuture<'_, String> {
        let token = handle.token().to_string();
        Box::pin(async move {
            self.pause().await;
            self.charge();
            let mut state = self.lock()?;
            let descriptor = state
                .searches
                .get(&token)
                .cloned()
                .ok_or_else(|| SourceError::not_found(format!("search handle {}", token)))?;
            let id = format!("customsearch_{}", state.saved.len() + 1);
            state.saved.insert(id.clone(), descriptor);
            Ok(id)
        })
    }

    fn lookup_fields(
        &self,
        record_type: &str,
        id: &str,
        columns: &[String],
    ) -> SourceFuture<'_, Map<String, Value>> {
        let record_type = record_type.to_string();
        let id = Value::String(id.to_string());
        let columns = columns.to_vec();
        Box::pin(async move {
            self.pause().await;
            self.charge();
            let state = self.lock()?;
            let record = state
                .records
                .get(&record_type)
                .and_then(|rows| {
                    rows.iter()
                        .find(|r| r.get("id").map_or(false, |v| loosely_equal(v, &id)))
                })
                .ok_or_else(|| SourceError::not_found(format!("{} {}", record_type, id)))?;

            Ok(columns
                .into_iter()
                .map(|c| {
                    let value = record.get(&c).cloned().unwrap_or(Value::Null);
                    (c, value)
                })
                .collect())
        })
    }

    fn remaining_usage(&self) -> u64 {
        self.usage.load(Ordering::Relaxed)
    }
}

/// Filter, sort and project rows the way the descriptor asks
fn evaluate(descriptor: &QueryDescriptor, rows: &[Row]) -> Vec<Row> {
    let mut matched: Vec<&Row> = rows
        .iter()
        .filter(|row| descriptor.filters().iter().all(|f| filter_matches(f, row)))
        .collect();

    let sort_keys: Vec<&ColumnSpec> = descriptor
        .columns()
        .iter()
        .filter(|c| c.sort != SortOrder::None)
        .collect();
    if !sort_keys.is_empty() {
        matched.sort_by(|a, b| {
            for column in &sort_keys {
                let join = column.join.as_deref();
                let ord = compare_values(field(a, &column.name, join), field(b, &column.name, join));
                let ord = match column.sort {
                    SortOrder::Desc => ord.reverse(),
                    _ => ord,
                };
                if ord != CmpOrdering::Equal {
                    return ord;
                }
            }
            CmpOrdering::Equal
        });
    }

    matched
        .into_iter()
        .map(|row| project(descriptor.columns(), row))
        .collect()
}

fn project(columns: &[ColumnSpec], row: &Row) -> Row {
    if columns.is_empty() {
        return row.clone();
    }
    let mut out = Map::new();
    if let Some(id) = row.get("id") {
        out.insert("id".to_string(), id.clone());
    }
    for column in columns {
        let value = field(row, &column.name, column.join.as_deref())
            .cloned()
            .unwrap_or(Value::Null);
        out.insert(column.name.clone(), value);
    }
    Value::Object(out)
}

fn field<'a>(row: &'a Row, name: &str, join: Option<&str>) -> Option<&'a Value> {
    match join {
        Some(join) => row.get(join).and_then(|j| j.get(name)),
        None => row.get(name),
    }
}

fn filter_matches(filter: &FilterSpec, row: &Row) -> bool {
    let value = field(row, &filter.name, filter.join.as_deref());
    let first = filter.values.first();

    match filter.operator {
        Operator::Is => matches!((value, first), (Some(v), Some(f)) if loosely_equal(v, f)),
        Operator::IsNot => !matches!((value, first), (Some(v), Some(f)) if loosely_equal(v, f)),
        Operator::AnyOf => value.map_or(false, |v| filter.values.iter().any(|f| loosely_equal(v, f))),
        Operator::NoneOf => value.map_or(true, |v| !filter.values.iter().any(|f| loosely_equal(v, f))),
        Operator::GreaterThan => {
            matches!((value.and_then(as_number), first.and_then(as_number)), (Some(a), Some(b)) if a > b)
        }
        Operator::LessThan => {
            matches!((value.and_then(as_number), first.and_then(as_number)), (Some(a), Some(b)) if a < b)
        }
        Operator::Contains => match (value, first) {
            (Some(v), Some(f)) => text(v).contains(&text(f)),
            _ => false,
        },
        Operator::IsEmpty => value.map_or(true, is_empty),
        Operator::IsNotEmpty => !value.map_or(true, is_empty),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Remote ids and values arrive as strings or numbers interchangeably
fn loosely_equal(a: &Value, b: &Value) -> bool {
    a == b || text(a) == text(b)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a.and_then(as_number), b.and_then(as_number)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal),
        _ => {
            let x = a.map(text).unwrap_or_default();
            let y = b.map(text).unwrap_or_default();
            x.cmp(&y)
        }
    }
}
