//! In-memory store used by the integration tests.
//!
//! Seedable tables, a query log for asserting how fetchers talk to the
//! store, per-table failure injection, and manually-driven row-event
//! subscriptions. Inserts and updates notify matching subscribers the way
//! the real store's realtime channel does.

// Allow dead code: not every test binary exercises every helper
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;

use caresync::error::StoreError;
use caresync::store::{DataStore, Filter, Query, Row, RowEvent, Subscription};

/// Install a test subscriber so warn-path logging shows up under RUST_LOG.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct MockStore {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    select_counts: Mutex<HashMap<String, usize>>,
    select_log: Mutex<Vec<Query>>,
    update_log: Mutex<Vec<(String, Vec<Filter>, Value)>>,
    failing: Mutex<HashSet<String>>,
    fail_subscribe: AtomicBool,
    subscribers: Mutex<Vec<(String, Filter, mpsc::Sender<RowEvent>)>>,
    insert_counter: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a table with rows expressed as JSON objects.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.lock().unwrap();
        let entry = tables.entry(table.to_string()).or_default();
        for row in rows {
            if let Value::Object(map) = row {
                entry.push(map);
            }
        }
    }

    /// Make every select/update/delete against `table` fail.
    pub fn fail_table(&self, table: &str) {
        self.failing.lock().unwrap().insert(table.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Number of selects issued against `table`.
    pub fn selects_for(&self, table: &str) -> usize {
        *self.select_counts.lock().unwrap().get(table).unwrap_or(&0)
    }

    /// All selects issued against `table`, in order.
    pub fn select_queries_for(&self, table: &str) -> Vec<Query> {
        self.select_log
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.table == table)
            .cloned()
            .collect()
    }

    /// All updates issued against `table`, in order.
    pub fn updates_for(&self, table: &str) -> Vec<(Vec<Filter>, Value)> {
        self.update_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _, _)| t == table)
            .map(|(_, f, v)| (f.clone(), v.clone()))
            .collect()
    }

    /// Current rows of a table, for direct assertions.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
    }

    /// Replace a field on every row matching `id`, bypassing the store API
    /// (simulates another writer changing remote state).
    pub fn patch_row(&self, table: &str, id: &str, field: &str, value: Value) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut() {
                if field_as_string(row, "id").as_deref() == Some(id) {
                    row.insert(field.to_string(), value.clone());
                }
            }
        }
    }

    /// Push a row event to matching subscribers; returns how many received it.
    pub async fn push_event(&self, table: &str, event: RowEvent) -> usize {
        let row = match &event {
            RowEvent::Inserted(row) | RowEvent::Updated(row) => row.clone(),
        };
        self.notify(table, &row, matches!(event, RowEvent::Inserted(_))).await
    }

    /// Drop every open subscription (the live channel dies mid-stream).
    pub fn close_subscriptions(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    async fn notify(&self, table: &str, row: &Row, inserted: bool) -> usize {
        let targets: Vec<mpsc::Sender<RowEvent>> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers
                .iter()
                .filter(|(t, filter, _)| t == table && row_matches(row, filter))
                .map(|(_, _, tx)| tx.clone())
                .collect()
        };
        let mut delivered = 0;
        for tx in targets {
            let event = if inserted {
                RowEvent::Inserted(row.clone())
            } else {
                RowEvent::Updated(row.clone())
            };
            if tx.send(event).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    fn check_failure(&self, table: &str) -> Result<(), StoreError> {
        if self.failing.lock().unwrap().contains(table) {
            Err(StoreError::ServerError(format!("injected failure for {}", table)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DataStore for MockStore {
    async fn select(&self, query: Query) -> Result<Vec<Row>, StoreError> {
        {
            let mut counts = self.select_counts.lock().unwrap();
            *counts.entry(query.table.clone()).or_default() += 1;
        }
        self.select_log.lock().unwrap().push(query.clone());
        self.check_failure(&query.table)?;

        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Row> = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| row_matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        if let Some((column, descending)) = &query.order {
            rows.sort_by(|a, b| {
                let left = field_as_string(a, column).unwrap_or_default();
                let right = field_as_string(b, column).unwrap_or_default();
                if *descending {
                    right.cmp(&left)
                } else {
                    left.cmp(&right)
                }
            });
        }
        if let Some(offset) = query.offset {
            rows = rows.into_iter().skip(offset).collect();
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Row, StoreError> {
        self.check_failure(table)?;
        let Value::Object(mut map) = row else {
            return Err(StoreError::InvalidResponse("insert expects an object".into()));
        };
        if !map.contains_key("id") {
            let n = self.insert_counter.fetch_add(1, Ordering::SeqCst);
            map.insert("id".to_string(), Value::String(format!("{}-{}", table, n)));
        }
        if !map.contains_key("created_at") {
            map.insert("created_at".to_string(), Value::String(Utc::now().to_rfc3339()));
        }

        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(map.clone());

        self.notify(table, &map, true).await;
        Ok(map)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<(), StoreError> {
        self.update_log
            .lock()
            .unwrap()
            .push((table.to_string(), filters.to_vec(), patch.clone()));
        self.check_failure(table)?;

        let Value::Object(patch) = patch else {
            return Err(StoreError::InvalidResponse("update expects an object".into()));
        };

        let changed: Vec<Row> = {
            let mut tables = self.tables.lock().unwrap();
            let Some(rows) = tables.get_mut(table) else { return Ok(()) };
            let mut changed = Vec::new();
            for row in rows.iter_mut() {
                if filters.iter().all(|f| row_matches(row, f)) {
                    for (key, value) in &patch {
                        row.insert(key.clone(), value.clone());
                    }
                    changed.push(row.clone());
                }
            }
            changed
        };

        for row in &changed {
            self.notify(table, row, false).await;
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        self.check_failure(table)?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| !filters.iter().all(|f| row_matches(row, f)));
        }
        Ok(())
    }

    async fn subscribe(&self, table: &str, filter: Filter) -> Result<Subscription, StoreError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(StoreError::Subscription("injected subscribe failure".into()));
        }
        let (tx, rx) = mpsc::channel(16);
        self.subscribers
            .lock()
            .unwrap()
            .push((table.to_string(), filter, tx));
        Ok(Subscription::from_receiver(rx))
    }
}

fn field_as_string(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn row_matches(row: &Row, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => field_as_string(row, column).as_deref() == Some(value),
        Filter::Neq(column, value) => field_as_string(row, column).as_deref() != Some(value.as_str()),
        Filter::In(column, values) => field_as_string(row, column)
            .map(|field| values.iter().any(|v| *v == field))
            .unwrap_or(false),
        Filter::IsNull(column) => row.get(column).map_or(true, Value::is_null),
        Filter::Or(a, b) => row_matches(row, a) || row_matches(row, b),
    }
}
