//! Remote data store boundary.
//!
//! The store is an external collaborator consumed through a narrow contract:
//! filtered row queries, inserts, scoped updates and deletes, and a
//! row-level change-event subscription. Rows arrive as loosely-typed
//! field/value mappings; each read model owns its transformation.
//!
//! `HttpStore` is the production implementation; tests substitute their own
//! `DataStore` so fetchers never touch the network.

pub mod http;
pub mod realtime;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StoreError;

pub use http::HttpStore;

/// A row as returned by the remote store: a loosely-typed field/value map.
pub type Row = serde_json::Map<String, Value>;

/// Table names on the remote store.
pub mod tables {
    pub const ORPHANS: &str = "orphans";
    pub const PAYMENTS: &str = "payments";
    pub const ACHIEVEMENTS: &str = "achievements";
    pub const OCCASIONS: &str = "occasions";
    pub const GIFTS: &str = "gifts";
    pub const ORPHAN_LOGS: &str = "orphan_logs";
    pub const FAMILY_MEMBERS: &str = "family_members";
    pub const PROGRAM_PARTICIPATIONS: &str = "program_participations";
    pub const SPONSORS: &str = "sponsors";
    pub const TEAM_MEMBERS: &str = "team_members";
    pub const TASKS: &str = "tasks";
    pub const SPONSOR_ORPHANS: &str = "sponsor_orphans";
    pub const TEAM_MEMBER_ORPHANS: &str = "team_member_orphans";
    pub const SPONSOR_TEAM_MEMBERS: &str = "sponsor_team_members";
    pub const CONVERSATIONS: &str = "conversations";
    pub const MESSAGES: &str = "messages";
    pub const PROFILES: &str = "profiles";
}

/// Row filter predicates supported by the store's query interface.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals value.
    Eq(String, String),
    /// Column does not equal value.
    Neq(String, String),
    /// Column is one of the listed values.
    In(String, Vec<String>),
    /// Column is null.
    IsNull(String),
    /// Either filter matches.
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn neq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Neq(column.into(), value.into())
    }

    pub fn within(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Filter::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull(column.into())
    }

    pub fn either(a: Filter, b: Filter) -> Self {
        Filter::Or(Box::new(a), Box::new(b))
    }
}

/// A select query against one table.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    /// Column and direction; `true` means descending.
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            ..Self::default()
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn neq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::neq(column, value));
        self
    }

    pub fn within(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.filters.push(Filter::within(column, values));
        self
    }

    pub fn is_null(mut self, column: impl Into<String>) -> Self {
        self.filters.push(Filter::is_null(column));
        self
    }

    pub fn either(mut self, a: Filter, b: Filter) -> Self {
        self.filters.push(Filter::either(a, b));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order = Some((column.into(), descending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Select one page of rows.
    pub fn page(mut self, page: usize, per_page: usize) -> Self {
        self.offset = Some(page * per_page);
        self.limit = Some(per_page);
        self
    }
}

/// A row-level change event delivered by a subscription.
#[derive(Debug, Clone)]
pub enum RowEvent {
    Inserted(Row),
    Updated(Row),
}

/// An open row-event subscription.
///
/// Owns the channel of incoming events and, for network-backed stores, the
/// driver task feeding it. Dropping the subscription aborts the driver, so
/// teardown happens on every exit path.
pub struct Subscription {
    events: mpsc::Receiver<RowEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<RowEvent>, task: JoinHandle<()>) -> Self {
        Self { events, task: Some(task) }
    }

    /// A subscription backed only by a channel, with no driver task.
    pub fn from_receiver(events: mpsc::Receiver<RowEvent>) -> Self {
        Self { events, task: None }
    }

    /// Await the next event. `None` means the subscription has ended.
    pub async fn next_event(&mut self) -> Option<RowEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The remote data store contract consumed by fetchers and mutations.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Run a filtered select and return matching rows.
    async fn select(&self, query: Query) -> Result<Vec<Row>, StoreError>;

    /// Insert one row and return the stored representation (the store
    /// assigns canonical identifiers and timestamps).
    async fn insert(&self, table: &str, row: Value) -> Result<Row, StoreError>;

    /// Update columns on every row matching `filters`.
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<(), StoreError>;

    /// Delete every row matching `filters`.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError>;

    /// Open a row-event subscription for insert/update events on `table`
    /// restricted by `filter`. Returns only once the store has confirmed
    /// the subscription.
    async fn subscribe(&self, table: &str, filter: Filter) -> Result<Subscription, StoreError>;
}
