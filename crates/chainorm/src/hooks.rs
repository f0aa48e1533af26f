//! Optional lifecycle capabilities for a model type.
//!
//! A model exposes up to four hook handles through [`Model::hooks`]. The set is
//! read once when a query chain is created; finishers consult the stored
//! handles and, when one applies, run the statement inside a transaction opened
//! on the executor.
//!
//! ```ignore
//! impl ModelHooks for User {
//!     fn register_hooks() -> Hooks<Self> {
//!         Hooks::new().before_mutate(|user, _ctx| {
//!             Box::pin(async move {
//!                 user.name = user.name.trim().to_string();
//!                 Ok(())
//!             })
//!         })
//!     }
//! }
//! ```

use std::fmt;

use futures_core::future::BoxFuture;

use crate::error::OrmResult;
use crate::executor::{ExecMode, ExecOutcome, ExecRequest, Executor};
use crate::schema::Model;
use crate::value::Value;

/// The finisher a hook runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Query,
}

/// What a hook sees: the operation, the table, and the transaction executor.
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    operation: Operation,
    table: &'a str,
    executor: &'a dyn Executor,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(operation: Operation, table: &'a str, executor: &'a dyn Executor) -> Self {
        Self {
            operation,
            table,
            executor,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn table(&self) -> &'a str {
        self.table
    }

    /// The transaction-bound executor.
    pub fn executor(&self) -> &'a dyn Executor {
        self.executor
    }

    /// Run raw SQL (with `$n` placeholders) inside the hook's transaction.
    pub async fn exec(&self, sql: impl Into<String>, params: Vec<Value>) -> OrmResult<ExecOutcome> {
        self.executor
            .execute(ExecRequest {
                sql: sql.into(),
                params,
                mode: ExecMode::Exec,
            })
            .await
    }
}

impl fmt::Debug for HookContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("operation", &self.operation)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// Hook over one record.
pub type RecordHook<M> = for<'a> fn(&'a mut M, HookContext<'a>) -> BoxFuture<'a, OrmResult<()>>;

/// Hook that runs before a query, when no record exists yet.
pub type QueryHook = for<'a> fn(HookContext<'a>) -> BoxFuture<'a, OrmResult<()>>;

/// Four independently optional capability handles.
pub struct Hooks<M> {
    before_mutate: Option<RecordHook<M>>,
    after_mutate: Option<RecordHook<M>>,
    before_query: Option<QueryHook>,
    after_query: Option<RecordHook<M>>,
}

impl<M> Hooks<M> {
    pub fn new() -> Self {
        Self {
            before_mutate: None,
            after_mutate: None,
            before_query: None,
            after_query: None,
        }
    }

    /// Runs before create, update and delete for each affected record.
    pub fn before_mutate(mut self, hook: RecordHook<M>) -> Self {
        self.before_mutate = Some(hook);
        self
    }

    /// Runs after create, update and delete for each affected record.
    pub fn after_mutate(mut self, hook: RecordHook<M>) -> Self {
        self.after_mutate = Some(hook);
        self
    }

    pub fn before_query(mut self, hook: QueryHook) -> Self {
        self.before_query = Some(hook);
        self
    }

    /// Runs for each loaded record.
    pub fn after_query(mut self, hook: RecordHook<M>) -> Self {
        self.after_query = Some(hook);
        self
    }

    pub fn has_mutate(&self) -> bool {
        self.before_mutate.is_some() || self.after_mutate.is_some()
    }

    pub fn has_query(&self) -> bool {
        self.before_query.is_some() || self.after_query.is_some()
    }

    pub(crate) fn before_mutate_hook(&self) -> Option<RecordHook<M>> {
        self.before_mutate
    }

    pub(crate) fn after_mutate_hook(&self) -> Option<RecordHook<M>> {
        self.after_mutate
    }

    pub(crate) fn before_query_hook(&self) -> Option<QueryHook> {
        self.before_query
    }

    pub(crate) fn after_query_hook(&self) -> Option<RecordHook<M>> {
        self.after_query
    }
}

impl<M> Default for Hooks<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for Hooks<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Hooks<M> {}

impl<M> fmt::Debug for Hooks<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_mutate", &self.before_mutate.is_some())
            .field("after_mutate", &self.after_mutate.is_some())
            .field("before_query", &self.before_query.is_some())
            .field("after_query", &self.after_query.is_some())
            .finish()
    }
}

/// User-side hook registration for derived models (`#[orm(hooks)]`).
pub trait ModelHooks: Model {
    fn register_hooks() -> Hooks<Self>;
}
