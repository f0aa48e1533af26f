//! The executor boundary: one request per finisher call.
//!
//! The query layer never talks to a connection directly. It hands an
//! [`ExecRequest`] to an [`Executor`] and interprets the [`ExecOutcome`].
//! Connection lifecycle, pooling, statement caching and retries belong to the
//! executor implementation ([`crate::pg::PgExecutor`] for PostgreSQL,
//! [`RecordingExecutor`] for dry runs and tests).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// How the executor should run a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// At most one row is expected.
    QueryOne,
    /// Any number of rows.
    QueryMany,
    /// No rows; report affected-row count.
    Exec,
}

/// A fully built statement ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecRequest {
    pub sql: String,
    pub params: Vec<Value>,
    pub mode: ExecMode,
}

/// Result of an [`ExecMode::Exec`] request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecSummary {
    pub rows_affected: u64,
    /// Identifier assigned to the last inserted row, for executors that report one.
    pub last_insert_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Row(Option<Row>),
    Rows(Vec<Row>),
    Exec(ExecSummary),
}

impl ExecOutcome {
    pub fn into_row(self) -> Option<Row> {
        match self {
            Self::Row(row) => row,
            Self::Rows(rows) => rows.into_iter().next(),
            Self::Exec(_) => None,
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Row(row) => row.into_iter().collect(),
            Self::Rows(rows) => rows,
            Self::Exec(_) => Vec::new(),
        }
    }

    pub fn summary(&self) -> ExecSummary {
        match self {
            Self::Exec(summary) => *summary,
            Self::Row(row) => ExecSummary {
                rows_affected: u64::from(row.is_some()),
                last_insert_id: None,
            },
            Self::Rows(rows) => ExecSummary {
                rows_affected: rows.len() as u64,
                last_insert_id: None,
            },
        }
    }
}

/// One result row: column names plus values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(columns.into(), values)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Something that can run a built statement.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: ExecRequest) -> OrmResult<ExecOutcome>;

    /// Open a transaction bound to this executor.
    async fn begin(&self) -> OrmResult<Box<dyn Transaction>> {
        Err(OrmError::Transaction(
            "executor does not support transactions".to_string(),
        ))
    }
}

/// A transaction-bound executor.
#[async_trait]
pub trait Transaction: Executor {
    async fn commit(self: Box<Self>) -> OrmResult<()>;

    async fn rollback(self: Box<Self>) -> OrmResult<()>;
}

/// Transaction boundary events seen by a [`RecordingExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Default)]
struct RecordingState {
    requests: Vec<ExecRequest>,
    outcomes: VecDeque<OrmResult<ExecOutcome>>,
    events: Vec<TxEvent>,
}

/// Records every request and replays queued outcomes.
///
/// With nothing queued, `QueryOne` yields no row, `QueryMany` an empty set and
/// `Exec` a zero summary, so it doubles as a dry-run executor.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RecordingState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Queue the outcome for the next request.
    pub fn push_outcome(&self, outcome: ExecOutcome) -> &Self {
        self.with_state(|s| s.outcomes.push_back(Ok(outcome)));
        self
    }

    /// Queue a failure for the next request.
    pub fn push_error(&self, error: OrmError) -> &Self {
        self.with_state(|s| s.outcomes.push_back(Err(error)));
        self
    }

    pub fn requests(&self) -> Vec<ExecRequest> {
        self.with_state(|s| s.requests.clone())
    }

    pub fn last_request(&self) -> Option<ExecRequest> {
        self.with_state(|s| s.requests.last().cloned())
    }

    pub fn tx_events(&self) -> Vec<TxEvent> {
        self.with_state(|s| s.events.clone())
    }

    fn record(&self, request: ExecRequest) -> OrmResult<ExecOutcome> {
        self.with_state(|s| {
            let mode = request.mode;
            s.requests.push(request);
            s.outcomes.pop_front().unwrap_or_else(|| {
                Ok(match mode {
                    ExecMode::QueryOne => ExecOutcome::Row(None),
                    ExecMode::QueryMany => ExecOutcome::Rows(Vec::new()),
                    ExecMode::Exec => ExecOutcome::Exec(ExecSummary::default()),
                })
            })
        })
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(&self, request: ExecRequest) -> OrmResult<ExecOutcome> {
        self.record(request)
    }

    async fn begin(&self) -> OrmResult<Box<dyn Transaction>> {
        self.with_state(|s| s.events.push(TxEvent::Begin));
        Ok(Box::new(RecordingTransaction {
            inner: self.clone(),
        }))
    }
}

struct RecordingTransaction {
    inner: RecordingExecutor,
}

#[async_trait]
impl Executor for RecordingTransaction {
    async fn execute(&self, request: ExecRequest) -> OrmResult<ExecOutcome> {
        self.inner.record(request)
    }
}

#[async_trait]
impl Transaction for RecordingTransaction {
    async fn commit(self: Box<Self>) -> OrmResult<()> {
        self.inner.with_state(|s| s.events.push(TxEvent::Commit));
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        self.inner.with_state(|s| s.events.push(TxEvent::Rollback));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: ExecMode) -> ExecRequest {
        ExecRequest {
            sql: "SELECT 1".to_string(),
            params: Vec::new(),
            mode,
        }
    }

    #[tokio::test]
    async fn replays_queued_outcomes_then_defaults() {
        let exec = RecordingExecutor::new();
        exec.push_outcome(ExecOutcome::Exec(ExecSummary {
            rows_affected: 3,
            last_insert_id: None,
        }));

        let first = exec.execute(request(ExecMode::Exec)).await.unwrap();
        assert_eq!(first.summary().rows_affected, 3);

        let second = exec.execute(request(ExecMode::QueryOne)).await.unwrap();
        assert_eq!(second, ExecOutcome::Row(None));
        assert_eq!(exec.requests().len(), 2);
    }

    #[tokio::test]
    async fn transactions_record_boundaries() {
        let exec = RecordingExecutor::new();
        let tx = exec.begin().await.unwrap();
        tx.execute(request(ExecMode::Exec)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(exec.tx_events(), [TxEvent::Begin, TxEvent::Commit]);
        assert_eq!(exec.requests().len(), 1);
    }

    #[test]
    fn row_lookup_by_name() {
        let row = Row::from_pairs([("id", Value::I64(1)), ("name", Value::from("a"))]);
        assert_eq!(row.get("name"), Some(&Value::Text("a".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }
}
