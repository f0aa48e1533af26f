//! PostgreSQL executor over `tokio-postgres`.
//!
//! [`PgExecutor`] runs each [`ExecRequest`] on either one shared client or a
//! `deadpool-postgres` pool. Statements are prepared once per connection and
//! kept in a bounded LRU owned by the executor; pooled connections use the
//! pool's per-connection statement cache instead.
//!
//! A transaction on the shared client holds it exclusively: statements sent
//! through the executor wait until the transaction commits or rolls back.
//! Pooled transactions hold a dedicated connection and block nobody.

mod statement_cache;
mod types;

#[cfg(feature = "pool")]
mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_postgres::types::ToSql;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tokio_postgres::{Client, NoTls, Statement};
use tracing::{debug, warn};

use crate::error::{OrmError, OrmResult};
use crate::executor::{ExecMode, ExecOutcome, ExecRequest, ExecSummary, Executor, Transaction};
use statement_cache::{StatementCache, is_stale_statement};
use types::decode_rows;

/// Executor tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgExecutorConfig {
    /// Prepared statements kept per connection; `0` disables caching.
    pub statement_cache_capacity: usize,
    /// Abort (and cancel server-side) statements that run longer than this.
    pub query_timeout: Option<Duration>,
}

impl Default for PgExecutorConfig {
    fn default() -> Self {
        Self {
            statement_cache_capacity: 64,
            query_timeout: None,
        }
    }
}

impl PgExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }
}

enum Source {
    /// Plain statements take the gate shared; a transaction takes it exclusively.
    Client {
        client: Arc<Client>,
        gate: Arc<RwLock<()>>,
    },
    #[cfg(feature = "pool")]
    Pool(deadpool_postgres::Pool),
}

/// Runs built statements against PostgreSQL.
pub struct PgExecutor {
    source: Source,
    config: PgExecutorConfig,
    cache: Arc<StatementCache>,
}

impl PgExecutor {
    pub fn new(client: Client) -> Self {
        Self::from_shared(Arc::new(client))
    }

    /// Executors built from clones of one `Arc<Client>` do not coordinate
    /// transactions with each other; share one executor (or one `Db`) instead.
    pub fn from_shared(client: Arc<Client>) -> Self {
        Self::with_source(Source::Client {
            client,
            gate: Arc::new(RwLock::new(())),
        })
    }

    #[cfg(feature = "pool")]
    pub fn from_pool(pool: deadpool_postgres::Pool) -> Self {
        Self::with_source(Source::Pool(pool))
    }

    fn with_source(source: Source) -> Self {
        let config = PgExecutorConfig::default();
        Self {
            source,
            cache: Arc::new(StatementCache::new(config.statement_cache_capacity)),
            config,
        }
    }

    /// Connect without TLS and drive the connection on a background task.
    pub async fn connect(database_url: &str) -> OrmResult<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(target: "chainorm.pg", error = %e, "connection closed with error");
            }
        });
        Ok(Self::new(client))
    }

    pub fn with_config(mut self, config: PgExecutorConfig) -> Self {
        self.cache = Arc::new(StatementCache::new(config.statement_cache_capacity));
        self.config = config;
        self
    }

    pub fn config(&self) -> &PgExecutorConfig {
        &self.config
    }

    /// Prepared statements currently cached for the shared client.
    pub fn cached_statements(&self) -> usize {
        self.cache.len()
    }
}

impl std::fmt::Debug for PgExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            Source::Client { .. } => "client",
            #[cfg(feature = "pool")]
            Source::Pool(_) => "pool",
        };
        f.debug_struct("PgExecutor")
            .field("source", &source)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A borrowed connection plus the statement cache that goes with it.
enum Conn<'a> {
    Shared {
        client: &'a Client,
        cache: &'a StatementCache,
    },
    #[cfg(feature = "pool")]
    Pooled(&'a deadpool_postgres::ClientWrapper),
}

impl Conn<'_> {
    fn client(&self) -> &Client {
        match self {
            Conn::Shared { client, .. } => *client,
            #[cfg(feature = "pool")]
            Conn::Pooled(wrapper) => wrapper,
        }
    }

    async fn statement(&self, sql: &str) -> OrmResult<Option<Statement>> {
        match self {
            Conn::Shared { client, cache } => {
                if !cache.is_enabled() {
                    return Ok(None);
                }
                if let Some(stmt) = cache.get(sql) {
                    return Ok(Some(stmt));
                }
                let stmt = client.prepare(sql).await?;
                Ok(Some(cache.insert(sql.to_string(), stmt)))
            }
            #[cfg(feature = "pool")]
            Conn::Pooled(wrapper) => Ok(Some(wrapper.prepare_cached(sql).await?)),
        }
    }

    fn forget(&self, sql: &str) {
        match self {
            Conn::Shared { cache, .. } => {
                cache.remove(sql);
            }
            #[cfg(feature = "pool")]
            Conn::Pooled(wrapper) => {
                wrapper.statement_cache.remove(sql, &[]);
            }
        }
    }

    async fn run_once(&self, request: &ExecRequest) -> OrmResult<ExecOutcome> {
        let client = self.client();
        let params: Vec<&(dyn ToSql + Sync)> = request
            .params
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect();
        let stmt = self.statement(&request.sql).await?;

        let outcome = match request.mode {
            ExecMode::Exec => {
                let rows_affected = match &stmt {
                    Some(stmt) => client.execute(stmt, &params).await?,
                    None => client.execute(request.sql.as_str(), &params).await?,
                };
                ExecOutcome::Exec(ExecSummary {
                    rows_affected,
                    last_insert_id: None,
                })
            }
            ExecMode::QueryOne | ExecMode::QueryMany => {
                let rows = match &stmt {
                    Some(stmt) => client.query(stmt, &params).await?,
                    None => client.query(request.sql.as_str(), &params).await?,
                };
                if request.mode == ExecMode::QueryOne {
                    let first = decode_rows(&rows[..rows.len().min(1)])?;
                    ExecOutcome::Row(first.into_iter().next())
                } else {
                    ExecOutcome::Rows(decode_rows(&rows)?)
                }
            }
        };
        Ok(outcome)
    }

    async fn run(&self, request: &ExecRequest) -> OrmResult<ExecOutcome> {
        match self.run_once(request).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if is_stale_statement(&err) => {
                debug!(target: "chainorm.pg", sql = %request.sql, "re-preparing stale statement");
                self.forget(&request.sql);
                self.run_once(request).await
            }
            Err(err) => Err(err),
        }
    }
}

async fn with_timeout<T, F>(timeout: Option<Duration>, client: &Client, future: F) -> OrmResult<T>
where
    F: Future<Output = OrmResult<T>> + Send,
{
    let Some(limit) = timeout else {
        return future.await;
    };
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            let token = client.cancel_token();
            tokio::spawn(async move {
                if let Err(e) = token.cancel_query(NoTls).await {
                    warn!(target: "chainorm.pg", error = %e, "failed to cancel timed out statement");
                }
            });
            Err(OrmError::Timeout(limit))
        }
    }
}

async fn execute_on(
    conn: Conn<'_>,
    timeout: Option<Duration>,
    request: ExecRequest,
) -> OrmResult<ExecOutcome> {
    with_timeout(timeout, conn.client(), conn.run(&request)).await
}

#[async_trait]
impl Executor for PgExecutor {
    async fn execute(&self, request: ExecRequest) -> OrmResult<ExecOutcome> {
        match &self.source {
            Source::Client { client, gate } => {
                let _shared = gate.read().await;
                let conn = Conn::Shared {
                    client,
                    cache: &self.cache,
                };
                execute_on(conn, self.config.query_timeout, request).await
            }
            #[cfg(feature = "pool")]
            Source::Pool(pool) => {
                let object = pool.get().await?;
                execute_on(Conn::Pooled(&object), self.config.query_timeout, request).await
            }
        }
    }

    async fn begin(&self) -> OrmResult<Box<dyn Transaction>> {
        let (conn, exclusive) = match &self.source {
            Source::Client { client, gate } => {
                let exclusive = Arc::clone(gate).write_owned().await;
                (TxConn::Shared(Arc::clone(client)), Some(exclusive))
            }
            #[cfg(feature = "pool")]
            Source::Pool(pool) => (TxConn::Pooled(pool.get().await?), None),
        };
        conn.client().batch_execute("BEGIN").await?;
        Ok(Box::new(PgTransaction {
            conn: Some(conn),
            exclusive,
            cache: Arc::clone(&self.cache),
            timeout: self.config.query_timeout,
        }))
    }
}

enum TxConn {
    Shared(Arc<Client>),
    #[cfg(feature = "pool")]
    Pooled(deadpool_postgres::Object),
}

impl TxConn {
    fn client(&self) -> &Client {
        match self {
            TxConn::Shared(client) => client,
            #[cfg(feature = "pool")]
            TxConn::Pooled(object) => object,
        }
    }
}

/// A transaction opened with `BEGIN` on one connection.
///
/// On a shared client it holds the executor's gate exclusively until it ends.
/// Dropped without `commit` or `rollback`, it sends `ROLLBACK` from a
/// background task and only then releases the gate.
pub struct PgTransaction {
    conn: Option<TxConn>,
    exclusive: Option<OwnedRwLockWriteGuard<()>>,
    cache: Arc<StatementCache>,
    timeout: Option<Duration>,
}

impl PgTransaction {
    fn conn(&self) -> OrmResult<&TxConn> {
        self.conn
            .as_ref()
            .ok_or_else(|| OrmError::Transaction("transaction already finished".to_string()))
    }

    async fn finish(mut self: Box<Self>, sql: &str) -> OrmResult<()> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| OrmError::Transaction("transaction already finished".to_string()))?;
        conn.client().batch_execute(sql).await?;
        Ok(())
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        warn!(target: "chainorm.pg", "transaction dropped without commit or rollback");
        let exclusive = self.exclusive.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = conn.client().batch_execute("ROLLBACK").await {
                        warn!(target: "chainorm.pg", error = %e, "rollback of dropped transaction failed");
                    }
                    drop(exclusive);
                });
            }
            Err(_) => {
                warn!(target: "chainorm.pg", "no runtime to roll back dropped transaction");
            }
        }
    }
}

#[async_trait]
impl Executor for PgTransaction {
    async fn execute(&self, request: ExecRequest) -> OrmResult<ExecOutcome> {
        let conn = match self.conn()? {
            TxConn::Shared(client) => Conn::Shared {
                client,
                cache: &self.cache,
            },
            #[cfg(feature = "pool")]
            TxConn::Pooled(object) => Conn::Pooled(object),
        };
        execute_on(conn, self.timeout, request).await
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self: Box<Self>) -> OrmResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        self.finish("ROLLBACK").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_overrides() {
        let config = PgExecutorConfig::new();
        assert_eq!(config.statement_cache_capacity, 64);
        assert_eq!(config.query_timeout, None);

        let tuned = PgExecutorConfig::new()
            .statement_cache_capacity(0)
            .timeout(Duration::from_secs(5));
        assert_eq!(tuned.statement_cache_capacity, 0);
        assert_eq!(tuned.query_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn config_deserializes_partial_input() {
        let config: PgExecutorConfig =
            serde_json::from_str(r#"{"statement_cache_capacity": 8}"#).unwrap();
        assert_eq!(config.statement_cache_capacity, 8);
        assert_eq!(config.query_timeout, None);
    }
}
