//! Chain-call API over a [`Statement`].
//!
//! Every chain operation takes the query by value and returns it. The
//! statement sits behind an `Arc` and is copied on write, so cloning a query
//! to branch it is cheap and the branches stay independent.

mod finish;


use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clause::{ConflictBuilder, LimitBuilder, LockBuilder, LockMode, OffsetBuilder, OnConflict};
use crate::condition::{Cond, IntoCondition, JoinKind};
use crate::config::{CancelSignal, DbConfig, Session};
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::hooks::Hooks;
use crate::schema::{Model, Schema};
use crate::statement::Statement;

/// A request chain for model `M`.
pub struct Query<M: Model> {
    db: Db,
    stmt: Result<Arc<Statement>, OrmError>,
    config: DbConfig,
    cancel: Option<CancelSignal>,
    hooks: Hooks<M>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for Query<M> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            stmt: self.stmt.clone(),
            config: self.config,
            cancel: self.cancel.clone(),
            hooks: self.hooks,
            _model: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("model", &M::NAME)
            .field("stmt", &self.stmt)
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl<M: Model> Query<M> {
    pub(crate) fn new(db: Db) -> Self {
        let config = *db.config();
        let stmt = M::schema().map(|schema| {
            let mut stmt = Statement::new(schema);
            stmt.allow_global_update = config.allow_global_update;
            stmt.allow_global_delete = config.allow_global_delete;
            Arc::new(stmt)
        });
        let cancel = db.cancel_signal().cloned();
        Self {
            db,
            stmt,
            config,
            cancel,
            hooks: M::hooks(),
            _model: PhantomData,
        }
    }

    /// The resolved schema, or the resolution error.
    pub fn schema(&self) -> OrmResult<Arc<Schema>> {
        match &self.stmt {
            Ok(stmt) => Ok(Arc::clone(stmt.schema())),
            Err(err) => Err(err.clone()),
        }
    }

    /// The first error recorded on this chain, if any.
    pub fn error(&self) -> Option<OrmError> {
        match &self.stmt {
            Ok(stmt) => stmt.error().cloned(),
            Err(err) => Some(err.clone()),
        }
    }

    /// Apply `f` and record whatever fails. After the first error the
    /// statement can no longer be built, but later calls still validate and
    /// their errors accumulate.
    fn apply<T>(
        mut self,
        prepared: OrmResult<T>,
        f: impl FnOnce(&mut Statement, T) -> OrmResult<()>,
    ) -> Self {
        if let Ok(shared) = &mut self.stmt {
            let stmt = Arc::make_mut(shared);
            if let Err(err) = prepared.and_then(|input| f(stmt, input)) {
                stmt.push_error(err);
            }
        }
        self
    }

    fn add_condition(self, kind: JoinKind, input: impl IntoCondition) -> Self {
        let prepared = input.into_condition();
        self.apply(prepared, |stmt, cond: Option<Cond>| match cond {
            Some(cond) => stmt.where_builder().conds_mut().add(cond.with_kind(kind)),
            None => Ok(()),
        })
    }

    /// Add an AND condition.
    pub fn where_(self, input: impl IntoCondition) -> Self {
        self.add_condition(JoinKind::And, input)
    }

    /// Add an OR condition. Must follow at least one `where_`/`not`.
    pub fn or(self, input: impl IntoCondition) -> Self {
        self.add_condition(JoinKind::Or, input)
    }

    /// Add a negated AND condition.
    pub fn not(self, input: impl IntoCondition) -> Self {
        self.add_condition(JoinKind::Not, input)
    }

    /// Choose fields (or raw select expressions). For create and update the
    /// names must be schema fields.
    pub fn select<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.apply(Ok(fields), |stmt, fields| {
            stmt.selected = Some(fields);
            Ok(())
        })
    }

    /// Append an ORDER BY item, e.g. `"age DESC"`.
    pub fn order(self, item: impl Into<String>) -> Self {
        let item = item.into();
        self.apply(Ok(item), |stmt, item| {
            Statement::builder(&mut stmt.order).push(item);
            Ok(())
        })
    }

    /// Set LIMIT. A later call replaces an earlier one; `0` clears it.
    pub fn limit(self, limit: u64) -> Self {
        self.apply(Ok(limit), |stmt, limit| {
            stmt.limit = Some(Arc::new(LimitBuilder { limit }));
            Ok(())
        })
    }

    /// Set OFFSET. A later call replaces an earlier one; `0` clears it.
    pub fn offset(self, offset: u64) -> Self {
        self.apply(Ok(offset), |stmt, offset| {
            stmt.offset = Some(Arc::new(OffsetBuilder { offset }));
            Ok(())
        })
    }

    /// Lock selected rows. Only one lock per chain.
    pub fn lock(self, mode: LockMode) -> Self {
        self.apply(Ok(mode), |stmt, mode| {
            if let Some(existing) = &stmt.lock {
                return Err(OrmError::validation(format!(
                    "lock already set to `{}`",
                    existing.mode.as_sql()
                )));
            }
            stmt.lock = Some(Arc::new(LockBuilder { mode }));
            Ok(())
        })
    }

    /// Upsert policy for create, targeting the primary key.
    pub fn on_conflict(self, policy: OnConflict) -> Self {
        self.apply(Ok(policy), |stmt, policy| {
            stmt.conflict = Some(Arc::new(ConflictBuilder::new(policy)));
            Ok(())
        })
    }

    /// Upsert policy for create with an explicit conflict target.
    pub fn on_conflict_on<I, S>(self, target: I, policy: OnConflict) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let target: Vec<String> = target.into_iter().map(Into::into).collect();
        self.apply(Ok((target, policy)), |stmt, (target, policy)| {
            stmt.conflict = Some(Arc::new(ConflictBuilder { policy, target }));
            Ok(())
        })
    }

    /// Ignore soft deletes: no `IS NULL` filter, and deletes are physical.
    pub fn unscoped(self) -> Self {
        self.apply(Ok(()), |stmt, ()| {
            stmt.unscoped = true;
            Ok(())
        })
    }

    /// Apply session overrides to this chain.
    pub fn session(mut self, session: Session) -> Self {
        session.apply(&mut self.config);
        if let Some(cancel) = session.cancel.clone() {
            self.cancel = Some(cancel);
        }
        let config = self.config;
        self.apply(Ok(()), move |stmt, ()| {
            stmt.allow_global_update = config.allow_global_update;
            stmt.allow_global_delete = config.allow_global_delete;
            Ok(())
        })
    }

    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn with_deadline(self, deadline: Instant) -> Self {
        let signal = self.cancel.clone().unwrap_or_default().with_deadline(deadline);
        self.with_cancel(signal)
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

impl<N: Model> IntoCondition for &Query<N> {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        let stmt = self.stmt.as_ref().map_err(Clone::clone)?;
        if let Some(err) = stmt.error() {
            return Err(err.clone());
        }
        match &stmt.where_ {
            Some(builder) if builder.has_conditions() => {
                Ok(Some(builder.conds().root(JoinKind::And)))
            }
            _ => Err(OrmError::sequencing("nested condition group is empty")),
        }
    }
}

impl<N: Model> IntoCondition for Query<N> {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        (&self).into_condition()
    }
}
