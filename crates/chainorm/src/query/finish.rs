//! Finishers: build one statement, dispatch it, interpret the outcome.

use std::sync::Arc;

use tracing::warn;

use super::Query;
use crate::clause::{
    DeleteBuilder, FromBuilder, InsertBuilder, LimitBuilder, ReturningBuilder, SelectBuilder,
    UpdateBuilder, ValuesBuilder,
};
use crate::condition::{Cond, Conds, JoinKind};
use crate::error::{OrmError, OrmResult};
use crate::executor::{ExecMode, ExecOutcome, ExecSummary, Executor, Row};
use crate::hooks::{HookContext, Operation};
use crate::monitor::{log_dispatch, log_failure};
use crate::naming::quote_ident;
use crate::schema::{Field, FieldValues, Model, Schema, field_value};
use crate::statement::{BuiltStatement, Statement};
use crate::transaction::finish_tx;
use crate::value::Value;

/// How an INSERT reports generated keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backfill {
    None,
    /// `RETURNING "pk"` rows, one per record.
    Returning,
}

/// A prepared INSERT plus the values it substituted for zero fields.
struct InsertPlan {
    stmt: Statement,
    backfill: Backfill,
    /// `(record, field index, value)` for each default or timestamp filled in.
    filled: Vec<(usize, usize, Value)>,
}

impl InsertPlan {
    /// Copy substituted values into the records so they match the inserted rows.
    fn write_back<M: Model>(&mut self, records: &mut [M]) -> OrmResult<()> {
        for (record, index, value) in self.filled.drain(..) {
            if let Some(record) = records.get_mut(record) {
                record.set_field(index, value)?;
            }
        }
        Ok(())
    }
}

fn scalar_i64(outcome: ExecOutcome) -> OrmResult<i64> {
    let row = outcome
        .into_row()
        .ok_or_else(|| OrmError::not_found("count returned no row"))?;
    let value = row
        .get_index(0)
        .ok_or_else(|| OrmError::decode("count", "empty row"))?;
    match value {
        Value::Null => Ok(0),
        other => other
            .as_i64()
            .ok_or_else(|| OrmError::decode("count", format!("expected integer, found {other:?}"))),
    }
}

/// Replace the chain's conditions with `(existing) AND extra`.
fn and_also(stmt: &mut Statement, extra: Cond) -> OrmResult<()> {
    let conds = stmt.where_builder().conds_mut();
    let existing = std::mem::take(conds);
    let mut scoped = Conds::new();
    if !existing.is_empty() {
        scoped.add(existing.root(JoinKind::And))?;
    }
    scoped.add(extra)?;
    *conds = scoped;
    Ok(())
}

fn resolve_all<'s>(schema: &'s Schema, names: &[String]) -> OrmResult<Vec<&'s Field>> {
    names.iter().map(|n| schema.resolve_field(n)).collect()
}

impl<M: Model> Query<M> {
    /// Clone of the chain's statement, or its stored error.
    fn snapshot(&self) -> OrmResult<Statement> {
        let stmt = self.stmt.as_ref().map_err(Clone::clone)?;
        if let Some(err) = stmt.error() {
            return Err(err.clone());
        }
        Ok(Statement::clone(stmt))
    }

    async fn dispatch(
        &self,
        executor: &dyn Executor,
        built: BuiltStatement,
        mode: ExecMode,
        table: &str,
    ) -> OrmResult<ExecOutcome> {
        if let Some(cancel) = &self.cancel {
            cancel.check()?;
        }
        let request = built.into_request(mode);
        log_dispatch(&request, table, self.config.debug);
        let sql = request.sql.clone();
        executor.execute(request).await.inspect_err(|err| log_failure(&sql, err))
    }

    fn decode(schema: &Schema, row: &Row) -> OrmResult<M> {
        M::from_fields(FieldValues::from_row(schema, M::FIELDS, row))
    }

    fn prepare_select(&self) -> OrmResult<Statement> {
        let mut stmt = self.snapshot()?;
        let columns = stmt.selected.clone().unwrap_or_default();
        stmt.select = Some(Arc::new(SelectBuilder::columns(columns)));
        stmt.from = Some(Arc::new(FromBuilder));
        Ok(stmt)
    }

    fn prepare_first(&self) -> OrmResult<Statement> {
        let mut stmt = self.prepare_select()?;
        let schema = Arc::clone(stmt.schema());
        let pk = format!(
            "{}.{}",
            quote_ident(schema.table()),
            quote_ident(&schema.primary_field().column)
        );
        Statement::builder(&mut stmt.order).push(pk);
        stmt.limit = Some(Arc::new(LimitBuilder { limit: 1 }));
        Ok(stmt)
    }

    fn prepare_count(&self, distinct: Vec<String>) -> OrmResult<Statement> {
        let mut stmt = self.snapshot()?;
        stmt.select = Some(Arc::new(SelectBuilder::count(distinct)));
        stmt.from = Some(Arc::new(FromBuilder));
        stmt.order = None;
        stmt.limit = None;
        stmt.offset = None;
        stmt.lock = None;
        Ok(stmt)
    }

    fn prepare_insert(&self, records: &[M]) -> OrmResult<InsertPlan> {
        if records.is_empty() {
            return Err(OrmError::validation("create requires at least one record"));
        }
        let mut stmt = self.snapshot()?;
        let schema = Arc::clone(stmt.schema());
        let pk = schema.primary_field();

        let fields: Vec<&Field> = match &stmt.selected {
            Some(names) => resolve_all(&schema, names)?,
            None => {
                let any_key_set = records
                    .iter()
                    .map(|r| field_value(r, pk).map(|v| !v.is_zero))
                    .collect::<OrmResult<Vec<_>>>()?
                    .into_iter()
                    .any(|set| set);
                schema
                    .fields()
                    .iter()
                    .filter(|f| !(f.primary_key && f.auto_increment) || any_key_set)
                    .collect()
            }
        };

        let mut rows = Vec::with_capacity(records.len());
        let mut filled = Vec::new();
        for (position, record) in records.iter().enumerate() {
            let mut row = Vec::with_capacity(fields.len());
            for field in &fields {
                let current = field_value(record, field)?;
                let value = field.insert_value(current.value.clone(), current.is_zero);
                if current.is_zero && value != current.value {
                    filled.push((position, field.index, value.clone()));
                }
                row.push(value);
            }
            rows.push(row);
        }

        let backfill = if pk.auto_increment && !fields.iter().any(|f| f.index == pk.index) {
            stmt.returning = Some(Arc::new(ReturningBuilder {
                columns: vec![pk.column.clone()],
            }));
            Backfill::Returning
        } else {
            Backfill::None
        };

        stmt.insert = Some(Arc::new(InsertBuilder {
            columns: fields.iter().map(|f| f.column.clone()).collect(),
        }));
        stmt.values = Some(Arc::new(ValuesBuilder { rows }));
        stmt.where_ = None;
        Ok(InsertPlan {
            stmt,
            backfill,
            filled,
        })
    }

    fn prepare_update(&self, pairs: Vec<(String, Value)>) -> OrmResult<Statement> {
        let mut stmt = self.snapshot()?;
        let schema = Arc::clone(stmt.schema());
        for (name, _) in &pairs {
            schema.resolve_field(name)?;
        }

        let assignments = match &stmt.selected {
            None => pairs,
            Some(selected) => {
                let mut picked = Vec::with_capacity(selected.len());
                for name in selected {
                    let field = schema.resolve_field(name)?;
                    let value = pairs
                        .iter()
                        .find(|(k, _)| schema.field(k).is_some_and(|f| f.index == field.index))
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| {
                            OrmError::field_resolution(format!(
                                "selected field `{name}` has no update value"
                            ))
                        })?;
                    picked.push((field.name.to_string(), value));
                }
                picked
            }
        };

        stmt.update = Some(Arc::new(UpdateBuilder { assignments }));
        Ok(stmt)
    }

    fn record_assignments(&self, record: &M) -> OrmResult<Vec<(String, Value)>> {
        let stmt = self.snapshot()?;
        let schema = stmt.schema();
        let mut pairs = Vec::new();
        match &stmt.selected {
            Some(names) => {
                for field in resolve_all(schema, names)? {
                    pairs.push((field.name.to_string(), field_value(record, field)?.value));
                }
            }
            None => {
                for field in schema.fields() {
                    let current = field_value(record, field)?;
                    if !current.is_zero {
                        pairs.push((field.name.to_string(), current.value));
                    }
                }
            }
        }
        Ok(pairs)
    }

    fn prepare_delete(&self, records: &[M]) -> OrmResult<Statement> {
        let mut stmt = self.snapshot()?;
        let schema = Arc::clone(stmt.schema());
        let pk = schema.primary_field();

        let mut keys = Vec::new();
        for record in records {
            let current = field_value(record, pk)?;
            if !current.is_zero {
                keys.push(current.value);
            }
        }
        if !keys.is_empty() {
            let column = quote_ident(&pk.column);
            let template = if keys.len() == 1 {
                format!("{column} = ?")
            } else {
                format!("{column} IN ({})", vec!["?"; keys.len()].join(", "))
            };
            and_also(&mut stmt, Cond::leaf(JoinKind::And, template, keys))?;
        }

        stmt.delete = Some(Arc::new(DeleteBuilder));
        Ok(stmt)
    }

    /// The SELECT `find` would dispatch.
    pub fn select_statement(&self) -> OrmResult<BuiltStatement> {
        self.prepare_select()?.build()
    }

    /// The SELECT `first` would dispatch.
    pub fn first_statement(&self) -> OrmResult<BuiltStatement> {
        self.prepare_first()?.build()
    }

    pub fn count_statement(&self) -> OrmResult<BuiltStatement> {
        self.prepare_count(Vec::new())?.build()
    }

    pub fn insert_statement(&self, records: &[M]) -> OrmResult<BuiltStatement> {
        self.prepare_insert(records)?.stmt.build()
    }

    pub fn update_statement<K, V>(
        &self,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> OrmResult<BuiltStatement>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let pairs = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.prepare_update(pairs)?.build()
    }

    pub fn delete_statement(&self, records: &[M]) -> OrmResult<BuiltStatement> {
        self.prepare_delete(records)?.build()
    }

    async fn run_query(&self, built: BuiltStatement, mode: ExecMode) -> OrmResult<Vec<M>> {
        let schema = self.schema()?;
        let table = schema.table();
        let executor = Arc::clone(self.db.executor());

        if !self.hooks.has_query() {
            let outcome = self.dispatch(&*executor, built, mode, table).await?;
            return outcome
                .into_rows()
                .iter()
                .map(|row| Self::decode(&schema, row))
                .collect();
        }

        let tx = executor.begin().await?;
        let result = async {
            let exec: &dyn Executor = &*tx;
            let ctx = HookContext::new(Operation::Query, table, exec);
            if let Some(hook) = self.hooks.before_query_hook() {
                hook(ctx).await?;
            }
            let outcome = self.dispatch(exec, built, mode, table).await?;
            let mut records = outcome
                .into_rows()
                .iter()
                .map(|row| Self::decode(&schema, row))
                .collect::<OrmResult<Vec<_>>>()?;
            if let Some(hook) = self.hooks.after_query_hook() {
                for record in &mut records {
                    hook(record, ctx).await?;
                }
            }
            Ok::<_, OrmError>(records)
        }
        .await;
        finish_tx(tx, result).await
    }

    async fn run_mutation<P, A>(
        &self,
        operation: Operation,
        records: &mut [M],
        plan: P,
        after: A,
    ) -> OrmResult<ExecSummary>
    where
        P: FnOnce(&Self, &mut [M]) -> OrmResult<(BuiltStatement, ExecMode)>,
        A: FnOnce(&ExecOutcome, &mut [M]) -> OrmResult<()>,
    {
        let schema = self.schema()?;
        let table = schema.table();
        let executor = Arc::clone(self.db.executor());

        if !self.hooks.has_mutate() {
            let (built, mode) = plan(self, &mut *records)?;
            let outcome = self.dispatch(&*executor, built, mode, table).await?;
            after(&outcome, &mut *records)?;
            return Ok(outcome.summary());
        }

        let tx = executor.begin().await?;
        let result = async {
            let exec: &dyn Executor = &*tx;
            let ctx = HookContext::new(operation, table, exec);
            if let Some(hook) = self.hooks.before_mutate_hook() {
                for record in records.iter_mut() {
                    hook(record, ctx).await?;
                }
            }
            let (built, mode) = plan(self, &mut *records)?;
            let outcome = self.dispatch(exec, built, mode, table).await?;
            after(&outcome, &mut *records)?;
            if let Some(hook) = self.hooks.after_mutate_hook() {
                for record in records.iter_mut() {
                    hook(record, ctx).await?;
                }
            }
            Ok::<_, OrmError>(outcome.summary())
        }
        .await;
        finish_tx(tx, result).await
    }

    /// First record ordered by primary key; `NotFound` when there is none.
    pub async fn first(&self) -> OrmResult<M> {
        let built = self.prepare_first()?.build()?;
        self.run_query(built, ExecMode::QueryOne)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found("record not found"))
    }

    /// All matching records.
    pub async fn find(&self) -> OrmResult<Vec<M>> {
        let built = self.prepare_select()?.build()?;
        self.run_query(built, ExecMode::QueryMany).await
    }

    pub async fn count(&self) -> OrmResult<i64> {
        self.count_distinct(Vec::<String>::new()).await
    }

    /// `COUNT(DISTINCT ...)` over the named fields or expressions.
    pub async fn count_distinct<S: Into<String>>(
        &self,
        columns: impl IntoIterator<Item = S>,
    ) -> OrmResult<i64> {
        let columns = columns.into_iter().map(Into::into).collect();
        let built = self.prepare_count(columns)?.build()?;
        let schema = self.schema()?;
        let outcome = self
            .dispatch(&**self.db.executor(), built, ExecMode::QueryOne, schema.table())
            .await?;
        scalar_i64(outcome)
    }

    /// Insert one record, back-filling an auto-increment key.
    pub async fn create(&self, record: &mut M) -> OrmResult<ExecSummary> {
        self.create_many(std::slice::from_mut(record)).await
    }

    /// Insert records in one statement, back-filling auto-increment keys in order.
    pub async fn create_many(&self, records: &mut [M]) -> OrmResult<ExecSummary> {
        let schema = self.schema()?;
        let pk = schema.primary_field();

        self.run_mutation(
            Operation::Create,
            records,
            |query, records| {
                let mut plan = query.prepare_insert(records)?;
                let mode = match plan.backfill {
                    Backfill::Returning => ExecMode::QueryMany,
                    Backfill::None => ExecMode::Exec,
                };
                let built = plan.stmt.build()?;
                plan.write_back(records)?;
                Ok((built, mode))
            },
            |outcome, records| {
                if !pk.auto_increment {
                    return Ok(());
                }
                match outcome {
                    ExecOutcome::Rows(rows) if rows.len() == records.len() => {
                        for (record, row) in records.iter_mut().zip(rows) {
                            if let Some(id) = row.get_index(0) {
                                record.set_field(pk.index, id.clone())?;
                            }
                        }
                    }
                    ExecOutcome::Rows(rows) => {
                        warn!(
                            target: "chainorm.sql",
                            returned = rows.len(),
                            records = records.len(),
                            "skipping key back-fill: returned rows do not match records"
                        );
                    }
                    ExecOutcome::Exec(ExecSummary {
                        last_insert_id: Some(last),
                        ..
                    }) => {
                        // Sequential ids only make sense when every key was generated.
                        for record in records.iter() {
                            if !field_value(record, pk)?.is_zero {
                                return Ok(());
                            }
                        }
                        let first = last - records.len() as i64 + 1;
                        for (offset, record) in records.iter_mut().enumerate() {
                            record.set_field(pk.index, Value::I64(first + offset as i64))?;
                        }
                    }
                    _ => {}
                }
                Ok(())
            },
        )
        .await
    }

    /// Update one field on every matching row.
    pub async fn update(
        &self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> OrmResult<ExecSummary> {
        self.updates([(field.into(), value.into())]).await
    }

    /// Update several fields on every matching row.
    pub async fn updates<K, V>(
        &self,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> OrmResult<ExecSummary>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let built = self.update_statement(pairs)?;
        let schema = self.schema()?;
        let outcome = self
            .dispatch(&**self.db.executor(), built, ExecMode::Exec, schema.table())
            .await?;
        Ok(outcome.summary())
    }

    /// Update matching rows from a record's non-zero (or selected) fields.
    pub async fn updates_from(&self, record: &mut M) -> OrmResult<ExecSummary> {
        self.run_mutation(
            Operation::Update,
            std::slice::from_mut(record),
            |query, records| {
                let pairs = query.record_assignments(&records[0])?;
                Ok((query.prepare_update(pairs)?.build()?, ExecMode::Exec))
            },
            |_, _| Ok(()),
        )
        .await
    }

    /// Delete one record (by primary key when it is set).
    pub async fn delete(&self, record: &mut M) -> OrmResult<ExecSummary> {
        self.delete_many(std::slice::from_mut(record)).await
    }

    /// Delete records by primary key, together with the chain's conditions.
    pub async fn delete_many(&self, records: &mut [M]) -> OrmResult<ExecSummary> {
        self.run_mutation(
            Operation::Delete,
            records,
            |query, records| Ok((query.prepare_delete(records)?.build()?, ExecMode::Exec)),
            |_, _| Ok(()),
        )
        .await
    }

    /// Delete every row matching the chain's conditions.
    pub async fn delete_all(&self) -> OrmResult<ExecSummary> {
        let built = self.prepare_delete(&[])?.build()?;
        let schema = self.schema()?;
        let outcome = self
            .dispatch(&**self.db.executor(), built, ExecMode::Exec, schema.table())
            .await?;
        Ok(outcome.summary())
    }
}
