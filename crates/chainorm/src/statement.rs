//! Statement state and assembly.
//!
//! A [`Statement`] holds one optional builder per clause kind behind an `Arc`.
//! Cloning a statement copies only those references; a builder is deep-copied
//! by [`Arc::make_mut`] the first time a clone mutates it, so two chains that
//! branch from one base never see each other's later changes.

use std::sync::Arc;

use crate::clause::{
    BuildContext, Clause, ClauseBuilder, ClauseKind, ConflictBuilder, DeleteBuilder, FromBuilder,
    InsertBuilder, LimitBuilder, LockBuilder, OffsetBuilder, OrderBuilder, ReturningBuilder,
    SelectBuilder, UpdateBuilder, ValuesBuilder, WhereBuilder,
};
use crate::error::{OrmError, OrmResult};
use crate::executor::{ExecMode, ExecRequest};
use crate::schema::Schema;
use crate::value::Value;

/// Final SQL text (`$n` placeholders) and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl BuiltStatement {
    /// Key for executor-side prepared statement caches.
    pub fn cache_key(&self) -> &str {
        &self.sql
    }

    pub fn into_request(self, mode: ExecMode) -> ExecRequest {
        ExecRequest {
            sql: self.sql,
            params: self.params,
            mode,
        }
    }
}

/// Builder state for one request chain.
#[derive(Debug, Clone)]
pub struct Statement {
    schema: Arc<Schema>,
    pub(crate) select: Option<Arc<SelectBuilder>>,
    pub(crate) from: Option<Arc<FromBuilder>>,
    pub(crate) where_: Option<Arc<WhereBuilder>>,
    pub(crate) order: Option<Arc<OrderBuilder>>,
    pub(crate) limit: Option<Arc<LimitBuilder>>,
    pub(crate) offset: Option<Arc<OffsetBuilder>>,
    pub(crate) lock: Option<Arc<LockBuilder>>,
    pub(crate) insert: Option<Arc<InsertBuilder>>,
    pub(crate) values: Option<Arc<ValuesBuilder>>,
    pub(crate) conflict: Option<Arc<ConflictBuilder>>,
    pub(crate) update: Option<Arc<UpdateBuilder>>,
    pub(crate) delete: Option<Arc<DeleteBuilder>>,
    pub(crate) returning: Option<Arc<ReturningBuilder>>,
    /// Field names chosen with `select`; drives SELECT, INSERT and UPDATE columns.
    pub(crate) selected: Option<Vec<String>>,
    pub(crate) unscoped: bool,
    pub(crate) allow_global_update: bool,
    pub(crate) allow_global_delete: bool,
    error: Option<OrmError>,
}

impl Statement {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            select: None,
            from: None,
            where_: None,
            order: None,
            limit: None,
            offset: None,
            lock: None,
            insert: None,
            values: None,
            conflict: None,
            update: None,
            delete: None,
            returning: None,
            selected: None,
            unscoped: false,
            allow_global_update: false,
            allow_global_delete: false,
            error: None,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn error(&self) -> Option<&OrmError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Record an error; a second error is appended to the first.
    pub fn push_error(&mut self, err: OrmError) {
        self.error = Some(match self.error.take() {
            None => err,
            Some(prev) => prev.combine(err),
        });
    }

    /// Mutable access to a builder slot, creating the builder on first use and
    /// copying it if another statement still shares it.
    pub(crate) fn builder<B: Clone + Default>(slot: &mut Option<Arc<B>>) -> &mut B {
        Arc::make_mut(slot.get_or_insert_with(Default::default))
    }

    pub(crate) fn where_builder(&mut self) -> &mut WhereBuilder {
        Self::builder(&mut self.where_)
    }

    /// Whether the caller supplied any WHERE condition.
    pub fn has_conditions(&self) -> bool {
        self.where_.as_ref().is_some_and(|w| w.has_conditions())
    }

    fn is_mutation(&self) -> bool {
        self.insert.is_some() || self.update.is_some() || self.delete.is_some()
    }

    fn render<B: ClauseBuilder>(
        builder: Option<&Arc<B>>,
        ctx: &BuildContext<'_>,
    ) -> OrmResult<Option<Clause>> {
        match builder {
            Some(b) => b.build(ctx),
            None => Ok(None),
        }
    }

    fn render_kind(&self, kind: ClauseKind, ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        match kind {
            ClauseKind::Insert => Self::render(self.insert.as_ref(), ctx),
            ClauseKind::Values => Self::render(self.values.as_ref(), ctx),
            ClauseKind::Conflict => Self::render(self.conflict.as_ref(), ctx),
            ClauseKind::Delete => Self::render(self.delete.as_ref(), ctx),
            ClauseKind::Update => Self::render(self.update.as_ref(), ctx),
            ClauseKind::Select => Self::render(self.select.as_ref(), ctx),
            ClauseKind::From => Self::render(self.from.as_ref(), ctx),
            // INSERT never filters; everything else picks up the soft-delete
            // filter even without caller conditions.
            ClauseKind::Where if self.insert.is_some() => Ok(None),
            ClauseKind::Where => match &self.where_ {
                Some(b) => b.build(ctx),
                None => WhereBuilder::new().build(ctx),
            },
            ClauseKind::Order => Self::render(self.order.as_ref(), ctx),
            ClauseKind::Limit => Self::render(self.limit.as_ref(), ctx),
            ClauseKind::Offset => Self::render(self.offset.as_ref(), ctx),
            ClauseKind::Lock => Self::render(self.lock.as_ref(), ctx),
            ClauseKind::Returning => Self::render(self.returning.as_ref(), ctx),
        }
    }

    fn validate(&self) -> OrmResult<()> {
        if self.is_mutation() && (self.select.is_some() || self.from.is_some()) {
            return Err(OrmError::validation(
                "select clauses cannot be combined with mutation clauses",
            ));
        }
        if self.update.is_some() && !self.allow_global_update && !self.has_conditions() {
            return Err(OrmError::validation("missing where clause"));
        }
        if self.delete.is_some() && !self.allow_global_delete && !self.has_conditions() {
            return Err(OrmError::validation("missing where clause"));
        }
        Ok(())
    }

    /// Render every configured clause in kind order and join them.
    pub fn build(&self) -> OrmResult<BuiltStatement> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.validate()?;

        let ctx = BuildContext {
            schema: &self.schema,
            unscoped: self.unscoped,
        };

        let mut parts = Vec::new();
        let mut params = Vec::new();
        for kind in ClauseKind::ORDER {
            if let Some(clause) = self.render_kind(kind, &ctx)? {
                parts.push(clause.sql);
                params.extend(clause.params);
            }
        }

        let template = parts.join(" ");
        let (sql, placeholders) = number_placeholders(&template);
        if placeholders != params.len() {
            return Err(OrmError::validation(format!(
                "statement has {placeholders} placeholders but {} parameters",
                params.len()
            )));
        }
        Ok(BuiltStatement { sql, params })
    }
}

/// Rewrite `?` placeholders to `$1..$n` left to right, skipping quoted text.
pub fn number_placeholders(template: &str) -> (String, usize) {
    let mut out = String::with_capacity(template.len() + 8);
    let mut count = 0usize;
    let mut quote: Option<char> = None;

    for ch in template.chars() {
        match (quote, ch) {
            (None, '\'' | '"') => {
                quote = Some(ch);
                out.push(ch);
            }
            (Some(q), c) if c == q => {
                quote = None;
                out.push(ch);
            }
            (None, '?') => {
                count += 1;
                out.push('$');
                out.push_str(&count.to_string());
            }
            _ => out.push(ch),
        }
    }
    (out, count)
}
