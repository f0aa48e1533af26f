use super::{BuildContext, Clause, ClauseBuilder, ClauseKind};
use crate::condition::{Cond, Conds, JoinKind};
use crate::error::OrmResult;
use crate::naming::quote_ident;

/// `WHERE ...` over the chain's root condition scope.
///
/// When the schema has a soft-delete column and the statement is not
/// unscoped, `"column" IS NULL` is placed first and the caller's conditions
/// are grouped after it, so a caller `OR` cannot reach deleted rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereBuilder {
    conds: Conds,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conds(&self) -> &Conds {
        &self.conds
    }

    pub fn conds_mut(&mut self) -> &mut Conds {
        &mut self.conds
    }

    /// Whether the caller supplied any condition (the soft-delete filter does not count).
    pub fn has_conditions(&self) -> bool {
        !self.conds.is_empty()
    }

    fn root(&self, ctx: &BuildContext<'_>) -> Option<Cond> {
        let soft = ctx.active_soft_delete().map(|field| {
            Cond::leaf(
                JoinKind::And,
                format!("{} IS NULL", quote_ident(&field.column)),
                Vec::new(),
            )
        });
        match (soft, self.conds.is_empty()) {
            (None, true) => None,
            (None, false) => Some(self.conds.root(JoinKind::And)),
            (Some(filter), true) => Some(filter),
            (Some(filter), false) => Some(Cond::group(
                JoinKind::And,
                vec![filter, self.conds.root(JoinKind::And)],
            )),
        }
    }
}

impl ClauseBuilder for WhereBuilder {
    const KIND: ClauseKind = ClauseKind::Where;

    fn build(&self, ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        let Some(root) = self.root(ctx) else {
            return Ok(None);
        };
        let (predicate, params) = root.compile();
        if predicate.is_empty() {
            return Ok(None);
        }
        Ok(Some(Clause::new(
            Self::KIND,
            format!("WHERE {predicate}"),
            params,
        )))
    }
}
