use super::update::push_auto_update;
use super::{BuildContext, Clause, ClauseBuilder, ClauseKind};
use crate::error::OrmResult;
use crate::naming::quote_ident;

/// `DELETE FROM "table"`, or a soft delete: `UPDATE "table" SET "marker" = ?`
/// followed by any auto-update-time columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteBuilder;

impl ClauseBuilder for DeleteBuilder {
    const KIND: ClauseKind = ClauseKind::Delete;

    fn build(&self, ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        let soft = ctx
            .active_soft_delete()
            .and_then(|field| Some((field, field.soft_delete_value()?)));

        let clause = match soft {
            Some((field, marker)) => {
                let mut sets = vec![format!("{} = ?", quote_ident(&field.column))];
                let mut params = vec![marker];
                push_auto_update(ctx, &mut sets, &mut params);
                Clause::new(
                    Self::KIND,
                    format!("UPDATE {} SET {}", ctx.table(), sets.join(", ")),
                    params,
                )
            }
            None => Clause::new(Self::KIND, format!("DELETE FROM {}", ctx.table()), Vec::new()),
        };
        Ok(Some(clause))
    }
}
