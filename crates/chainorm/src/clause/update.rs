use super::{BuildContext, Clause, ClauseBuilder, ClauseKind};
use crate::error::{OrmError, OrmResult};
use crate::naming::quote_ident;
use crate::value::Value;

/// `UPDATE "table" SET "a" = ?, "b" = ?`
///
/// Assignments name fields (or columns) and are resolved through the schema.
/// Auto-update-time columns are always set to "now" and placed last; an
/// explicit assignment to one of them is replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBuilder {
    pub assignments: Vec<(String, Value)>,
}

impl ClauseBuilder for UpdateBuilder {
    const KIND: ClauseKind = ClauseKind::Update;

    fn build(&self, ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        let mut sets = Vec::with_capacity(self.assignments.len() + 1);
        let mut params = Vec::with_capacity(self.assignments.len() + 1);

        for (name, value) in &self.assignments {
            let field = ctx.schema.resolve_field(name)?;
            if field.auto_update_time {
                continue;
            }
            sets.push(format!("{} = ?", quote_ident(&field.column)));
            params.push(value.clone());
        }

        push_auto_update(ctx, &mut sets, &mut params);

        if sets.is_empty() {
            return Err(OrmError::validation("update has no assignments"));
        }

        Ok(Some(Clause::new(
            Self::KIND,
            format!("UPDATE {} SET {}", ctx.table(), sets.join(", ")),
            params,
        )))
    }
}

/// Append `"col" = ?` with "now" for every auto-update-time column.
pub(super) fn push_auto_update(
    ctx: &BuildContext<'_>,
    sets: &mut Vec<String>,
    params: &mut Vec<Value>,
) {
    for field in ctx.schema.auto_update_fields() {
        let now = Value::now(field.kind).unwrap_or_else(|| Value::Timestamp(chrono::Utc::now()));
        sets.push(format!("{} = ?", quote_ident(&field.column)));
        params.push(now);
    }
}
