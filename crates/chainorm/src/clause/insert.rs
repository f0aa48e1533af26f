use super::{BuildContext, Clause, ClauseBuilder, ClauseKind};
use crate::error::{OrmError, OrmResult};
use crate::naming::quote_ident;
use crate::value::Value;

/// `INSERT INTO "table" ("a", "b")` over already-resolved column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertBuilder {
    pub columns: Vec<String>,
}

impl ClauseBuilder for InsertBuilder {
    const KIND: ClauseKind = ClauseKind::Insert;

    fn build(&self, ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        if self.columns.is_empty() {
            return Err(OrmError::validation("insert has no columns"));
        }
        let columns: Vec<_> = self.columns.iter().map(|c| quote_ident(c)).collect();
        Ok(Some(Clause::new(
            Self::KIND,
            format!("INSERT INTO {} ({})", ctx.table(), columns.join(", ")),
            Vec::new(),
        )))
    }
}

/// `VALUES (?, ?), (?, ?)`, parameters row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValuesBuilder {
    pub rows: Vec<Vec<Value>>,
}

impl ClauseBuilder for ValuesBuilder {
    const KIND: ClauseKind = ClauseKind::Values;

    fn build(&self, _ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        let Some(width) = self.rows.first().map(Vec::len) else {
            return Err(OrmError::validation("insert has no rows"));
        };
        if self.rows.iter().any(|row| row.len() != width) {
            return Err(OrmError::validation("insert rows differ in width"));
        }

        let tuple = format!("({})", vec!["?"; width].join(", "));
        let sql = format!("VALUES {}", vec![tuple.as_str(); self.rows.len()].join(", "));
        let params = self.rows.iter().flatten().cloned().collect();
        Ok(Some(Clause::new(Self::KIND, sql, params)))
    }
}

/// `RETURNING "a", "b"`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturningBuilder {
    pub columns: Vec<String>,
}

impl ClauseBuilder for ReturningBuilder {
    const KIND: ClauseKind = ClauseKind::Returning;

    fn build(&self, _ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        if self.columns.is_empty() {
            return Ok(None);
        }
        let columns: Vec<_> = self.columns.iter().map(|c| quote_ident(c)).collect();
        Ok(Some(Clause::new(
            Self::KIND,
            format!("RETURNING {}", columns.join(", ")),
            Vec::new(),
        )))
    }
}
