use super::{BuildContext, Clause, ClauseBuilder, ClauseKind};
use crate::error::OrmResult;

#[derive(Debug, Clone, PartialEq)]
enum Projection {
    Columns(Vec<String>),
    Count { distinct: Vec<String> },
}

/// `SELECT ...`
///
/// Names that resolve to a schema field or column are qualified with the
/// table; anything else (`COUNT(*)`, expressions) passes through verbatim.
/// With no names, every schema column is selected.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectBuilder {
    projection: Projection,
}

impl SelectBuilder {
    pub fn columns(columns: Vec<String>) -> Self {
        Self {
            projection: Projection::Columns(columns),
        }
    }

    pub fn all() -> Self {
        Self::columns(Vec::new())
    }

    /// `COUNT(*)`, or `COUNT(DISTINCT ...)` over `distinct` when non-empty.
    pub fn count(distinct: Vec<String>) -> Self {
        Self {
            projection: Projection::Count { distinct },
        }
    }

    fn resolve(ctx: &BuildContext<'_>, name: &str) -> String {
        match ctx.schema.field(name) {
            Some(field) => ctx.qualified(&field.column),
            None => name.to_string(),
        }
    }
}

impl Default for SelectBuilder {
    fn default() -> Self {
        Self::all()
    }
}

impl ClauseBuilder for SelectBuilder {
    const KIND: ClauseKind = ClauseKind::Select;

    fn build(&self, ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        let list = match &self.projection {
            Projection::Columns(columns) if columns.is_empty() => ctx
                .schema
                .fields()
                .iter()
                .map(|f| ctx.qualified(&f.column))
                .collect::<Vec<_>>()
                .join(", "),
            Projection::Columns(columns) => columns
                .iter()
                .map(|c| Self::resolve(ctx, c))
                .collect::<Vec<_>>()
                .join(", "),
            Projection::Count { distinct } if distinct.is_empty() => "COUNT(*)".to_string(),
            Projection::Count { distinct } => {
                let cols: Vec<_> = distinct.iter().map(|c| Self::resolve(ctx, c)).collect();
                if cols.len() == 1 {
                    format!("COUNT(DISTINCT {})", cols[0])
                } else {
                    format!("COUNT(DISTINCT ({}))", cols.join(", "))
                }
            }
        };
        Ok(Some(Clause::new(
            Self::KIND,
            format!("SELECT {list}"),
            Vec::new(),
        )))
    }
}

/// `FROM "table"`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FromBuilder;

impl ClauseBuilder for FromBuilder {
    const KIND: ClauseKind = ClauseKind::From;

    fn build(&self, ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        Ok(Some(Clause::new(
            Self::KIND,
            format!("FROM {}", ctx.table()),
            Vec::new(),
        )))
    }
}
