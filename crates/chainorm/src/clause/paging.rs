use super::{BuildContext, Clause, ClauseBuilder, ClauseKind};
use crate::error::OrmResult;

/// `ORDER BY a, b DESC`. Items are caller SQL and used verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBuilder {
    items: Vec<String>,
}

impl OrderBuilder {
    pub fn push(&mut self, item: impl Into<String>) {
        let item = item.into();
        if !item.trim().is_empty() {
            self.items.push(item);
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }
}

impl ClauseBuilder for OrderBuilder {
    const KIND: ClauseKind = ClauseKind::Order;

    fn build(&self, _ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        if self.items.is_empty() {
            return Ok(None);
        }
        Ok(Some(Clause::new(
            Self::KIND,
            format!("ORDER BY {}", self.items.join(", ")),
            Vec::new(),
        )))
    }
}

/// `LIMIT n`; zero renders nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitBuilder {
    pub limit: u64,
}

impl ClauseBuilder for LimitBuilder {
    const KIND: ClauseKind = ClauseKind::Limit;

    fn build(&self, _ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        Ok((self.limit > 0)
            .then(|| Clause::new(Self::KIND, format!("LIMIT {}", self.limit), Vec::new())))
    }
}

/// `OFFSET n`; zero renders nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OffsetBuilder {
    pub offset: u64,
}

impl ClauseBuilder for OffsetBuilder {
    const KIND: ClauseKind = ClauseKind::Offset;

    fn build(&self, _ctx: &BuildContext<'_>) -> OrmResult<Option<Clause>> {
        Ok((self.offset > 0)
            .then(|| Clause::new(Self::KIND, format!("OFFSET {}", self.offset), Vec::new())))
    }
}
