//! Condition trees for WHERE composition.
//!
//! Every node carries the join kind it was added with (`And`, `Or`, `Not`).
//! Rendering walks the tree post-order:
//!
//! - a `Not` leaf renders as `NOT (template)`;
//! - a group joins its children left to right, putting ` OR ` before children
//!   added with `Or` and ` AND ` before everything else;
//! - with more than one child every child is parenthesized, a single child is
//!   rendered bare;
//! - a `Not` group wraps the joined children in `NOT (...)`.
//!
//! Parameters are collected in the same left-to-right order as the `?`
//! placeholders they bind.

use std::collections::{BTreeMap, HashMap};

use crate::error::{OrmError, OrmResult};
use crate::naming::quote_ident;
use crate::schema::{Model, field_value};
use crate::value::Value;


/// How a node joins its preceding sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf { template: String, params: Vec<Value> },
    Group(Vec<Cond>),
}

/// One node in a condition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Cond {
    kind: JoinKind,
    node: Node,
}

impl Cond {
    /// A predicate template with positional `?` parameters.
    pub fn leaf(kind: JoinKind, template: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            kind,
            node: Node::Leaf {
                template: template.into(),
                params,
            },
        }
    }

    pub fn group(kind: JoinKind, children: Vec<Cond>) -> Self {
        Self {
            kind,
            node: Node::Group(children),
        }
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn with_kind(mut self, kind: JoinKind) -> Self {
        self.kind = kind;
        self
    }

    /// Children of a group node; empty for leaves.
    pub fn children(&self) -> &[Cond] {
        match &self.node {
            Node::Group(children) => children,
            Node::Leaf { .. } => &[],
        }
    }

    /// A node that would render to nothing.
    pub fn is_empty(&self) -> bool {
        match &self.node {
            Node::Leaf { template, .. } => template.trim().is_empty(),
            Node::Group(children) => children.iter().all(Cond::is_empty),
        }
    }

    /// Render to predicate text and parameters. Does not consume the tree.
    pub fn compile(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.render_into(&mut sql, &mut params);
        (sql, params)
    }

    fn render_into(&self, sql: &mut String, params: &mut Vec<Value>) {
        match &self.node {
            Node::Leaf {
                template,
                params: own,
            } => {
                if self.kind == JoinKind::Not {
                    sql.push_str("NOT (");
                    sql.push_str(template);
                    sql.push(')');
                } else {
                    sql.push_str(template);
                }
                params.extend(own.iter().cloned());
            }
            Node::Group(children) => {
                if self.kind == JoinKind::Not {
                    sql.push_str("NOT (");
                }
                let wrap = children.len() > 1;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(if child.kind == JoinKind::Or {
                            " OR "
                        } else {
                            " AND "
                        });
                    }
                    if wrap {
                        sql.push('(');
                    }
                    child.render_into(sql, params);
                    if wrap {
                        sql.push(')');
                    }
                }
                if self.kind == JoinKind::Not {
                    sql.push(')');
                }
            }
        }
    }
}

/// One condition-accumulation scope.
///
/// Enforces that an `Or` child is always preceded by at least one non-`Or`
/// child and that no `And`/`Not` child follows an `Or` child.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conds {
    children: Vec<Cond>,
    seen_or: bool,
}

impl Conds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `cond`. Empty nodes are ignored and leave the ordering state unchanged.
    pub fn add(&mut self, cond: Cond) -> OrmResult<()> {
        if cond.is_empty() {
            return Ok(());
        }
        match cond.kind {
            JoinKind::Or if self.children.is_empty() => {
                return Err(OrmError::sequencing(
                    "at least one where/not condition must come before an or condition",
                ));
            }
            JoinKind::Or => self.seen_or = true,
            JoinKind::And | JoinKind::Not if self.seen_or => {
                return Err(OrmError::sequencing(
                    "where/not conditions must come before or conditions",
                ));
            }
            JoinKind::And | JoinKind::Not => {}
        }
        self.children.push(cond);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// A group node holding this scope's children, joined as `kind`.
    pub fn root(&self, kind: JoinKind) -> Cond {
        Cond::group(kind, self.children.clone())
    }

    pub fn compile(&self) -> (String, Vec<Value>) {
        self.root(JoinKind::And).compile()
    }
}

/// Equality leaf over `(column, value)` pairs joined by `AND`.
///
/// `Null` values render as `column IS NULL` and bind nothing.
fn equality_leaf(pairs: impl IntoIterator<Item = (String, Value)>) -> Option<Cond> {
    let mut template = String::new();
    let mut params = Vec::new();
    for (column, value) in pairs {
        if !template.is_empty() {
            template.push_str(" AND ");
        }
        template.push_str(&column);
        if value.is_null() {
            template.push_str(" IS NULL");
        } else {
            template.push_str(" = ?");
            params.push(value);
        }
    }
    if template.is_empty() {
        None
    } else {
        Some(Cond::leaf(JoinKind::And, template, params))
    }
}

/// Input accepted by `where_`, `or` and `not`.
///
/// The produced node's join kind is replaced by the caller.
pub trait IntoCondition {
    fn into_condition(self) -> OrmResult<Option<Cond>>;
}

/// A literal predicate template with positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    template: String,
    params: Vec<Value>,
}

/// Build a [`Predicate`]: `cond("age > ? AND name = ?", args![18, "bob"])`.
pub fn cond(template: impl Into<String>, params: Vec<Value>) -> Predicate {
    Predicate {
        template: template.into(),
        params,
    }
}

impl IntoCondition for Predicate {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        let node = Cond::leaf(JoinKind::And, self.template, self.params);
        Ok((!node.is_empty()).then_some(node))
    }
}

impl IntoCondition for &str {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        cond(self, Vec::new()).into_condition()
    }
}

impl IntoCondition for String {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        cond(self, Vec::new()).into_condition()
    }
}

impl IntoCondition for Cond {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        Ok((!self.is_empty()).then_some(self))
    }
}

fn pairs_condition<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> OrmResult<Option<Cond>>
where
    K: Into<String>,
    V: Into<Value>,
{
    Ok(equality_leaf(
        pairs.into_iter().map(|(k, v)| (k.into(), v.into())),
    ))
}

impl<K: Into<String>, V: Into<Value>, const N: usize> IntoCondition for [(K, V); N] {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        pairs_condition(self)
    }
}

impl<K: Into<String>, V: Into<Value>> IntoCondition for Vec<(K, V)> {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        pairs_condition(self)
    }
}

impl<K: Into<String>, V: Into<Value>> IntoCondition for BTreeMap<K, V> {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        pairs_condition(self)
    }
}

impl<K: Into<String>, V: Into<Value>, S> IntoCondition for HashMap<K, V, S> {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        pairs_condition(self)
    }
}

/// Equality conditions taken from a typed record.
#[derive(Debug)]
pub struct Fields<'a, M> {
    record: &'a M,
    names: Option<Vec<String>>,
}

impl<'a, M: Model> Fields<'a, M> {
    /// Every field holding a non-zero value, in declaration order.
    pub fn non_zero(record: &'a M) -> Self {
        Self {
            record,
            names: None,
        }
    }

    /// The named fields (field or column names), in the order given.
    pub fn named<I, S>(record: &'a M, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            record,
            names: Some(names.into_iter().map(Into::into).collect()),
        }
    }
}

impl<M: Model> IntoCondition for Fields<'_, M> {
    fn into_condition(self) -> OrmResult<Option<Cond>> {
        let schema = M::schema()?;
        let mut pairs = Vec::new();
        match self.names {
            Some(names) => {
                for name in &names {
                    let field = schema.resolve_field(name)?;
                    let current = field_value(self.record, field)?;
                    pairs.push((quote_ident(&field.column), current.value));
                }
            }
            None => {
                for field in schema.fields() {
                    let current = field_value(self.record, field)?;
                    if !current.is_zero {
                        pairs.push((quote_ident(&field.column), current.value));
                    }
                }
            }
        }
        Ok(equality_leaf(pairs))
    }
}
