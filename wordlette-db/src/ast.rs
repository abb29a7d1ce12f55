//! The comparison-expression tree behind `when(...)`.
//!
//! Expressions are built explicitly: [`compare`] produces a
//! [`Comparison`], [`when`] collects clauses into a [`Group`], and
//! [`Group::and`]/[`Group::or`] extend a group with an operator token
//! followed by the next clause. Nothing mutates behind the builder's back.
//!
//! A group's item list always alternates clause, operator, clause, ...;
//! it never starts or ends with an operator and never holds two operators
//! in a row. The combinators are the only mutators, so the invariant holds
//! by construction; [`Group::from_items`] exists for hand-built trees and
//! the compiler re-validates while walking.

use serde::{Deserialize, Serialize};

/// A boxed scalar usable as a literal or a stored field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Int(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int(v as i64)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Real(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Text(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Text(v)
    }
}

/// A field together with its owning model's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub table: String,
    pub field: String,
}

impl FieldRef {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Either side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Reference(FieldRef),
    Literal(ScalarValue),
}

impl From<FieldRef> for Operand {
    fn from(r: FieldRef) -> Self {
        Operand::Reference(r)
    }
}

impl From<ScalarValue> for Operand {
    fn from(v: ScalarValue) -> Self {
        Operand::Literal(v)
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Literal(v.into())
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Literal(v.into())
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Operand::Literal(v.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

/// Build a single comparison node.
pub fn compare(left: impl Into<Operand>, op: CompareOp, right: impl Into<Operand>) -> Comparison {
    Comparison {
        left: left.into(),
        op,
        right: right.into(),
    }
}

/// One entry in a group's alternating item list.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupItem {
    Comparison(Comparison),
    Group(Group),
    Op(LogicalOp),
}

/// A clause acceptable to [`when`], [`Group::and`], and [`Group::or`].
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Comparison(Comparison),
    Group(Group),
}

impl From<Comparison> for Clause {
    fn from(c: Comparison) -> Self {
        Clause::Comparison(c)
    }
}

impl From<Group> for Clause {
    fn from(g: Group) -> Self {
        Clause::Group(g)
    }
}

/// An ordered boolean-expression sub-tree.
///
/// Equality is strict structural equality of the item sequence in order:
/// `a AND b` never equals `b AND a`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    items: Vec<GroupItem>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a group from a raw item list. The alternation invariant is
    /// checked by the compiler on use, not here.
    pub fn from_items(items: Vec<GroupItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[GroupItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append `AND <clause>`.
    pub fn and(mut self, clause: impl Into<Clause>) -> Self {
        self.push(LogicalOp::And, clause.into());
        self
    }

    /// Append `OR <clause>`.
    pub fn or(mut self, clause: impl Into<Clause>) -> Self {
        self.push(LogicalOp::Or, clause.into());
        self
    }

    fn push(&mut self, op: LogicalOp, clause: Clause) {
        if !self.items.is_empty() {
            self.items.push(GroupItem::Op(op));
        }
        match clause {
            Clause::Comparison(c) => self.items.push(GroupItem::Comparison(c)),
            // A singleton sub-group is spliced rather than nested; so is
            // any group landing in a still-empty receiver.
            Clause::Group(g) if g.items.len() == 1 || self.items.is_empty() => {
                self.items.extend(g.items);
            }
            Clause::Group(g) => self.items.push(GroupItem::Group(g)),
        }
    }
}

/// Normalize clauses into a single top-level group.
///
/// No clauses yield an empty group (compiled as "no WHERE"); one group
/// clause is returned as-is rather than wrapped; multiple clauses are
/// AND-joined in argument order.
pub fn when<I>(clauses: I) -> Group
where
    I: IntoIterator,
    I::Item: Into<Clause>,
{
    let mut clauses = clauses.into_iter().map(Into::into);
    let first = match clauses.next() {
        Some(clause) => clause,
        None => return Group::new(),
    };

    let mut group = match first {
        Clause::Group(g) => g,
        Clause::Comparison(c) => Group::from_items(vec![GroupItem::Comparison(c)]),
    };
    for clause in clauses {
        group = group.and(clause);
    }
    group
}
