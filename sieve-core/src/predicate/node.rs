use crate::{Comparison, Group, Reference, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupFlag {
    Open,
    Close,
}

#[derive(Debug, Clone)]
pub enum Node {
    Reference(Reference),
    Literal(Value),
    Comparison(Comparison),
    Logical(LogicalOp),
    Flag(GroupFlag),
    Group(Group),
}

impl Node {
    /// A whole-model reference, which declares a model and never filters.
    pub fn is_model_reference(&self) -> bool {
        matches!(self, Node::Reference(r) if r.is_model())
    }
}

impl From<Comparison> for Node {
    fn from(value: Comparison) -> Self {
        Node::Comparison(value)
    }
}

impl From<Reference> for Node {
    fn from(value: Reference) -> Self {
        Node::Reference(value)
    }
}

impl From<LogicalOp> for Node {
    fn from(value: LogicalOp) -> Self {
        Node::Logical(value)
    }
}

impl From<GroupFlag> for Node {
    fn from(value: GroupFlag) -> Self {
        Node::Flag(value)
    }
}

impl From<Group> for Node {
    fn from(value: Group) -> Self {
        Node::Group(value)
    }
}
