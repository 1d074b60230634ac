use crate::{Comparison, GroupFlag, LogicalOp, ModelRef, Node, Reference, Token, Tokens};
use std::{
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    sync::atomic::{AtomicUsize, Ordering},
};

/// What [`Group::add`] accepts.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Declares a model, the first one is what the query returns.
    Model(ModelRef),
    Comparison(Comparison),
    Group(Group),
}

impl From<ModelRef> for Condition {
    fn from(value: ModelRef) -> Self {
        Condition::Model(value)
    }
}

impl From<&ModelRef> for Condition {
    fn from(value: &ModelRef) -> Self {
        Condition::Model(value.clone())
    }
}

impl From<Comparison> for Condition {
    fn from(value: Comparison) -> Self {
        Condition::Comparison(value)
    }
}

impl From<Group> for Condition {
    fn from(value: Group) -> Self {
        Condition::Group(value)
    }
}

/// A predicate: sequence of nodes combined by logical operators, plus paging and sorting.
///
/// While [`Group::tokens`] is iterating, or after [`Group::freeze`], the group is frozen and every
/// mutation is ignored.
#[derive(Default)]
pub struct Group {
    items: Vec<Node>,
    limit: Option<u64>,
    page: u64,
    sorting: Vec<Reference>,
    frozen: AtomicUsize,
}

/// Starts a predicate from a single condition.
pub fn when(condition: impl Into<Condition>) -> Group {
    Group::new().and(condition)
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Node] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_results(&self) -> Option<u64> {
        self.limit
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    /// Rows to skip, `page * limit`.
    pub fn offset(&self) -> u64 {
        self.limit.map_or(0, |limit| self.page * limit)
    }

    pub fn sorting(&self) -> &[Reference] {
        &self.sorting
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire) > 0
    }

    /// Freezes the group for good, later mutations are ignored. Clones start unfrozen.
    pub fn freeze(self) -> Self {
        self.frozen.fetch_add(1, Ordering::AcqRel);
        self
    }

    fn accepts_changes(&self) -> bool {
        if self.is_frozen() {
            log::debug!("Ignoring a change to a frozen predicate");
            return false;
        }
        true
    }

    /// Appends `condition`, preceded by `op` when it follows something that filters.
    ///
    /// A model becomes a whole-model reference and never takes an operator. A group holding a single
    /// item is unwrapped, a group holding more is nested, an empty group adds nothing.
    pub fn add(&mut self, condition: impl Into<Condition>, op: LogicalOp) -> &mut Self {
        if !self.accepts_changes() {
            return self;
        }
        match condition.into() {
            Condition::Model(model) => self.items.push(Node::Reference(Reference::model(model))),
            Condition::Comparison(comparison) => {
                self.push_operator(op);
                self.items.push(Node::Comparison(comparison));
            }
            Condition::Group(mut group) => {
                for reference in group.sorting.drain(..) {
                    self.push_sort(reference);
                }
                match group.items.len() {
                    0 => {}
                    1 => {
                        let node = group.items.remove(0);
                        if !node.is_model_reference() {
                            self.push_operator(op);
                        }
                        self.items.push(node);
                    }
                    _ => {
                        self.push_operator(op);
                        self.items.push(Node::Group(group));
                    }
                }
            }
        }
        self
    }

    fn push_operator(&mut self, op: LogicalOp) {
        let last = self.items.iter().rev().find(|v| !v.is_model_reference());
        if last.is_some_and(|v| !matches!(v, Node::Logical(..) | Node::Flag(GroupFlag::Open))) {
            self.items.push(Node::Logical(op));
        }
    }

    pub fn and(mut self, condition: impl Into<Condition>) -> Self {
        self.add(condition, LogicalOp::And);
        self
    }

    pub fn or(mut self, condition: impl Into<Condition>) -> Self {
        self.add(condition, LogicalOp::Or);
        self
    }

    /// Appends a node as it is, flags and operators included.
    pub fn push(&mut self, node: impl Into<Node>) -> &mut Self {
        if self.accepts_changes() {
            self.items.push(node.into());
        }
        self
    }

    /// At most `n` results, starting from the zero based `page` of size `n`.
    pub fn limit(mut self, n: u64, page: u64) -> Self {
        if self.accepts_changes() {
            self.limit = Some(n);
            self.page = page;
        }
        self
    }

    /// Adds sort keys in call order, a field already sorted on keeps its first position.
    pub fn sort(mut self, references: impl IntoIterator<Item = Reference>) -> Self {
        if self.accepts_changes() {
            for reference in references {
                self.push_sort(reference);
            }
        }
        self
    }

    fn push_sort(&mut self, reference: Reference) {
        if reference.is_model() {
            log::warn!(
                "Cannot sort on the whole model `{}`, a field is needed",
                reference.model
            );
            return;
        }
        if !self
            .sorting
            .iter()
            .any(|v| v.model == reference.model && v.field == reference.field)
        {
            self.sorting.push(reference);
        }
    }

    /// Flattened token stream, the group is frozen until the iterator is dropped.
    pub fn tokens(&self) -> Tokens<'_> {
        Tokens::new(self, &self.frozen)
    }

    /// Same predicate returning `model`: a whole-model reference to it is put first.
    pub fn targeting(&self, model: &ModelRef) -> Group {
        if matches!(self.items.first(), Some(Node::Reference(r)) if r.is_model() && r.model == *model)
        {
            return self.clone();
        }
        let mut result = Group::new();
        result.limit = self.limit;
        result.page = self.page;
        result.items.push(Node::Reference(Reference::model(model.clone())));
        let mut rest = self.clone();
        rest.limit = None;
        rest.page = 0;
        result.add(rest, LogicalOp::And);
        result
    }

    /// Models named anywhere in the predicate or its sort keys, first appearance order.
    pub fn models(&self) -> Vec<ModelRef> {
        let mut result = Vec::<ModelRef>::new();
        let mut push = |model: &ModelRef| {
            if !result.contains(model) {
                result.push(model.clone());
            }
        };
        for token in self.tokens() {
            match token {
                Token::Reference(r) => push(&r.model),
                Token::Comparison(c) => {
                    for operand in [&c.left, &c.right] {
                        if let Some(r) = operand.as_reference() {
                            push(&r.model);
                        }
                    }
                }
                _ => {}
            }
        }
        for r in &self.sorting {
            push(&r.model);
        }
        result
    }
}

impl Clone for Group {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            limit: self.limit,
            page: self.page,
            sorting: self.sorting.clone(),
            frozen: AtomicUsize::new(0),
        }
    }
}

impl Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("items", &self.items)
            .field("limit", &self.limit)
            .field("page", &self.page)
            .field("sorting", &self.sorting)
            .finish()
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.limit == other.limit
            && self.page == other.page
            && self.sorting == other.sorting
            && self.tokens().eq(other.tokens())
    }
}

impl Eq for Group {}

impl Hash for Group {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.limit.hash(state);
        self.page.hash(state);
        self.sorting.hash(state);
        for token in self.tokens() {
            token.hash(state);
        }
    }
}
