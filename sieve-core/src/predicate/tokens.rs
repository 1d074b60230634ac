use crate::{Comparison, Group, GroupFlag, LogicalOp, Node, Reference, Value};
use std::{
    slice,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Flattened view of a [`Group`], what every compiler consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token<'a> {
    Open,
    Close,
    Logical(LogicalOp),
    Reference(&'a Reference),
    Literal(&'a Value),
    Comparison(&'a Comparison),
}

struct FreezeGuard<'a>(&'a AtomicUsize);

impl<'a> FreezeGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for FreezeGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Iterator returned by [`Group::tokens`], the group stays frozen until it is dropped.
///
/// Sub-groups are expanded in place, wrapped in `Open`/`Close` only when they hold more than one item.
pub struct Tokens<'a> {
    _guard: FreezeGuard<'a>,
    open: bool,
    stack: Vec<(slice::Iter<'a, Node>, bool)>,
}

impl<'a> Tokens<'a> {
    pub(crate) fn new(group: &'a Group, counter: &'a AtomicUsize) -> Self {
        let wrap = group.items().len() > 1;
        Self {
            _guard: FreezeGuard::new(counter),
            open: wrap,
            stack: vec![(group.items().iter(), wrap)],
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.open {
            self.open = false;
            return Some(Token::Open);
        }
        loop {
            let (items, close) = self.stack.last_mut()?;
            let Some(node) = items.next() else {
                let close = *close;
                self.stack.pop();
                if close {
                    return Some(Token::Close);
                }
                continue;
            };
            return Some(match node {
                Node::Reference(v) => Token::Reference(v),
                Node::Literal(v) => Token::Literal(v),
                Node::Comparison(v) => Token::Comparison(v),
                Node::Logical(v) => Token::Logical(*v),
                Node::Flag(GroupFlag::Open) => Token::Open,
                Node::Flag(GroupFlag::Close) => Token::Close,
                Node::Group(group) => {
                    let wrap = group.items().len() > 1;
                    self.stack.push((group.items().iter(), wrap));
                    if !wrap {
                        continue;
                    }
                    Token::Open
                }
            });
        }
    }
}
