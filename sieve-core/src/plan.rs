use crate::{ErrorKind, Group, JoinStep, ModelRef, Reference, Result, Token, Tokens};

/// Rows to skip and the maximum to return.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub offset: u64,
    pub limit: Option<u64>,
}

impl Window {
    pub fn new(offset: u64, limit: Option<u64>) -> Self {
        Self { offset, limit }
    }

    /// The paging declared by `group`.
    pub fn of(group: &Group) -> Self {
        Self {
            offset: group.offset(),
            limit: group.max_results(),
        }
    }
}

/// Backend independent shape of a query, what every compiler starts from.
///
/// The first model named by the predicate is the primary one (the one returned, updated or deleted),
/// every other model is joined through the shortest chain of references to the models already in.
#[derive(Debug)]
pub struct QueryPlan<'g> {
    pub group: &'g Group,
    pub primary: ModelRef,
    pub joins: Vec<JoinStep>,
    pub window: Window,
}

impl<'g> QueryPlan<'g> {
    pub fn new(group: &'g Group) -> Result<Self> {
        let mut depth = 0usize;
        for token in group.tokens() {
            match token {
                Token::Open => depth += 1,
                Token::Close => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        malformed("a group is closed before being opened".into())
                    })?
                }
                Token::Reference(r) if !r.is_model() => {
                    r.field_def()?;
                }
                Token::Comparison(c) => {
                    for r in [&c.left, &c.right].into_iter().filter_map(|v| v.as_reference()) {
                        if !r.is_model() {
                            r.field_def()?;
                        }
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(malformed(format!("{} group(s) left open", depth)));
        }
        for r in group.sorting() {
            r.field_def()?;
        }
        let mut models = group.models().into_iter();
        let Some(primary) = models.next() else {
            return Err(malformed("the predicate names no model".into()));
        };
        let secondary = models.collect::<Vec<_>>();
        let mut joins = Vec::new();
        if !secondary.is_empty() {
            let index = primary.collection()?.references()?;
            let mut joined = vec![primary.clone()];
            for model in &secondary {
                for step in index.join_path(&joined, model)? {
                    joined.push(step.model.clone());
                    joins.push(step);
                }
            }
        }
        Ok(Self {
            group,
            primary,
            joins,
            window: Window::of(group),
        })
    }

    /// Same plan reading `window` instead of the paging of the predicate.
    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    pub fn tokens(&self) -> Tokens<'g> {
        self.group.tokens()
    }

    pub fn sorting(&self) -> &'g [Reference] {
        self.group.sorting()
    }

    pub fn is_joined(&self) -> bool {
        !self.joins.is_empty()
    }

    /// Primary model followed by the joined ones, in join order.
    pub fn models(&self) -> impl Iterator<Item = &ModelRef> {
        std::iter::once(&self.primary).chain(self.joins.iter().map(|j| &j.model))
    }
}

fn malformed(message: String) -> crate::Error {
    let error = ErrorKind::MalformedPredicate(message).into_error();
    log::error!("{:#}", error);
    error
}
