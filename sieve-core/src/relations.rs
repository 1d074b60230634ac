use crate::{ErrorKind, Group, ModelRef, Result, Value, when};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// At most one related record.
    One,
    /// Any number of related records.
    Many,
}

/// Named link from a model to related records of another model, loaded on demand.
///
/// The fields to match are never declared here, they come from the references between the two
/// models (or between each of them and the association model given with [`Relation::via`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: Cow<'static, str>,
    pub kind: RelationKind,
    pub target: Cow<'static, str>,
    pub via: Option<Cow<'static, str>>,
}

impl Relation {
    pub fn one(name: impl Into<Cow<'static, str>>, target: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::One,
            target: target.into(),
            via: None,
        }
    }

    pub fn many(name: impl Into<Cow<'static, str>>, target: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::Many,
            target: target.into(),
            via: None,
        }
    }

    /// Reach the target through an association model referencing both ends.
    pub fn via(mut self, association: impl Into<Cow<'static, str>>) -> Self {
        self.via = Some(association.into());
        self
    }

    /// Resolves the target model in the collection of `source`.
    pub fn target_model(&self, source: &ModelRef) -> Result<ModelRef> {
        lookup(source, &self.target)
    }

    /// Predicate selecting the records related to `row`, a row of `source`.
    pub fn predicate(&self, source: &ModelRef, row: &[Value]) -> Result<Group> {
        let target = self.target_model(source)?;
        let near = match &self.via {
            Some(association) => lookup(source, association)?,
            None => target.clone(),
        };
        let index = source.collection()?.references()?;
        index.check(source)?;
        index.check(&near)?;
        let references = index.between(source, &near);
        if references.is_empty() {
            let error = ErrorKind::JoinResolutionFailed {
                from: source.name().to_string(),
                to: near.name().to_string(),
            }
            .into_error();
            log::error!("{:#}", error);
            return Err(error);
        }
        let mut group = when(&target);
        for reference in references {
            let (near_field, source_field) = if reference.from_model == *source {
                (reference.to_field_def(), reference.from_field)
            } else {
                (reference.from_field_def(), reference.to_field)
            };
            let value = row.get(source_field).cloned().unwrap_or(Value::Null);
            group = group.and(near.field(near_field.name.clone()).equals(value));
        }
        Ok(group)
    }
}

fn lookup(source: &ModelRef, name: &str) -> Result<ModelRef> {
    source.collection()?.get(name).ok_or_else(|| {
        let error = ErrorKind::UnresolvedReference {
            model: source.name().to_string(),
            field: String::new(),
            target: name.to_string(),
        }
        .into_error();
        log::error!("{:#}", error);
        error
    })
}
