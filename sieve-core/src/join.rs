use crate::{ErrorKind, FieldDef, ModelRef, Result};
use std::collections::{HashMap, HashSet, VecDeque};

/// Resolved reference: `from_model.fields()[from_field]` points at `to_model.fields()[to_field]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldReference {
    pub from_model: ModelRef,
    pub from_field: usize,
    pub to_model: ModelRef,
    pub to_field: usize,
}

impl FieldReference {
    pub fn from_field_def(&self) -> &FieldDef {
        &self.from_model.fields()[self.from_field]
    }

    pub fn to_field_def(&self) -> &FieldDef {
        &self.to_model.fields()[self.to_field]
    }

    fn links(&self, a: &ModelRef, b: &ModelRef) -> bool {
        self.from_model == *a && self.to_model == *b
    }
}

/// A field of a specific model, one side of a join condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub model: ModelRef,
    pub field: usize,
}

impl FieldPath {
    pub fn field_def(&self) -> &FieldDef {
        &self.model.fields()[self.field]
    }
}

/// One model entering the query. Every pair in `on` is `(already joined side, entering side)` and
/// all of them must hold, composite references produce more than one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    pub model: ModelRef,
    pub on: Vec<(FieldPath, FieldPath)>,
}

#[derive(Debug, Clone)]
struct Unresolved {
    model: String,
    field: String,
    target: String,
}

/// Every reference declared by the models of one collection, resolved against model names.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    references: Vec<FieldReference>,
    unresolved: Vec<Unresolved>,
}

impl ReferenceIndex {
    pub fn build(models: &[ModelRef]) -> Self {
        let mut index = ReferenceIndex::default();
        for model in models {
            for (from_field, field) in model.fields().iter().enumerate() {
                let Some(target) = field.reference() else {
                    continue;
                };
                let resolved = models
                    .iter()
                    .find(|m| m.name() == target.model)
                    .and_then(|to_model| {
                        to_model
                            .field_index(&target.field)
                            .map(|to_field| (to_model.clone(), to_field))
                    });
                match resolved {
                    Some((to_model, to_field)) => index.references.push(FieldReference {
                        from_model: model.clone(),
                        from_field,
                        to_model,
                        to_field,
                    }),
                    None => index.unresolved.push(Unresolved {
                        model: model.name().to_string(),
                        field: field.name.to_string(),
                        target: format!("{}.{}", target.model, target.field),
                    }),
                }
            }
        }
        index
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn references(&self) -> &[FieldReference] {
        &self.references
    }

    /// References declared by `model`.
    pub fn from_model<'a>(&'a self, model: &'a ModelRef) -> impl Iterator<Item = &'a FieldReference> {
        self.references.iter().filter(move |r| r.from_model == *model)
    }

    /// References pointing at `model`.
    pub fn to_model<'a>(&'a self, model: &'a ModelRef) -> impl Iterator<Item = &'a FieldReference> {
        self.references.iter().filter(move |r| r.to_model == *model)
    }

    /// References from `a` to `b` when there are some, otherwise the ones from `b` to `a`.
    pub fn between(&self, a: &ModelRef, b: &ModelRef) -> Vec<&FieldReference> {
        let forward = self
            .references
            .iter()
            .filter(|r| r.links(a, b))
            .collect::<Vec<_>>();
        if !forward.is_empty() {
            return forward;
        }
        self.references.iter().filter(|r| r.links(b, a)).collect()
    }

    /// Fails with [`ErrorKind::UnresolvedReference`] when a reference declared by `model` did not resolve.
    pub fn check(&self, model: &ModelRef) -> Result<()> {
        match self.unresolved.iter().find(|u| u.model == model.name()) {
            Some(u) => Err(Self::unresolved_error(u)),
            None => Ok(()),
        }
    }

    pub fn check_all(&self) -> Result<()> {
        match self.unresolved.first() {
            Some(u) => Err(Self::unresolved_error(u)),
            None => Ok(()),
        }
    }

    fn unresolved_error(unresolved: &Unresolved) -> crate::Error {
        let error = ErrorKind::UnresolvedReference {
            model: unresolved.model.clone(),
            field: unresolved.field.clone(),
            target: unresolved.target.clone(),
        }
        .into_error();
        log::error!("{:#}", error);
        error
    }

    fn neighbours(&self, model: &ModelRef) -> Vec<ModelRef> {
        let mut result = Vec::new();
        for r in &self.references {
            let other = if r.from_model == *model {
                &r.to_model
            } else if r.to_model == *model {
                &r.from_model
            } else {
                continue;
            };
            if other != model && !result.contains(other) {
                result.push(other.clone());
            }
        }
        result
    }

    /// Steps bringing `target` into a query already covering `joined`, following the shortest chain
    /// of references. Intermediate models on the chain (association tables) are joined too. Empty
    /// when `target` is already part of the query.
    pub fn join_path(&self, joined: &[ModelRef], target: &ModelRef) -> Result<Vec<JoinStep>> {
        if joined.contains(target) {
            return Ok(Vec::new());
        }
        self.check(target)?;
        for model in joined {
            self.check(model)?;
        }
        let mut parent = HashMap::<ModelRef, ModelRef>::new();
        let mut visited = HashSet::from([target.clone()]);
        let mut queue = VecDeque::from([target.clone()]);
        let mut reached = None;
        'search: while let Some(current) = queue.pop_front() {
            for next in self.neighbours(&current) {
                if !visited.insert(next.clone()) {
                    continue;
                }
                parent.insert(next.clone(), current.clone());
                if joined.contains(&next) {
                    reached = Some(next);
                    break 'search;
                }
                queue.push_back(next);
            }
        }
        let Some(mut previous) = reached else {
            let error = ErrorKind::JoinResolutionFailed {
                from: joined
                    .first()
                    .map(|m| m.name().to_string())
                    .unwrap_or_default(),
                to: target.name().to_string(),
            }
            .into_error();
            log::error!("{:#}", error);
            return Err(error);
        };
        let mut steps = Vec::new();
        while let Some(entering) = parent.get(&previous) {
            let on = self
                .between(&previous, entering)
                .into_iter()
                .map(|r| {
                    let from = FieldPath {
                        model: r.from_model.clone(),
                        field: r.from_field,
                    };
                    let to = FieldPath {
                        model: r.to_model.clone(),
                        field: r.to_field,
                    };
                    if r.from_model == previous {
                        (from, to)
                    } else {
                        (to, from)
                    }
                })
                .collect();
            steps.push(JoinStep {
                model: entering.clone(),
                on,
            });
            previous = entering.clone();
        }
        Ok(steps)
    }
}
