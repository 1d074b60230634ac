use crate::{ModelRef, ReferenceIndex, Result};
use std::sync::{Arc, LazyLock, PoisonError, RwLock, Weak};

static DEFAULT_COLLECTION: LazyLock<ModelCollection> =
    LazyLock::new(|| ModelCollection::new("default"));

pub struct CollectionInner {
    name: String,
    models: RwLock<Vec<ModelRef>>,
    references: RwLock<Option<Arc<ReferenceIndex>>>,
}

/// Set of models created and dropped together, and the namespace their references resolve in.
///
/// Registration is the first phase of reference resolution: models only record the symbolic name of
/// what they reference. The [`ReferenceIndex`] is the second phase, built on the first lookup (or by
/// [`ModelCollection::finalize`]) and cached until another model is registered.
#[derive(Clone)]
pub struct ModelCollection(Arc<CollectionInner>);

impl ModelCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(CollectionInner {
            name: name.into(),
            models: Default::default(),
            references: Default::default(),
        }))
    }

    /// Process-wide collection models register into when none is given.
    pub fn default_collection() -> Self {
        DEFAULT_COLLECTION.clone()
    }

    pub(crate) fn from_inner(inner: Arc<CollectionInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<CollectionInner> {
        Arc::downgrade(&self.0)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub(crate) fn register(&self, model: ModelRef) {
        let mut models = self.0.models.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = models.iter_mut().find(|m| m.name() == model.name()) {
            log::warn!(
                "Model `{}` is registered again in collection `{}`, replacing the previous one",
                model.name(),
                self.0.name
            );
            *existing = model;
        } else {
            models.push(model);
        }
        self.invalidate();
    }

    /// Removes the model registered as `name`.
    pub fn remove(&self, name: &str) -> Option<ModelRef> {
        let mut models = self.0.models.write().unwrap_or_else(PoisonError::into_inner);
        let position = models.iter().position(|m| m.name() == name)?;
        let model = models.remove(position);
        self.invalidate();
        Some(model)
    }

    pub fn get(&self, name: &str) -> Option<ModelRef> {
        self.0
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|m| m.name() == name)
            .cloned()
    }

    pub fn contains(&self, model: &ModelRef) -> bool {
        self.0
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(model)
    }

    /// Models in registration order.
    pub fn models(&self) -> Vec<ModelRef> {
        self.0
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The reference index, building and caching it when every reference resolves.
    pub fn references(&self) -> Result<Arc<ReferenceIndex>> {
        if let Some(index) = self
            .0
            .references
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(index.clone());
        }
        let index = Arc::new(ReferenceIndex::build(&self.models()));
        if index.is_complete() {
            *self
                .0
                .references
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(index.clone());
        }
        Ok(index)
    }

    /// Resolves every reference now, failing on the first that does not resolve.
    pub fn finalize(&self) -> Result<()> {
        self.references()?.check_all()
    }

    fn invalidate(&self) {
        *self
            .0
            .references
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl PartialEq for ModelCollection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for ModelCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCollection")
            .field("name", &self.0.name)
            .field("models", &self.models())
            .finish()
    }
}
