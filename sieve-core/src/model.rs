use crate::{
    CollectionInner, Error, ErrorKind, FieldDef, ModelCollection, Reference, Relation, Result,
};
use std::{
    borrow::Cow,
    collections::HashMap,
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
    ops::Deref,
    sync::{Arc, Weak},
};

/// Immutable schema descriptor of a model.
pub struct ModelDef {
    name: Cow<'static, str>,
    storage_name: Cow<'static, str>,
    fields: Box<[FieldDef]>,
    primary_key: Box<[usize]>,
    relations: Box<[Relation]>,
    pub(crate) collection: Weak<CollectionInner>,
}

impl ModelDef {
    pub fn builder(name: impl Into<Cow<'static, str>>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            storage_name: None,
            fields: Vec::new(),
            relations: Vec::new(),
            collection: None,
        }
    }

    /// Name the model is registered under in its collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table or collection name.
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Like [`ModelDef::find_field`] but failing with [`ErrorKind::UnknownField`].
    pub fn expect_field(&self, name: &str) -> Result<&FieldDef> {
        self.find_field(name).ok_or_else(|| {
            ErrorKind::UnknownField {
                model: self.name.to_string(),
                field: name.to_string(),
            }
            .into_error()
        })
    }

    /// Positions of the primary key fields, in declaration order.
    pub fn primary_key_indices(&self) -> &[usize] {
        &self.primary_key
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &FieldDef> {
        self.primary_key.iter().map(|&i| &self.fields[i])
    }

    /// Position of the key field the backend generates, present when the key is a single integer field.
    pub fn auto_increment_index(&self) -> Option<usize> {
        match *self.primary_key {
            [i] if self.fields[i].value_type.is_integer() => Some(i),
            _ => None,
        }
    }

    pub fn auto_increment(&self) -> Option<&FieldDef> {
        self.auto_increment_index().map(|i| &self.fields[i])
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Collection the model was registered into.
    pub fn collection(&self) -> Result<ModelCollection> {
        self.collection
            .upgrade()
            .map(ModelCollection::from_inner)
            .ok_or_else(|| {
                Error::msg(format!(
                    "The collection of model `{}` no longer exists",
                    self.name
                ))
            })
    }
}

/// Primary key selection: every key-tagged field, else the field stored as `id` or `_id`, else the
/// first integer field, else the first field.
pub fn select_primary_key(fields: &[FieldDef]) -> Vec<usize> {
    let keys = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_key())
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    if !keys.is_empty() {
        return keys;
    }
    fields
        .iter()
        .position(|f| matches!(f.storage_name(), "id" | "_id"))
        .or_else(|| fields.iter().position(|f| f.value_type.is_integer()))
        .or(if fields.is_empty() { None } else { Some(0) })
        .into_iter()
        .collect()
}

pub struct ModelBuilder {
    name: Cow<'static, str>,
    storage_name: Option<Cow<'static, str>>,
    fields: Vec<FieldDef>,
    relations: Vec<Relation>,
    collection: Option<ModelCollection>,
}

impl ModelBuilder {
    pub fn storage_name(mut self, storage_name: impl Into<Cow<'static, str>>) -> Self {
        self.storage_name = Some(storage_name.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Collection to register into, the default collection otherwise.
    pub fn collection(mut self, collection: &ModelCollection) -> Self {
        self.collection = Some(collection.clone());
        self
    }

    /// Validates the declaration and registers the model.
    pub fn build(self) -> Result<ModelRef> {
        if self.fields.is_empty() {
            let error = ErrorKind::NotSupported(format!("model `{}` declares no fields", self.name))
                .into_error();
            log::error!("{:#}", error);
            return Err(error);
        }
        {
            let mut storage_names = HashMap::<String, &FieldDef>::new();
            for field in &self.fields {
                if let Some(previous) =
                    storage_names.insert(field.storage_name().to_lowercase(), field)
                {
                    let error = ErrorKind::DuplicateStorageName {
                        model: self.name.to_string(),
                        storage_name: field.storage_name().to_string(),
                        first: previous.name.to_string(),
                        second: field.name.to_string(),
                    }
                    .into_error();
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        }
        let collection = self
            .collection
            .unwrap_or_else(ModelCollection::default_collection);
        let primary_key = select_primary_key(&self.fields).into_boxed_slice();
        let model = ModelRef(Arc::new(ModelDef {
            storage_name: self.storage_name.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            fields: self.fields.into_boxed_slice(),
            primary_key,
            relations: self.relations.into_boxed_slice(),
            collection: collection.downgrade(),
        }));
        collection.register(model.clone());
        Ok(model)
    }
}

/// Shared handle to a [`ModelDef`], equal only to handles of the same registration.
#[derive(Clone)]
pub struct ModelRef(Arc<ModelDef>);

impl ModelRef {
    /// Reference to a field of this model, used to build predicates and sort keys.
    pub fn field(&self, name: impl Into<Cow<'static, str>>) -> Reference {
        Reference::field(self.clone(), name)
    }

    /// Reference to the whole model, no field.
    pub fn all(&self) -> Reference {
        Reference::model(self.clone())
    }
}

impl Deref for ModelRef {
    type Target = ModelDef;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ModelRef {}

impl Hash for ModelRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state)
    }
}

impl Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelRef({})", self.name)
    }
}

impl Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
