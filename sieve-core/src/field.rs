use crate::{AsValue, Value};
use std::borrow::Cow;

/// Kind of a [`FieldTag`], what [`FieldTags::has`] looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Key,
    StoreAs,
    References,
    Nullable,
    Unique,
}

/// Symbolic reference target, resolved against the model collection on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceTarget {
    pub model: Cow<'static, str>,
    pub field: Cow<'static, str>,
}

impl ReferenceTarget {
    pub fn new(model: impl Into<Cow<'static, str>>, field: impl Into<Cow<'static, str>>) -> Self {
        Self {
            model: model.into(),
            field: field.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldTag {
    /// Part of the primary key.
    Key,
    /// Storage name overriding the attribute name.
    StoreAs(Cow<'static, str>),
    /// Foreign reference to another model's field.
    References(ReferenceTarget),
    Nullable,
    Unique,
}

impl FieldTag {
    pub fn tag(&self) -> Tag {
        match self {
            FieldTag::Key => Tag::Key,
            FieldTag::StoreAs(..) => Tag::StoreAs,
            FieldTag::References(..) => Tag::References,
            FieldTag::Nullable => Tag::Nullable,
            FieldTag::Unique => Tag::Unique,
        }
    }
}

/// Ordered set of field tags, one entry per [`Tag`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct FieldTags(Vec<FieldTag>);

impl FieldTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tag`, replacing the payload of an existing tag of the same kind.
    pub fn insert(&mut self, tag: FieldTag) {
        match self.0.iter_mut().find(|t| t.tag() == tag.tag()) {
            Some(existing) => *existing = tag,
            None => self.0.push(tag),
        }
    }

    pub fn union(mut self, other: FieldTags) -> FieldTags {
        for tag in other.0 {
            self.insert(tag);
        }
        self
    }

    pub fn has(&self, tag: Tag) -> bool {
        self.0.iter().any(|t| t.tag() == tag)
    }

    pub fn get(&self, tag: Tag) -> Option<&FieldTag> {
        self.0.iter().find(|t| t.tag() == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldTag> {
        self.0.iter()
    }
}

impl FromIterator<FieldTag> for FieldTags {
    fn from_iter<I: IntoIterator<Item = FieldTag>>(iter: I) -> Self {
        let mut tags = FieldTags::new();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}

/// Field of a model: attribute name, storage name, declared type and tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDef {
    pub name: Cow<'static, str>,
    pub value_type: Value,
    pub tags: FieldTags,
}

impl FieldDef {
    pub fn new(name: impl Into<Cow<'static, str>>, value_type: Value) -> Self {
        Self {
            name: name.into(),
            value_type: value_type.as_null(),
            tags: Default::default(),
        }
    }

    /// Field declared with the type of `T`.
    pub fn of<T: AsValue>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, T::as_empty_value())
    }

    pub fn tag(mut self, tag: FieldTag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn tags(mut self, tags: FieldTags) -> Self {
        self.tags = self.tags.union(tags);
        self
    }

    pub fn key(self) -> Self {
        self.tag(FieldTag::Key)
    }

    pub fn store_as(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.tag(FieldTag::StoreAs(name.into()))
    }

    pub fn references(
        self,
        model: impl Into<Cow<'static, str>>,
        field: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.tag(FieldTag::References(ReferenceTarget::new(model, field)))
    }

    pub fn nullable(self) -> Self {
        self.tag(FieldTag::Nullable)
    }

    pub fn unique(self) -> Self {
        self.tag(FieldTag::Unique)
    }

    pub fn storage_name(&self) -> &str {
        match self.tags.get(Tag::StoreAs) {
            Some(FieldTag::StoreAs(name)) => name,
            _ => &self.name,
        }
    }

    pub fn reference(&self) -> Option<&ReferenceTarget> {
        match self.tags.get(Tag::References) {
            Some(FieldTag::References(target)) => Some(target),
            _ => None,
        }
    }

    pub fn is_key(&self) -> bool {
        self.tags.has(Tag::Key)
    }

    pub fn is_nullable(&self) -> bool {
        self.tags.has(Tag::Nullable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_keep_one_entry_per_kind() {
        let tags: FieldTags = [
            FieldTag::Key,
            FieldTag::StoreAs("a".into()),
            FieldTag::StoreAs("b".into()),
        ]
        .into_iter()
        .collect();
        assert_eq!(tags.iter().count(), 2);
        assert!(tags.has(Tag::Key));
        assert!(!tags.has(Tag::Nullable));
        assert_eq!(tags.get(Tag::StoreAs), Some(&FieldTag::StoreAs("b".into())));
    }

    #[test]
    fn union_merges_and_overrides() {
        let field = FieldDef::of::<i64>("author")
            .store_as("author_id")
            .tags([FieldTag::Unique, FieldTag::StoreAs("writer_id".into())].into_iter().collect());
        assert_eq!(field.storage_name(), "writer_id");
        assert!(field.tags.has(Tag::Unique));
        assert_eq!(field.value_type, Value::Int64(None));
    }
}
