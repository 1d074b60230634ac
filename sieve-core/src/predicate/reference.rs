use crate::{CompareOp, Comparison, ErrorKind, FieldDef, ModelRef, Operand, Result, Value};
use std::borrow::Cow;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    #[default]
    ASC,
    DESC,
}

/// A field of a model, or the whole model when `field` is `None`.
///
/// A whole-model reference selects what the query returns (the first one) or which models it
/// joins (the others), it never filters by itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub model: ModelRef,
    pub field: Option<Cow<'static, str>>,
    pub order: Order,
}

impl Reference {
    pub fn field(model: ModelRef, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            model,
            field: Some(name.into()),
            order: Order::ASC,
        }
    }

    pub fn model(model: ModelRef) -> Self {
        Self {
            model,
            field: None,
            order: Order::ASC,
        }
    }

    pub fn asc(mut self) -> Self {
        self.order = Order::ASC;
        self
    }

    pub fn desc(mut self) -> Self {
        self.order = Order::DESC;
        self
    }

    pub fn is_model(&self) -> bool {
        self.field.is_none()
    }

    /// The referenced field definition, failing with [`ErrorKind::UnknownField`].
    pub fn field_def(&self) -> Result<&FieldDef> {
        self.model.expect_field(self.field_name()?)
    }

    pub fn field_index(&self) -> Result<usize> {
        let name = self.field_name()?;
        self.model.field_index(name).ok_or_else(|| {
            ErrorKind::UnknownField {
                model: self.model.name().to_string(),
                field: name.to_string(),
            }
            .into_error()
        })
    }

    fn field_name(&self) -> Result<&str> {
        self.field.as_deref().ok_or_else(|| {
            ErrorKind::MalformedPredicate(format!(
                "reference to model `{}` has no field",
                self.model.name()
            ))
            .into_error()
        })
    }

    pub fn equals(self, right: impl Into<Operand>) -> Comparison {
        Comparison::new(self, CompareOp::Eq, right)
    }

    pub fn not_equals(self, right: impl Into<Operand>) -> Comparison {
        Comparison::new(self, CompareOp::Ne, right)
    }

    pub fn gt(self, right: impl Into<Operand>) -> Comparison {
        Comparison::new(self, CompareOp::Gt, right)
    }

    pub fn gte(self, right: impl Into<Operand>) -> Comparison {
        Comparison::new(self, CompareOp::Gte, right)
    }

    pub fn lt(self, right: impl Into<Operand>) -> Comparison {
        Comparison::new(self, CompareOp::Lt, right)
    }

    pub fn lte(self, right: impl Into<Operand>) -> Comparison {
        Comparison::new(self, CompareOp::Lte, right)
    }

    pub fn is_null(self) -> Comparison {
        Comparison::new(self, CompareOp::Eq, Value::Null)
    }

    pub fn is_not_null(self) -> Comparison {
        Comparison::new(self, CompareOp::Ne, Value::Null)
    }
}
