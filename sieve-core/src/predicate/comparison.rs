use crate::{AsValue, Reference, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// The operator holding once the operands are swapped.
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Lte => CompareOp::Gte,
            op => op,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Reference(Reference),
    Literal(Value),
}

impl Operand {
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Operand::Reference(r) => Some(r),
            Operand::Literal(..) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Operand::Literal(v) => Some(v),
            Operand::Reference(..) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Literal(v) if v.is_null())
    }
}

impl From<Reference> for Operand {
    fn from(value: Reference) -> Self {
        Operand::Reference(value)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

impl<T: AsValue> From<T> for Operand {
    fn from(value: T) -> Self {
        Operand::Literal(value.as_value())
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Literal(value.into())
    }
}

/// `left op right`, each side a field reference or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comparison {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

impl Comparison {
    pub fn new(left: impl Into<Operand>, op: CompareOp, right: impl Into<Operand>) -> Self {
        Self {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    /// Same comparison with the literal, if any, moved to the right.
    pub fn normalized(&self) -> Comparison {
        match (&self.left, &self.right) {
            (Operand::Literal(..), Operand::Reference(..)) => Comparison {
                left: self.right.clone(),
                op: self.op.flip(),
                right: self.left.clone(),
            },
            _ => self.clone(),
        }
    }

    /// `Some(true)` for `x = NULL`, `Some(false)` for `x <> NULL`, these mean IS [NOT] NULL.
    pub fn null_check(&self) -> Option<bool> {
        if !(self.left.is_null() || self.right.is_null()) {
            return None;
        }
        match self.op {
            CompareOp::Eq => Some(true),
            CompareOp::Ne => Some(false),
            _ => None,
        }
    }
}
