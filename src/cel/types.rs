//! Semantic types of filter expressions

use std::fmt;

/// Type of a filter expression node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Timestamp,
    Duration,
    /// Untyped JSON; structure unknown until run time
    Dyn,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// Named nested message declared by a view
    Message(String),
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn message(name: impl Into<String>) -> Self {
        Type::Message(name.into())
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, Type::Dyn)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Uint | Type::Double)
    }

    /// True when a value of `other` can be used where `self` is expected
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Dyn, _) | (_, Type::Dyn) => true,
            (Type::Null, Type::Null) => true,
            (Type::Message(_) | Type::Timestamp | Type::Duration, Type::Null) => true,
            (Type::Null, Type::Message(_) | Type::Timestamp | Type::Duration) => true,
            (Type::List(a), Type::List(b)) => a.is_assignable_from(b),
            (Type::Map(ak, av), Type::Map(bk, bv)) => {
                ak.is_assignable_from(bk) && av.is_assignable_from(bv)
            }
            (a, b) => a == b,
        }
    }

    /// Shared type of two branches, widening to `Dyn` on mismatch
    pub fn join(&self, other: &Type) -> Type {
        if self == other {
            self.clone()
        } else if self.is_dyn() {
            other.clone()
        } else if other.is_dyn() {
            self.clone()
        } else {
            Type::Dyn
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Null => write!(f, "null_type"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Uint => write!(f, "uint"),
            Type::Double => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::Timestamp => write!(f, "google.protobuf.Timestamp"),
            Type::Duration => write!(f, "google.protobuf.Duration"),
            Type::Dyn => write!(f, "dyn"),
            Type::List(elem) => write!(f, "list({})", elem),
            Type::Map(key, value) => write!(f, "map({}, {})", key, value),
            Type::Message(name) => write!(f, "{}", name),
        }
    }
}
