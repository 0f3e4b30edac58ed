//! Field values.

use std::rc::Rc;

use crate::instance::ObjRef;

/// A single field value: a primitive or a reference to another object.
///
/// References compare by object identity (`Rc` pointer), primitives
/// structurally. `Value` is deliberately not `Eq`/`Hash`: floats and
/// reference identity make neither lawful, so unordered collections are
/// association vectors compared with [`unordered_eq`].
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ref(ObjRef),
}

impl Value {
    /// Build a string value.
    pub fn str(s: &str) -> Self {
        Self::Str(s.to_string())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The referenced object, if this is a live reference.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Self::Ref(obj) => Some(obj),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Multiset equality over values, ignoring order.
#[must_use]
pub fn unordered_eq(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut remaining: Vec<&Value> = b.iter().collect();
    for value in a {
        match remaining.iter().position(|v| *v == value) {
            Some(idx) => {
                remaining.swap_remove(idx);
            }
            None => return false,
        }
    }
    true
}

/// Multiset equality over key/value pairs, ignoring order.
#[must_use]
pub fn entries_eq(a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut remaining: Vec<&(Value, Value)> = b.iter().collect();
    for entry in a {
        match remaining
            .iter()
            .position(|e| e.0 == entry.0 && e.1 == entry.1)
        {
            Some(idx) => {
                remaining.swap_remove(idx);
            }
            None => return false,
        }
    }
    true
}
