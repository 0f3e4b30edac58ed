use thiserror::Error;

use crate::class::PrimitiveType;

/// Errors raised by the object model and its collaborators.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Class name not present in the registry
    #[error("unknown class: {0}")]
    UnknownClass(String),

    /// Field not declared by the class or any ancestor
    #[error("unknown field: {class}.{field}")]
    UnknownField { class: String, field: String },

    /// Field accessed through the wrong kind (scalar vs collection)
    #[error("field {class}.{field} is not a {expected}")]
    KindMismatch {
        class: String,
        field: String,
        expected: &'static str,
    },

    /// Name already registered to another object
    #[error("name already in use: {0}")]
    NameInUse(String),

    /// Object already carries a different name
    #[error("object is already registered as {0}")]
    AlreadyNamed(String),

    /// Text does not parse as the declared primitive type
    #[error("cannot convert {text:?} to {ty}")]
    InvalidValue { ty: PrimitiveType, text: String },

    /// Reference values have no canonical text form
    #[error("value is not a primitive")]
    NotPrimitive,
}

pub type Result<T> = std::result::Result<T, ModelError>;
