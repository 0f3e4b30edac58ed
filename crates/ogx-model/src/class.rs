//! Class metadata and the model registry.
//!
//! Classes are described by fully-qualified names (`com.acme.Person`) with an
//! optional superclass, and an ordered list of field definitions. The
//! [`ModelRegistry`] is the runtime type information the codec walks: it
//! enumerates serializable fields, resolves fields through the superclass
//! chain, and instantiates default instances.

use std::collections::BTreeMap;

use crate::error::{ModelError, Result};
use crate::instance::{Instance, ObjRef, Slot};
use crate::value::Value;

/// Primitive value types a field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Bool,
    Int,
    Float,
    Str,
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "string"),
        }
    }
}

/// A field's declared type: either a primitive or a class reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Primitive(PrimitiveType),
    Class(String),
}

impl TypeRef {
    /// Shorthand for a class-typed reference.
    pub fn class(name: &str) -> Self {
        Self::Class(name.to_string())
    }
}

/// The kind of a field, a closed union over scalar and collection shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Single value (primitive or reference).
    Scalar(TypeRef),
    /// Ordered collection.
    List(TypeRef),
    /// Unordered collection.
    Set(TypeRef),
    /// Key/value pairs; keys and values are independently typed.
    Map { key: TypeRef, value: TypeRef },
}

impl FieldKind {
    /// Whether this kind holds multiple values.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }
}

/// Definition of one field of a class.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// Derived at runtime, never serialized.
    pub calculated: bool,
    /// Excluded from serialization by declaration.
    pub transient: bool,
    /// Class-level, not per-instance.
    pub is_static: bool,
}

impl FieldDef {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            calculated: false,
            transient: false,
            is_static: false,
        }
    }

    /// A scalar field.
    pub fn scalar(name: &str, ty: TypeRef) -> Self {
        Self::new(name, FieldKind::Scalar(ty))
    }

    /// An ordered list field.
    pub fn list(name: &str, element: TypeRef) -> Self {
        Self::new(name, FieldKind::List(element))
    }

    /// An unordered set field.
    pub fn set(name: &str, element: TypeRef) -> Self {
        Self::new(name, FieldKind::Set(element))
    }

    /// A map field.
    pub fn map(name: &str, key: TypeRef, value: TypeRef) -> Self {
        Self::new(name, FieldKind::Map { key, value })
    }

    /// Mark the field as calculated.
    #[must_use]
    pub fn calculated(mut self) -> Self {
        self.calculated = true;
        self
    }

    /// Mark the field as transient.
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Mark the field as static.
    #[must_use]
    pub fn static_field(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Whether the field takes part in serialization.
    #[must_use]
    pub fn is_serializable(&self) -> bool {
        !self.calculated && !self.transient && !self.is_static
    }

    /// Default slot for a fresh instance.
    pub(crate) fn default_slot(&self) -> Slot {
        match &self.kind {
            FieldKind::Scalar(_) => Slot::Scalar(Value::Null),
            FieldKind::List(_) => Slot::List(Vec::new()),
            FieldKind::Set(_) => Slot::Set(Vec::new()),
            FieldKind::Map { .. } => Slot::Map(Vec::new()),
        }
    }
}

/// Definition of a class: fully-qualified name, optional superclass, fields.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub superclass: Option<String>,
    pub fields: Vec<FieldDef>,
}

impl ClassDef {
    /// Create a class with no superclass and no fields.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            superclass: None,
            fields: Vec::new(),
        }
    }

    /// Set the superclass.
    #[must_use]
    pub fn with_superclass(mut self, superclass: &str) -> Self {
        self.superclass = Some(superclass.to_string());
        self
    }

    /// Append a field.
    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// The class name after the last `.` separator.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Registry of class definitions; the codec's RTTI collaborator.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    classes: BTreeMap<String, ClassDef>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class definition, replacing any previous one of the same name.
    pub fn register(&mut self, class: ClassDef) {
        tracing::debug!(class = %class.name, "registered class");
        self.classes.insert(class.name.clone(), class);
    }

    /// Look up a class by fully-qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    fn get_or_err(&self, name: &str) -> Result<&ClassDef> {
        self.get(name)
            .ok_or_else(|| ModelError::UnknownClass(name.to_string()))
    }

    /// The class and its superclasses, most derived first.
    ///
    /// Unknown superclass names end the chain; a malformed cyclic hierarchy
    /// is cut rather than looped over.
    pub fn ancestors<'a>(&'a self, name: &'a str) -> Vec<&'a str> {
        let mut chain = Vec::new();
        let mut cursor = Some(name);
        while let Some(current) = cursor {
            if chain.contains(&current) {
                break;
            }
            chain.push(current);
            cursor = self
                .get(current)
                .and_then(|c| c.superclass.as_deref());
        }
        chain
    }

    /// Serializable fields of a class, inherited fields first, in declaration
    /// order. A field redeclared in a subclass shadows the inherited one.
    pub fn fields(&self, class: &str) -> Result<Vec<&FieldDef>> {
        self.get_or_err(class)?;
        let mut fields: Vec<&FieldDef> = Vec::new();
        for ancestor in self.ancestors(class).into_iter().rev() {
            if let Some(def) = self.get(ancestor) {
                for field in &def.fields {
                    if let Some(slot) = fields.iter_mut().find(|f| f.name == field.name) {
                        *slot = field;
                    } else {
                        fields.push(field);
                    }
                }
            }
        }
        fields.retain(|f| f.is_serializable());
        Ok(fields)
    }

    /// Resolve a field by name through the superclass chain.
    pub fn field(&self, class: &str, name: &str) -> Result<&FieldDef> {
        self.get_or_err(class)?;
        for ancestor in self.ancestors(class) {
            if let Some(def) = self.get(ancestor) {
                if let Some(field) = def.fields.iter().find(|f| f.name == name) {
                    return Ok(field);
                }
            }
        }
        Err(ModelError::UnknownField {
            class: class.to_string(),
            field: name.to_string(),
        })
    }

    /// Instantiate a default instance of a class, every serializable field
    /// initialized to its empty value.
    pub fn instantiate(&self, class: &str) -> Result<ObjRef> {
        self.get_or_err(class)?;
        let mut slots = Vec::new();
        for field in self.fields(class)? {
            slots.push((field.name.clone(), field.default_slot()));
        }
        Ok(Instance::create(class, slots))
    }
}
