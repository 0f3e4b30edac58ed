//! Dynamic object model for graph serialization.
//!
//! This crate provides the host-side collaborators the `ogx-codec` crate
//! serializes against:
//!
//! - **Class metadata** ([`ClassDef`], [`FieldDef`], [`ModelRegistry`]):
//!   runtime type information describing which fields a class has, their
//!   kinds (scalar, list, set, map) and declared types, and how to
//!   instantiate a default instance.
//! - **Instances** ([`Instance`], [`ObjRef`], [`Value`]): live objects with
//!   named field slots, shared by reference-counted handles whose pointer is
//!   the object's identity.
//! - **Naming** ([`NameRegistry`]): the bidirectional map between objects
//!   and the stable string names used for cross-reference in serialized
//!   form, including the counters that keep minted names unique.
//! - **Value conversion** ([`value_to_string`], [`value_from_string`]):
//!   canonical text forms for primitive values.
//!
//! # Example
//!
//! ```
//! use ogx_model::{
//!     ClassDef, FieldDef, ModelRegistry, NameRegistry, PrimitiveType, TypeRef, Value,
//! };
//!
//! let mut model = ModelRegistry::new();
//! model.register(
//!     ClassDef::new("com.acme.Person")
//!         .with_field(FieldDef::scalar("age", TypeRef::Primitive(PrimitiveType::Int)))
//!         .with_field(FieldDef::scalar("friend", TypeRef::class("com.acme.Person"))),
//! );
//!
//! let mut names = NameRegistry::new();
//! let p = model.instantiate("com.acme.Person").unwrap();
//! let name = names.assign_name(&p).unwrap();
//! assert_eq!(name, "person0");
//!
//! p.borrow_mut().set_scalar("age", Value::Int(5)).unwrap();
//! assert_eq!(p.borrow().scalar("age").unwrap(), &Value::Int(5));
//! ```

mod class;
mod convert;
mod error;
mod instance;
mod naming;
mod value;

pub use class::{ClassDef, FieldDef, FieldKind, ModelRegistry, PrimitiveType, TypeRef};
pub use convert::{value_from_string, value_to_string};
pub use error::{ModelError, Result};
pub use instance::{Instance, ObjRef, Slot, obj_id};
pub use naming::NameRegistry;
pub use value::{Value, entries_eq, unordered_eq};
