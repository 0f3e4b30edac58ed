//! Object-graph export/import codec.
//!
//! Serializes a live, possibly cyclic graph of objects into an XML stream
//! and reads such a stream back into an equivalent graph, preserving object
//! identity, inter-object references, and collection membership. Objects,
//! classes, and names come from the `ogx-model` crate; this crate owns only
//! the transient traversal and parsing state.
//!
//! # Export
//!
//! [`Exporter`] walks the graph reachable from a set of roots, gated by an
//! allow/deny [`ClassFilter`], and writes one `<object>` element per object.
//! Cycles terminate because every object is written at most once; an object
//! without a registered name is dropped with an error log, since nothing
//! could ever reference it back.
//!
//! # Import
//!
//! [`Importer`] makes two passes over the same input: the first allocates or
//! identifies every named object, the second populates fields, so forward
//! references and cycles resolve without any patch-up machinery. Re-importing
//! unchanged state is a no-op: scalars and collections are only written when
//! their content actually differs.
//!
//! # Example
//!
//! ```
//! use ogx_codec::{Exporter, Importer};
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
//! let q = model.instantiate("com.acme.Person").unwrap();
//! names.register("P", &p).unwrap();
//! names.register("Q", &q).unwrap();
//! p.borrow_mut().set_scalar("age", Value::Int(5)).unwrap();
//! p.borrow_mut().set_scalar("friend", Value::Ref(q.clone())).unwrap();
//!
//! let mut exporter = Exporter::new(&model, &names, &["com\\.acme\\..*"], &[]);
//! let text = exporter.export_to_string(&[p.clone()]).unwrap();
//!
//! // Import into a fresh registry rebuilds both objects and the link.
//! let mut fresh = NameRegistry::new();
//! let report = Importer::new(&model, &mut fresh).import_str(&text).unwrap();
//! assert_eq!(report.objects_allocated, 2);
//! let p2 = fresh.object_of("P").unwrap();
//! assert_eq!(p2.borrow().scalar("age").unwrap(), &Value::Int(5));
//! ```

mod error;
mod exporter;
mod filter;
mod importer;
pub mod text;

pub use error::{CodecError, Result};
pub use exporter::{ExportOptions, ExportReport, Exporter};
pub use filter::ClassFilter;
pub use importer::{ImportOptions, ImportReport, Importer, RefCompare};
