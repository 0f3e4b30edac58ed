//! Object-graph import.
//!
//! The stream may reference objects defined later in it, so a single pass
//! cannot resolve everything. The importer makes exactly two passes over the
//! same buffered input:
//!
//! 1. **Allocate**: every `<object>` header is resolved against the name
//!    registry; unknown names get a fresh default instance registered under
//!    the serialized name, and the importer pins a strong reference to it so
//!    it survives until pass 2. Name counters are read and applied after all
//!    allocation, since allocation itself may mint names.
//! 2. **Populate**: the input is re-parsed from the start and field contents
//!    are written into the (now existing) objects. Scalars are set only when
//!    the value actually differs, and collections are cleared and refilled
//!    only when the accumulated scratch content differs from the live one,
//!    so re-importing unchanged state mutates nothing.
//!
//! A failure while processing one element is logged with its full state
//! context and skipped; only stream-level errors abort the call.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use quick_xml::Reader;
use quick_xml::events::{BytesRef, BytesStart, Event};

use ogx_model::{
    FieldDef, FieldKind, ModelRegistry, NameRegistry, ObjRef, PrimitiveType, TypeRef, Value,
    entries_eq, unordered_eq, value_from_string,
};

use crate::error::{CodecError, Result};
use crate::text::{resolve_entity, unslashify};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// How scalar reference fields are compared against the incoming value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefCompare {
    /// Same object handle (pointer identity).
    #[default]
    Identity,
    /// Same registered name.
    ByName,
}

/// Options for the importer.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Comparison used to decide whether a scalar reference changed.
    pub ref_compare: RefCompare,
}

impl ImportOptions {
    /// Set the scalar reference comparison.
    #[must_use]
    pub fn with_ref_compare(mut self, ref_compare: RefCompare) -> Self {
        self.ref_compare = ref_compare;
        self
    }
}

/// Summary of one import call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportReport {
    /// Instances created during pass 1.
    pub objects_allocated: usize,
    /// Scalar fields whose value changed.
    pub fields_updated: usize,
    /// Collections that were cleared and refilled.
    pub collections_updated: usize,
}

/// Parser state for the populate pass; reset per element as the stream
/// opens and closes `<object>`/`<field>` scopes.
#[derive(Default)]
struct PopulateState {
    current: Option<ObjRef>,
    current_name: Option<String>,
    class: Option<String>,
    field: Option<FieldDef>,
    in_key: bool,
    in_value: bool,
    key_slot: Option<Value>,
    value_slot: Option<Value>,
    list_buf: Vec<Value>,
    set_buf: Vec<Value>,
    map_buf: Vec<(Value, Value)>,
    text: String,
}

impl PopulateState {
    fn object_name(&self) -> &str {
        self.current_name.as_deref().unwrap_or("")
    }

    fn field_name(&self) -> &str {
        self.field.as_ref().map_or("", |f| f.name.as_str())
    }
}

/// Reads an exported stream back into the live object graph.
pub struct Importer<'a> {
    model: &'a ModelRegistry,
    names: &'a mut NameRegistry,
    options: ImportOptions,
    /// Strong holds on instances created in pass 1, released when the
    /// import call finishes so unreferenced objects can be reclaimed.
    held: Vec<ObjRef>,
}

impl<'a> Importer<'a> {
    /// Create an importer with default options.
    pub fn new(model: &'a ModelRegistry, names: &'a mut NameRegistry) -> Self {
        Self::with_options(model, names, ImportOptions::default())
    }

    /// Create an importer with explicit options.
    pub fn with_options(
        model: &'a ModelRegistry,
        names: &'a mut NameRegistry,
        options: ImportOptions,
    ) -> Self {
        Self {
            model,
            names,
            options,
            held: Vec::new(),
        }
    }

    /// Import from a file.
    pub fn import_path(&mut self, path: &Path) -> Result<ImportReport> {
        let data = fs::read(path)?;
        self.import_bytes(&data)
    }

    /// Import from a reader; the input is buffered fully first, since the
    /// importer needs two passes over it.
    pub fn import_reader<R: Read>(&mut self, mut reader: R) -> Result<ImportReport> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.import_bytes(&data)
    }

    /// Import from an in-memory string.
    pub fn import_str(&mut self, text: &str) -> Result<ImportReport> {
        self.import_bytes(text.as_bytes())
    }

    /// Import from an in-memory buffer.
    ///
    /// Gzip-compressed input is accepted transparently, detected by its
    /// magic bytes.
    pub fn import_bytes(&mut self, data: &[u8]) -> Result<ImportReport> {
        let data = inflate_if_gzip(data)?;
        let result = self.run(&data);
        // Holds are released whether the import succeeded or not.
        self.held.clear();
        result
    }

    fn run(&mut self, data: &[u8]) -> Result<ImportReport> {
        tracing::info!("first pass");
        let objects_allocated = self.allocate_pass(data)?;
        tracing::info!(count = objects_allocated, "first pass done");

        tracing::info!("second pass");
        let (fields_updated, collections_updated) = self.populate_pass(data)?;
        tracing::info!(fields_updated, collections_updated, "second pass done");

        Ok(ImportReport {
            objects_allocated,
            fields_updated,
            collections_updated,
        })
    }

    /// Pass 1: create or identify every named object, touch no field.
    fn allocate_pass(&mut self, data: &[u8]) -> Result<usize> {
        let mut reader = Reader::from_reader(data);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut allocated = 0usize;
        let mut counters: BTreeMap<String, i64> = BTreeMap::new();
        let mut text = String::new();
        let mut counter_name: Option<String> = None;
        let mut counter_value: Option<i64> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"object" => match self.allocate_object(&e) {
                        Ok(true) => allocated += 1,
                        Ok(false) => {}
                        Err(error) => tracing::error!(%error, "failed to allocate object"),
                    },
                    b"name" | b"counter" => text.clear(),
                    _ => {}
                },
                Event::Text(t) => text.push_str(&t.decode()?),
                Event::GeneralRef(e) => append_reference(&e, &mut text)?,
                Event::End(e) => match e.local_name().as_ref() {
                    b"name" => counter_name = Some(text.clone()),
                    b"counter" => match text.parse() {
                        Ok(value) => counter_value = Some(value),
                        Err(error) => {
                            tracing::error!(value = %text, %error, "bad name counter value");
                        }
                    },
                    b"nameCounter" => match (counter_name.take(), counter_value.take()) {
                        (Some(base), Some(value)) => {
                            counters.insert(base, value);
                        }
                        _ => tracing::error!("malformed nameCounter element"),
                    },
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        // Only after allocation: instantiation may have minted new names,
        // and the replayed counters must not wind those back.
        self.names.update_counters(&counters);
        tracing::info!(count = counters.len(), "name counters applied");
        Ok(allocated)
    }

    fn allocate_object(&mut self, e: &BytesStart<'_>) -> Result<bool> {
        let name = attr(e, "object", "name")?;
        let class = attr(e, "object", "class")?;
        if self.names.object_of(&name).is_some() {
            // Existing object: import will update it in pass 2.
            tracing::debug!(name, class, "object already known");
            return Ok(false);
        }
        let obj = match self.model.instantiate(&class) {
            Ok(obj) => obj,
            Err(error) => {
                tracing::error!(name, class, %error, "instantiation failed");
                return Ok(false);
            }
        };
        self.names.register(&name, &obj)?;
        tracing::debug!(name, class, "instantiated");
        self.held.push(obj);
        Ok(true)
    }

    /// Pass 2: re-parse from the start and populate fields.
    fn populate_pass(&mut self, data: &[u8]) -> Result<(usize, usize)> {
        let mut reader = Reader::from_reader(data);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut state = PopulateState::default();
        let mut fields_updated = 0usize;
        let mut collections_updated = 0usize;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => self.populate_start(&e, &mut state),
                Event::Empty(e) => {
                    self.populate_start(&e, &mut state);
                    let name = e.local_name().as_ref().to_vec();
                    self.populate_end(
                        &name,
                        &mut state,
                        &mut fields_updated,
                        &mut collections_updated,
                    );
                }
                Event::Text(t) => state.text.push_str(&t.decode()?),
                Event::GeneralRef(e) => append_reference(&e, &mut state.text)?,
                Event::End(e) => self.populate_end(
                    e.local_name().as_ref(),
                    &mut state,
                    &mut fields_updated,
                    &mut collections_updated,
                ),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok((fields_updated, collections_updated))
    }

    fn populate_start(&mut self, e: &BytesStart<'_>, state: &mut PopulateState) {
        match e.local_name().as_ref() {
            b"object" => {
                let (name, class) = match (attr(e, "object", "name"), attr(e, "object", "class")) {
                    (Ok(name), Ok(class)) => (name, class),
                    (Err(error), _) | (_, Err(error)) => {
                        tracing::error!(%error, "malformed <object> element");
                        return;
                    }
                };
                let current = self.names.object_of(&name);
                if current.is_none() {
                    tracing::error!(name, "object was not allocated during first pass");
                }
                state.current = current;
                state.current_name = Some(name);
                state.class = Some(class);
            }
            b"field" => {
                let name = match attr(e, "field", "name") {
                    Ok(name) => name,
                    Err(error) => {
                        tracing::error!(%error, "malformed <field> element");
                        return;
                    }
                };
                if state.current.is_none() {
                    tracing::debug!(field = %name, "no current object, skipping field");
                    return;
                }
                let class = state.class.as_deref().unwrap_or_default();
                match self.model.field(class, &name) {
                    Ok(field) => state.field = Some(field.clone()),
                    Err(error) => {
                        tracing::error!(class, field = %name, %error, "unknown field");
                        state.field = None;
                    }
                }
            }
            b"reference" | b"primitive_value" => state.text.clear(),
            b"list" | b"set" | b"map" => {
                if state.field.is_none() {
                    tracing::error!("no current collection field");
                }
                state.list_buf.clear();
                state.set_buf.clear();
                state.map_buf.clear();
            }
            b"entry" => {
                state.key_slot = None;
                state.value_slot = None;
            }
            b"key" => state.in_key = true,
            b"value" => state.in_value = true,
            // pass-1 trailer elements, ignored here
            b"name" | b"counter" | b"nameCounter" => state.text.clear(),
            _ => {}
        }
    }

    fn populate_end(
        &mut self,
        element: &[u8],
        state: &mut PopulateState,
        fields_updated: &mut usize,
        collections_updated: &mut usize,
    ) {
        if let Err(error) =
            self.handle_end(element, state, fields_updated, collections_updated)
        {
            tracing::error!(
                %error,
                element = %String::from_utf8_lossy(element),
                object = state.object_name(),
                class = state.class.as_deref().unwrap_or(""),
                field = state.field_name(),
                buffer = %state.text,
                "failed to process element"
            );
        }
    }

    fn handle_end(
        &mut self,
        element: &[u8],
        state: &mut PopulateState,
        fields_updated: &mut usize,
        collections_updated: &mut usize,
    ) -> Result<()> {
        match element {
            b"object" => {
                state.current = None;
                state.current_name = None;
                state.class = None;
            }
            b"field" => state.field = None,
            b"reference" => {
                let name = unslashify(&state.text);
                let value = if name == "null" {
                    Value::Null
                } else {
                    match self.names.object_of(&name) {
                        Some(obj) => Value::Ref(obj),
                        None => {
                            tracing::error!(name, "dangling reference resolved to null");
                            Value::Null
                        }
                    }
                };
                self.deliver(value, state, fields_updated)?;
            }
            b"primitive_value" => {
                let text = unslashify(&state.text);
                let expected = state
                    .field
                    .as_ref()
                    .map(|f| expected_primitive(f, state.in_key));
                match expected {
                    // No current field: stray content, nothing to do.
                    None => {}
                    Some(None) => {
                        tracing::error!(
                            field = state.field_name(),
                            "primitive value in reference-typed position"
                        );
                        self.deliver(Value::Null, state, fields_updated)?;
                    }
                    Some(Some(ty)) => {
                        let value = value_from_string(ty, &text)?;
                        self.deliver(value, state, fields_updated)?;
                    }
                }
            }
            b"list" => {
                let scratch = std::mem::take(&mut state.list_buf);
                let (Some(field), Some(obj)) = (state.field.clone(), state.current.clone())
                else {
                    return Ok(());
                };
                let changed = {
                    let inst = obj.borrow();
                    inst.list(&field.name)? != &scratch[..]
                };
                if changed {
                    tracing::info!(
                        object = state.object_name(),
                        field = %field.name,
                        "updating list"
                    );
                    obj.borrow_mut().replace_list(&field.name, scratch)?;
                    *collections_updated += 1;
                } else {
                    tracing::debug!(field = %field.name, "list unchanged");
                }
            }
            b"set" => {
                let scratch = std::mem::take(&mut state.set_buf);
                let (Some(field), Some(obj)) = (state.field.clone(), state.current.clone())
                else {
                    return Ok(());
                };
                let changed = {
                    let inst = obj.borrow();
                    !unordered_eq(inst.set(&field.name)?, &scratch)
                };
                if changed {
                    tracing::info!(
                        object = state.object_name(),
                        field = %field.name,
                        "updating set"
                    );
                    obj.borrow_mut().replace_set(&field.name, scratch)?;
                    *collections_updated += 1;
                } else {
                    tracing::debug!(field = %field.name, "set unchanged");
                }
            }
            b"map" => {
                let scratch = std::mem::take(&mut state.map_buf);
                let (Some(field), Some(obj)) = (state.field.clone(), state.current.clone())
                else {
                    return Ok(());
                };
                let changed = {
                    let inst = obj.borrow();
                    !entries_eq(inst.map(&field.name)?, &scratch)
                };
                if changed {
                    tracing::info!(
                        object = state.object_name(),
                        field = %field.name,
                        "updating map"
                    );
                    obj.borrow_mut().replace_map(&field.name, scratch)?;
                    *collections_updated += 1;
                } else {
                    tracing::debug!(field = %field.name, "map unchanged");
                }
            }
            b"entry" => {
                let is_map = matches!(
                    state.field.as_ref().map(|f| &f.kind),
                    Some(FieldKind::Map { .. })
                );
                if is_map {
                    let key = state.key_slot.take().unwrap_or(Value::Null);
                    let value = state.value_slot.take().unwrap_or(Value::Null);
                    state.map_buf.push((key, value));
                } else {
                    tracing::error!(field = state.field_name(), "entry outside a map field");
                }
            }
            b"key" => state.in_key = false,
            b"value" => state.in_value = false,
            _ => {}
        }
        Ok(())
    }

    /// Route a decoded value to its destination: a map staging slot, a
    /// collection scratch buffer, or a scalar field (set only on change).
    fn deliver(
        &mut self,
        value: Value,
        state: &mut PopulateState,
        fields_updated: &mut usize,
    ) -> Result<()> {
        if state.in_key {
            state.key_slot = Some(value);
            return Ok(());
        }
        if state.in_value {
            state.value_slot = Some(value);
            return Ok(());
        }
        let Some(field) = state.field.clone() else {
            return Ok(());
        };
        match &field.kind {
            FieldKind::List(_) => state.list_buf.push(value),
            FieldKind::Set(_) => state.set_buf.push(value),
            FieldKind::Map { .. } => {
                tracing::error!(field = %field.name, "map field expects <entry> elements");
            }
            FieldKind::Scalar(_) => {
                let Some(obj) = state.current.clone() else {
                    return Ok(());
                };
                let changed = {
                    let inst = obj.borrow();
                    !self.values_equal(inst.scalar(&field.name)?, &value)
                };
                if changed {
                    tracing::info!(
                        object = state.object_name(),
                        field = %field.name,
                        "updating field"
                    );
                    obj.borrow_mut().set_scalar(&field.name, value)?;
                    *fields_updated += 1;
                }
            }
        }
        Ok(())
    }

    fn values_equal(&self, current: &Value, incoming: &Value) -> bool {
        match self.options.ref_compare {
            RefCompare::Identity => current == incoming,
            RefCompare::ByName => match (current, incoming) {
                (Value::Ref(a), Value::Ref(b)) => self.names.name_of(a) == self.names.name_of(b),
                _ => current == incoming,
            },
        }
    }
}

/// The primitive type expected at the current read position, or `None` when
/// the declared type is a class.
fn expected_primitive(field: &FieldDef, in_key: bool) -> Option<PrimitiveType> {
    let ty = match &field.kind {
        FieldKind::Scalar(ty) | FieldKind::List(ty) | FieldKind::Set(ty) => ty,
        FieldKind::Map { key, value } => {
            if in_key {
                key
            } else {
                value
            }
        }
    };
    match ty {
        TypeRef::Primitive(p) => Some(*p),
        TypeRef::Class(_) => None,
    }
}

/// The reader splits entity and character references out of text content as
/// separate events; resolve them back into the accumulating buffer.
fn append_reference(e: &BytesRef<'_>, text: &mut String) -> Result<()> {
    let name = e.xml_content()?;
    match resolve_entity(&name) {
        Some(c) => text.push(c),
        None => tracing::error!(entity = %name, "unknown entity reference dropped"),
    }
    Ok(())
}

fn inflate_if_gzip(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    if data.starts_with(&GZIP_MAGIC) {
        tracing::debug!("inflating gzip input");
        let mut inflated = Vec::new();
        GzDecoder::new(data).read_to_end(&mut inflated)?;
        Ok(Cow::Owned(inflated))
    } else {
        Ok(Cow::Borrowed(data))
    }
}

fn attr(e: &BytesStart<'_>, element: &'static str, attribute: &'static str) -> Result<String> {
    match e.try_get_attribute(attribute)? {
        Some(attr) => Ok(attr.decode_and_unescape_value(e.decoder())?.into_owned()),
        None => Err(CodecError::MissingAttribute { element, attribute }),
    }
}
