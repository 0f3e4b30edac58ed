//! Object-graph export.
//!
//! The exporter walks the graph reachable from a set of root objects,
//! applying the class filter, and writes one `<object>` element per visited
//! object. Traversal is roots first, then whatever became pending, repeated
//! to fixpoint; the exported set guarantees each object is written exactly
//! once and makes cycles terminate.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use ogx_model::{
    FieldDef, FieldKind, Instance, ModelRegistry, NameRegistry, ObjRef, TypeRef, Value, obj_id,
    value_to_string,
};

use crate::error::{CodecError, Result};
use crate::filter::ClassFilter;
use crate::text::{escape_string, slashify};

/// Options for the exporter.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Character encoding of the output, as a WHATWG encoding label. The
    /// XML declaration names the resolved encoding and the payload bytes
    /// are transcoded to it.
    pub encoding: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            encoding: "UTF-8".to_string(),
        }
    }
}

impl ExportOptions {
    /// Set the encoding named in the XML declaration.
    #[must_use]
    pub fn with_encoding(mut self, encoding: &str) -> Self {
        self.encoding = encoding.to_string();
        self
    }
}

/// Summary of one export call.
#[derive(Debug, Clone, Copy)]
pub struct ExportReport {
    /// Number of `<object>` elements written.
    pub objects_written: usize,
}

/// Writes a reachable object graph as an XML stream.
pub struct Exporter<'a> {
    model: &'a ModelRegistry,
    names: &'a NameRegistry,
    filter: ClassFilter,
    options: ExportOptions,
    /// Objects discovered but not written yet, keyed by identity; the value
    /// is the handle plus the path through which the object was first seen.
    pending: HashMap<usize, (ObjRef, String)>,
    /// Objects already written. Never shrinks during a session.
    exported: HashSet<usize>,
}

impl<'a> Exporter<'a> {
    /// Create an exporter with allow/deny class patterns.
    pub fn new(
        model: &'a ModelRegistry,
        names: &'a NameRegistry,
        allow: &[&str],
        deny: &[&str],
    ) -> Self {
        Self::with_options(model, names, allow, deny, ExportOptions::default())
    }

    /// Create an exporter with explicit options.
    pub fn with_options(
        model: &'a ModelRegistry,
        names: &'a NameRegistry,
        allow: &[&str],
        deny: &[&str],
        options: ExportOptions,
    ) -> Self {
        Self {
            model,
            names,
            filter: ClassFilter::new(allow, deny),
            options,
            pending: HashMap::new(),
            exported: HashSet::new(),
        }
    }

    /// Export to a file.
    pub fn export_path(&mut self, roots: &[ObjRef], path: &Path) -> Result<ExportReport> {
        let file = File::create(path)?;
        self.export(roots, BufWriter::new(file))
    }

    /// Export to an in-memory string. The result is UTF-8 regardless of the
    /// encoding option; use [`Exporter::export`] for transcoded bytes.
    pub fn export_to_string(&mut self, roots: &[ObjRef]) -> Result<String> {
        let mut buf = Vec::new();
        self.write_document(roots, &mut buf, UTF_8.name())?;
        String::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }

    /// Export the graph reachable from `roots` to a writer.
    ///
    /// The caller must keep the graph quiescent for the duration of the
    /// call; the exporter reads live objects without snapshotting them.
    pub fn export<W: Write>(&mut self, roots: &[ObjRef], mut out: W) -> Result<ExportReport> {
        let encoding = Encoding::for_label(self.options.encoding.as_bytes())
            .ok_or_else(|| CodecError::UnknownEncoding(self.options.encoding.clone()))?;
        let mut buf = Vec::new();
        let report = self.write_document(roots, &mut buf, encoding.name())?;
        if encoding == UTF_8 {
            out.write_all(&buf)?;
        } else {
            // The writer itself only produces UTF-8; characters the target
            // encoding cannot represent become character references, which
            // the import side resolves.
            let text = String::from_utf8(buf)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let (bytes, _, _) = encoding.encode(&text);
            out.write_all(&bytes)?;
        }
        Ok(report)
    }

    fn write_document<W: Write>(
        &mut self,
        roots: &[ObjRef],
        out: W,
        encoding_name: &str,
    ) -> Result<ExportReport> {
        // Fresh traversal state per call; sessions do not interfere.
        self.pending.clear();
        self.exported.clear();

        let mut xml = Writer::new_with_indent(out, b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new(
            "1.0",
            Some(encoding_name),
            None,
        )))?;
        xml.write_event(Event::Start(BytesStart::new("export")))?;

        let mut written = 0usize;
        for root in roots {
            let opath = self
                .names
                .name_of(root)
                .map(str::to_owned)
                .unwrap_or_default();
            if self.export_object(&mut xml, root, &opath)? {
                written += 1;
            }
        }
        while !self.pending.is_empty() {
            // Snapshot: exporting an object grows the pending map.
            let snapshot: Vec<(ObjRef, String)> = self.pending.values().cloned().collect();
            for (obj, opath) in snapshot {
                if self.export_object(&mut xml, &obj, &opath)? {
                    written += 1;
                }
            }
        }
        tracing::info!(count = written, "objects exported");

        for (base, counter) in self.names.counters() {
            xml.write_event(Event::Start(BytesStart::new("nameCounter")))?;
            write_text_element(&mut xml, "name", base)?;
            write_text_element(&mut xml, "counter", &counter.to_string())?;
            xml.write_event(Event::End(BytesEnd::new("nameCounter")))?;
        }
        tracing::info!("name counters exported");

        xml.write_event(Event::End(BytesEnd::new("export")))?;
        Ok(ExportReport {
            objects_written: written,
        })
    }

    /// Write one object, unless it must be dropped (unnamed, already
    /// written, or rejected by the filter). Dropping removes the pending
    /// entry; subtrees reachable only through a dropped object are pruned.
    fn export_object<W: Write>(
        &mut self,
        xml: &mut Writer<W>,
        obj: &ObjRef,
        opath: &str,
    ) -> Result<bool> {
        let model = self.model;
        let id = obj_id(obj);
        let inst = obj.borrow();
        let class = inst.class_name().to_owned();

        let Some(name) = self.names.name_of(obj).map(str::to_owned) else {
            tracing::error!(class, opath, "skipping unnamed object");
            self.pending.remove(&id);
            return Ok(false);
        };
        if self.exported.contains(&id) {
            tracing::debug!(name, class, "skipping already exported object");
            self.pending.remove(&id);
            return Ok(false);
        }
        if !self.filter.is_exportable(self.model, &class) {
            tracing::debug!(name, class, "skipping class rejected by filter");
            self.pending.remove(&id);
            return Ok(false);
        }
        let fields = match model.fields(&class) {
            Ok(fields) => fields,
            Err(error) => {
                tracing::error!(name, class, %error, "skipping object of unknown class");
                self.pending.remove(&id);
                return Ok(false);
            }
        };

        tracing::debug!(name, class, "exporting object");
        self.exported.insert(id);
        self.pending.remove(&id);

        let mut start = BytesStart::new("object");
        start.push_attribute(("name", name.as_str()));
        start.push_attribute(("class", class.as_str()));
        xml.write_event(Event::Start(start))?;
        for field in fields {
            let path = format!("{opath}.{}", field.name);
            if let Err(error) = self.export_field(xml, &inst, field, &path) {
                tracing::error!(name, field = %field.name, %error, "failed to export field");
            }
        }
        xml.write_event(Event::End(BytesEnd::new("object")))?;
        Ok(true)
    }

    fn export_field<W: Write>(
        &mut self,
        xml: &mut Writer<W>,
        inst: &Instance,
        field: &FieldDef,
        path: &str,
    ) -> Result<()> {
        match &field.kind {
            FieldKind::Scalar(ty) => {
                if !self.filter.type_allowed(self.model, ty) {
                    return Ok(());
                }
                let value = inst.scalar(&field.name)?.clone();
                self.open_field(xml, field)?;
                self.write_value(xml, &value, ty, path)?;
                xml.write_event(Event::End(BytesEnd::new("field")))?;
            }
            FieldKind::List(element) | FieldKind::Set(element) => {
                if !self.filter.type_allowed(self.model, element) {
                    return Ok(());
                }
                let (tag, values) = match &field.kind {
                    FieldKind::List(_) => ("list", inst.list(&field.name)?.to_vec()),
                    _ => ("set", inst.set(&field.name)?.to_vec()),
                };
                self.open_field(xml, field)?;
                xml.write_event(Event::Start(BytesStart::new(tag)))?;
                for (index, value) in values.iter().enumerate() {
                    self.write_value(xml, value, element, &format!("{path}[{index}]"))?;
                }
                xml.write_event(Event::End(BytesEnd::new(tag)))?;
                xml.write_event(Event::End(BytesEnd::new("field")))?;
            }
            FieldKind::Map { key, value } => {
                if !self.filter.type_allowed(self.model, value) {
                    return Ok(());
                }
                let entries = inst.map(&field.name)?.to_vec();
                self.open_field(xml, field)?;
                xml.write_event(Event::Start(BytesStart::new("map")))?;
                for (entry_key, entry_value) in &entries {
                    xml.write_event(Event::Start(BytesStart::new("entry")))?;
                    xml.write_event(Event::Start(BytesStart::new("key")))?;
                    self.write_value(xml, entry_key, key, &format!("{path}[key]"))?;
                    xml.write_event(Event::End(BytesEnd::new("key")))?;
                    xml.write_event(Event::Start(BytesStart::new("value")))?;
                    let key_path = format!("{path}[{}]", self.path_key(entry_key));
                    self.write_value(xml, entry_value, value, &key_path)?;
                    xml.write_event(Event::End(BytesEnd::new("value")))?;
                    xml.write_event(Event::End(BytesEnd::new("entry")))?;
                }
                xml.write_event(Event::End(BytesEnd::new("map")))?;
                xml.write_event(Event::End(BytesEnd::new("field")))?;
            }
        }
        Ok(())
    }

    fn open_field<W: Write>(&self, xml: &mut Writer<W>, field: &FieldDef) -> Result<()> {
        let mut start = BytesStart::new("field");
        start.push_attribute(("name", field.name.as_str()));
        xml.write_event(Event::Start(start))?;
        Ok(())
    }

    /// Write one value; live references not yet written are queued for
    /// export under the path they were first discovered through.
    fn write_value<W: Write>(
        &mut self,
        xml: &mut Writer<W>,
        value: &Value,
        declared: &TypeRef,
        path: &str,
    ) -> Result<()> {
        match value {
            Value::Ref(target) => {
                let id = obj_id(target);
                if !self.exported.contains(&id) {
                    self.pending
                        .entry(id)
                        .or_insert_with(|| (target.clone(), path.to_owned()));
                    tracing::debug!(path, "queued referenced object");
                }
                // An unnamed target cannot be referenced; it is written as
                // null and reported when its own export is attempted.
                let text = match self.names.name_of(target) {
                    Some(name) => escape_string(&slashify(name)),
                    None => "null".to_string(),
                };
                write_raw_element(xml, "reference", &text)?;
            }
            Value::Null if matches!(declared, TypeRef::Class(_)) => {
                write_raw_element(xml, "reference", "null")?;
            }
            Value::Null => {
                write_raw_element(xml, "primitive_value", "null")?;
            }
            primitive => {
                let text = escape_string(&slashify(&value_to_string(primitive)?));
                write_raw_element(xml, "primitive_value", &text)?;
            }
        }
        Ok(())
    }

    /// Compact rendering of a map key for diagnostic paths.
    fn path_key(&self, key: &Value) -> String {
        match key {
            Value::Ref(target) => self
                .names
                .name_of(target)
                .unwrap_or("?")
                .to_string(),
            other => value_to_string(other).unwrap_or_else(|_| "?".to_string()),
        }
    }
}

/// Element whose text is escaped by the writer.
fn write_text_element<W: Write>(xml: &mut Writer<W>, tag: &str, text: &str) -> Result<()> {
    xml.write_event(Event::Start(BytesStart::new(tag)))?;
    xml.write_event(Event::Text(BytesText::new(text)))?;
    xml.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Element whose text has already been escaped by [`escape_string`].
fn write_raw_element<W: Write>(xml: &mut Writer<W>, tag: &str, text: &str) -> Result<()> {
    xml.write_event(Event::Start(BytesStart::new(tag)))?;
    xml.write_event(Event::Text(BytesText::from_escaped(text)))?;
    xml.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
