//! End-to-end export/import scenarios.
//!
//! These tests drive the codec through the public API: build a small graph,
//! export it, import it into a fresh or already-populated registry, and
//! check identity, references, collections, and idempotence.

use ogx_codec::{ExportOptions, Exporter, ImportOptions, Importer, RefCompare};
use ogx_model::{
    ClassDef, FieldDef, ModelRegistry, NameRegistry, ObjRef, PrimitiveType, TypeRef, Value,
    obj_id,
};

const ALLOW: &[&str] = &["com\\.acme\\..*"];

fn model() -> ModelRegistry {
    let mut model = ModelRegistry::new();
    model.register(
        ClassDef::new("com.acme.Person")
            .with_field(FieldDef::scalar("age", TypeRef::Primitive(PrimitiveType::Int)))
            .with_field(FieldDef::scalar("label", TypeRef::Primitive(PrimitiveType::Str)))
            .with_field(FieldDef::scalar("friend", TypeRef::class("com.acme.Person")))
            .with_field(FieldDef::list("friends", TypeRef::class("com.acme.Person")))
            .with_field(FieldDef::list("scores", TypeRef::Primitive(PrimitiveType::Int)))
            .with_field(FieldDef::set("tags", TypeRef::Primitive(PrimitiveType::Str)))
            .with_field(FieldDef::map(
                "accounts",
                TypeRef::Primitive(PrimitiveType::Str),
                TypeRef::class("com.acme.Person"),
            )),
    );
    model.register(ClassDef::new("com.acme.Secret"));
    model
}

fn person(model: &ModelRegistry, names: &mut NameRegistry, name: &str) -> ObjRef {
    let obj = model.instantiate("com.acme.Person").unwrap();
    names.register(name, &obj).unwrap();
    obj
}

fn export(model: &ModelRegistry, names: &NameRegistry, roots: &[ObjRef]) -> String {
    Exporter::new(model, names, ALLOW, &[])
        .export_to_string(roots)
        .unwrap()
}

#[test]
fn test_scalar_and_reference_round_trip() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    let q = person(&model, &mut names, "Q");
    p.borrow_mut().set_scalar("age", Value::Int(5)).unwrap();
    p.borrow_mut()
        .set_scalar("friend", Value::Ref(q.clone()))
        .unwrap();

    let text = export(&model, &names, &[p.clone()]);
    assert!(text.contains(r#"<object name="P" class="com.acme.Person">"#));
    assert!(text.contains("<primitive_value>5</primitive_value>"));
    assert!(text.contains("<reference>Q</reference>"));
    // the referenced object is exported too, after its discoverer
    let p_at = text.find(r#"name="P""#).unwrap();
    let q_at = text.find(r#"<object name="Q""#).unwrap();
    assert!(p_at < q_at);

    let mut fresh = NameRegistry::new();
    let report = Importer::new(&model, &mut fresh).import_str(&text).unwrap();
    assert_eq!(report.objects_allocated, 2);

    let p2 = fresh.object_of("P").unwrap();
    let q2 = fresh.object_of("Q").unwrap();
    assert_eq!(p2.borrow().scalar("age").unwrap(), &Value::Int(5));
    let friend = p2.borrow().scalar("friend").unwrap().clone();
    assert_eq!(obj_id(friend.as_object().unwrap()), obj_id(&q2));
}

#[test]
fn test_cycles_export_once_and_reconstruct() {
    let model = model();
    let mut names = NameRegistry::new();
    let a = person(&model, &mut names, "A");
    let b = person(&model, &mut names, "B");
    a.borrow_mut()
        .set_scalar("friend", Value::Ref(b.clone()))
        .unwrap();
    b.borrow_mut()
        .set_scalar("friend", Value::Ref(a.clone()))
        .unwrap();

    let text = export(&model, &names, &[a]);
    assert_eq!(text.matches("<object ").count(), 2);

    let mut fresh = NameRegistry::new();
    Importer::new(&model, &mut fresh).import_str(&text).unwrap();
    let a2 = fresh.object_of("A").unwrap();
    let b2 = fresh.object_of("B").unwrap();
    let a_friend = a2.borrow().scalar("friend").unwrap().clone();
    let b_friend = b2.borrow().scalar("friend").unwrap().clone();
    assert_eq!(obj_id(a_friend.as_object().unwrap()), obj_id(&b2));
    assert_eq!(obj_id(b_friend.as_object().unwrap()), obj_id(&a2));
}

#[test]
fn test_self_reference_round_trips() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    p.borrow_mut()
        .set_scalar("friend", Value::Ref(p.clone()))
        .unwrap();

    let text = export(&model, &names, &[p]);
    let mut fresh = NameRegistry::new();
    Importer::new(&model, &mut fresh).import_str(&text).unwrap();
    let p2 = fresh.object_of("P").unwrap();
    let friend = p2.borrow().scalar("friend").unwrap().clone();
    assert_eq!(obj_id(friend.as_object().unwrap()), obj_id(&p2));
}

#[test]
fn test_second_import_mutates_nothing() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    let q = person(&model, &mut names, "Q");
    p.borrow_mut().set_scalar("age", Value::Int(41)).unwrap();
    p.borrow_mut()
        .set_scalar("friend", Value::Ref(q.clone()))
        .unwrap();
    p.borrow_mut()
        .replace_list("scores", vec![Value::Int(1), Value::Int(2)])
        .unwrap();
    p.borrow_mut()
        .replace_set("tags", vec![Value::str("x"), Value::str("y")])
        .unwrap();
    p.borrow_mut()
        .replace_map("accounts", vec![(Value::str("main"), Value::Ref(q.clone()))])
        .unwrap();

    let text = export(&model, &names, &[p.clone()]);

    // importing into the live, already-correct registry changes nothing
    let report = Importer::new(&model, &mut names).import_str(&text).unwrap();
    assert_eq!(report.objects_allocated, 0);
    assert_eq!(report.fields_updated, 0);
    assert_eq!(report.collections_updated, 0);

    let p_version = p.borrow().version();
    let q_version = q.borrow().version();
    Importer::new(&model, &mut names).import_str(&text).unwrap();
    assert_eq!(p.borrow().version(), p_version);
    assert_eq!(q.borrow().version(), q_version);
}

#[test]
fn test_import_restores_locally_changed_field() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    p.borrow_mut().set_scalar("age", Value::Int(5)).unwrap();
    let text = export(&model, &names, &[p.clone()]);

    p.borrow_mut().set_scalar("age", Value::Int(6)).unwrap();
    let report = Importer::new(&model, &mut names).import_str(&text).unwrap();
    assert_eq!(report.fields_updated, 1);
    assert_eq!(p.borrow().scalar("age").unwrap(), &Value::Int(5));
}

#[test]
fn test_denied_class_never_exports_even_when_allowed() {
    let model = model();
    let mut names = NameRegistry::new();
    let secret = model.instantiate("com.acme.Secret").unwrap();
    names.register("S", &secret).unwrap();
    let public = person(&model, &mut names, "P");

    let text = Exporter::new(&model, &names, ALLOW, &["com\\.acme\\.Secret"])
        .export_to_string(&[secret, public])
        .unwrap();
    assert!(!text.contains(r#"name="S""#));
    assert!(text.contains(r#"name="P""#));
}

#[test]
fn test_unnamed_root_exports_nothing() {
    let model = model();
    let names = NameRegistry::new();
    let orphan = model.instantiate("com.acme.Person").unwrap();

    let mut exporter = Exporter::new(&model, &names, ALLOW, &[]);
    let report = exporter.export(&[orphan], Vec::new()).unwrap();
    assert_eq!(report.objects_written, 0);
}

#[test]
fn test_permuted_list_triggers_exactly_one_refill() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    p.borrow_mut()
        .replace_list(
            "scores",
            vec![Value::Int(3), Value::Int(2), Value::Int(1)],
        )
        .unwrap();
    let permuted = export(&model, &names, &[p.clone()]);

    p.borrow_mut()
        .replace_list(
            "scores",
            vec![Value::Int(1), Value::Int(2), Value::Int(3)],
        )
        .unwrap();
    let report = Importer::new(&model, &mut names).import_str(&permuted).unwrap();
    assert_eq!(report.collections_updated, 1);
    assert_eq!(
        p.borrow().list("scores").unwrap(),
        &[Value::Int(3), Value::Int(2), Value::Int(1)]
    );

    // order now matches; importing again touches nothing
    let report = Importer::new(&model, &mut names).import_str(&permuted).unwrap();
    assert_eq!(report.collections_updated, 0);
}

#[test]
fn test_permuted_set_is_not_an_update() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    p.borrow_mut()
        .replace_set("tags", vec![Value::str("a"), Value::str("b")])
        .unwrap();
    let text = export(&model, &names, &[p.clone()]);

    p.borrow_mut()
        .replace_set("tags", vec![Value::str("b"), Value::str("a")])
        .unwrap();
    let report = Importer::new(&model, &mut names).import_str(&text).unwrap();
    assert_eq!(report.collections_updated, 0);
}

#[test]
fn test_reference_collections_round_trip() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    let q = person(&model, &mut names, "Q");
    let r = person(&model, &mut names, "R");
    p.borrow_mut()
        .replace_list("friends", vec![Value::Ref(q.clone()), Value::Ref(r.clone())])
        .unwrap();
    p.borrow_mut()
        .replace_map(
            "accounts",
            vec![
                (Value::str("first"), Value::Ref(q.clone())),
                (Value::str("second"), Value::Ref(r.clone())),
            ],
        )
        .unwrap();

    let text = export(&model, &names, &[p]);
    assert_eq!(text.matches("<object ").count(), 3);

    let mut fresh = NameRegistry::new();
    Importer::new(&model, &mut fresh).import_str(&text).unwrap();
    let p2 = fresh.object_of("P").unwrap();
    let q2 = fresh.object_of("Q").unwrap();
    let friends = p2.borrow().list("friends").unwrap().to_vec();
    assert_eq!(friends.len(), 2);
    assert_eq!(obj_id(friends[0].as_object().unwrap()), obj_id(&q2));
    let accounts = p2.borrow().map("accounts").unwrap().to_vec();
    assert_eq!(accounts.len(), 2);
    let first = accounts
        .iter()
        .find(|(k, _)| k == &Value::str("first"))
        .unwrap();
    assert_eq!(obj_id(first.1.as_object().unwrap()), obj_id(&q2));
}

#[test]
fn test_dangling_reference_resolves_to_null() {
    let model = model();
    let mut names = NameRegistry::new();
    let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<export>
  <object name="P" class="com.acme.Person">
    <field name="friend">
      <reference>Ghost</reference>
    </field>
  </object>
</export>
"#;
    let report = Importer::new(&model, &mut names).import_str(text).unwrap();
    assert_eq!(report.objects_allocated, 1);
    let p = names.object_of("P").unwrap();
    assert_eq!(p.borrow().scalar("friend").unwrap(), &Value::Null);
}

#[test]
fn test_malformed_field_is_skipped_not_fatal() {
    let model = model();
    let mut names = NameRegistry::new();
    let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<export>
  <object name="P" class="com.acme.Person">
    <field name="age">
      <primitive_value>not-a-number</primitive_value>
    </field>
    <field name="label">
      <primitive_value>ok</primitive_value>
    </field>
  </object>
</export>
"#;
    let report = Importer::new(&model, &mut names).import_str(text).unwrap();
    assert_eq!(report.fields_updated, 1);
    let p = names.object_of("P").unwrap();
    assert_eq!(p.borrow().scalar("age").unwrap(), &Value::Null);
    assert_eq!(p.borrow().scalar("label").unwrap(), &Value::str("ok"));
}

#[test]
fn test_awkward_strings_survive_the_envelope() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    let awkward = "a <b> & 'c' \"d\" ]]> \t tab\nnewline \\slash ";
    p.borrow_mut()
        .set_scalar("label", Value::str(awkward))
        .unwrap();

    let text = export(&model, &names, &[p]);
    let mut fresh = NameRegistry::new();
    Importer::new(&model, &mut fresh).import_str(&text).unwrap();
    let p2 = fresh.object_of("P").unwrap();
    assert_eq!(p2.borrow().scalar("label").unwrap(), &Value::str(awkward));
}

#[test]
fn test_each_escaped_character_round_trips() {
    let model = model();
    for s in ["<", ">", "&", "'", "\"", "]", "a<b", "&amp;", "]]>"] {
        let mut names = NameRegistry::new();
        let p = person(&model, &mut names, "P");
        p.borrow_mut().set_scalar("label", Value::str(s)).unwrap();
        let text = export(&model, &names, &[p]);

        let mut fresh = NameRegistry::new();
        Importer::new(&model, &mut fresh).import_str(&text).unwrap();
        let p2 = fresh.object_of("P").unwrap();
        let got = p2.borrow().scalar("label").unwrap().clone();
        assert_eq!(got, Value::str(s), "round-trip failed for {s:?}");
    }
}

#[test]
fn test_reference_names_with_markup_round_trip() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    let q = person(&model, &mut names, "a<b&c]d e");
    p.borrow_mut()
        .set_scalar("friend", Value::Ref(q.clone()))
        .unwrap();
    let text = export(&model, &names, &[p]);

    let mut fresh = NameRegistry::new();
    Importer::new(&model, &mut fresh).import_str(&text).unwrap();
    let p2 = fresh.object_of("P").unwrap();
    let q2 = fresh.object_of("a<b&c]d e").unwrap();
    let friend = p2.borrow().scalar("friend").unwrap().clone();
    assert_eq!(obj_id(friend.as_object().unwrap()), obj_id(&q2));
}

#[test]
fn test_declared_encoding_matches_payload_bytes() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    p.borrow_mut()
        .set_scalar("label", Value::str("café"))
        .unwrap();

    let mut out = Vec::new();
    let options = ExportOptions::default().with_encoding("ISO-8859-1");
    Exporter::with_options(&model, &names, ALLOW, &[], options)
        .export(&[p], &mut out)
        .unwrap();

    let head = String::from_utf8_lossy(&out);
    assert!(head.contains(r#"encoding="windows-1252""#));
    // latin-1 e-acute, not the UTF-8 pair
    assert!(out.contains(&0xE9));
    assert!(!out.windows(2).any(|w| w == [0xC3, 0xA9]));

    let mut fresh = NameRegistry::new();
    Importer::new(&model, &mut fresh).import_bytes(&out).unwrap();
    let p2 = fresh.object_of("P").unwrap();
    assert_eq!(p2.borrow().scalar("label").unwrap(), &Value::str("café"));
}

#[test]
fn test_unknown_encoding_label_is_an_error() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    let options = ExportOptions::default().with_encoding("EBCDIC-FANTASY");
    let result = Exporter::with_options(&model, &names, ALLOW, &[], options)
        .export(&[p], Vec::new());
    assert!(result.is_err());
}

#[test]
fn test_gzip_compressed_input_is_accepted() {
    use std::io::Write as _;

    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    p.borrow_mut().set_scalar("age", Value::Int(9)).unwrap();
    let text = export(&model, &names, &[p]);

    let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    gz.write_all(text.as_bytes()).unwrap();
    let compressed = gz.finish().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.xml.gz");
    std::fs::write(&path, &compressed).unwrap();

    let mut fresh = NameRegistry::new();
    let report = Importer::new(&model, &mut fresh).import_path(&path).unwrap();
    assert_eq!(report.objects_allocated, 1);
    let p2 = fresh.object_of("P").unwrap();
    assert_eq!(p2.borrow().scalar("age").unwrap(), &Value::Int(9));
}

#[test]
fn test_name_counters_survive_the_round_trip() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = model.instantiate("com.acme.Person").unwrap();
    let minted = names.assign_name(&p).unwrap();
    assert_eq!(minted, "person0");

    let text = export(&model, &names, &[p]);
    assert!(text.contains("<nameCounter>"));

    let mut fresh = NameRegistry::new();
    Importer::new(&model, &mut fresh).import_str(&text).unwrap();
    // the replayed counter keeps newly minted names clear of imported ones
    let extra = model.instantiate("com.acme.Person").unwrap();
    assert_eq!(fresh.assign_name(&extra).unwrap(), "person1");
}

#[test]
fn test_ref_compare_by_name_sees_renamed_handles_as_equal() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    let q = person(&model, &mut names, "Q");
    p.borrow_mut()
        .set_scalar("friend", Value::Ref(q.clone()))
        .unwrap();
    let text = export(&model, &names, &[p.clone()]);

    let options = ImportOptions::default().with_ref_compare(RefCompare::ByName);
    let report = Importer::with_options(&model, &mut names, options)
        .import_str(&text)
        .unwrap();
    assert_eq!(report.fields_updated, 0);
}

#[test]
fn test_export_and_import_through_files() {
    let model = model();
    let mut names = NameRegistry::new();
    let p = person(&model, &mut names, "P");
    p.borrow_mut().set_scalar("age", Value::Int(7)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.xml");
    let report = Exporter::new(&model, &names, ALLOW, &[])
        .export_path(&[p], &path)
        .unwrap();
    assert_eq!(report.objects_written, 1);

    let mut fresh = NameRegistry::new();
    let report = Importer::new(&model, &mut fresh).import_path(&path).unwrap();
    assert_eq!(report.objects_allocated, 1);
    let p2 = fresh.object_of("P").unwrap();
    assert_eq!(p2.borrow().scalar("age").unwrap(), &Value::Int(7));
}
