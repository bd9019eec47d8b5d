#![allow(missing_docs)]

use std::cell::Cell;

use refgraph::{
    BinaryFormat, FormatDriver, GraphError, MemberCatalog, MemberGroup, Model, ModelRef, ModelSerializer, Payload,
    PropertyValue, RefGraph, Shared, TypeRegistry, Value, WireValue,
};

#[derive(Debug, Default, Model)]
struct Markers {
    plain: i32,
    #[refgraph(exclude)]
    excluded: i32,
    #[refgraph(include, exclude)]
    both: i32,
    #[refgraph(property)]
    regular: i32,
    #[refgraph(property, include)]
    regular_in: i32,
    #[refgraph(field)]
    field_out: i32,
    #[refgraph(field, include)]
    field_in: i32,
    #[refgraph(skip)]
    cache: Cell<u8>,
}

#[derive(Debug, Default, Model)]
#[refgraph(name = "shapes.Circle", alias = "legacy.Round")]
struct Circle {
    #[refgraph(rename = "r")]
    radius: f64,
}

#[derive(Debug, Default, Model)]
struct Drawing {
    title: String,
    shapes: Vec<Shared<Circle>>,
}

/// Three versions of one wire type: `pinned` was later removed, or excluded.
#[derive(Debug, Default, Model)]
#[refgraph(name = "sketch.Layout")]
struct LayoutV1 {
    pinned: Vec<Shared<Circle>>,
    focus: Option<Shared<Circle>>,
}

#[derive(Debug, Default, Model)]
#[refgraph(name = "sketch.Layout")]
struct LayoutV2 {
    focus: Option<Shared<Circle>>,
}

#[derive(Debug, Default, Model)]
#[refgraph(name = "sketch.Layout")]
struct LayoutV3 {
    #[refgraph(exclude)]
    pinned: Vec<Shared<Circle>>,
    focus: Option<Shared<Circle>>,
}

fn markers() -> Markers {
    Markers {
        plain: 1,
        excluded: 2,
        both: 3,
        regular: 4,
        regular_in: 5,
        field_out: 6,
        field_in: 7,
        cache: Cell::new(8),
    }
}

// --- CATALOG ---

#[test]
fn test_inclusion_rules() -> refgraph::Result<()> {
    let catalog = MemberCatalog::new();
    let entry = catalog.entry_of::<Markers>()?;

    assert_eq!(entry.fields_to_serialize(), &["field_in"]);
    assert_eq!(entry.properties_to_serialize(), &["plain", "regular_in"]);

    // Exclusion wins over an explicit include.
    assert!(!entry.is_serializable("both"));
    assert!(!entry.is_serializable("excluded"));
    assert!(entry.is_serializable("plain"));

    let order: Vec<&str> = entry.serializable_members().map(|m| m.name).collect();
    assert_eq!(order, vec!["field_in", "plain", "regular_in"]);
    Ok(())
}

#[test]
fn test_payload_follows_catalog() -> refgraph::Result<()> {
    let payload = ModelSerializer::new().to_payload(&Shared::new(markers()).handle())?;

    let names: Vec<&str> = payload.members.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["field_in", "plain", "regular_in"]);
    assert_eq!(payload.members[0].value, WireValue::Int(7));
    Ok(())
}

#[test]
fn test_non_serializable_records_are_ignored() -> refgraph::Result<()> {
    let payload = Payload {
        type_name: Markers::model_type().name,
        members: vec![
            PropertyValue::scalar("plain", WireValue::Int(10)),
            PropertyValue::scalar("both", WireValue::Int(30)),
            PropertyValue::scalar("field_out", WireValue::Int(60)),
            PropertyValue::scalar("no_such_member", WireValue::Int(99)),
            PropertyValue::scalar("regular_in", WireValue::Str("not a number".into())),
        ],
        graph_id: 1,
    };
    let mut bytes = Vec::new();
    BinaryFormat::new().write_payload(&payload, false, &mut bytes)?;

    let loaded = RefGraph::from_bytes::<Markers>(&bytes)?;

    let loaded = loaded.borrow();
    assert_eq!(loaded.plain, 10);
    assert_eq!(loaded.both, 0);
    assert_eq!(loaded.field_out, 0);
    // A value that does not fit is skipped, not fatal.
    assert_eq!(loaded.regular_in, 0);
    Ok(())
}

#[test]
fn test_member_lookup_errors() -> refgraph::Result<()> {
    let catalog = MemberCatalog::new();
    let entry = catalog.entry_of::<Markers>()?;

    assert_eq!(entry.member("regular")?.group, MemberGroup::RegularProperty);
    assert_eq!(entry.member("field_in")?.group, MemberGroup::Field);
    assert!(matches!(
        entry.member("cache"),
        Err(GraphError::MemberNotRegistered { member, .. }) if member == "cache"
    ));

    let mut model = markers();
    assert!(matches!(model.get_member("nope"), Err(GraphError::MemberNotRegistered { .. })));
    assert!(matches!(
        model.set_member("plain", Value::Str("x".into())),
        Err(GraphError::TypeMismatch { .. })
    ));
    model.set_member("excluded", Value::Int(-5))?;
    assert_eq!(model.excluded, -5);
    Ok(())
}

#[test]
fn test_catalog_caches_per_type() -> refgraph::Result<()> {
    let catalog = MemberCatalog::new();
    let handle = ModelRef::new(markers());

    let first = catalog.entry(&handle)?;
    let second = catalog.entry_of::<Markers>()?;
    catalog.entry_of::<Circle>()?;

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(catalog.len(), 2);
    Ok(())
}

#[test]
fn test_rename_and_explicit_name() -> refgraph::Result<()> {
    let model_type = Circle::model_type();
    assert_eq!(model_type.name, "shapes.Circle");
    assert_eq!(model_type.aliases, vec!["legacy.Round".to_string()]);
    assert!(model_type.find_member("r").is_some());
    assert!(model_type.find_member("radius").is_none());

    let default_name = Markers::model_type().name;
    assert!(default_name.ends_with("::Markers"), "{default_name}");
    Ok(())
}

// --- REGISTRY ---

#[test]
fn test_registry_walks_nested_types() {
    let registry = TypeRegistry::new();
    registry.register::<Drawing>();

    assert!(registry.contains(&Drawing::model_type().name));
    assert!(registry.contains("shapes.Circle"));
    assert!(registry.contains("legacy.Round"));
    assert!(!registry.contains("shapes.Square"));
}

#[test]
fn test_registry_create_and_redirect() -> refgraph::Result<()> {
    let registry = TypeRegistry::new();
    registry.register::<Circle>();
    registry.redirect("old.Circle", "shapes.Circle");

    let fresh = registry.create("old.Circle")?;
    assert!(fresh.downcast::<Circle>().is_some());
    assert_eq!(registry.resolve_name("legacy.Round"), "shapes.Circle");
    assert_eq!(registry.resolve_name("shapes.Circle"), "shapes.Circle");
    assert!(matches!(registry.create("shapes.Square"), Err(GraphError::TypeNotRegistered(name)) if name == "shapes.Square"));
    Ok(())
}

#[test]
fn test_alias_payload_loads() -> refgraph::Result<()> {
    // A payload written when the type was still called "legacy.Round".
    let payload = Payload {
        type_name: "legacy.Round".into(),
        members: vec![PropertyValue::scalar("r", WireValue::Float(2.5))],
        graph_id: 1,
    };
    let mut bytes = Vec::new();
    BinaryFormat::new().write_payload(&payload, false, &mut bytes)?;

    let serializer = RefGraph::builder().verify_root_type(true).register::<Circle>().build()?;

    let any = serializer.deserialize_any(&mut bytes.as_slice())?;
    let circle = any.downcast::<Circle>().expect("circle");
    assert_eq!(circle.borrow().radius, 2.5);

    let typed: Shared<Circle> = serializer.deserialize(&mut bytes.as_slice())?;
    assert_eq!(typed.borrow().radius, 2.5);
    Ok(())
}

#[test]
fn test_nested_types_are_created_without_registration() -> refgraph::Result<()> {
    let drawing = Shared::new(Drawing {
        title: "dots".into(),
        shapes: vec![Shared::new(Circle { radius: 1.0 }), Shared::new(Circle { radius: 2.0 })],
    });

    let copy = RefGraph::from_bytes::<Drawing>(&RefGraph::to_bytes(&drawing.handle())?)?;

    let copy = copy.borrow();
    assert_eq!(copy.title, "dots");
    let radii: Vec<f64> = copy.shapes.iter().map(|c| c.borrow().radius).collect();
    assert_eq!(radii, vec![1.0, 2.0]);
    Ok(())
}

#[test]
fn test_ignored_records_still_define_shared_instances() -> refgraph::Result<()> {
    let circle = Shared::new(Circle { radius: 4.0 });
    let layout = Shared::new(LayoutV1 {
        pinned: vec![circle.clone()],
        focus: Some(circle),
    });
    let bytes = RefGraph::to_bytes(&layout.handle())?;

    // `focus` only holds a reference; the instance is written under `pinned`.
    let report = RefGraph::inspect_bytes(&bytes)?;
    assert_eq!(report.record("focus").map(|r| r.kind.as_str()), Some("reference"));

    let removed: Shared<LayoutV2> = ModelSerializer::new().deserialize(&mut bytes.as_slice())?;
    let focus = removed.borrow().focus.clone().expect("focus resolved");
    assert_eq!(focus.borrow().radius, 4.0);

    let excluded: Shared<LayoutV3> = ModelSerializer::new().deserialize(&mut bytes.as_slice())?;
    assert!(excluded.borrow().pinned.is_empty());
    let focus = excluded.borrow().focus.clone().expect("focus resolved");
    assert_eq!(focus.borrow().radius, 4.0);
    Ok(())
}
