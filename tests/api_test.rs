#![allow(missing_docs)]

use refgraph::{GraphError, Model, ModelSerializer, RefGraph, Shared};

#[derive(Debug, Default, Clone, PartialEq, Model)]
struct Settings {
    name: String,
    retries: u32,
    ratio: f64,
    enabled: bool,
    offset: i16,
    tags: Vec<String>,
    nickname: Option<String>,
    initial: char,
}

#[derive(Debug, Default, PartialEq, Model)]
struct Renamed {
    name: String,
    unrelated: u8,
}

fn create_settings() -> Settings {
    Settings {
        name: "Integration Test".to_string(),
        retries: 3,
        ratio: 0.75,
        enabled: true,
        offset: -12,
        tags: vec!["alpha".into(), "beta".into()],
        nickname: None,
        initial: 'x',
    }
}

// --- TESTS ---

/// Standard File IO
/// Validate `RefGraph::save`, `RefGraph::load` (memory mapped)
#[test]
fn test_standard_file_io() -> refgraph::Result<()> {
    let dir = tempfile::tempdir()?;
    let file_path = dir.path().join("settings.rgf");
    let data = Shared::new(create_settings());

    RefGraph::save(&file_path, &data.handle())?;
    let loaded: Shared<Settings> = RefGraph::load(&file_path)?;

    assert_eq!(*data.borrow(), *loaded.borrow());
    Ok(())
}

/// Pure Memory IO
#[test]
fn test_memory_io() -> refgraph::Result<()> {
    let data = Shared::new(create_settings());

    let bytes = RefGraph::to_bytes(&data.handle())?;
    let loaded = RefGraph::from_bytes::<Settings>(&bytes)?;

    assert_eq!(*data.borrow(), *loaded.borrow());
    Ok(())
}

#[test]
fn test_deserialize_into_existing_instance() -> refgraph::Result<()> {
    let serializer = ModelSerializer::new();
    let source = Shared::new(create_settings());
    let mut bytes = Vec::new();
    serializer.serialize(&source.handle(), &mut bytes)?;

    let target = Shared::new(Settings {
        nickname: Some("stale".into()),
        ..Settings::default()
    });
    serializer.deserialize_into(&target.handle(), &mut bytes.as_slice())?;

    assert_eq!(*target.borrow(), create_settings());
    Ok(())
}

#[test]
fn test_load_file_into_and_any() -> refgraph::Result<()> {
    let dir = tempfile::tempdir()?;
    let file_path = dir.path().join("any.rgf");
    let serializer = RefGraph::builder().register::<Settings>().build()?;

    serializer.save_file(&file_path, &Shared::new(create_settings()).handle())?;

    let any = serializer.load_file_any(&file_path)?;
    let typed = any.downcast::<Settings>().expect("root should be Settings");
    assert_eq!(*typed.borrow(), create_settings());

    let target = Shared::new(Settings::default());
    serializer.load_file_into(&file_path, &target.handle())?;
    assert_eq!(target.borrow().retries, 3);
    Ok(())
}

#[test]
fn test_deserialize_any_unknown_type() -> refgraph::Result<()> {
    let bytes = RefGraph::to_bytes(&Shared::new(create_settings()).handle())?;

    let result = ModelSerializer::new().deserialize_any(&mut bytes.as_slice());

    assert!(matches!(result, Err(GraphError::TypeNotRegistered(_))));
    Ok(())
}

#[test]
fn test_frames_concatenate_on_one_stream() -> refgraph::Result<()> {
    let serializer = ModelSerializer::new();
    let first = Shared::new(create_settings());
    let second = Shared::new(Settings {
        name: "second".into(),
        ..Settings::default()
    });

    let mut stream = Vec::new();
    serializer.serialize(&first.handle(), &mut stream)?;
    serializer.serialize(&second.handle(), &mut stream)?;

    let mut reader = stream.as_slice();
    let a: Shared<Settings> = serializer.deserialize(&mut reader)?;
    let b: Shared<Settings> = serializer.deserialize(&mut reader)?;

    assert_eq!(a.borrow().name, "Integration Test");
    assert_eq!(b.borrow().name, "second");
    assert!(reader.is_empty());
    Ok(())
}

#[test]
fn test_corrupted_payload_is_rejected() -> refgraph::Result<()> {
    let mut bytes = RefGraph::to_bytes(&Shared::new(create_settings()).handle())?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    let result = RefGraph::from_bytes::<Settings>(&bytes);

    assert!(matches!(result, Err(GraphError::Format(msg)) if msg.contains("checksum")));
    Ok(())
}

#[test]
fn test_truncated_and_foreign_input() -> refgraph::Result<()> {
    let bytes = RefGraph::to_bytes(&Shared::new(create_settings()).handle())?;

    let truncated = RefGraph::from_bytes::<Settings>(&bytes[..bytes.len() - 4]);
    assert!(matches!(truncated, Err(GraphError::Format(msg)) if msg.contains("Truncated")));

    let short = RefGraph::from_bytes::<Settings>(&bytes[..10]);
    assert!(matches!(short, Err(GraphError::Format(_))));

    let mut foreign = bytes.clone();
    foreign[0..4].copy_from_slice(b"PAR4");
    let wrong_magic = RefGraph::from_bytes::<Settings>(&foreign);
    assert!(matches!(wrong_magic, Err(GraphError::Format(msg)) if msg.contains("Magic")));
    Ok(())
}

#[test]
fn test_tiny_file_is_rejected_before_mapping() -> refgraph::Result<()> {
    let dir = tempfile::tempdir()?;
    let file_path = dir.path().join("tiny.rgf");
    std::fs::write(&file_path, b"RGF1")?;

    let result = RefGraph::load::<Settings, _>(&file_path);

    assert!(matches!(result, Err(GraphError::Format(_))));
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let result = RefGraph::load::<Settings, _>("/definitely/not/here.rgf");
    assert!(matches!(result, Err(GraphError::Io(_))));
}

#[test]
fn test_foreign_root_is_lenient_by_default() -> refgraph::Result<()> {
    let bytes = RefGraph::to_bytes(&Shared::new(create_settings()).handle())?;

    // Only the members both types share are assigned.
    let loaded = RefGraph::from_bytes::<Renamed>(&bytes)?;

    assert_eq!(loaded.borrow().name, "Integration Test");
    assert_eq!(loaded.borrow().unrelated, 0);
    Ok(())
}

#[test]
fn test_verify_root_type_rejects_foreign_root() -> refgraph::Result<()> {
    let bytes = RefGraph::to_bytes(&Shared::new(create_settings()).handle())?;
    let serializer = RefGraph::builder().verify_root_type(true).build()?;

    let foreign = serializer.deserialize::<Renamed, _>(&mut bytes.as_slice());
    assert!(matches!(foreign, Err(GraphError::Format(_))));

    let own = serializer.deserialize::<Settings, _>(&mut bytes.as_slice())?;
    assert_eq!(*own.borrow(), create_settings());
    Ok(())
}

#[test]
fn test_inspector_report() -> refgraph::Result<()> {
    let bytes = RefGraph::to_bytes(&Shared::new(create_settings()).handle())?;

    let report = RefGraph::inspect_bytes(&bytes)?;

    assert_eq!(report.type_name, Settings::model_type().name);
    assert_eq!(report.graph_id, 1);
    assert!(!report.is_flat);
    assert_eq!(report.compression_algo, "None");
    assert_eq!(report.instance_count, 1);
    assert_eq!(report.reference_count, 0);
    assert_eq!(report.records.len(), 8);

    let tags = report.record("tags").expect("tags record");
    assert_eq!(tags.kind, "list");
    assert_eq!(tags.children.len(), 2);
    assert_eq!(report.record("nickname").map(|r| r.kind.as_str()), Some("null"));

    let text = report.to_string();
    assert!(text.contains("REFGRAPH INSPECTOR REPORT"));
    assert!(text.contains("tags: list"));
    Ok(())
}

#[test]
#[cfg(feature = "lz4_flex")]
fn test_lz4_roundtrip() -> refgraph::Result<()> {
    let serializer = RefGraph::builder().compression(true).build()?;
    let data = Shared::new(Settings {
        tags: vec!["repeat".to_string(); 500],
        ..create_settings()
    });

    let mut compressed = Vec::new();
    serializer.serialize(&data.handle(), &mut compressed)?;
    let plain = RefGraph::to_bytes(&data.handle())?;
    assert!(compressed.len() < plain.len());

    // Readers pick the algorithm from the frame, whatever they were built with.
    let loaded = RefGraph::from_bytes::<Settings>(&compressed)?;
    assert_eq!(*loaded.borrow(), *data.borrow());
    assert_eq!(RefGraph::inspect_bytes(&compressed)?.compression_algo, "LZ4");
    Ok(())
}

#[test]
#[cfg(not(feature = "lz4_flex"))]
fn test_compression_requires_feature() {
    let result = RefGraph::builder().compression(true).build();
    assert!(matches!(result, Err(GraphError::Compression(_))));
}
