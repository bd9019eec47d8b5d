#![allow(missing_docs)]

use std::sync::{Arc, Mutex};

use refgraph::{
    BinaryFormat, ContextMode, FormatDriver, GraphError, MemberValue, Model, ModelRef, ModelSerializer, Payload,
    PropertyValue, RefGraph, SerializationContext, SerializerModifier, Shared, Value, WireValue,
};

// --- MODIFIERS ---

/// Reverses the `secret` member on the way out and back on the way in.
#[derive(Debug, Default)]
struct ReverseSecret;

fn reverse_secret(member: &mut MemberValue) {
    if member.name == "secret"
        && let Value::Str(s) = &member.value
    {
        let reversed = s.chars().rev().collect();
        member.value = Value::Str(reversed);
    }
}

impl SerializerModifier for ReverseSecret {
    fn serialize_member(&self, _: &SerializationContext<'_>, member: &mut MemberValue) -> refgraph::Result<()> {
        reverse_secret(member);
        Ok(())
    }

    fn deserialize_member(&self, _: &SerializationContext<'_>, member: &mut MemberValue) -> refgraph::Result<()> {
        reverse_secret(member);
        Ok(())
    }
}

/// Appends a tag to strings, and insists on stripping it again.
#[derive(Debug)]
struct Suffix(&'static str);

impl Default for Suffix {
    fn default() -> Self {
        Suffix("D")
    }
}

impl SerializerModifier for Suffix {
    fn serialize_member(&self, _: &SerializationContext<'_>, member: &mut MemberValue) -> refgraph::Result<()> {
        if let Value::Str(s) = &mut member.value {
            s.push_str(self.0);
        }
        Ok(())
    }

    fn deserialize_member(&self, _: &SerializationContext<'_>, member: &mut MemberValue) -> refgraph::Result<()> {
        if let Value::Str(s) = &member.value {
            let stripped = s
                .strip_suffix(self.0)
                .ok_or_else(|| GraphError::Modifier(format!("'{s}' lacks suffix {}", self.0)))?;
            member.value = Value::Str(stripped.to_string());
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Recorder {
    tag: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn push(&self, event: String) {
        self.log.lock().unwrap().push(format!("{}:{event}", self.tag));
    }
}

impl SerializerModifier for Recorder {
    fn on_serializing(&self, _: &SerializationContext<'_>, _: &ModelRef) -> refgraph::Result<()> {
        self.push("on_serializing".into());
        Ok(())
    }

    fn serialize_member(&self, _: &SerializationContext<'_>, member: &mut MemberValue) -> refgraph::Result<()> {
        self.push(format!("serialize:{}", member.name));
        Ok(())
    }

    fn on_serialized(&self, _: &SerializationContext<'_>, _: &ModelRef) -> refgraph::Result<()> {
        self.push("on_serialized".into());
        Ok(())
    }

    fn on_deserializing(&self, _: &SerializationContext<'_>, _: &ModelRef) -> refgraph::Result<()> {
        self.push("on_deserializing".into());
        Ok(())
    }

    fn deserialize_member(&self, _: &SerializationContext<'_>, member: &mut MemberValue) -> refgraph::Result<()> {
        self.push(format!("deserialize:{}", member.name));
        Ok(())
    }

    fn on_deserialized(&self, _: &SerializationContext<'_>, _: &ModelRef) -> refgraph::Result<()> {
        self.push("on_deserialized".into());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct HidePassword;

impl SerializerModifier for HidePassword {
    fn should_ignore_member(&self, _: &SerializationContext<'_>, _: &ModelRef, member: &MemberValue) -> bool {
        member.name == "password"
    }
}

/// Writes `audit` but never reads it back.
#[derive(Debug, Default)]
struct WriteOnlyAudit;

impl SerializerModifier for WriteOnlyAudit {
    fn should_ignore_member(&self, context: &SerializationContext<'_>, _: &ModelRef, member: &MemberValue) -> bool {
        member.name == "audit" && context.mode() == ContextMode::Deserializing
    }
}

#[derive(Debug, Default)]
struct Fragile;

impl SerializerModifier for Fragile {
    fn serialize_member(&self, _: &SerializationContext<'_>, member: &mut MemberValue) -> refgraph::Result<()> {
        if member.name == "fragile" {
            return Err(GraphError::Modifier("cannot encode".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Grumpy;

impl SerializerModifier for Grumpy {
    fn on_serializing(&self, _: &SerializationContext<'_>, _: &ModelRef) -> refgraph::Result<()> {
        Err(GraphError::Modifier("not today".into()))
    }

    fn on_deserializing(&self, _: &SerializationContext<'_>, _: &ModelRef) -> refgraph::Result<()> {
        Err(GraphError::Modifier("not today".into()))
    }
}

/// Refuses to write any crate flagged as broken.
#[derive(Debug, Default)]
struct RejectBroken;

impl SerializerModifier for RejectBroken {
    fn on_serializing(&self, _: &SerializationContext<'_>, model: &ModelRef) -> refgraph::Result<()> {
        if matches!(model.try_borrow()?.get_member("broken")?, Value::Bool(true)) {
            return Err(GraphError::Modifier("broken crate".into()));
        }
        Ok(())
    }
}

// --- MODELS ---

#[derive(Debug, Default, Model)]
#[refgraph(modifier = ReverseSecret)]
struct Vault {
    owner: String,
    secret: String,
}

#[derive(Debug, Default, Model)]
#[refgraph(modifier = Suffix)]
struct Label {
    text: String,
}

#[derive(Debug, Default, Model)]
struct Pair {
    left: i32,
    right: i32,
}

#[derive(Debug, Default, Model)]
#[refgraph(modifier = HidePassword, modifier = WriteOnlyAudit)]
struct Account {
    user: String,
    password: String,
    audit: String,
}

#[derive(Debug, Default, Model)]
#[refgraph(modifier = Fragile)]
struct Parcel {
    fragile: String,
    sturdy: String,
}

#[derive(Debug, Default, Model)]
#[refgraph(modifier = Grumpy)]
struct Moody {
    mood: String,
}

#[derive(Debug, Default, Model)]
struct Household {
    note: String,
    pet: Option<Shared<Moody>>,
}

#[derive(Debug, Default, Model)]
struct Tag {
    name: String,
}

#[derive(Debug, Default, Model)]
#[refgraph(modifier = RejectBroken)]
struct Crate {
    broken: bool,
    tag: Option<Shared<Tag>>,
}

#[derive(Debug, Default, Model)]
struct Shipment {
    crates: Vec<Shared<Crate>>,
    label: Option<Shared<Tag>>,
}

fn record<'a>(payload: &'a Payload, name: &str) -> Option<&'a PropertyValue> {
    payload.members.iter().find(|r| r.name == name)
}

// --- TESTS ---

#[test]
fn test_modifier_symmetry() -> refgraph::Result<()> {
    let serializer = ModelSerializer::new();

    for secret in ["", "a", "hunter2", "ünïcödé", "racecar"] {
        let vault = Shared::new(Vault {
            owner: "me".into(),
            secret: secret.into(),
        });

        let payload = serializer.to_payload(&vault.handle())?;
        let reversed: String = secret.chars().rev().collect();
        assert_eq!(record(&payload, "secret").map(|r| &r.value), Some(&WireValue::Str(reversed)));
        assert_eq!(record(&payload, "owner").map(|r| &r.value), Some(&WireValue::Str("me".into())));

        let mut bytes = Vec::new();
        serializer.serialize(&vault.handle(), &mut bytes)?;
        let copy: Shared<Vault> = serializer.deserialize(&mut bytes.as_slice())?;
        assert_eq!(copy.borrow().secret, secret);
    }
    Ok(())
}

#[test]
fn test_declared_then_runtime_order() -> refgraph::Result<()> {
    let serializer = RefGraph::builder()
        .modifier::<Label>(Arc::new(Suffix("R")))
        .build()?;
    let label = Shared::new(Label { text: "v".into() });

    let payload = serializer.to_payload(&label.handle())?;
    assert_eq!(record(&payload, "text").map(|r| &r.value), Some(&WireValue::Str("vDR".into())));

    // Deserialization strips R before D; the other order would fail and skip the member.
    let mut bytes = Vec::new();
    serializer.serialize(&label.handle(), &mut bytes)?;
    let copy: Shared<Label> = serializer.deserialize(&mut bytes.as_slice())?;
    assert_eq!(copy.borrow().text, "v");
    Ok(())
}

#[test]
fn test_hook_call_order() -> refgraph::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let serializer = RefGraph::builder()
        .modifier::<Pair>(Arc::new(Recorder {
            tag: "first",
            log: log.clone(),
        }))
        .modifier::<Pair>(Arc::new(Recorder {
            tag: "second",
            log: log.clone(),
        }))
        .build()?;

    let pair = Shared::new(Pair { left: 1, right: 2 });
    let mut bytes = Vec::new();
    serializer.serialize(&pair.handle(), &mut bytes)?;
    assert_eq!(
        std::mem::take(&mut *log.lock().unwrap()),
        vec![
            "first:on_serializing",
            "second:on_serializing",
            "first:serialize:left",
            "second:serialize:left",
            "first:serialize:right",
            "second:serialize:right",
            "first:on_serialized",
            "second:on_serialized",
        ]
    );

    let copy: Shared<Pair> = serializer.deserialize(&mut bytes.as_slice())?;
    assert_eq!((copy.borrow().left, copy.borrow().right), (1, 2));
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "second:on_deserializing",
            "first:on_deserializing",
            "second:deserialize:left",
            "first:deserialize:left",
            "second:deserialize:right",
            "first:deserialize:right",
            "second:on_deserialized",
            "first:on_deserialized",
        ]
    );
    Ok(())
}

#[test]
fn test_ignored_member_skips_both_directions() -> refgraph::Result<()> {
    let serializer = ModelSerializer::new();
    let account = Shared::new(Account {
        user: "root".into(),
        password: "hunter2".into(),
        audit: "created".into(),
    });

    let payload = serializer.to_payload(&account.handle())?;
    assert!(record(&payload, "password").is_none());
    assert!(record(&payload, "audit").is_some());

    // A payload that does carry the password still leaves it untouched.
    let forged = Payload {
        members: vec![
            PropertyValue::scalar("user", WireValue::Str("eve".into())),
            PropertyValue::scalar("password", WireValue::Str("stolen".into())),
            PropertyValue::scalar("audit", WireValue::Str("forged".into())),
        ],
        ..payload
    };
    let mut bytes = Vec::new();
    BinaryFormat::new().write_payload(&forged, false, &mut bytes)?;

    let target = Shared::new(Account {
        password: "kept".into(),
        ..Account::default()
    });
    serializer.deserialize_into(&target.handle(), &mut bytes.as_slice())?;

    let target = target.borrow();
    assert_eq!(target.user, "eve");
    assert_eq!(target.password, "kept");
    assert_eq!(target.audit, "");
    Ok(())
}

#[test]
fn test_member_error_skips_only_that_member() -> refgraph::Result<()> {
    let parcel = Shared::new(Parcel {
        fragile: "glass".into(),
        sturdy: "rock".into(),
    });

    let payload = ModelSerializer::new().to_payload(&parcel.handle())?;

    assert!(record(&payload, "fragile").is_none());
    assert_eq!(record(&payload, "sturdy").map(|r| &r.value), Some(&WireValue::Str("rock".into())));
    Ok(())
}

#[test]
fn test_object_hook_error() -> refgraph::Result<()> {
    let serializer = ModelSerializer::new();

    // At the root the hook error is the call's error.
    let moody = Shared::new(Moody { mood: "dark".into() });
    let mut sink = Vec::new();
    let result = serializer.serialize(&moody.handle(), &mut sink);
    assert!(matches!(result, Err(GraphError::Modifier(_))));

    // Nested, it only drops the member holding the object.
    let household = Shared::new(Household {
        note: "hello".into(),
        pet: Some(moody),
    });
    let payload = serializer.to_payload(&household.handle())?;
    assert!(record(&payload, "pet").is_none());
    assert!(record(&payload, "note").is_some());
    Ok(())
}

#[test]
fn test_dropped_member_releases_its_graph_ids() -> refgraph::Result<()> {
    let tag = Shared::new(Tag { name: "fragile".into() });
    let shipment = Shared::new(Shipment {
        crates: vec![
            Shared::new(Crate {
                broken: false,
                tag: Some(tag.clone()),
            }),
            Shared::new(Crate {
                broken: true,
                tag: None,
            }),
        ],
        label: Some(tag),
    });
    let serializer = ModelSerializer::new();

    // The broken crate drops `crates`, and the tag first met inside it.
    let payload = serializer.to_payload(&shipment.handle())?;
    assert!(record(&payload, "crates").is_none());
    let label = record(&payload, "label").expect("label written");
    assert_eq!(label.graph_ref_id, 0);
    assert!(matches!(label.value, WireValue::Model(_)));

    let mut bytes = Vec::new();
    serializer.serialize(&shipment.handle(), &mut bytes)?;
    let loaded: Shared<Shipment> = serializer.deserialize(&mut bytes.as_slice())?;
    let loaded = loaded.borrow();
    assert!(loaded.crates.is_empty());
    assert_eq!(loaded.label.as_ref().map(|t| t.borrow().name.clone()).as_deref(), Some("fragile"));
    Ok(())
}
