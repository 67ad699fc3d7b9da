//! End-to-end matrix: schema JSON in, exact wire bytes out.

use protopack::{JsonOptions, LongMode, ProtoValue, Root, Writer};
use serde_json::json;

fn schema(doc: serde_json::Value) -> Root {
    let root = Root::from_json(&doc).unwrap();
    root.resolve_all().unwrap();
    root
}

fn encode(root: &Root, type_path: &str, value: serde_json::Value) -> Vec<u8> {
    let message = root.lookup_type(type_path).unwrap();
    let mut writer = Writer::new();
    message
        .encode(&ProtoValue::from(value), &mut writer)
        .unwrap();
    writer.finish()
}

#[test]
fn scalar_field_matrix() {
    let root = schema(json!({
        "nested": {
            "Scalars": {"fields": {
                "u32": {"type": "uint32", "id": 1},
                "i32": {"type": "int32", "id": 2},
                "s32": {"type": "sint32", "id": 3},
                "f32": {"type": "fixed32", "id": 4},
                "b": {"type": "bool", "id": 5},
                "s": {"type": "string", "id": 6},
                "by": {"type": "bytes", "id": 7},
                "d": {"type": "double", "id": 8},
            }},
        },
    }));

    assert_eq!(encode(&root, "Scalars", json!({"u32": 0})), vec![0x08, 0x00]);
    assert_eq!(
        encode(&root, "Scalars", json!({"u32": 150})),
        vec![0x08, 0x96, 0x01]
    );
    assert_eq!(encode(&root, "Scalars", json!({"s32": -1})), vec![0x18, 0x01]);
    assert_eq!(
        encode(&root, "Scalars", json!({"f32": 1})),
        vec![0x25, 0x01, 0x00, 0x00, 0x00]
    );
    assert_eq!(encode(&root, "Scalars", json!({"b": true})), vec![0x28, 0x01]);
    assert_eq!(
        encode(&root, "Scalars", json!({"s": "€"})),
        vec![0x32, 0x03, 0xE2, 0x82, 0xAC]
    );
    assert_eq!(
        encode(&root, "Scalars", json!({"by": [0xAA, 0xBB]})),
        vec![0x3A, 0x02, 0xAA, 0xBB]
    );
    assert_eq!(
        encode(&root, "Scalars", json!({"d": 1.0})),
        vec![0x41, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F]
    );
}

#[test]
fn negative_int32_takes_the_canonical_ten_byte_form() {
    let root = schema(json!({
        "nested": {
            "M": {"fields": {"n": {"type": "int32", "id": 1}}},
        },
    }));
    assert_eq!(
        encode(&root, "M", json!({"n": -1})),
        vec![0x08, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
    );
}

#[test]
fn long_scalars_cover_the_full_range() {
    let root = schema(json!({
        "nested": {
            "M": {"fields": {
                "u": {"type": "uint64", "id": 1},
                "s": {"type": "sint64", "id": 2},
                "f": {"type": "fixed64", "id": 3},
            }},
        },
    }));
    assert_eq!(
        encode(&root, "M", json!({"u": u64::MAX})),
        vec![0x08, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
    );
    assert_eq!(encode(&root, "M", json!({"s": -2})), vec![0x10, 0x03]);
    assert_eq!(
        encode(&root, "M", json!({"f": 1})),
        vec![0x19, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn packed_repeated_emits_one_block() {
    let root = schema(json!({
        "nested": {
            "M": {"fields": {
                "v": {"rule": "repeated", "type": "int32", "id": 3},
            }},
        },
    }));
    assert_eq!(
        encode(&root, "M", json!({"v": [1, 2, 150]})),
        vec![0x1A, 0x04, 0x01, 0x02, 0x96, 0x01]
    );
    assert_eq!(encode(&root, "M", json!({"v": []})), Vec::<u8>::new());
}

#[test]
fn nested_messages_three_deep() {
    let root = schema(json!({
        "nested": {
            "C": {"fields": {"x": {"type": "uint32", "id": 1}}},
            "B": {"fields": {"c": {"type": "C", "id": 1}}},
            "A": {"fields": {"b": {"type": "B", "id": 1}}},
        },
    }));
    assert_eq!(
        encode(&root, "A", json!({"b": {"c": {"x": 150}}})),
        vec![0x0A, 0x05, 0x0A, 0x03, 0x08, 0x96, 0x01]
    );
}

#[test]
fn enum_fields_encode_names_and_numbers() {
    let root = schema(json!({
        "nested": {
            "Mood": {"values": {"CALM": 0, "TENSE": 3}},
            "M": {"fields": {"mood": {"type": "Mood", "id": 1}}},
        },
    }));
    assert_eq!(encode(&root, "M", json!({"mood": "TENSE"})), vec![0x08, 0x03]);
    assert_eq!(encode(&root, "M", json!({"mood": 3})), vec![0x08, 0x03]);
}

#[test]
fn repeated_enums_pack_by_default() {
    let root = schema(json!({
        "nested": {
            "Mood": {"values": {"CALM": 0, "TENSE": 3}},
            "M": {"fields": {
                "moods": {"rule": "repeated", "type": "Mood", "id": 2},
            }},
        },
    }));
    assert_eq!(
        encode(&root, "M", json!({"moods": ["CALM", "TENSE", 1]})),
        vec![0x12, 0x03, 0x00, 0x03, 0x01]
    );
}

#[test]
fn map_fields_emit_entry_messages_in_order() {
    let root = schema(json!({
        "nested": {
            "M": {"fields": {
                "counts": {"keyType": "string", "type": "uint32", "id": 4},
            }},
        },
    }));
    assert_eq!(
        encode(&root, "M", json!({"counts": {"b": 2, "a": 1}})),
        vec![
            0x22, 0x05, 0x0A, 0x01, b'b', 0x10, 0x02, // "b" first: insertion order
            0x22, 0x05, 0x0A, 0x01, b'a', 0x10, 0x01,
        ]
    );
}

#[test]
fn extension_fields_encode_on_the_target() {
    let root = schema(json!({
        "nested": {
            "pkg": {"nested": {
                "Base": {"fields": {"x": {"type": "uint32", "id": 1}}},
                "extra": {"type": "uint32", "id": 100, "extend": "Base"},
            }},
        },
    }));
    let base = root.lookup_type("pkg.Base").unwrap();
    let mut writer = Writer::new();
    base.encode(
        &ProtoValue::from(json!({"x": 1, "pkg.extra": 150})),
        &mut writer,
    )
    .unwrap();
    // tag(100, 0) = 800 = varint [0xA0, 0x06]
    assert_eq!(
        writer.finish(),
        vec![0x08, 0x01, 0xA0, 0x06, 0x96, 0x01]
    );
}

#[test]
fn chunk_boundary_stress_through_the_full_stack() {
    let root = schema(json!({
        "nested": {
            "M": {"fields": {
                "blob": {"type": "bytes", "id": 1},
                "tail": {"type": "uint32", "id": 2},
            }},
        },
    }));
    let blob: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    let bytes = encode(
        &root,
        "M",
        json!({"blob": blob.clone(), "tail": 150}),
    );
    // tag(1,2), varint(1000) = [0xE8, 0x07], blob, tag(2,0), 150.
    let mut expected = vec![0x0A, 0xE8, 0x07];
    expected.extend_from_slice(&blob);
    expected.extend_from_slice(&[0x10, 0x96, 0x01]);
    assert_eq!(bytes, expected);
}

#[test]
fn writer_survives_a_failed_encode_after_reset() {
    let root = schema(json!({
        "nested": {
            "M": {"fields": {"n": {"type": "uint32", "id": 1}}},
        },
    }));
    let m = root.lookup_type("M").unwrap();
    let mut writer = Writer::new();
    assert!(m
        .encode(&ProtoValue::from(json!({"n": "not a number"})), &mut writer)
        .is_err());
    // Discard the partial stream, then reuse the writer.
    writer.reset();
    m.encode(&ProtoValue::from(json!({"n": 1})), &mut writer)
        .unwrap();
    assert_eq!(writer.finish(), vec![0x08, 0x01]);
}

#[test]
fn json_convert_matrix() {
    let root = schema(json!({
        "nested": {
            "Mood": {"values": {"CALM": 0, "TENSE": 3}},
            "M": {"fields": {
                "mood": {"type": "Mood", "id": 1},
                "big": {"type": "int64", "id": 2},
                "data": {"type": "bytes", "id": 3},
            }},
        },
    }));
    let m = root.lookup_type("M").unwrap();
    let opts = JsonOptions {
        enums_as_names: true,
        longs: LongMode::String,
    };
    assert_eq!(
        m.get("mood")
            .unwrap()
            .json_convert(&ProtoValue::I64(3), opts)
            .unwrap(),
        json!("TENSE")
    );
    assert_eq!(
        m.get("big")
            .unwrap()
            .json_convert(&ProtoValue::I64(-9_007_199_254_740_993), opts)
            .unwrap(),
        json!("-9007199254740993")
    );
    assert_eq!(
        m.get("data")
            .unwrap()
            .json_convert(&ProtoValue::Bytes(vec![1, 2, 3]), JsonOptions::default())
            .unwrap(),
        json!("AQID")
    );
}

#[test]
fn schema_document_roundtrip() {
    let doc = json!({
        "options": {"syntax": "proto3"},
        "nested": {
            "shop": {"nested": {
                "Currency": {"values": {"EUR": 0, "USD": 1}},
                "Price": {"fields": {
                    "amount": {"type": "uint64", "id": 1},
                    "currency": {"type": "Currency", "id": 2},
                }},
                "Order": {"fields": {
                    "id": {"type": "string", "id": 1},
                    "lines": {"rule": "repeated", "type": "Price", "id": 2},
                    "labels": {"keyType": "string", "type": "string", "id": 3},
                }},
                "Shop": {"methods": {
                    "PlaceOrder": {"requestType": "Order", "responseType": "Order"},
                }},
            }},
        },
    });
    let root = schema(doc.clone());
    assert_eq!(root.to_json(), doc);
}

#[test]
fn full_document_drives_real_encoding() {
    let root = schema(json!({
        "nested": {
            "shop": {"nested": {
                "Currency": {"values": {"EUR": 0, "USD": 1}},
                "Price": {"fields": {
                    "amount": {"type": "uint64", "id": 1},
                    "currency": {"type": "Currency", "id": 2},
                }},
                "Order": {"fields": {
                    "id": {"type": "string", "id": 1},
                    "lines": {"rule": "repeated", "type": "Price", "id": 2},
                }},
            }},
        },
    }));
    let bytes = encode(
        &root,
        "shop.Order",
        json!({
            "id": "A1",
            "lines": [
                {"amount": 150, "currency": "USD"},
                {"amount": 5},
            ],
        }),
    );
    assert_eq!(
        bytes,
        vec![
            0x0A, 0x02, b'A', b'1', // id: "A1"
            0x12, 0x05, 0x08, 0x96, 0x01, 0x10, 0x01, // {amount: 150, currency: USD}
            0x12, 0x02, 0x08, 0x05, // {amount: 5}
        ]
    );
}
