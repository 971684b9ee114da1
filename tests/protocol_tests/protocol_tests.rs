//! Protocol Tests
//!
//! Tests for command and response encoding/decoding.

use std::io::Cursor;

use serde_json::json;
use zmatstore::codec::into_document;
use zmatstore::protocol::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, Command, CommandType, Response, Status,
    HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use zmatstore::StoreError;

fn roundtrip(command: Command) -> Command {
    let encoded = encode_command(&command).unwrap();
    decode_command(&encoded).unwrap()
}

// =============================================================================
// Command Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_create() {
    let cmd = Command::Create {
        collection: "users".to_string(),
        document: into_document(json!({ "name": "A", "tags": ["x"] })).unwrap(),
    };
    assert_eq!(roundtrip(cmd.clone()), cmd);
}

#[test]
fn test_encode_decode_view_and_delete() {
    let view = Command::View {
        collection: "users".to_string(),
        id: 42,
    };
    let delete = Command::Delete {
        collection: "users".to_string(),
        id: u64::MAX,
    };
    assert_eq!(roundtrip(view.clone()), view);
    assert_eq!(roundtrip(delete.clone()), delete);
}

#[test]
fn test_encode_decode_update() {
    let cmd = Command::Update {
        collection: "users".to_string(),
        id: 7,
        partial: into_document(json!({ "age": 31 })).unwrap(),
    };
    assert_eq!(roundtrip(cmd.clone()), cmd);
}

#[test]
fn test_encode_decode_find_with_any_value() {
    for value in [json!("A"), json!(3), json!(null), json!({ "city": "X" })] {
        let cmd = Command::Find {
            collection: "users".to_string(),
            field: "name".to_string(),
            value,
        };
        assert_eq!(roundtrip(cmd.clone()), cmd);
    }
}

#[test]
fn test_encode_ping_is_header_only() {
    let encoded = encode_command(&Command::Ping).unwrap();

    assert_eq!(encoded, vec![0x06, 0, 0, 0, 0]);
    assert_eq!(decode_command(&encoded).unwrap(), Command::Ping);
}

#[test]
fn test_view_wire_layout() {
    let encoded = encode_command(&Command::View {
        collection: "ab".to_string(),
        id: 1,
    })
    .unwrap();

    let expected: Vec<u8> = vec![
        0x02, // VIEW
        0, 0, 0, 14, // payload length
        0, 0, 0, 2, b'a', b'b', // collection
        0, 0, 0, 0, 0, 0, 0, 1, // id
    ];
    assert_eq!(encoded, expected);
}

#[test]
fn test_command_type_bytes() {
    assert_eq!(CommandType::from_byte(0x01), Some(CommandType::Create));
    assert_eq!(CommandType::from_byte(0x05), Some(CommandType::Find));
    assert_eq!(CommandType::from_byte(0x00), None);
    assert_eq!(CommandType::from_byte(0xFF), None);
}

#[test]
fn test_command_collection() {
    let cmd = Command::Delete {
        collection: "posts".to_string(),
        id: 1,
    };
    assert_eq!(cmd.collection(), Some("posts"));
    assert_eq!(Command::Ping.collection(), None);
}

// =============================================================================
// Command Error Tests
// =============================================================================

fn expect_protocol_error(bytes: &[u8]) {
    match decode_command(bytes) {
        Err(StoreError::Protocol(_)) => {}
        other => panic!("Expected protocol error, got {:?}", other),
    }
}

#[test]
fn test_decode_unknown_command() {
    expect_protocol_error(&[0x7F, 0, 0, 0, 0]);
}

#[test]
fn test_decode_incomplete_header() {
    expect_protocol_error(&[0x02, 0, 0]);
}

#[test]
fn test_decode_incomplete_payload() {
    let mut encoded = encode_command(&Command::View {
        collection: "users".to_string(),
        id: 1,
    })
    .unwrap();
    encoded.truncate(encoded.len() - 3);

    expect_protocol_error(&encoded);
}

#[test]
fn test_decode_payload_too_large() {
    let len = (MAX_PAYLOAD_SIZE + 1).to_be_bytes();
    expect_protocol_error(&[0x06, len[0], len[1], len[2], len[3]]);
}

#[test]
fn test_decode_trailing_bytes() {
    // PING with a one-byte payload
    expect_protocol_error(&[0x06, 0, 0, 0, 1, 0xAA]);
}

#[test]
fn test_decode_invalid_json() {
    let mut payload = vec![0, 0, 0, 1, b'u'];
    payload.extend_from_slice(b"{oops");
    let mut bytes = vec![0x01];
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&payload);

    expect_protocol_error(&bytes);
}

#[test]
fn test_decode_create_non_object_document() {
    let mut payload = vec![0, 0, 0, 1, b'u'];
    payload.extend_from_slice(b"[1,2]");
    let mut bytes = vec![0x01];
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&payload);

    assert!(matches!(
        decode_command(&bytes),
        Err(StoreError::InvalidDocument(_))
    ));
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_response_ok_roundtrip() {
    let response = Response::ok(&json!({ "id": 3 })).unwrap();
    let decoded = decode_response(&encode_response(&response)).unwrap();

    assert_eq!(decoded.status, Status::Ok);
    assert_eq!(decoded.json().unwrap(), json!({ "id": 3 }));
}

#[test]
fn test_response_not_found_and_error() {
    let not_found = decode_response(&encode_response(&Response::not_found("gone"))).unwrap();
    let error = decode_response(&encode_response(&Response::error("boom"))).unwrap();

    assert_eq!(not_found.status, Status::NotFound);
    assert_eq!(not_found.message(), "gone");
    assert!(not_found.json().is_err());
    assert_eq!(error.status, Status::Error);
    assert_eq!(error.message(), "boom");
}

#[test]
fn test_response_empty_payload_is_none() {
    let response = Response {
        status: Status::Ok,
        payload: None,
    };
    let encoded = encode_response(&response);

    assert_eq!(encoded.len(), HEADER_SIZE);
    let decoded = decode_response(&encoded).unwrap();
    assert_eq!(decoded.payload, None);
    assert_eq!(decoded.json().unwrap(), serde_json::Value::Null);
}

#[test]
fn test_decode_unknown_status() {
    assert!(matches!(
        decode_response(&[0x09, 0, 0, 0, 0]),
        Err(StoreError::Protocol(_))
    ));
}

#[test]
fn test_response_from_result() {
    assert_eq!(Response::from_result(Ok(json!(true))).status, Status::Ok);
    assert_eq!(
        Response::from_result(Err(StoreError::NotFound { id: 1 })).status,
        Status::NotFound
    );
    assert_eq!(
        Response::from_result(Err(StoreError::UnknownCollection("x".into()))).status,
        Status::NotFound
    );
    assert_eq!(
        Response::from_result(Err(StoreError::InvalidDocument("bad".into()))).status,
        Status::Error
    );
}

// =============================================================================
// Stream Helper Tests
// =============================================================================

#[test]
fn test_stream_commands_back_to_back() {
    let first = Command::Create {
        collection: "users".to_string(),
        document: into_document(json!({ "n": 1 })).unwrap(),
    };
    let second = Command::Ping;

    let mut buffer = Vec::new();
    write_command(&mut buffer, &first).unwrap();
    write_command(&mut buffer, &second).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_command(&mut cursor).unwrap(), first);
    assert_eq!(read_command(&mut cursor).unwrap(), second);
    assert!(matches!(read_command(&mut cursor), Err(StoreError::Io(_))));
}

#[test]
fn test_stream_response() {
    let response = Response::ok(&json!([{ "name": "A" }])).unwrap();

    let mut buffer = Vec::new();
    write_response(&mut buffer, &response).unwrap();
    let decoded = read_response(&mut Cursor::new(buffer)).unwrap();

    assert_eq!(decoded, response);
}

#[test]
fn test_stream_rejects_oversized_frame() {
    let len = (MAX_PAYLOAD_SIZE + 1).to_be_bytes();
    let bytes = vec![0x01, len[0], len[1], len[2], len[3]];

    assert!(matches!(
        read_command(&mut Cursor::new(bytes)),
        Err(StoreError::Protocol(_))
    ));
}
