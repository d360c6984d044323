use chrono::Utc;
use codepair_common::language::Language;
use codepair_common::protocol::ws::{ClientEvent, ServerEvent};
use codepair_common::types::ParticipantInfo;
use serde_json::Value;
use uuid::Uuid;

#[test]
fn websocket_contract_client_event_shapes_match_the_browser() {
    let session_id = Uuid::new_v4();

    let samples = [
        (
            ClientEvent::Join {
                session_id,
                participant_id: "u1".to_string(),
                display_name: "Ada".to_string(),
            },
            "join",
            &["type", "sessionId", "participantId", "displayName"][..],
        ),
        (
            ClientEvent::CodeChange {
                session_id,
                code: "x = 1".to_string(),
                participant_id: "u1".to_string(),
            },
            "codeChange",
            &["type", "sessionId", "code", "participantId"][..],
        ),
        (
            ClientEvent::LanguageChange {
                session_id,
                language: Language::Python,
                participant_id: "u1".to_string(),
            },
            "languageChange",
            &["type", "sessionId", "language", "participantId"][..],
        ),
    ];

    for (event, expected_type, expected_keys) in samples {
        let value = serde_json::to_value(event).expect("client event should serialize");
        assert_eq!(value["type"], expected_type);
        assert_exact_keys(&value, expected_type, expected_keys);
    }
}

#[test]
fn websocket_contract_server_event_shapes_match_the_browser() {
    let session_id = Uuid::new_v4();

    let samples = [
        (
            ServerEvent::Joined {
                session_id,
                code: "x = 1".to_string(),
                language: Language::Javascript,
                participants: vec![ParticipantInfo {
                    id: "u1".to_string(),
                    display_name: "Ada".to_string(),
                }],
                count: 1,
            },
            "joined",
            &["type", "sessionId", "code", "language", "participants", "count"][..],
        ),
        (
            ServerEvent::PresenceJoined {
                participant_id: "u2".to_string(),
                display_name: "Grace".to_string(),
                count: 2,
            },
            "presenceJoined",
            &["type", "participantId", "displayName", "count"][..],
        ),
        (
            ServerEvent::CodeUpdated {
                code: "x = 1".to_string(),
                participant_id: "u1".to_string(),
                timestamp: Utc::now(),
            },
            "codeUpdated",
            &["type", "code", "participantId", "timestamp"][..],
        ),
        (
            ServerEvent::LanguageUpdated {
                language: Language::Python,
                code: "pass".to_string(),
                participant_id: "u1".to_string(),
            },
            "languageUpdated",
            &["type", "language", "code", "participantId"][..],
        ),
        (
            ServerEvent::PresenceLeft { participant_id: "u2".to_string(), count: 1 },
            "presenceLeft",
            &["type", "participantId", "count"][..],
        ),
        (
            ServerEvent::ErrorEvent {
                message: "session not found".to_string(),
                code: "SESSION_NOT_FOUND".to_string(),
            },
            "errorEvent",
            &["type", "message", "code"][..],
        ),
    ];

    for (event, expected_type, expected_keys) in samples {
        let value = serde_json::to_value(event).expect("server event should serialize");
        assert_eq!(value["type"], expected_type);
        assert_exact_keys(&value, expected_type, expected_keys);
    }
}

#[test]
fn websocket_contract_participant_entries_expose_id_and_display_name_only() {
    let info = ParticipantInfo { id: "u1".to_string(), display_name: "Ada".to_string() };
    let value = serde_json::to_value(info).expect("participant info should serialize");
    assert_exact_keys(&value, "participant", &["id", "displayName"]);
}

#[test]
fn websocket_contract_inbound_frames_parse_from_raw_browser_json() {
    let session_id = Uuid::new_v4();
    let raw = format!(
        r#"{{"type":"languageChange","sessionId":"{session_id}","language":"python","participantId":"u1"}}"#
    );

    let parsed: ClientEvent = serde_json::from_str(&raw).expect("frame should parse");
    assert_eq!(
        parsed,
        ClientEvent::LanguageChange {
            session_id,
            language: Language::Python,
            participant_id: "u1".to_string(),
        }
    );
}

#[test]
fn websocket_contract_unknown_language_in_frame_is_rejected() {
    let session_id = Uuid::new_v4();
    let raw = format!(
        r#"{{"type":"languageChange","sessionId":"{session_id}","language":"cobol","participantId":"u1"}}"#
    );
    assert!(serde_json::from_str::<ClientEvent>(&raw).is_err());
}

fn assert_exact_keys(value: &Value, label: &str, expected_keys: &[&str]) {
    let mut keys: Vec<String> = value
        .as_object()
        .unwrap_or_else(|| panic!("`{label}` frame must be an object"))
        .keys()
        .cloned()
        .collect();
    keys.sort();
    let mut expected: Vec<String> = expected_keys.iter().map(|k| k.to_string()).collect();
    expected.sort();
    assert_eq!(keys, expected, "`{label}` frame key set mismatch");
}
