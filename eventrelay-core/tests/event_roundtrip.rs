//! Text roundtrip and validation tests for `eventrelay-core` events.
//!
//! Each `#[case]` is isolated; nothing is shared between cases.

use eventrelay_core::{payload_from_value, Event, EventDto, EventError, Payload, PayloadValue};
use rstest::rstest;
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn minimal_event() -> Event {
    Event::new("resource.changed").expect("event")
}

fn full_event() -> Event {
    let payload: Payload = [
        ("id".to_string(), PayloadValue::from("vm-42")),
        ("count".to_string(), PayloadValue::from(3i64)),
        ("ratio".to_string(), PayloadValue::from(0.25)),
        ("active".to_string(), PayloadValue::from(false)),
        ("previous".to_string(), PayloadValue::Null),
    ]
    .into_iter()
    .collect();
    Event::new("vm.updated")
        .expect("event")
        .with_request_id("req-001")
        .with_payload(payload)
}

fn unicode_event() -> Event {
    let payload = payload_from_value(json!({
        "title": "日本語・한국어・العربية",
        "quote": "<>&\"'",
    }))
    .expect("payload");
    Event::new("пользователь-🚀").expect("event").with_payload(payload)
}

fn empty_payload_event() -> Event {
    Event::new("empty").expect("event").with_payload(Payload::new())
}

// ---------------------------------------------------------------------------
// Parameterised roundtrip test
// ---------------------------------------------------------------------------

#[rstest]
#[case("minimal", minimal_event())]
#[case("all_fields", full_event())]
#[case("unicode_strings", unicode_event())]
#[case("empty_payload", empty_payload_event())]
fn event_text_roundtrip(#[case] label: &str, #[case] event: Event) {
    let text = event.to_string();
    let back: Event = text
        .parse()
        .unwrap_or_else(|e| panic!("[{label}] parse failed: {e}"));
    assert_eq!(event, back, "[{label}] value equality");
}

#[rstest]
#[case("minimal", minimal_event())]
#[case("all_fields", full_event())]
fn frozen_event_roundtrip(#[case] label: &str, #[case] event: Event) {
    let frozen = event.clone().freeze();
    let back: Event = frozen
        .to_string()
        .parse()
        .unwrap_or_else(|e| panic!("[{label}] parse failed: {e}"));
    assert_eq!(*frozen, back, "[{label}] frozen value equality");
    assert_eq!(event, back, "[{label}] original unchanged");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[rstest]
#[case("a")]
#[case("resource.changed")]
#[case("with spaces")]
#[case("ünïcödé")]
fn valid_names_construct(#[case] name: &str) {
    let event = Event::new(name).expect("valid name");
    assert_eq!(event.name(), name);
}

#[rstest]
#[case(json!({"name": "", "time": "2019-04-28T04:48:00.405Z"}))]
#[case(json!({"name": 12, "time": "2019-04-28T04:48:00.405Z"}))]
#[case(json!({"name": null, "time": "2019-04-28T04:48:00.405Z"}))]
#[case(json!({"time": "2019-04-28T04:48:00.405Z"}))]
fn invalid_names_fail(#[case] value: serde_json::Value) {
    assert!(serde_json::from_value::<Event>(value).is_err());
}

#[test]
fn empty_name_is_invalid_argument() {
    let err = Event::from_dto(EventDto {
        name: String::new(),
        time: "2019-04-28T04:48:00.405Z".into(),
        request_id: None,
        payload: None,
    })
    .expect_err("empty name");
    assert!(matches!(err, EventError::InvalidArgument(_)));
}

#[test]
fn wire_form_matches_contract_field_names() {
    let value = serde_json::to_value(full_event()).expect("serialize");
    let object = value.as_object().expect("object");
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["name", "payload", "requestId", "time"]);
}
