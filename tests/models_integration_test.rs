//! Integration tests for live-events data models
//!
//! These tests verify the wire format and validation of the live score
//! documents, and how model errors surface as crate errors.

use live_events::kafka::decode;
use live_events::models::{
    validate_event_id, LiveScoreMessage, Message, TrackingRequest, ValidationErrorKind,
    MAX_EVENT_ID, MIN_EVENT_ID,
};
use live_events::Error;
use serde_json::json;

#[test]
fn test_live_score_deserialization_valid() {
    let json = json!({ "eventId": 1234, "currentScore": "2:1" });

    let message: LiveScoreMessage =
        serde_json::from_value(json).expect("Should deserialize valid message");

    assert_eq!(message.event_id, 1234);
    assert_eq!(message.current_score, "2:1");
    assert!(message.check().is_ok());
}

#[test]
fn test_live_score_missing_field_fails_to_decode() {
    let payload = serde_json::to_vec(&json!({ "eventId": 1234 })).unwrap();
    let message = Message::new("live_score", 0, 0, Some(payload));

    assert!(decode::<LiveScoreMessage>(&message).is_err());
}

#[test]
fn test_live_score_rejects_snake_case_fields() {
    let json = json!({ "event_id": 1234, "current_score": "0:0" });

    assert!(serde_json::from_value::<LiveScoreMessage>(json).is_err());
}

#[test]
fn test_live_score_validation_errors() {
    let errors = LiveScoreMessage::new(99, "").check().unwrap_err();

    assert_eq!(errors.len(), 2);
    let kinds: Vec<&ValidationErrorKind> = errors.errors().iter().map(|e| &e.kind).collect();
    assert!(kinds.contains(&&ValidationErrorKind::OutOfRange));
    assert!(kinds.contains(&&ValidationErrorKind::TooShort));
}

#[test]
fn test_tracking_request_wire_format() {
    let request: TrackingRequest =
        serde_json::from_value(json!({ "eventId": 4321, "status": true })).unwrap();

    assert_eq!(request, TrackingRequest::new(4321, true));
    assert_eq!(
        serde_json::to_value(TrackingRequest::new(4321, false)).unwrap(),
        json!({ "eventId": 4321, "status": false })
    );
}

#[test]
fn test_tracking_request_validation_maps_to_crate_error() {
    let error: Error = TrackingRequest::new(10_000, true).check().unwrap_err().into();

    assert!(matches!(error, Error::Validation(_)));
    assert!(!error.is_retryable());
}

#[test]
fn test_event_id_bounds() {
    assert!(validate_event_id(MIN_EVENT_ID).is_ok());
    assert!(validate_event_id(MAX_EVENT_ID).is_ok());
    assert!(validate_event_id(MIN_EVENT_ID - 1).is_err());
    assert!(validate_event_id(MAX_EVENT_ID + 1).is_err());
}

#[test]
fn test_message_next_offset() {
    let message = Message::new("live_score", 3, 41, None).with_key(Some(b"1234".to_vec()));

    assert_eq!(message.next_offset(), 42);
    assert_eq!(message.key(), Some(&b"1234"[..]));
    assert!(message.payload().is_none());
}
