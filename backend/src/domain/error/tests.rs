//! Tests for the domain error payload and its serialised form.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
fn invalid_request_constructor_sets_code() {
    let err = Error::invalid_request("bad");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(err.message(), "bad");
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
}

#[rstest]
#[case(ErrorCode::IllegalTransition, "illegal transition")]
#[case(ErrorCode::NoSubstituteAvailable, "no substitute available")]
#[case(ErrorCode::ServiceUnavailable, "service unavailable")]
fn new_falls_back_to_default_message(#[case] code: ErrorCode, #[case] expected: &str) {
    let err = Error::new(code, "");
    assert_eq!(err.message(), expected);
    assert_eq!(err.code(), code);
}

#[rstest]
fn serialises_to_camel_case_payload() {
    let err = Error::illegal_transition("cannot move")
        .with_details(json!({ "from": "CLOSED", "to": "REPAIRING" }));
    let value = serde_json::to_value(&err).expect("serialise error");
    assert_eq!(
        value,
        json!({
            "code": "illegal_transition",
            "message": "cannot move",
            "details": { "from": "CLOSED", "to": "REPAIRING" },
        })
    );
}

#[rstest]
fn deserialising_blank_message_fails() {
    let result: Result<Error, _> =
        serde_json::from_value(json!({ "code": "not_found", "message": " " }));
    assert!(result.is_err());
}

#[rstest]
fn round_trip_preserves_details() {
    let err = Error::invalid_state("component reserved").with_details(json!({ "id": 1 }));
    let json = serde_json::to_string(&err).expect("serialise");
    let back: Error = serde_json::from_str(&json).expect("deserialise");
    assert_eq!(back, err);
}
