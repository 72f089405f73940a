use reqwest::StatusCode;

use sidecar_api::error::parse_error_message;
use sidecar_api::SidecarApiError;

#[test]
fn parse_error_message_prefers_detail_field() {
    let message = parse_error_message(
        StatusCode::UNPROCESSABLE_ENTITY,
        r#"{"detail":"message must not be empty"}"#,
    );
    assert_eq!(message, "message must not be empty");
}

#[test]
fn parse_error_message_renders_structured_detail_as_json() {
    let message = parse_error_message(
        StatusCode::UNPROCESSABLE_ENTITY,
        r#"{"detail":[{"loc":["body"],"msg":"field required"}]}"#,
    );
    assert!(message.contains("field required"));
}

#[test]
fn parse_error_message_reads_nested_error_message() {
    let message = parse_error_message(
        StatusCode::BAD_REQUEST,
        r#"{"error":{"message":"invalid model"}}"#,
    );
    assert_eq!(message, "invalid model");
}

#[test]
fn parse_error_message_falls_back_to_raw_body_then_reason() {
    assert_eq!(
        parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, "Internal failure\n"),
        "Internal failure"
    );
    assert_eq!(
        parse_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
        "Service Unavailable"
    );
}

#[test]
fn status_error_display_carries_status_and_message() {
    let error = SidecarApiError::status(StatusCode::BAD_GATEWAY, r#"{"detail":"engine crashed"}"#);

    assert_eq!(error.http_status(), Some(StatusCode::BAD_GATEWAY));
    assert_eq!(
        error.to_string(),
        "sidecar returned HTTP 502 Bad Gateway: engine crashed"
    );
}
