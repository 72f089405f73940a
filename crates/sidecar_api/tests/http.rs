use std::time::Duration;

use sidecar_api::{SidecarApiConfig, SidecarApiError, SidecarClient, DEFAULT_SIDECAR_PORT};

#[test]
fn chat_request_posts_message_as_json() {
    let client = SidecarClient::new(SidecarApiConfig::new()).expect("client");

    let request = client
        .build_chat_request("hi there")
        .expect("build request")
        .build()
        .expect("request");

    assert_eq!(request.method(), "POST");
    assert_eq!(request.url().as_str(), "http://127.0.0.1:39821/chat");
    assert_eq!(
        request
            .headers()
            .get("accept")
            .and_then(|value| value.to_str().ok()),
        Some("text/event-stream")
    );
    let body = request
        .body()
        .and_then(|body| body.as_bytes())
        .expect("json body");
    let body: serde_json::Value = serde_json::from_slice(body).expect("body is json");
    assert_eq!(body, serde_json::json!({ "message": "hi there" }));
}

#[test]
fn confirm_and_reset_requests_target_command_endpoints() {
    let client =
        SidecarClient::new(SidecarApiConfig::for_port(4000)).expect("client");

    let confirm = client
        .build_confirm_request(false)
        .expect("build confirm")
        .build()
        .expect("request");
    assert_eq!(confirm.url().as_str(), "http://127.0.0.1:4000/confirm");
    let body = confirm
        .body()
        .and_then(|body| body.as_bytes())
        .expect("json body");
    assert_eq!(body, br#"{"approved":false}"#);

    let reset = client
        .build_reset_request()
        .expect("build reset")
        .build()
        .expect("request");
    assert_eq!(reset.method(), "POST");
    assert_eq!(reset.url().as_str(), "http://127.0.0.1:4000/reset");
}

#[test]
fn config_defaults_to_local_sidecar_without_timeout() {
    let config = SidecarApiConfig::default();
    assert_eq!(config.base_url, format!("http://127.0.0.1:{DEFAULT_SIDECAR_PORT}"));
    assert_eq!(config.timeout, None);

    let config = config.with_timeout(Duration::from_secs(5));
    assert_eq!(config.timeout, Some(Duration::from_secs(5)));
}

#[test]
fn client_rejects_invalid_base_url_up_front() {
    let error = SidecarClient::new(SidecarApiConfig::new().with_base_url("mailto:x@y"))
        .expect_err("invalid base should fail");
    assert!(matches!(error, SidecarApiError::InvalidBaseUrl { .. }));
}
