#![allow(dead_code)]

use wiremock::ResponseTemplate;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An event-stream response carrying one `data:` event per payload
pub fn sse_response(events: &[&str]) -> ResponseTemplate {
    let body: String = events
        .iter()
        .map(|event| format!("data: {}\n\n", event))
        .collect();
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}
