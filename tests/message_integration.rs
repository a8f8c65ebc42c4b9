//! Integration tests for outbound formatting and response accumulation.

mod common;

use agent_cli_session::message::{interrupt_request, new_request_id, user_turn};
use agent_cli_session::{
    assistant_text, final_text_processor, CallbackRegistry, Event, Response, UserMessage,
};
use common::object;
use serde_json::json;
use std::sync::{Arc, Mutex};

#[test]
fn test_format_uses_sender_prefix() {
    assert_eq!(UserMessage::new("hi").format(), "User: hi");
    assert_eq!(UserMessage::new("hi").from_sender("Alice").format(), "Alice: hi");
}

#[test]
fn test_system_sender_wraps_in_envelope() {
    let expected = "<system-message>\nsystem update\n</system-message>";
    assert_eq!(UserMessage::system("system update").format(), expected);
    assert_eq!(
        UserMessage::new("system update").from_sender("SYSTEM").format(),
        expected
    );
}

#[test]
fn test_additional_context_block() {
    let message = UserMessage::new("summarise")
        .with_context("page one")
        .with_context("   ")
        .with_context("page two\n");
    assert_eq!(
        message.format(),
        "User: summarise\n\n<additional-context>\npage one\npage two\n</additional-context>"
    );
}

#[test]
fn test_blank_detection() {
    assert!(UserMessage::default().is_blank());
    assert!(UserMessage::new(" \t\n").is_blank());
    assert!(!UserMessage::new(" x ").is_blank());
}

#[test]
fn test_user_turn_payload_omits_missing_session_id() {
    assert_eq!(
        user_turn("User: hi", None),
        json!({"type": "user", "message": {"role": "user", "content": "User: hi"}})
    );
    assert_eq!(
        user_turn("User: hi", Some("s-1")),
        json!({
            "type": "user",
            "message": {"role": "user", "content": "User: hi"},
            "session_id": "s-1",
        })
    );
}

#[test]
fn test_interrupt_payload_and_request_ids() {
    assert_eq!(
        interrupt_request("req_1"),
        json!({"type": "control_request", "request_id": "req_1", "request": {"subtype": "interrupt"}})
    );
    let a = new_request_id();
    let b = new_request_id();
    assert!(a.starts_with("req_"));
    assert_ne!(a, b);
}

fn assistant(text: &str) -> Arc<Event> {
    Arc::new(Event::wire(object(json!({
        "type": "assistant",
        "message": {"content": [
            {"type": "text", "text": text},
            {"type": "tool_use", "name": "Read"},
        ]},
    }))))
}

#[test]
fn test_assistant_text_reads_text_blocks_only() {
    assert_eq!(assistant_text(&assistant("hello")).as_deref(), Some("hello"));
    let result = Event::wire(object(json!({"type": "result", "result": "x"})));
    assert_eq!(assistant_text(&result), None);
}

#[test]
fn test_response_from_history_starts_after_last_local_user_turn() {
    let history = vec![
        Arc::new(Event::user_turn("q1", "User: q1", "User")),
        assistant("old answer"),
        Arc::new(Event::user_turn("q2", "User: q2", "User")),
        assistant("Hello"),
        Arc::new(Event::wire(object(json!({"type": "user", "message": {"content": [{"type": "tool_result"}]}})))),
        assistant(" World"),
    ];
    let response = Response::from_history(&history);
    assert_eq!(response.final_text(), "Hello World");
    assert_eq!(response.events.len(), 3);
    assert_eq!(response.to_string(), "Hello World");
}

#[test]
fn test_response_chaining() {
    let mut response = Response::new();
    response
        .add_event(Arc::new(Event::local(object(json!({"type": "start"})))))
        .append_text("Hello")
        .append_text(" World")
        .add_event(Arc::new(Event::local(object(json!({"type": "end"})))));
    assert_eq!(response.text, "Hello World");
    assert_eq!(response.events.len(), 2);
}

#[test]
fn test_final_text_processor_drives_named_callback() {
    let registry = CallbackRegistry::new();
    registry.declare_processor("final_answer", final_text_processor());
    let answers = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&answers);
    registry.register("final_answer", move |delivery| {
        if let Some(value) = delivery.derived {
            sink.lock().expect("lock").push(value.clone());
        }
    });

    let events = vec![
        Arc::new(Event::user_turn("q", "User: q", "User")),
        assistant("Hel"),
        Arc::new(Event::wire(object(json!({"type": "result"})))),
        assistant("lo"),
    ];
    let mut history = Vec::new();
    for event in &events {
        history.push(Arc::clone(event));
        registry.dispatch(event, &history);
    }
    assert_eq!(*answers.lock().expect("lock"), vec![json!("Hel"), json!("Hello")]);
}
