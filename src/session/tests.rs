//! Controller tests against the in-memory transport.
//!
//! Timer tests run on a paused clock: awaiting `pump()` lets tokio jump
//! straight to the next timer deadline.

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use super::*;
use crate::reconnect::FixedDelay;
use crate::transport::mock::MockFactory;
use crate::transport::{TransportError, TransportEvent};

const URL: &str = "ws://backend.test/ws/chat";

fn controller() -> (SessionController<MockFactory>, MockFactory) {
    let factory = MockFactory::new();
    let controller = SessionController::new(URL, factory.clone(), FixedDelay::default());
    (controller, factory)
}

/// Controller whose first attempt (mock index 0) has opened.
fn open_controller() -> (SessionController<MockFactory>, MockFactory) {
    let (mut controller, factory) = controller();
    controller.connect();
    factory.emit(0, TransportEvent::Opened);
    controller.try_pump();
    assert!(controller.state().is_open());
    (controller, factory)
}

fn events(controller: &SessionController<MockFactory>) -> Vec<SessionEvent> {
    controller.log().iter().map(|e| e.event.clone()).collect()
}

fn user(text: &str) -> SessionEvent {
    SessionEvent::UserInput {
        text: text.to_string(),
    }
}

fn closed(code: u16) -> TransportEvent {
    TransportEvent::Closed {
        code,
        reason: "gone".to_string(),
    }
}

/// Pump with a generous bound so a hung test fails instead of stalling.
async fn pump_one(controller: &mut SessionController<MockFactory>) -> bool {
    tokio::time::timeout(Duration::from_secs(60), controller.pump())
        .await
        .expect("no input arrived")
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_new_controller_is_idle_without_transport() {
    let (controller, factory) = controller();
    assert_eq!(controller.state(), ConnectionState::Idle);
    assert!(controller.log().is_empty());
    assert_eq!(factory.opens(), 0);
    assert_eq!(controller.endpoint(), URL);
}

#[tokio::test]
async fn test_connect_opens_one_attempt() {
    let (mut controller, factory) = controller();
    controller.connect();
    controller.connect();

    assert_eq!(factory.opens(), 1);
    assert_eq!(factory.url(0), URL);
    assert_eq!(controller.state(), ConnectionState::Connecting { attempt: 1 });
}

#[tokio::test]
async fn test_opened_moves_to_open() {
    let (controller, _factory) = open_controller();
    assert_eq!(controller.state(), ConnectionState::Open { attempt: 1 });
    assert!(controller.log().is_empty());
}

// =============================================================================
// Submit
// =============================================================================

#[tokio::test]
async fn test_blank_submit_has_no_effect() {
    let (mut controller, factory) = open_controller();

    assert_eq!(controller.submit(""), SubmitOutcome::Empty);
    assert_eq!(controller.submit("   "), SubmitOutcome::Empty);
    assert_eq!(controller.submit("\n\t"), SubmitOutcome::Empty);

    assert!(controller.log().is_empty());
    assert_eq!(factory.total_sent(), 0);
}

#[tokio::test]
async fn test_submit_while_open_records_then_sends_once() {
    let (mut controller, factory) = open_controller();

    let outcome = controller.submit("hi");

    assert!(outcome.is_sent());
    assert_eq!(events(&controller), vec![user("hi")]);
    assert_eq!(factory.sent(0), vec![r#"{"message":"hi"}"#.to_string()]);
}

#[tokio::test]
async fn test_submit_keeps_text_untrimmed() {
    let (mut controller, factory) = open_controller();
    controller.submit("  hi ");
    assert_eq!(events(&controller), vec![user("  hi ")]);
    assert_eq!(factory.sent(0), vec![r#"{"message":"  hi "}"#.to_string()]);
}

#[tokio::test]
async fn test_submit_while_connecting_records_and_rejects() {
    let (mut controller, factory) = controller();
    controller.connect();

    assert_eq!(controller.submit("hi"), SubmitOutcome::NotConnected);

    let log = events(&controller);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], user("hi"));
    assert_eq!(log[1].severity(), Some(Severity::Error));
    assert_eq!(factory.total_sent(), 0);
}

#[tokio::test]
async fn test_submit_is_not_queued_for_later_delivery() {
    let (mut controller, factory) = controller();
    controller.connect();
    controller.submit("early");

    factory.emit(0, TransportEvent::Opened);
    controller.try_pump();

    assert!(controller.state().is_open());
    assert_eq!(factory.total_sent(), 0);
}

#[tokio::test]
async fn test_submit_while_idle_is_rejected() {
    let (mut controller, factory) = controller();
    assert_eq!(controller.submit("hi"), SubmitOutcome::NotConnected);
    assert_eq!(controller.log().len(), 2);
    assert_eq!(factory.opens(), 0);
}

#[tokio::test]
async fn test_submit_while_closed_records_and_rejects() {
    let (mut controller, factory) = open_controller();
    factory.emit(0, closed(1006));
    controller.try_pump();
    let before = controller.log().len();

    assert_eq!(controller.submit("hi"), SubmitOutcome::NotConnected);

    let log = events(&controller);
    assert_eq!(log.len(), before + 2);
    assert_eq!(log[before], user("hi"));
    assert_eq!(log[before + 1].severity(), Some(Severity::Error));
    assert_eq!(factory.total_sent(), 0);
}

#[tokio::test]
async fn test_send_failure_is_reported_not_retried() {
    let (mut controller, factory) = open_controller();
    factory.fail_sends("buffer full");

    let outcome = controller.submit("hi");

    assert_eq!(
        outcome,
        SubmitOutcome::SendFailed(TransportError::SendFailed("buffer full".to_string()))
    );
    let log = events(&controller);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], user("hi"));
    assert_eq!(
        log[1],
        SessionEvent::error("Message not sent: send failed: buffer full")
    );
    assert!(controller.state().is_open());
}

// =============================================================================
// Inbound frames
// =============================================================================

#[tokio::test]
async fn test_inbound_frames_are_logged_in_arrival_order() {
    let (mut controller, factory) = open_controller();
    let frames = [
        r#"{"type":"tool_call","tool":"add","arguments":{"a":1,"b":2}}"#,
        r#"{"type":"tool_result","tool":"add","result":"3"}"#,
        r#"{"type":"response","content":"1 + 2 = 3"}"#,
        r#"{"type":"tool_result","tool":"add","result":"3"}"#,
        r#"{"type":"error","content":"rate limited"}"#,
    ];
    for frame in frames {
        factory.emit(0, TransportEvent::Message(frame.to_string()));
    }
    assert_eq!(controller.try_pump(), frames.len());

    assert_eq!(
        events(&controller),
        vec![
            SessionEvent::ToolCall {
                tool_name: "add".to_string(),
                arguments: json!({"a": 1, "b": 2}),
            },
            SessionEvent::ToolResult {
                tool_name: "add".to_string(),
                result: "3".to_string(),
            },
            SessionEvent::AssistantMessage {
                text: "1 + 2 = 3".to_string(),
            },
            SessionEvent::ToolResult {
                tool_name: "add".to_string(),
                result: "3".to_string(),
            },
            SessionEvent::error("Error: rate limited"),
        ]
    );
}

#[tokio::test]
async fn test_tool_result_without_call_is_kept() {
    let (mut controller, factory) = open_controller();
    factory.emit(
        0,
        TransportEvent::Message(r#"{"type":"tool_result","tool":"ls","result":"a b"}"#.to_string()),
    );
    controller.try_pump();
    assert_eq!(controller.log().len(), 1);
}

#[tokio::test]
async fn test_unknown_frame_yields_one_warning_and_keeps_state() {
    let (mut controller, factory) = open_controller();
    factory.emit(0, TransportEvent::Message(r#"{"type":"ping"}"#.to_string()));
    controller.try_pump();

    let log = events(&controller);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].severity(), Some(Severity::Warning));
    assert_eq!(controller.state(), ConnectionState::Open { attempt: 1 });
    assert_eq!(factory.close_calls(0), 0);
}

#[tokio::test]
async fn test_malformed_frame_yields_warning_and_keeps_state() {
    let (mut controller, factory) = open_controller();
    factory.emit(0, TransportEvent::Message("{oops".to_string()));
    controller.try_pump();

    assert_eq!(controller.log().len(), 1);
    assert_eq!(controller.log()[0].event.severity(), Some(Severity::Warning));
    assert!(controller.state().is_open());
}

#[tokio::test]
async fn test_transport_error_event_adds_no_entry() {
    let (mut controller, factory) = open_controller();
    factory.emit(0, TransportEvent::Error("reset by peer".to_string()));
    controller.try_pump();
    assert!(controller.log().is_empty());
    assert!(controller.state().is_open());
}

#[tokio::test]
async fn test_write_failure_after_send_flags_possible_loss() {
    let (mut controller, factory) = open_controller();
    assert_eq!(controller.submit("hi"), SubmitOutcome::Sent);

    factory.emit(0, TransportEvent::Error("broken pipe".to_string()));
    factory.emit(0, closed(1006));
    controller.try_pump();

    let log = controller.log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].event.severity(), Some(Severity::Warning));
    assert!(log[1]
        .event
        .to_string()
        .contains("the last message may not have been delivered"));
}

#[tokio::test]
async fn test_error_after_reply_is_a_plain_disconnect() {
    let (mut controller, factory) = open_controller();
    controller.submit("hi");
    factory.emit(
        0,
        TransportEvent::Message(r#"{"type":"response","content":"hello"}"#.to_string()),
    );
    factory.emit(0, TransportEvent::Error("reset by peer".to_string()));
    factory.emit(0, closed(1006));
    controller.try_pump();

    let notice = controller.log().last().unwrap().event.to_string();
    assert!(notice.contains("reconnecting"));
    assert!(!notice.contains("may not have been delivered"));
}

// =============================================================================
// Reconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_close_arms_one_timer_and_reopens_after_delay() {
    let (mut controller, factory) = open_controller();
    controller.submit("before");

    factory.emit(0, closed(1006));
    let closed_at = Instant::now();
    controller.try_pump();

    assert_eq!(controller.state(), ConnectionState::Closed { will_retry: true });
    let notices: Vec<_> = controller
        .log()
        .iter()
        .filter(|e| e.event.severity() == Some(Severity::Warning))
        .collect();
    assert_eq!(notices.len(), 1);
    assert_eq!(factory.opens(), 1);

    assert!(pump_one(&mut controller).await);

    assert!(closed_at.elapsed() >= Duration::from_millis(3000));
    assert_eq!(factory.opens(), 2);
    assert_eq!(factory.url(1), URL);
    assert_eq!(controller.state(), ConnectionState::Connecting { attempt: 2 });
    // Reconnecting never clears the log.
    assert_eq!(controller.log()[0].event, user("before"));
}

#[tokio::test(start_paused = true)]
async fn test_nothing_reopens_before_delay() {
    let (mut controller, factory) = open_controller();
    factory.emit(0, closed(1000));
    controller.try_pump();

    tokio::time::advance(Duration::from_millis(2999)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    controller.try_pump();
    assert_eq!(factory.opens(), 1);

    assert!(pump_one(&mut controller).await);
    assert_eq!(factory.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_open_retries_steadily() {
    let (mut controller, factory) = controller();
    controller.connect();

    for attempt in 0..3 {
        factory.emit(attempt, closed(1006));
        controller.try_pump();
        assert_eq!(controller.state(), ConnectionState::Closed { will_retry: true });
        assert!(pump_one(&mut controller).await);
    }

    assert_eq!(factory.opens(), 4);
    let disconnects = controller
        .log()
        .iter()
        .filter(|e| e.event.severity() == Some(Severity::Warning))
        .count();
    assert_eq!(disconnects, 3);
}

#[tokio::test(start_paused = true)]
async fn test_events_from_replaced_attempt_are_ignored() {
    let (mut controller, factory) = open_controller();
    factory.emit(0, closed(1006));
    controller.try_pump();
    assert!(pump_one(&mut controller).await);
    factory.emit(1, TransportEvent::Opened);
    controller.try_pump();
    let before = controller.log().len();

    factory.emit(0, TransportEvent::Message(r#"{"type":"response","content":"late"}"#.to_string()));
    factory.emit(0, closed(1006));
    controller.try_pump();

    assert_eq!(controller.log().len(), before);
    assert_eq!(controller.state(), ConnectionState::Open { attempt: 2 });
}

#[tokio::test(start_paused = true)]
async fn test_bounded_policy_stops_and_connect_restarts() {
    let factory = MockFactory::new();
    let policy = FixedDelay::new(Duration::from_millis(100)).with_max_attempts(1);
    let mut controller = SessionController::new(URL, factory.clone(), policy);
    controller.connect();

    factory.emit(0, closed(1006));
    controller.try_pump();
    assert!(pump_one(&mut controller).await);
    assert_eq!(factory.opens(), 2);

    factory.emit(1, closed(1006));
    controller.try_pump();
    assert_eq!(controller.state(), ConnectionState::Closed { will_retry: false });
    assert_eq!(
        controller.log().last().map(|e| e.event.clone()),
        Some(SessionEvent::error("Reconnection stopped after 2 failed attempts"))
    );

    tokio::time::sleep(Duration::from_secs(10)).await;
    controller.try_pump();
    assert_eq!(factory.opens(), 2);

    controller.connect();
    assert_eq!(factory.opens(), 3);
    assert_eq!(controller.state(), ConnectionState::Connecting { attempt: 3 });
}

#[tokio::test(start_paused = true)]
async fn test_manual_connect_while_retrying_cancels_timer() {
    let (mut controller, factory) = open_controller();
    factory.emit(0, closed(1006));
    controller.try_pump();

    controller.connect();
    assert_eq!(factory.opens(), 2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    controller.try_pump();
    assert_eq!(factory.opens(), 2);
    assert_eq!(controller.state(), ConnectionState::Connecting { attempt: 2 });
}

// =============================================================================
// Dispose
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_dispose_cancels_pending_reconnect() {
    let (mut controller, factory) = open_controller();
    factory.emit(0, closed(1006));
    controller.try_pump();
    let before = controller.log().len();

    controller.dispose();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(!controller.pump().await);
    assert_eq!(controller.try_pump(), 0);
    assert_eq!(factory.opens(), 1);
    assert_eq!(controller.log().len(), before);
    assert_eq!(controller.state(), ConnectionState::Disposed);
}

#[tokio::test]
async fn test_dispose_closes_transport_mid_open() {
    let (mut controller, factory) = controller();
    controller.connect();

    controller.dispose();
    assert_eq!(factory.close_calls(0), 1);

    // The attempt settles after dispose; nothing reacts.
    assert!(!factory.try_emit(0, TransportEvent::Opened));
    assert_eq!(controller.try_pump(), 0);
    assert_eq!(controller.state(), ConnectionState::Disposed);
    assert!(controller.log().is_empty());
}

#[tokio::test]
async fn test_dispose_is_idempotent() {
    let (mut controller, factory) = open_controller();
    controller.submit("hi");

    controller.dispose();
    let state = controller.state();
    let log_len = controller.log().len();
    controller.dispose();

    assert_eq!(controller.state(), state);
    assert_eq!(controller.log().len(), log_len);
    assert_eq!(factory.close_calls(0), 1);
}

#[tokio::test]
async fn test_calls_after_dispose_are_inert() {
    let (mut controller, factory) = open_controller();
    controller.submit("hi");
    controller.dispose();

    assert_eq!(controller.submit("again"), SubmitOutcome::Disposed);
    controller.clear();
    controller.connect();

    let disposed = SessionEvent::error("Session disposed; message was not sent");
    assert_eq!(events(&controller), vec![user("hi"), disposed]);
    assert_eq!(factory.opens(), 1);
    assert_eq!(factory.total_sent(), 1);
}

#[tokio::test]
async fn test_submit_after_dispose_notifies_subscribers() {
    let (mut controller, _factory) = open_controller();
    let mut updates = controller.subscribe();
    controller.dispose();
    updates.drain();

    assert_eq!(controller.submit("late"), SubmitOutcome::Disposed);
    assert_eq!(controller.submit("   "), SubmitOutcome::Disposed);

    let appended: Vec<SessionEvent> = updates
        .drain()
        .into_iter()
        .filter_map(|u| match u {
            SessionUpdate::Appended(entry) => Some(entry.event),
            _ => None,
        })
        .collect();
    assert_eq!(appended.len(), 2);
    assert!(appended.iter().all(|e| e.severity() == Some(Severity::Error)));
}

// =============================================================================
// Clear and subscriptions
// =============================================================================

#[tokio::test]
async fn test_clear_empties_log_and_keeps_connection() {
    let (mut controller, factory) = open_controller();
    controller.submit("hi");
    controller.clear();

    assert!(controller.log().is_empty());
    assert!(controller.state().is_open());
    assert_eq!(factory.total_sent(), 1);

    controller.submit("again");
    assert_eq!(events(&controller), vec![user("again")]);
}

#[tokio::test]
async fn test_subscriber_sees_appends_clears_and_state() {
    let (mut controller, factory) = controller();
    let mut updates = controller.subscribe();

    controller.connect();
    factory.emit(0, TransportEvent::Opened);
    controller.try_pump();
    controller.submit("hi");
    controller.clear();

    let received = updates.drain();
    assert_eq!(received.len(), 4);
    assert_eq!(
        received[0],
        SessionUpdate::StateChanged(ConnectionState::Connecting { attempt: 1 })
    );
    assert_eq!(
        received[1],
        SessionUpdate::StateChanged(ConnectionState::Open { attempt: 1 })
    );
    match &received[2] {
        SessionUpdate::Appended(entry) => assert_eq!(entry.event, user("hi")),
        other => panic!("expected append, got {other:?}"),
    }
    assert_eq!(received[3], SessionUpdate::Cleared);
}

#[tokio::test]
async fn test_late_subscriber_gets_no_replay() {
    let (mut controller, _factory) = open_controller();
    controller.submit("first");

    let mut late = controller.subscribe();
    assert!(late.try_recv().is_none());
    assert_eq!(controller.log().len(), 1);

    controller.submit("second");
    match late.try_recv() {
        Some(SessionUpdate::Appended(entry)) => assert_eq!(entry.event, user("second")),
        other => panic!("expected append, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsubscribe_leaves_others_and_session_alone() {
    let (mut controller, _factory) = open_controller();
    let mut a = controller.subscribe();
    let mut b = controller.subscribe();

    assert!(controller.unsubscribe(a.id()));
    controller.submit("hi");

    assert!(a.try_recv().is_none());
    assert_eq!(b.drain().len(), 1);
    assert_eq!(controller.log().len(), 1);
    assert!(controller.state().is_open());
}

#[tokio::test]
async fn test_dispose_notifies_state_once() {
    let (mut controller, _factory) = open_controller();
    let mut updates = controller.subscribe();

    controller.dispose();
    controller.dispose();

    assert_eq!(
        updates.drain(),
        vec![SessionUpdate::StateChanged(ConnectionState::Disposed)]
    );
}

#[tokio::test]
async fn test_log_sequence_survives_clear() {
    let (mut controller, _factory) = open_controller();
    controller.submit("a");
    controller.submit("b");
    controller.clear();
    controller.submit("c");
    assert_eq!(controller.log()[0].seq, 2);
}
