use crate::integration::init_tracing;
use crate::utils::*;
use std::time::Duration;
use tandem_core::utils::LEAVE_GRACE_PERIOD;
use tandem_session::media::SyntheticDevices;
use tandem_session::negotiator::PeerConnectionState;
use tandem_session::{SessionConfig, SessionError, SessionEvent, SessionState};
use tokio::time::Instant;

#[tokio::test]
async fn test_remote_leave_tears_down_then_redirects() {
    init_tracing();
    let test_room = TestRoom::new();
    let ((mut a, _), (mut b, mut b_events)) = connected_pair(&test_room, "abc123").await;
    drain(&mut b_events);
    let b_local = b.local_stream().cloned().unwrap();

    a.leave_call().await.unwrap();
    assert_eq!(a.state(), SessionState::Left);
    assert_eq!(test_room.connector.link(0).sent_tags().last(), Some(&"leave-call"));

    assert!(pump(&mut b).await);
    let left_at = Instant::now();
    assert_eq!(b.state(), SessionState::Leaving);
    assert_eq!(b_local.live_tracks(), 0);
    assert!(b.remote_stream().is_none());
    assert_eq!(b.peer_state(), PeerConnectionState::Closed);
    assert!(test_room.connector.link(1).is_closed());

    run_until_redirect(&mut b, Duration::from_secs(2)).await;
    assert_eq!(b.state(), SessionState::Left);
    assert!(left_at.elapsed() >= TEST_GRACE - Duration::from_millis(5));

    let events = drain(&mut b_events);
    assert_eq!(
        events.first(),
        Some(&SessionEvent::Notice(SessionError::PeerDeparted))
    );
    assert!(events.contains(&SessionEvent::StateChanged(SessionState::Leaving)));
    assert_eq!(
        &events[events.len() - 2..],
        [
            SessionEvent::StateChanged(SessionState::Left),
            SessionEvent::Redirect
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_default_grace_period_is_three_seconds() {
    init_tracing();
    let test_room = TestRoom::new();
    let grace_config = |name: &str| SessionConfig {
        leave_grace_period: LEAVE_GRACE_PERIOD,
        ..config(name)
    };
    let (mut a, _a_events) =
        test_room.participant_with(grace_config("alice"), SyntheticDevices::new());
    let (mut b, _b_events) =
        test_room.participant_with(grace_config("bob"), SyntheticDevices::new());

    a.join(room("abc123")).await.unwrap();
    b.join(room("abc123")).await.unwrap();
    a.start_call().await.unwrap();
    settle(&mut a, &mut b).await;

    a.leave_call().await.unwrap();
    assert!(pump(&mut b).await);
    assert_eq!(b.state(), SessionState::Leaving);
    let left_at = Instant::now();

    run_until_redirect(&mut b, Duration::from_secs(10)).await;
    assert_eq!(b.state(), SessionState::Left);
    assert!(left_at.elapsed() >= Duration::from_secs(3));
    assert!(left_at.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_severed_channel_is_treated_as_departure() {
    init_tracing();
    let test_room = TestRoom::new();
    let ((mut a, mut a_events), (mut b, mut b_events)) =
        connected_pair(&test_room, "abc123").await;
    drain(&mut a_events);
    drain(&mut b_events);
    let b_local = b.local_stream().cloned().unwrap();

    test_room.connector.sever(1);
    assert!(pump(&mut b).await);

    assert_eq!(b.state(), SessionState::Leaving);
    assert_eq!(b_local.live_tracks(), 0);
    assert_eq!(test_room.transports.stats(1).closes(), 1);
    assert_eq!(
        drain(&mut b_events).first(),
        Some(&SessionEvent::Notice(SessionError::ChannelClosedUnexpectedly))
    );

    run_until_redirect(&mut b, Duration::from_secs(2)).await;
    assert_eq!(b.state(), SessionState::Left);

    // The relay does not announce the drop; the other side keeps its call.
    settle_one(&mut a).await;
    assert_eq!(a.state(), SessionState::InCall);
    assert!(drain(&mut a_events).is_empty());
}

#[tokio::test]
async fn test_leave_during_grace_redirects_immediately() {
    init_tracing();
    let test_room = TestRoom::new();
    let ((mut a, _), (mut b, mut b_events)) = connected_pair(&test_room, "abc123").await;

    a.leave_call().await.unwrap();
    assert!(pump(&mut b).await);
    assert_eq!(b.state(), SessionState::Leaving);
    drain(&mut b_events);

    b.leave_call().await.unwrap();
    assert_eq!(b.state(), SessionState::Left);
    assert_eq!(
        drain(&mut b_events),
        [
            SessionEvent::StateChanged(SessionState::Left),
            SessionEvent::Redirect
        ]
    );
    // Nothing is sent after teardown.
    assert_eq!(test_room.connector.link(1).count("leave-call"), 0);
}

#[tokio::test]
async fn test_leave_call_on_idle_session_is_rejected() {
    init_tracing();
    let test_room = TestRoom::new();
    let (mut a, _events) = test_room.participant("alice");

    let result = a.leave_call().await;
    assert!(matches!(result, Err(SessionError::InvalidState { .. })));
    assert_eq!(a.state(), SessionState::Idle);
}
