use crate::integration::init_tracing;
use crate::utils::*;
use std::sync::Arc;
use tandem_core::{RoomId, SignalMessage};
use tandem_session::media::SyntheticDevices;
use tandem_session::negotiator::PeerConnectionState;
use tandem_session::signaling::SignalEvent;
use tandem_session::{
    SessionCommand, SessionCoordinator, SessionError, SessionEvent, SessionHandle, SessionInput,
    SessionState,
};

#[tokio::test]
async fn test_join_then_leave_releases_everything() {
    init_tracing();
    let test_room = TestRoom::new();
    let (mut a, mut events) = test_room.participant("alice");

    a.join(room("abc123")).await.unwrap();
    assert_eq!(a.state(), SessionState::AwaitingPeer);
    let local = a.local_stream().cloned().unwrap();
    assert_eq!(local.live_tracks(), 2);
    assert_eq!(test_room.relay.rooms().occupancy(&room("abc123")), 1);

    a.leave_call().await.unwrap();
    assert_eq!(a.state(), SessionState::Left);
    assert_eq!(local.live_tracks(), 0);
    assert!(a.local_stream().is_none());
    assert_eq!(a.peer_state(), PeerConnectionState::Closed);
    assert_eq!(test_room.transports.stats(0).closes(), 1);

    let link = test_room.connector.link(0);
    assert_eq!(link.sent_tags(), ["join-room", "leave-call"]);
    assert!(link.is_closed());
    assert_eq!(test_room.relay.rooms().occupancy(&room("abc123")), 0);

    a.cleanup().await;
    a.cleanup().await;
    assert_eq!(test_room.transports.stats(0).closes(), 1);

    let events = drain(&mut events);
    assert_eq!(
        events.first(),
        Some(&SessionEvent::StateChanged(SessionState::Joining))
    );
    assert!(events.contains(&SessionEvent::LocalMediaReady { tracks: 2 }));
    assert_eq!(events.last(), Some(&SessionEvent::Redirect));
}

#[tokio::test]
async fn test_join_sends_identity_with_join_room() {
    init_tracing();
    let test_room = TestRoom::new();
    let (mut a, _events) = test_room.participant("alice");

    a.join(room("abc123")).await.unwrap();

    let sent = test_room.connector.link(0).sent();
    let SignalMessage::JoinRoom { room_id, identity } = &sent[0] else {
        panic!("expected join-room, got {:?}", sent[0]);
    };
    assert_eq!(room_id.as_str(), "abc123");
    assert_eq!(identity.as_ref().map(|i| i.name.as_str()), Some("alice"));
}

#[tokio::test]
async fn test_second_join_is_rejected() {
    init_tracing();
    let test_room = TestRoom::new();
    let (mut a, _events) = test_room.participant("alice");

    a.join(room("abc123")).await.unwrap();
    let result = a.join(room("other")).await;
    assert!(matches!(result, Err(SessionError::InvalidState { .. })));
    assert_eq!(a.room_id(), Some(&room("abc123")));
    assert_eq!(test_room.connector.connections(), 1);
}

#[tokio::test]
async fn test_media_denied_leaves_session_unjoined() {
    init_tracing();
    let test_room = TestRoom::new();
    let (mut a, mut events) =
        test_room.participant_with(config("alice"), SyntheticDevices::new().deny_camera());

    let result = a.join(room("abc123")).await;
    assert!(matches!(result, Err(SessionError::MediaAccessDenied(_))));
    assert_eq!(a.state(), SessionState::Idle);
    assert!(a.room_id().is_none());
    assert_eq!(test_room.transports.created(), 0);

    // The relay connection opened concurrently is released again.
    assert!(test_room.connector.link(0).is_closed());
    assert_eq!(test_room.relay.rooms().occupancy(&room("abc123")), 0);

    let states: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(states, [SessionState::Joining, SessionState::Idle]);
}

#[tokio::test]
async fn test_unreachable_relay_releases_media() {
    init_tracing();
    let transports = Arc::new(SimTransportFactory::new());
    let (mut a, _events) = SessionCoordinator::new(
        config("alice"),
        Arc::new(SyntheticDevices::new()),
        transports.clone(),
        Arc::new(UnreachableConnector),
    );

    let result = a.join(room("abc123")).await;
    assert!(matches!(result, Err(SessionError::Signaling(_))));
    assert_eq!(a.state(), SessionState::Idle);
    assert!(a.local_stream().is_none());
    assert_eq!(transports.created(), 0);
}

#[tokio::test]
async fn test_third_participant_gets_room_busy() {
    init_tracing();
    let test_room = TestRoom::new();
    let (mut a, _a_events) = test_room.participant("alice");
    let (mut b, mut b_events) = test_room.participant("bob");
    let (mut c, mut c_events) = test_room.participant("carol");

    a.join(room("abc123")).await.unwrap();
    b.join(room("abc123")).await.unwrap();
    settle(&mut a, &mut b).await;
    assert!(
        !drain(&mut b_events)
            .iter()
            .any(|e| *e == SessionEvent::Notice(SessionError::RoomBusy))
    );

    c.join(room("abc123")).await.unwrap();
    let local = c.local_stream().cloned().unwrap();
    settle_one(&mut c).await;

    assert_eq!(c.state(), SessionState::Left);
    assert_eq!(local.live_tracks(), 0);
    assert_ne!(c.peer_state(), PeerConnectionState::Connected);
    assert_eq!(test_room.transports.stats(2).closes(), 1);

    let events = drain(&mut c_events);
    let busy = events
        .iter()
        .position(|e| *e == SessionEvent::Notice(SessionError::RoomBusy))
        .expect("room-busy notice");
    let redirect = events
        .iter()
        .position(|e| *e == SessionEvent::Redirect)
        .expect("redirect");
    assert!(busy < redirect);

    settle(&mut a, &mut b).await;
    assert_eq!(a.state(), SessionState::AwaitingPeer);
    assert_eq!(b.state(), SessionState::AwaitingPeer);
    assert_eq!(test_room.relay.rooms().occupancy(&room("abc123")), 2);
}

#[tokio::test]
async fn test_messages_for_other_rooms_are_ignored() {
    init_tracing();
    let test_room = TestRoom::new();
    let (mut a, mut events) = test_room.participant("alice");
    a.join(room("abc123")).await.unwrap();
    drain(&mut events);

    let foreign = SignalMessage::LeaveCall {
        room_id: RoomId::new("elsewhere").unwrap(),
    };
    a.dispatch(SessionInput::Signal(SignalEvent::Message(foreign)))
        .await;

    assert_eq!(a.state(), SessionState::AwaitingPeer);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_commands_before_join_are_reported() {
    init_tracing();
    let test_room = TestRoom::new();
    let (mut a, mut events) = test_room.participant("alice");

    a.handle_command(SessionCommand::StartCall).await;
    a.handle_command(SessionCommand::ToggleCamera).await;

    let notices: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Notice(SessionError::InvalidState { .. })))
        .collect();
    assert_eq!(notices.len(), 2);
    assert_eq!(a.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_handle_runs_session_to_completion() {
    init_tracing();
    let test_room = TestRoom::new();
    let (coordinator, events) = test_room.participant("alice");
    let mut handle = SessionHandle::spawn(coordinator, events);

    handle.send(SessionCommand::Join(room("abc123"))).unwrap();
    let ready = handle
        .wait_for(|e| matches!(e, SessionEvent::LocalMediaReady { .. }))
        .await;
    assert_eq!(ready, Some(SessionEvent::LocalMediaReady { tracks: 2 }));

    handle.send(SessionCommand::SendMessage("hello".to_owned())).unwrap();
    handle.send(SessionCommand::LeaveCall).unwrap();
    assert_eq!(
        handle.wait_for(|e| *e == SessionEvent::Redirect).await,
        Some(SessionEvent::Redirect)
    );
    assert_eq!(handle.next_event().await, None);

    assert_eq!(
        test_room.connector.link(0).sent_tags(),
        ["join-room", "send-message", "leave-call"]
    );
}

#[tokio::test]
async fn test_dropping_handle_cleans_up() {
    init_tracing();
    let test_room = TestRoom::new();
    let (coordinator, events) = test_room.participant("alice");
    let mut handle = SessionHandle::spawn(coordinator, events);

    handle.send(SessionCommand::Join(room("abc123"))).unwrap();
    handle
        .wait_for(|e| *e == SessionEvent::StateChanged(SessionState::AwaitingPeer))
        .await
        .unwrap();

    handle.shutdown().await;
    assert_eq!(test_room.transports.stats(0).closes(), 1);
    assert!(test_room.connector.link(0).is_closed());
    assert_eq!(test_room.relay.rooms().occupancy(&room("abc123")), 0);
}

#[tokio::test]
async fn test_with_defaults_builds_an_idle_session() {
    let (session, _events) = SessionCoordinator::with_defaults(config("alice"));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.peer_state(), PeerConnectionState::New);
    assert!(session.remote_stream().is_none());
}

#[tokio::test]
async fn test_dropped_session_closes_peer_connection() {
    init_tracing();
    let test_room = TestRoom::new();
    let (mut a, _a_events) = test_room.participant("alice");
    a.join(room("abc123")).await.unwrap();
    assert_eq!(test_room.transports.stats(0).closes(), 0);

    drop(a);
    assert!(test_room.connector.link(0).is_closed());

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(test_room.transports.stats(0).closes(), 1);
}
