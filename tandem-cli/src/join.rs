use anyhow::{Result, bail};
use colored::*;
use tandem_core::RoomId;
use tandem_session::media::TrackKind;
use tandem_session::{SessionCommand, SessionConfig, SessionEvent, SessionHandle, SessionState};
use tokio::io::{AsyncBufReadExt, BufReader, stdin};
use tracing::debug;

/// Drives one session from stdin until it redirects or ends.
pub async fn run(config: SessionConfig, room_id: RoomId) -> Result<()> {
    println!(
        "{} {} {}",
        "Joining room".green().bold(),
        room_id.as_str().cyan(),
        format!("via {}", config.relay_url).dimmed()
    );
    println!(
        "{}",
        "Commands: /call /camera /mic /screen /leave, anything else is chat".dimmed()
    );

    let mut handle = SessionHandle::start(config);
    handle.send(SessionCommand::Join(room_id))?;

    let mut lines = BufReader::new(stdin()).lines();
    let mut stdin_open = true;
    let mut state = SessionState::Idle;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        if let Some(cmd) = parse_line(&line) {
                            if handle.send(cmd).is_err() {
                                break;
                            }
                        }
                    }
                    None => {
                        debug!("stdin closed, leaving the call");
                        stdin_open = false;
                        if handle.send(SessionCommand::LeaveCall).is_err() {
                            break;
                        }
                    }
                }
            }

            event = handle.next_event() => {
                let Some(event) = event else { break };
                print_event(&event);
                if let SessionEvent::StateChanged(next) = event {
                    state = next;
                }
                if ends_session(state, &event) {
                    break;
                }
            }
        }
    }

    handle.shutdown().await;
    if matches!(state, SessionState::Idle | SessionState::Joining) {
        bail!("could not join the room");
    }
    Ok(())
}

/// A notice before the session got past joining means the join failed.
fn ends_session(state: SessionState, event: &SessionEvent) -> bool {
    match event {
        SessionEvent::Redirect => true,
        SessionEvent::Notice(_) => matches!(state, SessionState::Idle | SessionState::Joining),
        _ => false,
    }
}

fn parse_line(line: &str) -> Option<SessionCommand> {
    let cmd = match line.trim() {
        "" => return None,
        "/call" => SessionCommand::StartCall,
        "/camera" => SessionCommand::ToggleCamera,
        "/mic" => SessionCommand::ToggleMicrophone,
        "/screen" => SessionCommand::ToggleScreenShare,
        "/leave" => SessionCommand::LeaveCall,
        _ => SessionCommand::SendMessage(line.to_owned()),
    };
    Some(cmd)
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged(state) => {
            println!("{} {}", "state:".dimmed(), state.to_string().yellow());
        }
        SessionEvent::LocalMediaReady { tracks } => {
            println!("{} {} local tracks", "media:".dimmed(), tracks);
        }
        SessionEvent::LocalTrackToggled { kind, enabled } => {
            let what = match kind {
                TrackKind::Video => "camera",
                TrackKind::Audio => "microphone",
            };
            let status = if *enabled { "on".green() } else { "off".red() };
            println!("{} {} {}", "media:".dimmed(), what, status);
        }
        SessionEvent::LocalScreenShare { active } => {
            let status = if *active { "started" } else { "stopped" };
            println!("{} screen share {}", "media:".dimmed(), status);
        }
        SessionEvent::RemoteStreamArrived { tracks } => {
            println!("{} {} remote tracks", "peer:".dimmed(), tracks.to_string().green());
        }
        SessionEvent::RemoteScreenShare { active } => {
            let status = if *active { "started" } else { "stopped" };
            println!("{} remote screen share {}", "peer:".dimmed(), status);
        }
        SessionEvent::ConnectionStateChanged(state) => {
            println!("{} {}", "connection:".dimmed(), state.to_string().cyan());
        }
        SessionEvent::ChatMessage(message) => {
            println!("{} {}", format!("<{}>", message.sender).bold(), message.content);
        }
        SessionEvent::Notice(err) => {
            if err.is_terminal() {
                println!("{} {}", "!".red().bold(), err.to_string().red());
            } else {
                println!("{} {}", "!".yellow().bold(), err);
            }
        }
        SessionEvent::Redirect => {
            println!("{}", "Session over, back to the start.".green().bold());
        }
    }
}
