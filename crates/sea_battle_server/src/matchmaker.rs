use std::sync::Arc;

use log::{debug, info};
use tokio::sync::mpsc;

use crate::server::{ServerState, UserId};
use crate::session::{self, SessionHandle, SessionSeat};

/// Tries to group the triggering user with other users that are
/// looking for an opponent. Called by the connection task right after
/// it flagged its user as looking. Candidates are whoever currently
/// has the flag set and no session; fairness is not attempted.
pub async fn try_start_session(state: &Arc<ServerState>, trigger: UserId) {
    let cfg = state.config();

    let (session_id, seats, events_tx, events_rx) = {
        let mut users = state.users_mut().await;

        match users.get(&trigger) {
            Some(user) if user.session.is_none() && user.looking_for_session => {}
            _ => return,
        }

        let mut picked = vec![trigger];
        let candidates: Vec<UserId> = users
            .values()
            .filter(|user| {
                user.id != trigger && user.looking_for_session && user.session.is_none()
            })
            .map(|user| user.id)
            .collect();
        for id in candidates {
            if picked.len() >= cfg.min_players_in_session {
                break;
            }
            picked.push(id);
        }

        if picked.len() < cfg.min_players_in_session {
            debug!("User #{trigger} is looking for a new session, nobody else is available yet");
            return;
        }

        let session_id = state.next_session_id();
        let (events_tx, events_rx) = mpsc::channel(cfg.event_queue_size);

        let mut seats = Vec::with_capacity(picked.len());
        for id in &picked {
            if let Some(user) = users.get_mut(id) {
                user.session = Some(session_id);
                user.looking_for_session = false;
                seats.push(SessionSeat {
                    user: *id,
                    name: user.name.clone(),
                    sender: user.sender.clone(),
                });
            }
        }

        (session_id, seats, events_tx, events_rx)
    };

    state
        .register_session(SessionHandle {
            id: session_id,
            events: events_tx,
        })
        .await;

    info!(
        "Matched players {} into session #{session_id}",
        seats
            .iter()
            .map(|seat| format!("'{}'", seat.name))
            .collect::<Vec<_>>()
            .join(", ")
    );

    session::spawn_session_task(state.clone(), session_id, seats, events_rx);
}
