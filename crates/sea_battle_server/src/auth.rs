use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use sea_battle_common::packet::{ConnectionStatus, ErrorCode, Packet};

use crate::connection::Connection;
use crate::server::{ServerState, UserId};

#[derive(Debug)]
pub enum AuthOutcome {
    Authorized(UserId),
    Rejected,
}

/// Drives the per-connection handshake: INITIAL (waiting for
/// USERNAME_AND_ID), VALIDATING (name length, uniqueness, black list),
/// then either AUTHORIZING (stored user, password challenge) or
/// REGISTERING (fresh user, first password is stored). Every failure
/// path sends its reply, removes the user from the registry again if
/// it was already inserted, and closes the connection.
pub async fn authenticate<T>(conn: &mut Connection<T>, state: &Arc<ServerState>) -> AuthOutcome
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (name, uid) = match conn.get().await {
        Packet::UsernameAndId { name, uid } => (name, uid),
        other => {
            warn!(
                "Expected USERNAME_AND_ID from {}, got {:?}",
                conn.ip(),
                other.code()
            );
            conn.disconnect().await;
            return AuthOutcome::Rejected;
        }
    };

    let cfg = state.config();
    if name.chars().count() > cfg.max_user_name_length {
        warn!(
            "Username from {} exceeds the maximum length of {} characters",
            conn.ip(),
            cfg.max_user_name_length
        );
        conn.send(Packet::error(ErrorCode::NameTooLong));
        conn.disconnect().await;
        return AuthOutcome::Rejected;
    }
    if state.user_by_name(&name).await.is_some() {
        warn!("A user with the name '{name}' already exists");
        conn.send(Packet::error(ErrorCode::NameAlreadyInUse));
        conn.disconnect().await;
        return AuthOutcome::Rejected;
    }
    if state.store().blacklist_contains(&name, &uid) {
        warn!("Rejecting user '{name}' because they are on the black list");
        conn.send(Packet::Status(ConnectionStatus::Banned));
        conn.disconnect().await;
        return AuthOutcome::Rejected;
    }

    let user_id = state
        .register_user(&name, &uid, conn.ip(), conn.sender())
        .await;
    conn.send(Packet::Status(ConnectionStatus::Connected));
    info!("New user '{}' connected from {}", name, conn.ip());

    let authorized = match state.store().find(&name) {
        Some(record) if record.last_login_id == uid => {
            info!("User '{name}' is already logged in on this machine");
            conn.send(Packet::Ok);
            true
        }
        Some(record) => authorize(conn, state, &name, &uid, &record.password).await,
        None => register(conn, state, &name, &uid).await,
    };

    if !authorized {
        state.remove_user(user_id).await;
        conn.disconnect().await;
        return AuthOutcome::Rejected;
    }

    state.mark_authorized(user_id).await;
    AuthOutcome::Authorized(user_id)
}

/// Password challenge for a stored user. Any non-PASSWORD packet or an
/// exhausted attempt budget ends the handshake.
async fn authorize<T>(
    conn: &mut Connection<T>,
    state: &Arc<ServerState>,
    name: &str,
    uid: &str,
    stored_password: &str,
) -> bool
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    conn.send(Packet::Status(ConnectionStatus::AuthorizationRequired));

    let mut attempts = state.config().login_attempts;
    while attempts > 0 {
        match conn.get().await {
            Packet::Password { password } => {
                if password == stored_password {
                    state.store().update_login(name, uid);
                    info!("User '{name}' has successfully logged in");
                    conn.send(Packet::Ok);
                    return true;
                }
                conn.send(Packet::error(ErrorCode::UncorrectPacket));
                attempts -= 1;
            }
            _ => return false,
        }
    }
    false
}

/// Fresh user: the first PASSWORD packet becomes the stored password.
async fn register<T>(
    conn: &mut Connection<T>,
    state: &Arc<ServerState>,
    name: &str,
    uid: &str,
) -> bool
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    conn.send(Packet::Status(ConnectionStatus::RegisterRequired));

    match conn.get().await {
        Packet::Password { password } => {
            state.store().add(name, uid, &password);
            info!("User '{name}' has successfully signed up");
            conn.send(Packet::Ok);
            true
        }
        _ => false,
    }
}
