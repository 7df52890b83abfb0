use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{RwLock, RwLockWriteGuard};

use sea_battle_common::packet::{ConnectionStatus, ErrorCode, Packet};

use crate::auth::{authenticate, AuthOutcome};
use crate::config_provider::{ConfigProvider, ServerConfig};
use crate::connection::{Connection, PacketSender};
use crate::matchmaker;
use crate::session::{SessionEvent, SessionHandle, SessionId};
use crate::store::UserStore;

pub type UserId = u64;

/// Registry entry for one connected client. Sessions refer to users by
/// id and resolve them here, so there are no ownership cycles between
/// the two.
#[derive(Debug)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub uid: String,
    pub ip: IpAddr,
    pub authorized: bool,
    pub looking_for_session: bool,
    pub session: Option<SessionId>,
    pub sender: PacketSender,
}

/// State shared by the accept loop, the connection tasks and the
/// session tasks. The two registries are the only cross-task maps;
/// they are never both locked at the same time.
pub struct ServerState {
    cfg: Arc<ServerConfig>,
    store: Arc<dyn UserStore>,
    users: RwLock<HashMap<UserId, User>>,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    next_user_id: AtomicU64,
    next_session_id: AtomicU64,
}

impl ServerState {
    pub fn new(cfg: Arc<ServerConfig>, store: Arc<dyn UserStore>) -> Arc<ServerState> {
        Arc::new(ServerState {
            cfg,
            store,
            users: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            next_user_id: AtomicU64::new(0),
            next_session_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.cfg.clone()
    }

    pub fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn user_by_name(&self, name: &str) -> Option<UserId> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.name.eq_ignore_ascii_case(name))
            .map(|user| user.id)
    }

    pub async fn register_user(
        &self,
        name: &str,
        uid: &str,
        ip: IpAddr,
        sender: PacketSender,
    ) -> UserId {
        let id = self.next_user_id.fetch_add(1, Ordering::Relaxed);
        self.users.write().await.insert(
            id,
            User {
                id,
                name: name.to_string(),
                uid: uid.to_string(),
                ip,
                authorized: false,
                looking_for_session: false,
                session: None,
                sender,
            },
        );
        id
    }

    pub async fn remove_user(&self, id: UserId) -> Option<User> {
        self.users.write().await.remove(&id)
    }

    pub async fn mark_authorized(&self, id: UserId) {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.authorized = true;
        }
    }

    /// Flips the looking-for-session flag and reports the previous
    /// value, or None for an unknown user.
    pub async fn set_looking(&self, id: UserId, looking: bool) -> Option<bool> {
        self.users.write().await.get_mut(&id).map(|user| {
            let previous = user.looking_for_session;
            user.looking_for_session = looking;
            previous
        })
    }

    pub async fn user_session(&self, id: UserId) -> Option<SessionId> {
        self.users.read().await.get(&id).and_then(|user| user.session)
    }

    pub async fn user_identity(&self, id: UserId) -> Option<(String, String)> {
        self.users
            .read()
            .await
            .get(&id)
            .map(|user| (user.name.clone(), user.uid.clone()))
    }

    pub async fn users_mut(&self) -> RwLockWriteGuard<'_, HashMap<UserId, User>> {
        self.users.write().await
    }

    pub fn next_session_id(&self) -> SessionId {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn register_session(&self, handle: SessionHandle) {
        self.sessions.write().await.insert(handle.id, handle);
    }

    pub async fn session_events(
        &self,
        id: SessionId,
    ) -> Option<tokio::sync::mpsc::Sender<SessionEvent>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|handle| handle.events.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops a finished session from the registry and detaches its
    /// players.
    pub async fn clear_session(&self, id: SessionId, players: &[UserId]) {
        self.sessions.write().await.remove(&id);

        let mut users = self.users.write().await;
        for player in players {
            if let Some(user) = users.get_mut(player) {
                if user.session == Some(id) {
                    user.session = None;
                }
            }
        }
    }

    async fn stop_all_sessions(&self) {
        let handles: Vec<_> = self.sessions.read().await.values().cloned().collect();
        for handle in handles {
            let _ = handle.events.send(SessionEvent::Stop).await;
        }
    }

    async fn disconnect_all_users(&self) {
        let users = self.users.read().await;
        for user in users.values() {
            user.sender.send(Packet::Status(ConnectionStatus::Disconnected));
            user.sender.close();
        }
    }
}

pub fn spawn_server_task(
    cfg: Arc<dyn ConfigProvider + Send + Sync>,
    store: Arc<dyn UserStore>,
) -> TaskControl {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(server_task(cfg, store, rx));
    TaskControl::new(tx, handle)
}

pub async fn server_task(
    cfg: Arc<dyn ConfigProvider + Send + Sync>,
    store: Arc<dyn UserStore>,
    mut stop: tokio::sync::oneshot::Receiver<()>,
) {
    let cfg = cfg.server_config();
    let state = ServerState::new(cfg.clone(), store);

    let listener = match bind_listener(&cfg).await {
        Some(listener) => listener,
        None => {
            error!("Failed to initialize the server, giving up");
            return;
        }
    };

    info!("The server has been initialized successfully");
    match listener.local_addr() {
        Ok(addr) => info!("Server is running at {addr}"),
        Err(e) => warn!("Unable to read the listener address: {e}"),
    }

    loop {
        tokio::select! {
            _ = &mut stop => break,
            accepted = listener.accept() => match accepted {
                Ok((socket, addr)) => {
                    debug!("Connection request from {addr}");
                    tokio::spawn(user_task(state.clone(), socket, addr.ip()));
                }
                Err(e) => warn!("An error occurred while accepting a connection: {e}"),
            },
        }
    }

    info!("Shutting down the server...");
    state.stop_all_sessions().await;
    state.disconnect_all_users().await;
}

async fn bind_listener(cfg: &ServerConfig) -> Option<TcpListener> {
    for attempt in 1..=cfg.init_attempts {
        match TcpListener::bind(cfg.listen_address()).await {
            Ok(listener) => return Some(listener),
            Err(e) => {
                warn!(
                    "Failed to bind {} (attempt {attempt}/{}): {e}",
                    cfg.listen_address(),
                    cfg.init_attempts
                );
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
    None
}

/// Runs one client from accept to teardown: admission, the
/// authentication handshake, the request dispatch loop, and exactly
/// one pass through the disconnect path.
pub async fn user_task<T>(state: Arc<ServerState>, io: T, ip: IpAddr)
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let cfg = state.config();
    let mut conn = Connection::new(io, ip, cfg.read_timeout);

    if state.user_count().await >= cfg.max_users {
        warn!("The connection request from {ip} was rejected because the maximum number of users has been reached");
        conn.send(Packet::error(ErrorCode::ReachedUsersLimit));
        conn.disconnect().await;
        return;
    }

    let user_id = match authenticate(&mut conn, &state).await {
        AuthOutcome::Authorized(id) => id,
        AuthOutcome::Rejected => return,
    };

    let banned = handle_requests(&state, &mut conn, user_id).await;
    disconnect_user(&state, &mut conn, user_id, banned).await;
}

/// Dispatch loop for an authorized user. Returns true when the user
/// was found on the black list and must be told so on the way out.
async fn handle_requests<T>(
    state: &Arc<ServerState>,
    conn: &mut Connection<T>,
    user_id: UserId,
) -> bool
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    loop {
        match conn.get().await {
            Packet::Undefined => return false,
            Packet::Ping => {
                let (name, uid) = match state.user_identity(user_id).await {
                    Some(identity) => identity,
                    None => return false,
                };
                if state.store().blacklist_contains(&name, &uid) {
                    info!("Disconnecting user '{name}' because they are on the black list");
                    return true;
                }
                conn.send(Packet::Ok);
            }
            Packet::Status(ConnectionStatus::Disconnected) => return false,
            Packet::Status(ConnectionStatus::FindNewSession) => {
                if state.user_session(user_id).await.is_some() {
                    conn.send(Packet::error(ErrorCode::UnexpectedPacket));
                } else {
                    state.set_looking(user_id, true).await;
                    matchmaker::try_start_session(state, user_id).await;
                }
            }
            Packet::Status(ConnectionStatus::LeaveSession) => {
                match state.user_session(user_id).await {
                    Some(session_id) => {
                        if let Some(events) = state.session_events(session_id).await {
                            let _ = events.send(SessionEvent::Leave(user_id)).await;
                        }
                    }
                    None => {
                        if state.set_looking(user_id, false).await == Some(true) {
                            conn.send(Packet::Ok);
                        } else {
                            conn.send(Packet::error_with_msg(
                                ErrorCode::UnexpectedPacket,
                                "player is not in any session",
                            ));
                        }
                    }
                }
            }
            Packet::SessionData(data) => match state.user_session(user_id).await {
                Some(session_id) => {
                    if let Some(events) = state.session_events(session_id).await {
                        if events.send(SessionEvent::Data(user_id, data)).await.is_err() {
                            debug!("Session #{session_id} is already gone, dropping the packet");
                        }
                    }
                }
                None => {
                    conn.send(Packet::error(ErrorCode::UnexpectedPacket));
                }
            },
            _ => {
                conn.send(Packet::error(ErrorCode::UnexpectedPacket));
            }
        }
    }
}

async fn disconnect_user<T>(
    state: &Arc<ServerState>,
    conn: &mut Connection<T>,
    user_id: UserId,
    banned: bool,
) where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    if let Some(user) = state.remove_user(user_id).await {
        if let Some(session_id) = user.session {
            if let Some(events) = state.session_events(session_id).await {
                let _ = events.send(SessionEvent::Leave(user_id)).await;
            }
        }
        info!("User '{}' has been disconnected", user.name);
    }

    if conn.connected() {
        let status = if banned {
            ConnectionStatus::Banned
        } else {
            ConnectionStatus::Disconnected
        };
        conn.send(Packet::Status(status));
    }
    conn.disconnect().await;
}

#[derive(Debug)]
pub struct TaskControl(
    tokio::sync::oneshot::Sender<()>,
    tokio::task::JoinHandle<()>,
);

impl TaskControl {
    pub fn new(
        stop: tokio::sync::oneshot::Sender<()>,
        handle: tokio::task::JoinHandle<()>,
    ) -> TaskControl {
        TaskControl(stop, handle)
    }

    pub async fn stop(self) {
        if !self.1.is_finished() && self.0.send(()).is_ok() {
            let _ = self.1.await;
        }
    }
}
