use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use rand::Rng;
use tokio::sync::mpsc;

use sea_battle_common::game::battle_field::{BattleField, ShootState};
use sea_battle_common::packet::{ErrorCode, GameData, Packet, SessionData};

use crate::connection::PacketSender;
use crate::server::{ServerState, UserId};
use crate::store::UserStore;

pub type SessionId = u64;

/// Events routed into a session's bounded queue. Game packets arrive
/// as `Data`; `Leave` covers both LEAVE_SESSION and a dropped
/// connection; `Stop` is the administrative stop hook.
#[derive(Debug)]
pub enum SessionEvent {
    Data(UserId, SessionData),
    Leave(UserId),
    Stop,
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub events: mpsc::Sender<SessionEvent>,
}

/// A player's place in a session: the registry id plus everything the
/// session needs without going back to the registry on every reply.
#[derive(Debug, Clone)]
pub struct SessionSeat {
    pub user: UserId,
    pub name: String,
    pub sender: PacketSender,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Battle,
    Finished,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Setup => f.write_str("setup"),
            Phase::Battle => f.write_str("battle"),
            Phase::Finished => f.write_str("finished"),
        }
    }
}

#[derive(Debug)]
struct PlayerFields {
    own: BattleField,
    shots: BattleField,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ShotTally {
    pub hits: u64,
    pub misses: u64,
}

/// The per-session state machine. It is synchronous on purpose: the
/// owning task feeds it one event at a time and forwards the replies,
/// which keeps every battlefield mutation on a single logical thread
/// without any field-level locking.
pub struct SessionCore {
    id: SessionId,
    players: Vec<(UserId, String)>,
    fields: HashMap<UserId, PlayerFields>,
    phase: Phase,
    first_attacker: usize,
    attacker: usize,
    defender: usize,
    winner: Option<UserId>,
    losers: HashSet<UserId>,
    tallies: HashMap<UserId, ShotTally>,
}

impl SessionCore {
    pub fn new(
        id: SessionId,
        players: Vec<(UserId, String)>,
        first_attacker: usize,
    ) -> SessionCore {
        debug_assert!(players.len() >= 2);
        let first_attacker = first_attacker % players.len();

        SessionCore {
            id,
            players,
            fields: HashMap::new(),
            phase: Phase::Setup,
            first_attacker,
            attacker: 0,
            defender: 0,
            winner: None,
            losers: HashSet::new(),
            tallies: HashMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> &[(UserId, String)] {
        &self.players
    }

    pub fn winner(&self) -> Option<UserId> {
        self.winner
    }

    /// The player whose shot is expected, once the battle has begun.
    pub fn whose_turn(&self) -> Option<UserId> {
        match self.phase {
            Phase::Battle => Some(self.players[self.attacker].0),
            Phase::Setup | Phase::Finished => None,
        }
    }

    /// True once the session has nothing left to do: the battle is
    /// decided and every loser has picked up the result.
    pub fn is_over(&self) -> bool {
        self.phase == Phase::Finished && self.losers.is_empty()
    }

    pub fn tally(&self, player: UserId) -> ShotTally {
        self.tallies.get(&player).copied().unwrap_or_default()
    }

    pub fn player_name(&self, player: UserId) -> &str {
        self.players
            .iter()
            .find(|(id, _)| *id == player)
            .map(|(_, name)| name.as_str())
            .unwrap_or("<unknown>")
    }

    /// Applies one event and returns the packets to deliver, addressed
    /// by player.
    pub fn handle(&mut self, player: UserId, data: SessionData) -> Vec<(UserId, Packet)> {
        match self.phase {
            Phase::Setup => self.handle_setup(player, data),
            Phase::Battle => self.handle_battle(player, data),
            Phase::Finished => self.handle_finished(player),
        }
    }

    fn handle_setup(&mut self, player: UserId, data: SessionData) -> Vec<(UserId, Packet)> {
        match data {
            SessionData::PostData(GameData::BattleField { field, .. }) => {
                match BattleField::from_layout(&field) {
                    Ok(own) => {
                        self.fields.insert(
                            player,
                            PlayerFields {
                                own,
                                shots: BattleField::new(),
                            },
                        );
                        info!(
                            "Session #{}: player '{}' battle field accepted",
                            self.id,
                            self.player_name(player)
                        );

                        if self.fields.len() == self.players.len() {
                            self.begin_battle();
                        }
                        vec![(player, Packet::SessionData(SessionData::Complete))]
                    }
                    Err(e) => {
                        warn!(
                            "Session #{}: player '{}' battle field rejected: {e}",
                            self.id,
                            self.player_name(player)
                        );
                        vec![(
                            player,
                            Packet::error_with_msg(ErrorCode::UncorrectPacket, e.to_string()),
                        )]
                    }
                }
            }
            SessionData::PostData(_) => {
                vec![(player, Packet::error(ErrorCode::UncorrectPacket))]
            }
            SessionData::GetData => {
                if !self.fields.contains_key(&player) {
                    return vec![(player, post_data(GameData::BattleFieldRequired))];
                }

                let waiting: Vec<&str> = self
                    .players
                    .iter()
                    .filter(|(id, _)| !self.fields.contains_key(id))
                    .map(|(_, name)| name.as_str())
                    .collect();
                let players = if waiting.is_empty() {
                    None
                } else {
                    Some(waiting.join(" "))
                };
                vec![(player, Packet::SessionData(SessionData::Waiting { players }))]
            }
            other => {
                debug!(
                    "Session #{}: ignoring {:?} during the {} phase",
                    self.id, other, self.phase
                );
                vec![]
            }
        }
    }

    fn begin_battle(&mut self) {
        self.phase = Phase::Battle;
        self.attacker = self.first_attacker;
        self.defender = (self.first_attacker + 1) % self.players.len();

        info!("Session #{}: moving into a new phase: '{}'", self.id, self.phase);
        info!(
            "Session #{}: now attacking player '{}'",
            self.id, self.players[self.attacker].1
        );
    }

    fn handle_battle(&mut self, player: UserId, data: SessionData) -> Vec<(UserId, Packet)> {
        match data {
            SessionData::GetData => {
                let attacker_id = self.players[self.attacker].0;
                if player != attacker_id {
                    return vec![(player, post_data(GameData::NotYourTurn))];
                }

                let view = self.fields[&attacker_id].shots.rows();
                vec![(
                    player,
                    post_data(GameData::BattleField {
                        field: view,
                        player: Some(self.players[self.defender].1.clone()),
                    }),
                )]
            }
            SessionData::PostData(GameData::Coordinate { row, col }) => {
                self.handle_shot(player, row as usize, col as usize)
            }
            SessionData::PostData(_) => {
                vec![(player, Packet::error(ErrorCode::UncorrectPacket))]
            }
            other => {
                debug!(
                    "Session #{}: ignoring {:?} during the {} phase",
                    self.id, other, self.phase
                );
                vec![]
            }
        }
    }

    fn handle_shot(&mut self, player: UserId, row: usize, col: usize) -> Vec<(UserId, Packet)> {
        let attacker_id = self.players[self.attacker].0;
        let defender_id = self.players[self.defender].0;

        if player != attacker_id {
            return vec![(player, post_data(GameData::NotYourTurn))];
        }

        let state = {
            let defender = self
                .fields
                .get_mut(&defender_id)
                .expect("every player has a field during the battle");
            match defender.own.shoot(row, col) {
                Ok(state) => state,
                Err(e) => {
                    return vec![(
                        player,
                        Packet::error_with_msg(ErrorCode::UncorrectPacket, e.to_string()),
                    )]
                }
            }
        };

        self.fields
            .get_mut(&attacker_id)
            .expect("every player has a field during the battle")
            .shots
            .set(row, col, state)
            .expect("coordinates were validated by the shot");

        let tally = self.tallies.entry(attacker_id).or_default();
        match state {
            ShootState::Hit => tally.hits += 1,
            ShootState::Miss => tally.misses += 1,
            ShootState::AlreadyShot | ShootState::Unknown => {}
        }

        if self.fields[&defender_id].own.is_all_ships_destroyed() {
            self.winner = Some(attacker_id);
            self.phase = Phase::Finished;
            self.losers = self
                .players
                .iter()
                .map(|(id, _)| *id)
                .filter(|id| *id != attacker_id)
                .collect();

            info!(
                "Session #{}: player '{}' win!",
                self.id,
                self.player_name(attacker_id)
            );
            return vec![(
                player,
                post_data(GameData::Results {
                    winner: String::from("you"),
                }),
            )];
        }

        match state {
            ShootState::Hit => {
                info!(
                    "Session #{}: player '{}' hit",
                    self.id,
                    self.player_name(player)
                );
                let view = self.fields[&attacker_id].shots.rows();
                vec![(player, post_data(GameData::ShootState { state, field: Some(view) }))]
            }
            ShootState::Miss => {
                info!(
                    "Session #{}: player '{}' missed",
                    self.id,
                    self.player_name(player)
                );
                let own = self.fields[&attacker_id].own.rows();

                self.attacker = (self.attacker + 1) % self.players.len();
                self.defender = (self.defender + 1) % self.players.len();
                info!(
                    "Session #{}: now attacking player '{}'",
                    self.id, self.players[self.attacker].1
                );

                vec![(player, post_data(GameData::ShootState { state, field: Some(own) }))]
            }
            ShootState::AlreadyShot => {
                info!(
                    "Session #{}: player '{}' already shot at the same place",
                    self.id,
                    self.player_name(player)
                );
                vec![(player, post_data(GameData::ShootState { state, field: None }))]
            }
            ShootState::Unknown => {
                vec![(player, Packet::error(ErrorCode::UncorrectPacket))]
            }
        }
    }

    fn handle_finished(&mut self, player: UserId) -> Vec<(UserId, Packet)> {
        if self.winner == Some(player) {
            return vec![(
                player,
                post_data(GameData::Results {
                    winner: String::from("you"),
                }),
            )];
        }

        let winner_name = self
            .winner
            .map(|id| self.player_name(id).to_string())
            .unwrap_or_default();
        self.losers.remove(&player);
        vec![(player, post_data(GameData::Results { winner: winner_name }))]
    }
}

fn post_data(data: GameData) -> Packet {
    Packet::SessionData(SessionData::PostData(data))
}

pub fn spawn_session_task(
    state: Arc<ServerState>,
    id: SessionId,
    seats: Vec<SessionSeat>,
    events: mpsc::Receiver<SessionEvent>,
) {
    tokio::spawn(session_task(state, id, seats, events));
}

/// Owns one session from start to teardown. All game progress happens
/// here: events are drained from the bounded queue one at a time, so
/// battlefield mutations are naturally serialized.
async fn session_task(
    state: Arc<ServerState>,
    id: SessionId,
    seats: Vec<SessionSeat>,
    mut events: mpsc::Receiver<SessionEvent>,
) {
    let started = Instant::now();
    let first_attacker = rand::thread_rng().gen_range(0..seats.len());
    let mut core = SessionCore::new(
        id,
        seats.iter().map(|seat| (seat.user, seat.name.clone())).collect(),
        first_attacker,
    );
    let senders: HashMap<UserId, PacketSender> = seats
        .iter()
        .map(|seat| (seat.user, seat.sender.clone()))
        .collect();

    info!(
        "Starting game session #{id}. Players: {}",
        seats
            .iter()
            .map(|seat| format!("'{}'", seat.name))
            .collect::<Vec<_>>()
            .join(", ")
    );

    for seat in &seats {
        seat.sender
            .send(Packet::SessionData(SessionData::SessionStarted {
                session_id: id,
            }));
    }

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Data(player, data) => {
                for (target, packet) in core.handle(player, data) {
                    if let Some(sender) = senders.get(&target) {
                        sender.send(packet);
                    }
                }
                if core.is_over() {
                    break;
                }
            }
            SessionEvent::Leave(player) => {
                info!(
                    "Session #{id}: player '{}' left the session",
                    core.player_name(player)
                );
                break;
            }
            SessionEvent::Stop => {
                info!("Session #{id}: stop requested");
                break;
            }
        }
    }

    info!("Stopping game session #{id}");

    for seat in &seats {
        if seat.sender.connected() {
            seat.sender
                .send(Packet::SessionData(SessionData::SessionClosed));
        }
    }

    record_stats(state.store(), &core, started.elapsed().as_secs());

    let players: Vec<UserId> = seats.iter().map(|seat| seat.user).collect();
    state.clear_session(id, &players).await;
}

/// Folds the session outcome into the per-player statistics: every
/// player gets a match, the winner a win, the rest a defeat once a
/// winner exists, and the shot tallies and longest-match time are
/// carried over.
fn record_stats(store: &dyn UserStore, core: &SessionCore, duration_secs: u64) {
    for (player, name) in core.players() {
        let mut stats = store.stats(name).unwrap_or_default();

        stats.matches += 1;
        if core.winner() == Some(*player) {
            stats.wins += 1;
        } else if core.winner().is_some() {
            stats.defeats += 1;
        }

        let tally = core.tally(*player);
        stats.hits += tally.hits;
        stats.misses += tally.misses;
        stats.longest_match_secs = stats.longest_match_secs.max(duration_secs);

        store.set_stats(name, stats);
    }
}
