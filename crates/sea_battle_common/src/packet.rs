use serde::{Deserialize, Serialize};

use crate::game::battle_field::{Cell, ShootState};

/// Every frame starts with this byte.
pub const PACKET_MAGIC: u8 = b'H';

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketCode {
    Undefined = 0,
    Ok = 1,
    Error = 2,
    Ping = 3,
    Status = 4,
    UsernameAndId = 5,
    Password = 6,
    SessionData = 7,
}

impl TryFrom<u8> for PacketCode {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<PacketCode, &'static str> {
        match value {
            0 => Ok(PacketCode::Undefined),
            1 => Ok(PacketCode::Ok),
            2 => Ok(PacketCode::Error),
            3 => Ok(PacketCode::Ping),
            4 => Ok(PacketCode::Status),
            5 => Ok(PacketCode::UsernameAndId),
            6 => Ok(PacketCode::Password),
            7 => Ok(PacketCode::SessionData),
            _ => Err("Unknown PacketCode"),
        }
    }
}

impl From<PacketCode> for u8 {
    fn from(code: PacketCode) -> u8 {
        code as u8
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    NameAlreadyInUse = 0,
    NameTooLong = 1,
    ReachedUsersLimit = 2,
    UnexpectedPacket = 3,
    UncorrectPacket = 4,
}

impl TryFrom<u8> for ErrorCode {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<ErrorCode, &'static str> {
        match value {
            0 => Ok(ErrorCode::NameAlreadyInUse),
            1 => Ok(ErrorCode::NameTooLong),
            2 => Ok(ErrorCode::ReachedUsersLimit),
            3 => Ok(ErrorCode::UnexpectedPacket),
            4 => Ok(ErrorCode::UncorrectPacket),
            _ => Err("Unknown ErrorCode"),
        }
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> u8 {
        code as u8
    }
}

/// Status values carried by STATUS packets in either direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionStatus {
    Connected = 1,
    Disconnected = 2,
    Banned = 3,
    ReachedUsersLimit = 4,
    RegisterRequired = 5,
    AuthorizationRequired = 6,
    FindNewSession = 8,
    LeaveSession = 9,
}

impl TryFrom<u8> for ConnectionStatus {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<ConnectionStatus, &'static str> {
        match value {
            1 => Ok(ConnectionStatus::Connected),
            2 => Ok(ConnectionStatus::Disconnected),
            3 => Ok(ConnectionStatus::Banned),
            4 => Ok(ConnectionStatus::ReachedUsersLimit),
            5 => Ok(ConnectionStatus::RegisterRequired),
            6 => Ok(ConnectionStatus::AuthorizationRequired),
            8 => Ok(ConnectionStatus::FindNewSession),
            9 => Ok(ConnectionStatus::LeaveSession),
            _ => Err("Unknown ConnectionStatus"),
        }
    }
}

impl From<ConnectionStatus> for u8 {
    fn from(status: ConnectionStatus) -> u8 {
        status as u8
    }
}

/// One decoded frame. `Undefined` doubles as the decoder's answer for
/// anything it could not make sense of, so receiving it never panics a
/// handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Undefined,
    Ok,
    Error { code: ErrorCode, msg: Option<String> },
    Ping,
    Status(ConnectionStatus),
    UsernameAndId { name: String, uid: String },
    Password { password: String },
    SessionData(SessionData),
}

impl Packet {
    pub fn code(&self) -> PacketCode {
        match self {
            Packet::Undefined => PacketCode::Undefined,
            Packet::Ok => PacketCode::Ok,
            Packet::Error { .. } => PacketCode::Error,
            Packet::Ping => PacketCode::Ping,
            Packet::Status(_) => PacketCode::Status,
            Packet::UsernameAndId { .. } => PacketCode::UsernameAndId,
            Packet::Password { .. } => PacketCode::Password,
            Packet::SessionData(_) => PacketCode::SessionData,
        }
    }

    pub fn error(code: ErrorCode) -> Packet {
        Packet::Error { code, msg: None }
    }

    pub fn error_with_msg(code: ErrorCode, msg: impl Into<String>) -> Packet {
        Packet::Error {
            code,
            msg: Some(msg.into()),
        }
    }
}

/// SESSION_DATA payloads. The variant order matches the GameDataCode
/// numbering on the wire (SESSION_STARTED=0 .. WAITING=5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionData {
    SessionStarted { session_id: u64 },
    SessionClosed,
    GetData,
    PostData(GameData),
    Complete,
    Waiting { players: Option<String> },
}

/// POST_DATA payloads. The variant order matches the GameDataType
/// numbering on the wire (BATTLE_FIELD_REQUIRED=0 .. RESULTS=5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameData {
    BattleFieldRequired,
    BattleField {
        field: Vec<Vec<Cell>>,
        player: Option<String>,
    },
    NotYourTurn,
    Coordinate {
        row: u8,
        col: u8,
    },
    ShootState {
        state: ShootState,
        field: Option<Vec<Vec<Cell>>>,
    },
    Results {
        winner: String,
    },
}
