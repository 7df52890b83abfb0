use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

use crate::packet::{ConnectionStatus, ErrorCode, Packet, PacketCode, PACKET_MAGIC};

/// magic + code + u16 payload length
pub const HEADER_SIZE: usize = 4;

pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Frame codec for the protocol: a one-byte magic, a one-byte packet
/// code and a big-endian u16 payload length, followed by the
/// bincode-encoded payload of the type that belongs to the code.
///
/// Malformed frames (wrong magic, unknown code, garbage payload) decode
/// to [`Packet::Undefined`] instead of failing the stream, so the
/// receiving loop decides what to do with them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeaBattleCodec;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to serialize packet payload: {0}")]
    Payload(#[from] bincode::Error),
    #[error("packet payload is too long")]
    PayloadTooLong,
}

#[derive(Serialize, Deserialize)]
struct ErrorPayload {
    error_code: u8,
    msg: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct CredentialsPayload {
    name: String,
    uid: String,
}

#[derive(Serialize, Deserialize)]
struct PasswordPayload {
    password: String,
}

impl Decoder for SeaBattleCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, CodecError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let payload_len = u16::from_be_bytes([src[2], src[3]]) as usize;
        if src.len() < HEADER_SIZE + payload_len {
            src.reserve(HEADER_SIZE + payload_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(HEADER_SIZE + payload_len);
        let payload = &frame[HEADER_SIZE..];

        if frame[0] != PACKET_MAGIC {
            return Ok(Some(Packet::Undefined));
        }

        let code = match PacketCode::try_from(frame[1]) {
            Ok(code) => code,
            Err(_) => return Ok(Some(Packet::Undefined)),
        };

        Ok(Some(decode_payload(code, payload)))
    }
}

impl Encoder<Packet> for SeaBattleCodec {
    type Error = CodecError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), CodecError> {
        let payload = encode_payload(&packet)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLong);
        }

        dst.reserve(HEADER_SIZE + payload.len());
        dst.put_u8(PACKET_MAGIC);
        dst.put_u8(packet.code().into());
        dst.put_u16(payload.len() as u16);
        dst.put_slice(&payload);
        Ok(())
    }
}

fn decode_payload(code: PacketCode, payload: &[u8]) -> Packet {
    match code {
        PacketCode::Undefined => Packet::Undefined,
        PacketCode::Ok => Packet::Ok,
        PacketCode::Ping => Packet::Ping,
        PacketCode::Error => match bincode::deserialize::<ErrorPayload>(payload) {
            Ok(p) => match ErrorCode::try_from(p.error_code) {
                Ok(code) => Packet::Error { code, msg: p.msg },
                Err(_) => Packet::Undefined,
            },
            Err(_) => Packet::Undefined,
        },
        PacketCode::Status => match bincode::deserialize::<u8>(payload) {
            Ok(value) => match ConnectionStatus::try_from(value) {
                Ok(status) => Packet::Status(status),
                Err(_) => Packet::Undefined,
            },
            Err(_) => Packet::Undefined,
        },
        PacketCode::UsernameAndId => match bincode::deserialize::<CredentialsPayload>(payload) {
            Ok(p) => Packet::UsernameAndId {
                name: p.name,
                uid: p.uid,
            },
            Err(_) => Packet::Undefined,
        },
        PacketCode::Password => match bincode::deserialize::<PasswordPayload>(payload) {
            Ok(p) => Packet::Password {
                password: p.password,
            },
            Err(_) => Packet::Undefined,
        },
        PacketCode::SessionData => match bincode::deserialize(payload) {
            Ok(data) => Packet::SessionData(data),
            Err(_) => Packet::Undefined,
        },
    }
}

fn encode_payload(packet: &Packet) -> Result<Vec<u8>, bincode::Error> {
    Ok(match packet {
        Packet::Undefined | Packet::Ok | Packet::Ping => Vec::new(),
        Packet::Error { code, msg } => bincode::serialize(&ErrorPayload {
            error_code: (*code).into(),
            msg: msg.clone(),
        })?,
        Packet::Status(status) => bincode::serialize(&u8::from(*status))?,
        Packet::UsernameAndId { name, uid } => bincode::serialize(&CredentialsPayload {
            name: name.clone(),
            uid: uid.clone(),
        })?,
        Packet::Password { password } => bincode::serialize(&PasswordPayload {
            password: password.clone(),
        })?,
        Packet::SessionData(data) => bincode::serialize(data)?,
    })
}
