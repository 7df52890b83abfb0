use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use sea_battle_common::codec::SeaBattleCodec;
use sea_battle_common::packet::Packet;

#[derive(Debug)]
enum Outbound {
    Packet(Packet),
    Shutdown,
}

/// Cloneable handle that queues packets for a connection's writer
/// task. Sessions hold one per player so they can push replies without
/// ever touching the reader side.
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: mpsc::UnboundedSender<Outbound>,
    connected: Arc<AtomicBool>,
}

impl PacketSender {
    /// Queues a packet for delivery. Returns false when the peer is
    /// already gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.connected() && self.tx.send(Outbound::Packet(packet)).is_ok()
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Asks the writer task to flush and close the socket.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Shutdown);
    }
}

/// One accepted socket: a framed reader owned by the connection task
/// and a writer task fed through the outbound queue.
pub struct Connection<T: AsyncRead + AsyncWrite> {
    reader: FramedRead<ReadHalf<T>, SeaBattleCodec>,
    sender: PacketSender,
    writer: Option<JoinHandle<()>>,
    ip: IpAddr,
    read_timeout: Duration,
}

impl<T: AsyncRead + AsyncWrite + Send + 'static> Connection<T> {
    pub fn new(io: T, ip: IpAddr, read_timeout: Duration) -> Connection<T> {
        let (read_half, write_half) = tokio::io::split(io);
        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(write_loop(
            FramedWrite::new(write_half, SeaBattleCodec),
            rx,
            connected.clone(),
            ip,
        ));

        Connection {
            reader: FramedRead::new(read_half, SeaBattleCodec),
            sender: PacketSender { tx, connected },
            writer: Some(writer),
            ip,
            read_timeout,
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn sender(&self) -> PacketSender {
        self.sender.clone()
    }

    pub fn connected(&self) -> bool {
        self.sender.connected()
    }

    pub fn send(&self, packet: Packet) -> bool {
        self.sender.send(packet)
    }

    /// Waits for the next packet, up to the read timeout. A timeout,
    /// a transport error and a closed stream all surface as
    /// [`Packet::Undefined`] so the caller's loop can wind down.
    pub async fn get(&mut self) -> Packet {
        if !self.connected() {
            return Packet::Undefined;
        }

        match tokio::time::timeout(self.read_timeout, self.reader.next()).await {
            Ok(Some(Ok(packet))) => {
                debug!("Received from {}: {:?}", self.ip, packet);
                packet
            }
            Ok(Some(Err(e))) => {
                debug!("Unable to read a packet from {}: {e}", self.ip);
                self.sender.connected.store(false, Ordering::Relaxed);
                Packet::Undefined
            }
            Ok(None) => {
                self.sender.connected.store(false, Ordering::Relaxed);
                Packet::Undefined
            }
            Err(_) => {
                debug!("Read from {} timed out", self.ip);
                Packet::Undefined
            }
        }
    }

    /// Flushes the outbound queue and closes the socket. Safe to call
    /// more than once.
    pub async fn disconnect(&mut self) {
        self.sender.close();
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
        self.sender.connected.store(false, Ordering::Relaxed);
    }
}

async fn write_loop<T: AsyncRead + AsyncWrite>(
    mut sink: FramedWrite<WriteHalf<T>, SeaBattleCodec>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    connected: Arc<AtomicBool>,
    ip: IpAddr,
) {
    while let Some(out) = rx.recv().await {
        match out {
            Outbound::Packet(packet) => {
                debug!("Sending to {ip}: {packet:?}");
                if let Err(e) = sink.send(packet).await {
                    debug!("Unable to send a packet to {ip}: {e}");
                    break;
                }
            }
            Outbound::Shutdown => break,
        }
    }

    let _ = sink.close().await;
    connected.store(false, Ordering::Relaxed);
}
