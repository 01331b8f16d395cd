//! UDP 데이터그램 링크
//!
//! 광고 = 바인드 후 Probe 대기, 탐색 = 피어 주소(유니캐스트 또는
//! 브로드캐스트)로 Probe 반복 송신. 연결 후에는 응답한 주소하고만 통신.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use super::link::{LinkEndpoint, LinkPacket};
use super::{ConnectionHandle, ServiceContract, Transport, TransportEvent};
use crate::{Error, Result};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// UDP 링크
pub struct UdpTransport {
    bind_addr: SocketAddr,
    peer_addr: Option<SocketAddr>,
    socket: Option<UdpSocket>,
    remote: Option<SocketAddr>,
    link: LinkEndpoint,
    poll_interval: Duration,
    buf: Vec<u8>,
}

impl UdpTransport {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            peer_addr: None,
            socket: None,
            remote: None,
            link: LinkEndpoint::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            buf: vec![0u8; 65535],
        }
    }

    /// 탐색 대상 주소 (송신측 필수)
    pub fn with_peer(mut self, peer_addr: SocketAddr) -> Self {
        self.peer_addr = Some(peer_addr);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// 실제 바인드된 주소 (init 이후)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    async fn send_packet(&self, packet: &LinkPacket, addr: SocketAddr) -> Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::Transport("transport not initialized".into()))?;
        let bytes = bincode::serialize(packet)?;
        socket.send_to(&bytes, addr).await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn init(&mut self) -> Result<()> {
        self.link.init()?;

        let socket = UdpSocket::bind(self.bind_addr)
            .await
            .map_err(|e| Error::TransportInitFailed(format!("bind {}: {}", self.bind_addr, e)))?;
        socket
            .set_broadcast(true)
            .map_err(|e| Error::TransportInitFailed(format!("set_broadcast: {}", e)))?;

        info!("UDP link bound on {}", socket.local_addr()?);
        self.socket = Some(socket);
        Ok(())
    }

    fn register_contract(&mut self, contract: ServiceContract) -> Result<()> {
        self.link.register_contract(contract)
    }

    async fn begin_advertising(&mut self) -> Result<()> {
        self.link.begin_advertising()
    }

    async fn begin_discovery(&mut self) -> Result<()> {
        if self.peer_addr.is_none() {
            return Err(Error::Transport("discovery requires a peer address".into()));
        }
        self.link.begin_discovery()
    }

    async fn poll(&mut self) -> Result<Option<TransportEvent>> {
        if let (Some(probe), Some(peer)) = (self.link.pending_probe(), self.peer_addr) {
            if let Err(e) = self.send_packet(&probe, peer).await {
                warn!("Probe 송신 실패 ({}): {}", peer, e);
            }
        }

        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::Transport("transport not initialized".into()))?;

        let (len, from) =
            match tokio::time::timeout(self.poll_interval, socket.recv_from(&mut self.buf)).await {
                Err(_) => return Ok(None),
                Ok(Err(e)) => {
                    warn!("수신 에러: {}", e);
                    return Ok(None);
                }
                Ok(Ok(received)) => received,
            };

        if matches!(self.remote, Some(remote) if remote != from) {
            debug!("연결되지 않은 주소의 데이터그램 무시: {}", from);
            return Ok(None);
        }

        let packet: LinkPacket = match bincode::deserialize(&self.buf[..len]) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("링크 패킷 파싱 실패 ({}): {}", from, e);
                return Ok(None);
            }
        };

        let inbound = self.link.on_packet(packet);
        match inbound.event {
            Some(TransportEvent::Connected(_)) => {
                info!("피어 연결: {}", from);
                self.remote = Some(from);
            }
            Some(TransportEvent::Disconnected(_)) => {
                info!("피어 연결 종료: {}", from);
                self.remote = None;
            }
            _ => {}
        }

        if let Some(reply) = inbound.reply {
            self.send_packet(&reply, from).await?;
        }

        Ok(inbound.event)
    }

    async fn send(&mut self, handle: ConnectionHandle, bytes: &[u8]) -> Result<()> {
        self.link.check_handle(handle)?;
        let remote = self.remote.ok_or(Error::NotConnected)?;
        self.send_packet(&LinkPacket::Data(bytes.to_vec()), remote)
            .await
    }

    async fn close(&mut self) -> Result<()> {
        let handle = self.link.close();
        if let (Some(handle), Some(remote)) = (handle, self.remote.take()) {
            info!("피어 연결 종료 통지: {} ({:?})", remote, handle);
            self.send_packet(&LinkPacket::Close, remote).await?;
        }
        Ok(())
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        // close() 없이 버려진 경우에도 상대가 끊김을 알 수 있도록 통지
        let (Some(socket), Some(remote)) = (self.socket.as_ref(), self.remote) else {
            return;
        };
        if self.link.connection().is_none() {
            return;
        }
        if let Ok(bytes) = bincode::serialize(&LinkPacket::Close) {
            if let Err(e) = socket.try_send_to(&bytes, remote) {
                debug!("종료 통지 실패 ({}): {}", remote, e);
            }
        }
    }
}
