//! 프로세스 내 쌍방향 링크
//!
//! 두 끝점이 tokio 채널로 연결됨. 한쪽이 drop되면 상대는
//! `Disconnected`를 받음.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::link::{LinkEndpoint, LinkPacket};
use super::{ConnectionHandle, ServiceContract, Transport, TransportEvent};
use crate::{Error, Result};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// 메모리 링크 끝점
pub struct MemoryTransport {
    link: LinkEndpoint,
    outbound: mpsc::UnboundedSender<LinkPacket>,
    inbound: mpsc::UnboundedReceiver<LinkPacket>,
    poll_interval: Duration,
}

impl MemoryTransport {
    /// 서로 연결된 끝점 한 쌍 생성
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let a = Self {
            link: LinkEndpoint::default(),
            outbound: b_tx,
            inbound: a_rx,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        let b = Self {
            link: LinkEndpoint::default(),
            outbound: a_tx,
            inbound: b_rx,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        (a, b)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn push(&self, packet: LinkPacket) -> Result<()> {
        self.outbound
            .send(packet)
            .map_err(|_| Error::Transport("peer endpoint dropped".into()))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn init(&mut self) -> Result<()> {
        self.link.init()
    }

    fn register_contract(&mut self, contract: ServiceContract) -> Result<()> {
        self.link.register_contract(contract)
    }

    async fn begin_advertising(&mut self) -> Result<()> {
        self.link.begin_advertising()
    }

    async fn begin_discovery(&mut self) -> Result<()> {
        self.link.begin_discovery()
    }

    async fn poll(&mut self) -> Result<Option<TransportEvent>> {
        if let Some(probe) = self.link.pending_probe() {
            // 광고측이 아직 없으면 조용히 버려짐
            let _ = self.push(probe);
        }

        match tokio::time::timeout(self.poll_interval, self.inbound.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => match self.link.close() {
                Some(handle) => {
                    debug!("메모리 링크 상대 종료: {:?}", handle);
                    Ok(Some(TransportEvent::Disconnected(handle)))
                }
                None => Err(Error::Transport("peer endpoint dropped".into())),
            },
            Ok(Some(packet)) => {
                let inbound = self.link.on_packet(packet);
                if let Some(reply) = inbound.reply {
                    let _ = self.push(reply);
                }
                Ok(inbound.event)
            }
        }
    }

    async fn send(&mut self, handle: ConnectionHandle, bytes: &[u8]) -> Result<()> {
        self.link.check_handle(handle)?;
        self.push(LinkPacket::Data(bytes.to_vec()))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(handle) = self.link.close() {
            debug!("메모리 링크 종료: {:?}", handle);
            // 상대가 이미 사라졌으면 통지할 곳이 없음
            let _ = self.push(LinkPacket::Close);
        }
        Ok(())
    }
}
