//! 스탠드인 링크 공통 핸드셰이크
//!
//! Probe(탐색) → Accept(광고 중인 쪽 응답) → Data ...

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{ConnectionHandle, ServiceContract, TransportEvent};
use crate::{Error, Result};

/// 링크 패킷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum LinkPacket {
    Probe(ServiceContract),
    Accept(ServiceContract),
    Data(Vec<u8>),
    Close,
}

/// 패킷 처리 결과
#[derive(Debug, Default)]
pub(crate) struct Inbound {
    pub event: Option<TransportEvent>,
    pub reply: Option<LinkPacket>,
}

/// 한쪽 끝점의 링크 상태
#[derive(Debug, Default)]
pub(crate) struct LinkEndpoint {
    initialized: bool,
    contract: Option<ServiceContract>,
    advertising: bool,
    discovering: bool,
    connection: Option<ConnectionHandle>,
    next_handle: u16,
}

impl LinkEndpoint {
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::TransportInitFailed("already initialized".into()));
        }
        self.initialized = true;
        Ok(())
    }

    pub fn register_contract(&mut self, contract: ServiceContract) -> Result<()> {
        if !self.initialized {
            return Err(Error::Transport("transport not initialized".into()));
        }
        self.contract = Some(contract);
        Ok(())
    }

    fn registered_contract(&self) -> Result<ServiceContract> {
        self.contract
            .ok_or_else(|| Error::Transport("no service contract registered".into()))
    }

    pub fn begin_advertising(&mut self) -> Result<()> {
        self.registered_contract()?;
        self.advertising = true;
        Ok(())
    }

    pub fn begin_discovery(&mut self) -> Result<()> {
        self.registered_contract()?;
        self.discovering = true;
        Ok(())
    }

    /// 아직 연결 전인 탐색측이 보낼 Probe
    pub fn pending_probe(&self) -> Option<LinkPacket> {
        match (self.discovering, self.connection, self.contract) {
            (true, None, Some(contract)) => Some(LinkPacket::Probe(contract)),
            _ => None,
        }
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection
    }

    pub fn check_handle(&self, handle: ConnectionHandle) -> Result<()> {
        match self.connection {
            Some(current) if current == handle => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }

    /// 연결 해제 (연결되어 있었다면 핸들 반환)
    pub fn close(&mut self) -> Option<ConnectionHandle> {
        self.connection.take()
    }

    fn open(&mut self) -> ConnectionHandle {
        self.next_handle = self.next_handle.wrapping_add(1);
        let handle = ConnectionHandle::new(self.next_handle);
        self.connection = Some(handle);
        handle
    }

    pub fn on_packet(&mut self, packet: LinkPacket) -> Inbound {
        match packet {
            LinkPacket::Probe(contract) => {
                if !self.advertising || self.contract != Some(contract) {
                    debug!("Probe 무시: 광고 중 아님 또는 계약 불일치 ({:?})", contract);
                    return Inbound::default();
                }

                let event = match self.connection {
                    // 이미 연결됨: Accept 유실 대비 재응답만
                    Some(_) => None,
                    None => Some(TransportEvent::Connected(self.open())),
                };
                Inbound {
                    event,
                    reply: Some(LinkPacket::Accept(contract)),
                }
            }

            LinkPacket::Accept(contract) => {
                if !self.discovering || self.connection.is_some() || self.contract != Some(contract)
                {
                    return Inbound::default();
                }
                Inbound {
                    event: Some(TransportEvent::Connected(self.open())),
                    reply: None,
                }
            }

            LinkPacket::Data(bytes) => match self.connection {
                Some(handle) => Inbound {
                    event: Some(TransportEvent::Data {
                        handle,
                        bytes: Bytes::from(bytes),
                    }),
                    reply: None,
                },
                None => {
                    trace!("연결 전 데이터 {} 바이트 폐기", bytes.len());
                    Inbound::default()
                }
            },

            LinkPacket::Close => Inbound {
                event: self.close().map(TransportEvent::Disconnected),
                reply: None,
            },
        }
    }
}
