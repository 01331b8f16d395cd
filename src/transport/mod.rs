//! 트랜스포트 추상화
//!
//! 무선 스택(탐색, 광고, 연결, 패킷 전달)은 이 트레이트 뒤에 위치.
//! 세션은 `poll`이 돌려주는 이벤트로만 연결/데이터를 전달받음.
//!
//! - [`MemoryTransport`]: 프로세스 내 쌍방향 링크 (테스트/데모용)
//! - [`UdpTransport`]: UDP 데이터그램으로 광고/탐색을 흉내 낸 링크

mod link;
pub mod memory;
pub mod udp;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Config, Result};

pub use memory::MemoryTransport;
pub use udp::UdpTransport;

/// 활성 링크 식별자 (트랜스포트가 발급, 세션은 보관/전달만 함)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(u16);

impl ConnectionHandle {
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u16 {
        self.0
    }
}

/// 서비스/특성 계약 (논리 채널)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContract {
    pub service_id: u16,
    pub characteristic_id: u16,
}

impl ServiceContract {
    pub fn new(service_id: u16, characteristic_id: u16) -> Self {
        Self {
            service_id,
            characteristic_id,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.service_id, config.characteristic_id)
    }
}

/// 트랜스포트 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// 피어 연결 수립
    Connected(ConnectionHandle),

    /// 바이트 청크 도착
    Data {
        handle: ConnectionHandle,
        bytes: Bytes,
    },

    /// 피어 연결 종료
    Disconnected(ConnectionHandle),
}

/// 무선 링크 기본 동작
///
/// 실행당 `init`은 한 번만 호출. `poll`은 루프에서 반복 호출되어야 하며
/// 최대 한 번의 poll 간격만큼 대기 후 이벤트가 없으면 `None` 반환.
#[async_trait]
pub trait Transport: Send {
    /// 무선 스택 초기화
    async fn init(&mut self) -> Result<()>;

    /// 사용할 서비스/특성 등록
    fn register_contract(&mut self, contract: ServiceContract) -> Result<()>;

    /// 수신측: 탐색 가능 상태로 전환
    async fn begin_advertising(&mut self) -> Result<()>;

    /// 송신측: 수신측 탐색 시작
    async fn begin_discovery(&mut self) -> Result<()>;

    /// 연결/데이터 이벤트 처리
    async fn poll(&mut self) -> Result<Option<TransportEvent>>;

    /// 프래그먼트 전송 (확인 응답 없음, 전달 보장 없음)
    async fn send(&mut self, handle: ConnectionHandle, bytes: &[u8]) -> Result<()>;

    /// 연결 종료 통지 (연결되어 있지 않으면 아무것도 하지 않음)
    async fn close(&mut self) -> Result<()>;
}
