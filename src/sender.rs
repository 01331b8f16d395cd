//! 송신자
//!
//! - 파일 전체를 전송 버퍼에 적재
//! - 수신측 탐색 후 연결
//! - 크기 공지 → 프래그먼트 순차 전송 (고정 페이싱) → 종료 프레임

use std::fs::File;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::buffer::TransferContext;
use crate::cancel::CancelHandle;
use crate::fragment::split;
use crate::message::Frame;
use crate::stats::TransferStats;
use crate::transport::{ConnectionHandle, ServiceContract, Transport, TransportEvent};
use crate::{Config, Error, Result};

/// 송신 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    FileLoaded,
    Connecting,
    Transmitting,
    Complete,
    Failed,
}

/// 송신 세션
pub struct SenderSession<T> {
    /// 설정
    config: Config,

    /// 트랜스포트
    transport: T,

    /// 전송 버퍼
    context: TransferContext,

    /// 현재 상태
    state: SenderState,

    /// 전송 통계
    stats: TransferStats,

    /// 취소 플래그
    cancel: CancelHandle,
}

impl<T: Transport> SenderSession<T> {
    /// 새 송신 세션 생성
    pub fn new(config: Config, transport: T) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            context: TransferContext::new(config.max_file_size),
            config,
            transport,
            state: SenderState::Idle,
            stats: TransferStats::default(),
            cancel: CancelHandle::new(),
        })
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// 적재된 파일 내용
    pub fn loaded(&self) -> &[u8] {
        self.context.buffer.snapshot()
    }

    /// 외부에서 전송을 중단시킬 핸들
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn expect_state(&self, expected: SenderState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState(format!(
                "sender expected {:?}, found {:?}",
                expected, self.state
            )));
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// 설정된 경로의 파일을 적재 (Idle → FileLoaded)
    ///
    /// 실패 시 Idle 유지
    pub fn load_file(&mut self) -> Result<usize> {
        self.expect_state(SenderState::Idle)?;

        let path = self.config.source_path.clone();
        info!("Sender mode: loading {}", path.display());

        let file = File::open(&path).map_err(|source| Error::SourceUnavailable {
            path: path.clone(),
            source,
        })?;

        let loaded = self
            .context
            .buffer
            .load_from_source(file)
            .map_err(|e| match e {
                Error::Io(source) => Error::SourceUnavailable { path, source },
                other => other,
            })?;

        info!("File read successfully, size: {} bytes", loaded);
        self.state = SenderState::FileLoaded;
        Ok(loaded)
    }

    /// 메모리의 바이트를 적재 (Idle → FileLoaded)
    pub fn load_bytes(&mut self, data: &[u8]) -> Result<usize> {
        self.expect_state(SenderState::Idle)?;

        let loaded = self.context.buffer.load_from_source(data)?;
        self.state = SenderState::FileLoaded;
        Ok(loaded)
    }

    /// 트랜스포트 초기화 후 수신측 탐색 (FileLoaded → Connecting → Transmitting)
    pub async fn connect(&mut self) -> Result<ConnectionHandle> {
        self.expect_state(SenderState::FileLoaded)?;

        self.transport.init().await.map_err(|e| match e {
            Error::TransportInitFailed(msg) => Error::TransportInitFailed(msg),
            other => Error::TransportInitFailed(other.to_string()),
        })?;
        self.transport
            .register_contract(ServiceContract::from_config(&self.config))?;
        self.transport.begin_discovery().await?;

        self.state = SenderState::Connecting;
        info!("Searching for receiver...");

        let started = Instant::now();
        loop {
            self.check_cancelled()?;

            if let Some(timeout_ms) = self.config.discovery_timeout_ms {
                if started.elapsed() >= Duration::from_millis(timeout_ms) {
                    return Err(Error::DiscoveryTimeout { timeout_ms });
                }
            }

            match self.transport.poll().await? {
                Some(TransportEvent::Connected(handle)) => {
                    info!("Receiver connected: {:?}", handle);
                    self.state = SenderState::Transmitting;
                    return Ok(handle);
                }
                Some(other) => debug!("탐색 중 이벤트 무시: {:?}", other),
                None => {}
            }
        }
    }

    /// 크기 공지 후 프래그먼트 전송 (Transmitting → Complete)
    pub async fn transmit(&mut self, handle: ConnectionHandle) -> Result<TransferStats> {
        self.expect_state(SenderState::Transmitting)?;

        let data = self.context.buffer.snapshot();
        let total_size = data.len() as u32;
        let pacing = self.config.pacing_delay();
        let fragments = split(data, self.config.fragment_size);
        let fragment_count = self.config.fragments_for(data.len()) as u32;

        self.stats = TransferStats::new(fragment_count as u64);

        let announce = Frame::Announce { total_size }.to_bytes()?;
        self.transport.send(handle, &announce).await?;
        debug!("크기 공지: {} bytes, {} fragments", total_size, fragment_count);

        for (seq, fragment) in fragments.enumerate() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let frame = Frame::Data {
                seq: seq as u32,
                payload: fragment.payload,
            }
            .to_bytes()?;
            self.transport.send(handle, &frame).await?;
            self.stats.record_fragment(fragment.size());
            debug!("Sent {} bytes.", fragment.size());

            if !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
        }

        let end = Frame::End {
            fragments: fragment_count,
            total_size,
        }
        .to_bytes()?;
        self.transport.send(handle, &end).await?;

        self.stats.finish();
        self.state = SenderState::Complete;
        info!("File transfer complete. {}", self.stats.summary());

        Ok(self.stats.clone())
    }

    /// 적재 → 연결 → 전송 전체 실행
    ///
    /// 어떤 에러든 재시도 없이 Failed로 종료. 미리 `load_bytes`로
    /// 적재했다면 파일 적재 단계는 건너뜀. 성공/실패와 무관하게
    /// 끝나면 링크를 닫아 수신측에 종료를 알림.
    pub async fn run(&mut self) -> Result<TransferStats> {
        let result = self.run_steps().await;
        if let Err(e) = &result {
            warn!("송신 실패 ({:?} 단계): {}", self.state, e);
            self.state = SenderState::Failed;
        }

        if let Err(e) = self.transport.close().await {
            warn!("링크 종료 실패: {}", e);
        }
        result
    }

    async fn run_steps(&mut self) -> Result<TransferStats> {
        if self.state == SenderState::Idle {
            self.load_file()?;
        }
        let handle = self.connect().await?;
        self.transmit(handle).await
    }
}
