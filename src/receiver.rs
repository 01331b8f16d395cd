//! 수신자
//!
//! - 광고 후 송신측 연결 대기
//! - 크기 공지 수신, 프래그먼트를 도착 순서대로 조립
//! - 예상 크기에 정확히 도달하면 파일로 저장

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::buffer::TransferContext;
use crate::cancel::CancelHandle;
use crate::fragment::{absorb, Fragment, TransferState};
use crate::message::Frame;
use crate::stats::TransferStats;
use crate::transport::{ConnectionHandle, ServiceContract, Transport, TransportEvent};
use crate::{Config, Error, Result};

/// 수신 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Listening,
    AwaitingPeer,
    Receiving,
    Complete,
    Failed,
}

/// 프래그먼트 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveProgress {
    /// 아직 수신 중
    InProgress { received: usize, expected: usize },

    /// 수신 완료 및 저장됨
    Complete { size: usize },

    /// 완료/실패 이후 도착한 데이터 (상태 변화 없음)
    Ignored,
}

/// 수신 세션
pub struct ReceiverSession<T> {
    config: Config,
    transport: T,
    context: TransferContext,
    state: ReceiverState,

    /// 다음에 기대하는 Data 시퀀스 번호
    next_seq: u32,

    stats: TransferStats,
    cancel: CancelHandle,
}

impl<T: Transport> ReceiverSession<T> {
    /// 새 수신 세션 생성
    pub fn new(config: Config, transport: T) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            context: TransferContext::new(config.max_file_size),
            config,
            transport,
            state: ReceiverState::Listening,
            next_seq: 0,
            stats: TransferStats::default(),
            cancel: CancelHandle::new(),
        })
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn transfer_state(&self) -> TransferState {
        self.context.state
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// 지금까지 조립된 데이터
    pub fn received(&self) -> &[u8] {
        self.context.buffer.snapshot()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn is_finished(&self) -> bool {
        matches!(self.state, ReceiverState::Complete | ReceiverState::Failed)
    }

    fn expect_state(&self, expected: ReceiverState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState(format!(
                "receiver expected {:?}, found {:?}",
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

    /// 에러 발생 시 전송 포기 (이후 데이터는 무시)
    fn abandon_on_error<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            warn!(
                "전송 포기: {} ({}/{} 바이트)",
                e, self.context.state.received_size, self.context.state.expected_size
            );
            self.state = ReceiverState::Failed;
        }
        result
    }

    /// 예상 크기 설정 (Announce 프레임 또는 외부 경로)
    pub fn expect_size(&mut self, size: usize) -> Result<()> {
        if self.is_finished() {
            return Err(Error::InvalidState(format!(
                "receiver already {:?}",
                self.state
            )));
        }
        let result = self.set_expected_size(size);
        self.abandon_on_error(result)
    }

    fn set_expected_size(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(Error::EmptyInput);
        }
        if size > self.context.buffer.capacity() {
            return Err(Error::CapacityExceeded {
                length: 0,
                incoming: size,
                capacity: self.context.buffer.capacity(),
            });
        }

        let current = self.context.state;
        if current.is_announced() {
            if current.expected_size == size {
                debug!("중복 크기 공지 무시: {} bytes", size);
                return Ok(());
            }
            return Err(Error::InvalidFrame(format!(
                "conflicting size announcement: {} then {}",
                current.expected_size, size
            )));
        }

        self.context.state = TransferState::new(size);
        self.stats = TransferStats::new(self.config.fragments_for(size) as u64);
        info!("Expecting {} bytes", size);
        Ok(())
    }

    /// 수신한 프레임 하나 처리
    pub fn handle_frame(&mut self, bytes: &[u8]) -> Result<ReceiveProgress> {
        if self.is_finished() {
            debug!("{:?} 이후 프레임 무시 ({} bytes)", self.state, bytes.len());
            return Ok(ReceiveProgress::Ignored);
        }
        let result = self.dispatch_frame(bytes);
        self.abandon_on_error(result)
    }

    fn dispatch_frame(&mut self, bytes: &[u8]) -> Result<ReceiveProgress> {
        match Frame::from_bytes(bytes)? {
            Frame::Announce { total_size } => {
                self.set_expected_size(total_size as usize)?;
                Ok(self.progress())
            }
            Frame::Data { seq, payload } => {
                if seq != self.next_seq {
                    return Err(Error::SequenceGap {
                        expected: self.next_seq,
                        got: seq,
                    });
                }
                let progress = self.absorb_payload(payload)?;
                self.next_seq += 1;
                Ok(progress)
            }
            Frame::End {
                fragments,
                total_size,
            } => {
                debug!("종료 프레임: {} fragments, {} bytes", fragments, total_size);
                Err(Error::IncompleteTransfer {
                    expected: self.context.state.expected_size,
                    received: self.context.state.received_size,
                })
            }
        }
    }

    /// 프레임 없이 도착한 원시 프래그먼트 처리 (도착 순서 신뢰)
    pub fn on_fragment(&mut self, payload: &[u8]) -> Result<ReceiveProgress> {
        if self.is_finished() {
            debug!("{:?} 이후 프래그먼트 무시 ({} bytes)", self.state, payload.len());
            return Ok(ReceiveProgress::Ignored);
        }
        let result = self.absorb_payload(payload);
        self.abandon_on_error(result)
    }

    fn absorb_payload(&mut self, payload: &[u8]) -> Result<ReceiveProgress> {
        if !self.context.state.is_announced() {
            return Err(Error::SizeNotAnnounced);
        }

        let fragment = Fragment::new(self.context.state.received_size, payload);
        self.context.state = absorb(self.context.state, &fragment, &mut self.context.buffer)?;
        self.stats.record_fragment(fragment.size());

        debug!(
            "Received {} bytes ({}/{}, {:.1}%, {} remaining)",
            fragment.size(),
            self.context.state.received_size,
            self.context.state.expected_size,
            self.context.state.receive_ratio() * 100.0,
            self.context.state.remaining()
        );

        if self.context.state.is_complete() {
            self.persist()?;
            self.stats.finish();
            self.state = ReceiverState::Complete;
            info!(
                "File received and saved to {}. {}",
                self.config.output_path.display(),
                self.stats.summary()
            );
            return Ok(ReceiveProgress::Complete {
                size: self.context.state.received_size,
            });
        }

        Ok(self.progress())
    }

    fn progress(&self) -> ReceiveProgress {
        ReceiveProgress::InProgress {
            received: self.context.state.received_size,
            expected: self.context.state.expected_size,
        }
    }

    /// 조립된 데이터를 고정 경로에 저장 (기존 파일 덮어씀)
    fn persist(&self) -> Result<()> {
        let path = &self.config.output_path;
        std::fs::write(path, self.context.buffer.snapshot()).map_err(|source| {
            Error::SinkUnavailable {
                path: path.clone(),
                source,
            }
        })
    }

    /// 트랜스포트 초기화 후 광고 시작 (Listening → AwaitingPeer)
    pub async fn listen(&mut self) -> Result<()> {
        self.expect_state(ReceiverState::Listening)?;

        self.transport.init().await.map_err(|e| match e {
            Error::TransportInitFailed(msg) => Error::TransportInitFailed(msg),
            other => Error::TransportInitFailed(other.to_string()),
        })?;
        self.transport
            .register_contract(ServiceContract::from_config(&self.config))?;
        self.transport.begin_advertising().await?;

        self.state = ReceiverState::AwaitingPeer;
        info!("Receiver mode: Waiting for connection...");
        Ok(())
    }

    /// 송신측 연결 대기 (AwaitingPeer → Receiving)
    pub async fn await_peer(&mut self) -> Result<ConnectionHandle> {
        self.expect_state(ReceiverState::AwaitingPeer)?;

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
                    info!("Sender connected: {:?}", handle);
                    self.state = ReceiverState::Receiving;
                    return Ok(handle);
                }
                Some(other) => debug!("연결 대기 중 이벤트 무시: {:?}", other),
                None => {}
            }
        }
    }

    /// 완료될 때까지 프레임 수신 (Receiving → Complete)
    pub async fn receive(&mut self, handle: ConnectionHandle) -> Result<TransferStats> {
        self.expect_state(ReceiverState::Receiving)?;

        let mut last_activity = Instant::now();
        loop {
            self.check_cancelled()?;

            if let Some(timeout_ms) = self.config.stall_timeout_ms {
                if last_activity.elapsed() >= Duration::from_millis(timeout_ms) {
                    return Err(Error::TransferStalled { timeout_ms });
                }
            }

            match self.transport.poll().await? {
                Some(TransportEvent::Data { handle: from, bytes }) if from == handle => {
                    last_activity = Instant::now();
                    if let ReceiveProgress::Complete { .. } = self.handle_frame(&bytes)? {
                        return Ok(self.stats.clone());
                    }
                }
                Some(TransportEvent::Disconnected(from)) if from == handle => {
                    return Err(Error::PeerDisconnected);
                }
                Some(other) => debug!("수신 중 이벤트 무시: {:?}", other),
                None => {}
            }
        }
    }

    /// 광고 → 연결 대기 → 수신 → 저장 전체 실행
    ///
    /// `run` 이전에 `expect_size`로 공지된 크기는 그대로 유지됨.
    /// 실패 시 저장되지 않은 부분 데이터는 버림.
    pub async fn run(&mut self) -> Result<TransferStats> {
        let result = self.run_steps().await;
        if let Err(e) = &result {
            if self.state != ReceiverState::Failed {
                warn!("수신 실패 ({:?} 단계): {}", self.state, e);
            }
            self.state = ReceiverState::Failed;
            self.context.reset();
        }

        if let Err(e) = self.transport.close().await {
            warn!("링크 종료 실패: {}", e);
        }
        result
    }

    async fn run_steps(&mut self) -> Result<TransferStats> {
        self.listen().await?;
        let handle = self.await_peer().await?;
        self.receive(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn session(dir: &tempfile::TempDir) -> ReceiverSession<MemoryTransport> {
        let config = Config {
            output_path: dir.path().join("received_file.bin"),
            ..Config::default()
        };
        let (transport, _) = MemoryTransport::pair();
        ReceiverSession::new(config, transport).unwrap()
    }

    fn data_frame(seq: u32, payload: &[u8]) -> Vec<u8> {
        Frame::Data { seq, payload }.to_bytes().unwrap()
    }

    #[test]
    fn test_completes_exactly_at_expected_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);
        let data: Vec<u8> = (0..45).collect();
        receiver.expect_size(45).unwrap();

        assert_eq!(
            receiver.on_fragment(&data[..20]).unwrap(),
            ReceiveProgress::InProgress {
                received: 20,
                expected: 45
            }
        );
        assert!(matches!(
            receiver.on_fragment(&data[20..40]).unwrap(),
            ReceiveProgress::InProgress { received: 40, .. }
        ));
        assert_ne!(receiver.state(), ReceiverState::Complete);
        assert!(!dir.path().join("received_file.bin").exists());

        assert_eq!(
            receiver.on_fragment(&data[40..]).unwrap(),
            ReceiveProgress::Complete { size: 45 }
        );
        assert_eq!(receiver.state(), ReceiverState::Complete);

        let written = std::fs::read(dir.path().join("received_file.bin")).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn test_fragment_after_complete_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);
        receiver.expect_size(3).unwrap();
        receiver.on_fragment(&[1, 2, 3]).unwrap();

        assert_eq!(
            receiver.on_fragment(&[4, 5]).unwrap(),
            ReceiveProgress::Ignored
        );
        assert_eq!(
            receiver.handle_frame(&data_frame(1, &[4])).unwrap(),
            ReceiveProgress::Ignored
        );
        assert_eq!(receiver.state(), ReceiverState::Complete);
        assert_eq!(receiver.received(), &[1, 2, 3]);
        assert_eq!(receiver.transfer_state().received_size, 3);
    }

    #[test]
    fn test_framed_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);

        let announce = Frame::Announce { total_size: 25 }.to_bytes().unwrap();
        assert!(matches!(
            receiver.handle_frame(&announce).unwrap(),
            ReceiveProgress::InProgress {
                received: 0,
                expected: 25
            }
        ));
        receiver.handle_frame(&data_frame(0, &[0xAA; 20])).unwrap();
        assert_eq!(
            receiver.handle_frame(&data_frame(1, &[0xBB; 5])).unwrap(),
            ReceiveProgress::Complete { size: 25 }
        );

        // 완료 후 도착한 End 프레임은 무시
        let end = Frame::End {
            fragments: 2,
            total_size: 25,
        }
        .to_bytes()
        .unwrap();
        assert_eq!(receiver.handle_frame(&end).unwrap(), ReceiveProgress::Ignored);
    }

    #[test]
    fn test_data_before_announce_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);

        let err = receiver.handle_frame(&data_frame(0, &[1, 2])).unwrap_err();
        assert!(matches!(err, Error::SizeNotAnnounced));
        assert_eq!(receiver.state(), ReceiverState::Failed);
    }

    #[test]
    fn test_sequence_gap_abandons_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);
        receiver.expect_size(60).unwrap();
        receiver.handle_frame(&data_frame(0, &[1; 20])).unwrap();

        let err = receiver.handle_frame(&data_frame(2, &[3; 20])).unwrap_err();
        assert!(matches!(
            err,
            Error::SequenceGap {
                expected: 1,
                got: 2
            }
        ));
        assert_eq!(receiver.state(), ReceiverState::Failed);

        // 포기 이후 데이터는 받지 않음
        assert_eq!(
            receiver.handle_frame(&data_frame(1, &[2; 20])).unwrap(),
            ReceiveProgress::Ignored
        );
        assert_eq!(receiver.transfer_state().received_size, 20);
    }

    #[test]
    fn test_duplicate_fragment_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);
        receiver.expect_size(40).unwrap();
        receiver.handle_frame(&data_frame(0, &[1; 20])).unwrap();

        assert!(matches!(
            receiver.handle_frame(&data_frame(0, &[1; 20])),
            Err(Error::SequenceGap {
                expected: 1,
                got: 0
            })
        ));
    }

    #[test]
    fn test_announce_above_capacity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);
        let capacity = Config::default().max_file_size;

        let announce = Frame::Announce {
            total_size: capacity as u32 + 1,
        }
        .to_bytes()
        .unwrap();
        assert!(matches!(
            receiver.handle_frame(&announce),
            Err(Error::CapacityExceeded { .. })
        ));
        assert_eq!(receiver.state(), ReceiverState::Failed);
    }

    #[test]
    fn test_zero_size_announce_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);
        assert!(matches!(receiver.expect_size(0), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_overrun_of_expected_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);
        receiver.expect_size(10).unwrap();
        receiver.on_fragment(&[0; 8]).unwrap();

        assert!(matches!(
            receiver.on_fragment(&[0; 5]),
            Err(Error::SizeMismatch { .. })
        ));
        assert_eq!(receiver.received().len(), 8);
    }

    #[test]
    fn test_end_before_complete_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);
        receiver.expect_size(45).unwrap();
        receiver.handle_frame(&data_frame(0, &[0; 20])).unwrap();

        let end = Frame::End {
            fragments: 3,
            total_size: 45,
        }
        .to_bytes()
        .unwrap();
        assert!(matches!(
            receiver.handle_frame(&end),
            Err(Error::IncompleteTransfer {
                expected: 45,
                received: 20
            })
        ));
    }

    #[test]
    fn test_unwritable_output_is_sink_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().join("missing-dir").join("out.bin"),
            ..Config::default()
        };
        let (transport, _) = MemoryTransport::pair();
        let mut receiver = ReceiverSession::new(config, transport).unwrap();
        receiver.expect_size(2).unwrap();

        assert!(matches!(
            receiver.on_fragment(&[1, 2]),
            Err(Error::SinkUnavailable { .. })
        ));
        assert_eq!(receiver.state(), ReceiverState::Failed);
    }

    #[test]
    fn test_existing_output_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("received_file.bin");
        std::fs::write(&output, b"previous transfer, longer").unwrap();

        let mut receiver = session(&dir);
        receiver.expect_size(4).unwrap();
        receiver.on_fragment(b"next").unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"next");
    }

    #[tokio::test]
    async fn test_stall_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().join("out.bin"),
            stall_timeout_ms: Some(30),
            ..Config::unpaced()
        };
        let (mut peer, transport) = MemoryTransport::pair();
        let mut receiver = ReceiverSession::new(config, transport).unwrap();

        peer.init().await.unwrap();
        peer.register_contract(ServiceContract::new(0x180D, 0x2A37))
            .unwrap();
        peer.begin_discovery().await.unwrap();

        let peer_task = tokio::spawn(async move {
            // 연결만 하고 데이터는 보내지 않음
            for _ in 0..100 {
                if let Ok(Some(TransportEvent::Connected(_))) = peer.poll().await {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
            drop(peer);
        });

        let err = receiver.run().await.unwrap_err();
        assert!(matches!(err, Error::TransferStalled { timeout_ms: 30 }));
        assert_eq!(receiver.state(), ReceiverState::Failed);
        peer_task.await.unwrap();
    }

    /// 탐색측 끝점을 연결 상태까지 진행
    async fn connected_peer(mut peer: MemoryTransport) -> (MemoryTransport, ConnectionHandle) {
        peer.init().await.unwrap();
        peer.register_contract(ServiceContract::new(0x180D, 0x2A37))
            .unwrap();
        peer.begin_discovery().await.unwrap();

        for _ in 0..100 {
            if let Some(TransportEvent::Connected(handle)) = peer.poll().await.unwrap() {
                return (peer, handle);
            }
        }
        panic!("peer never connected");
    }

    #[tokio::test]
    async fn test_peer_disconnect_mid_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().join("out.bin"),
            ..Config::unpaced()
        };
        let (peer, transport) = MemoryTransport::pair();
        let mut receiver = ReceiverSession::new(config.clone(), transport).unwrap();

        let peer_task = async move {
            let (mut peer, handle) = connected_peer(peer).await;
            let announce = Frame::Announce { total_size: 100 }.to_bytes().unwrap();
            peer.send(handle, &announce).await.unwrap();
            peer.send(handle, &data_frame(0, &[1; 20])).await.unwrap();
            drop(peer);
        };

        let (result, ()) = tokio::join!(receiver.run(), peer_task);
        assert!(matches!(result, Err(Error::PeerDisconnected)));
        assert_eq!(receiver.state(), ReceiverState::Failed);
        assert!(!config.output_path.exists());
        // 저장되지 않은 부분 데이터는 버려짐
        assert!(receiver.received().is_empty());
    }

    #[tokio::test]
    async fn test_size_set_before_run_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().join("out.bin"),
            ..Config::unpaced()
        };
        let (peer, transport) = MemoryTransport::pair();
        let mut receiver = ReceiverSession::new(config.clone(), transport).unwrap();
        receiver.expect_size(25).unwrap();

        // Announce 없이 Data만 전송
        let peer_task = async move {
            let (mut peer, handle) = connected_peer(peer).await;
            peer.send(handle, &data_frame(0, &[0xAA; 20])).await.unwrap();
            peer.send(handle, &data_frame(1, &[0xBB; 5])).await.unwrap();
            peer
        };

        let (result, _peer) = tokio::join!(receiver.run(), peer_task);
        let stats = result.unwrap();
        assert_eq!(receiver.state(), ReceiverState::Complete);
        assert_eq!(stats.total_bytes, 25);
        assert_eq!(std::fs::read(&config.output_path).unwrap().len(), 25);
    }

    #[tokio::test]
    async fn test_cancel_while_awaiting_peer() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = session(&dir);
        receiver.cancel_handle().cancel();

        assert!(matches!(receiver.run().await, Err(Error::Cancelled)));
        assert_eq!(receiver.state(), ReceiverState::Failed);
    }
}
