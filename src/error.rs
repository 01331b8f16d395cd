//! 에러 타입 정의
//!
//! 모든 에러는 현재 전송 실행에 대해 치명적임 (재시도/부분 복구 없음)

use std::path::PathBuf;

use thiserror::Error;

/// blink 전송 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("원본 파일을 열 수 없음: {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("입력이 비어 있음 (0 바이트)")]
    EmptyInput,

    #[error("출력 파일을 쓸 수 없음: {path}: {source}")]
    SinkUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("버퍼 용량 초과: length={length} + incoming={incoming} > capacity={capacity}")]
    CapacityExceeded {
        length: usize,
        incoming: usize,
        capacity: usize,
    },

    #[error("트랜스포트 초기화 실패: {0}")]
    TransportInitFailed(String),

    #[error("유효하지 않은 모드 선택: {0:?}")]
    InvalidModeSelection(String),

    #[error("예상 크기 초과: received={received} + incoming={incoming} > expected={expected}")]
    SizeMismatch {
        expected: usize,
        received: usize,
        incoming: usize,
    },

    #[error("시퀀스 불일치: expected {expected}, got {got}")]
    SequenceGap { expected: u32, got: u32 },

    #[error("전송 크기가 아직 공지되지 않음")]
    SizeNotAnnounced,

    #[error("전송 미완료: {received}/{expected} 바이트 수신")]
    IncompleteTransfer { expected: usize, received: usize },

    #[error("유효하지 않은 프레임: {0}")]
    InvalidFrame(String),

    #[error("유효하지 않은 매직 넘버: expected {expected:04X}, got {got:04X}")]
    InvalidMagicNumber { expected: u16, got: u16 },

    #[error("유효하지 않은 프로토콜 버전: expected {expected}, got {got}")]
    InvalidVersion { expected: u8, got: u8 },

    #[error("연결되지 않음")]
    NotConnected,

    #[error("피어 연결 종료")]
    PeerDisconnected,

    #[error("피어 탐색 타임아웃: {timeout_ms}ms")]
    DiscoveryTimeout { timeout_ms: u64 },

    #[error("전송 정체: {timeout_ms}ms 동안 데이터 없음")]
    TransferStalled { timeout_ms: u64 },

    #[error("전송 취소됨")]
    Cancelled,

    #[error("잘못된 세션 상태: {0}")]
    InvalidState(String),

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("트랜스포트 에러: {0}")]
    Transport(String),

    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
