//! # blink
//!
//! 근거리 무선 링크를 통한 단일 파일 전송
//!
//! ## 핵심 특징
//! - **고정 용량 버퍼**: 용량을 넘는 쓰기는 거부, 절대 넘치지 않음
//! - **결정적 분할/조립**: 같은 입력은 항상 같은 프래그먼트 열
//! - **크기 공지**: 첫 프레임(Announce)으로 예상 크기 전달
//! - **순서 검출**: 시퀀스 번호로 누락/역순/중복 검출 (재전송은 없음)
//! - **고정 페이싱**: 프래그먼트 사이 일정 간격 대기
//! - **트랜스포트 추상화**: 무선 스택은 `Transport` 트레이트 뒤에 위치

pub mod buffer;
pub mod cancel;
pub mod config;
pub mod error;
pub mod fragment;
pub mod message;
pub mod mode;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod transport;

pub use buffer::{TransferBuffer, TransferContext};
pub use cancel::CancelHandle;
pub use config::Config;
pub use error::{Error, Result};
pub use fragment::{absorb, split, Fragment, Fragments, TransferState};
pub use message::Frame;
pub use mode::Mode;
pub use receiver::{ReceiveProgress, ReceiverSession, ReceiverState};
pub use sender::{SenderSession, SenderState};
pub use stats::TransferStats;
pub use transport::{
    ConnectionHandle, MemoryTransport, ServiceContract, Transport, TransportEvent, UdpTransport,
};

/// 프로토콜 버전
pub const PROTOCOL_VERSION: u8 = 1;

/// 매직 넘버 (프레임 식별용)
pub const MAGIC_NUMBER: u16 = 0x424C; // "BL"

/// 기본 버퍼 용량 (바이트)
pub const DEFAULT_MAX_FILE_SIZE: usize = 1024 * 1024; // 1MB

/// 기본 프래그먼트 크기 (바이트)
pub const DEFAULT_FRAGMENT_SIZE: usize = 20; // 기본 ATT MTU 23 - 3

/// 기본 프래그먼트 전송 간격 (밀리초)
pub const DEFAULT_PACING_DELAY_MS: u64 = 100;

/// 기본 서비스 ID
pub const DEFAULT_SERVICE_ID: u16 = 0x180D;

/// 기본 특성 ID
pub const DEFAULT_CHARACTERISTIC_ID: u16 = 0x2A37;

/// 기본 송신 파일 경로
pub const DEFAULT_SOURCE_PATH: &str = "/shared/test_file.bin";

/// 기본 수신 파일 저장 경로
pub const DEFAULT_OUTPUT_PATH: &str = "/shared/received_file.bin";
