//! 전송 프레임 정의
//!
//! 한 번의 전송 단위 = 고정 길이 헤더 + (Data일 때) 페이로드
//!
//! ```text
//! Announce : header(seq=0, value=total_size)          -- 프래그먼트 0, 크기 공지
//! Data     : header(seq=n, value=payload_len) payload -- n = 0, 1, 2, ...
//! End      : header(seq=fragments, value=total_size)  -- 마지막 프래그먼트 이후
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Result, MAGIC_NUMBER, PROTOCOL_VERSION};

/// 직렬화된 헤더 길이 (bincode fixint: 2 + 1 + 4 + 4 + 4)
pub const FRAME_HEADER_LEN: usize = 15;

/// Data 프레임 페이로드 최대 길이
pub const MAX_FRAME_PAYLOAD: usize = 60_000;

/// 프레임 타입
///
/// bincode가 변형 인덱스를 u32로 기록 (Announce=0, Data=1, End=2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    /// 전체 크기 공지
    Announce,

    /// 데이터 프래그먼트
    Data,

    /// 전송 종료
    End,
}

/// 프레임 헤더 (고정 길이)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameHeader {
    /// 매직 넘버
    pub magic: u16,

    /// 프로토콜 버전
    pub version: u8,

    /// 프레임 타입
    pub kind: FrameKind,

    /// 시퀀스 번호 (Data) 또는 프래그먼트 수 (End)
    pub seq: u32,

    /// 페이로드 길이 (Data) 또는 전체 크기 (Announce/End)
    pub value: u32,
}

impl FrameHeader {
    pub fn new(kind: FrameKind, seq: u32, value: u32) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            version: PROTOCOL_VERSION,
            kind,
            seq,
            value,
        }
    }
}

/// 전송 프레임
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Announce { total_size: u32 },
    Data { seq: u32, payload: &'a [u8] },
    End { fragments: u32, total_size: u32 },
}

impl<'a> Frame<'a> {
    fn header(&self) -> FrameHeader {
        match *self {
            Frame::Announce { total_size } => FrameHeader::new(FrameKind::Announce, 0, total_size),
            Frame::Data { seq, payload } => {
                FrameHeader::new(FrameKind::Data, seq, payload.len() as u32)
            }
            Frame::End {
                fragments,
                total_size,
            } => FrameHeader::new(FrameKind::End, fragments, total_size),
        }
    }

    /// 바이트로 직렬화
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if let Frame::Data { payload, .. } = self {
            if payload.len() > MAX_FRAME_PAYLOAD {
                return Err(Error::InvalidFrame(format!(
                    "payload {} exceeds {}",
                    payload.len(),
                    MAX_FRAME_PAYLOAD
                )));
            }
        }

        let header_bytes = bincode::serialize(&self.header())?;
        let payload: &[u8] = match self {
            Frame::Data { payload, .. } => *payload,
            _ => &[],
        };

        let mut buf = Vec::with_capacity(header_bytes.len() + payload.len());
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(payload);
        Ok(buf)
    }

    /// 바이트에서 역직렬화 (페이로드는 입력을 빌림)
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(Error::InvalidFrame(format!(
                "frame too short: {} bytes",
                bytes.len()
            )));
        }

        let header: FrameHeader = bincode::deserialize(&bytes[..FRAME_HEADER_LEN])?;

        if header.magic != MAGIC_NUMBER {
            return Err(Error::InvalidMagicNumber {
                expected: MAGIC_NUMBER,
                got: header.magic,
            });
        }
        if header.version != PROTOCOL_VERSION {
            return Err(Error::InvalidVersion {
                expected: PROTOCOL_VERSION,
                got: header.version,
            });
        }

        let body = &bytes[FRAME_HEADER_LEN..];
        match header.kind {
            FrameKind::Data => {
                if body.len() != header.value as usize {
                    return Err(Error::InvalidFrame(format!(
                        "payload length mismatch: header {} != body {}",
                        header.value,
                        body.len()
                    )));
                }
                Ok(Frame::Data {
                    seq: header.seq,
                    payload: body,
                })
            }
            FrameKind::Announce | FrameKind::End if !body.is_empty() => Err(Error::InvalidFrame(
                format!("{:?} frame carries {} trailing bytes", header.kind, body.len()),
            )),
            FrameKind::Announce => Ok(Frame::Announce {
                total_size: header.value,
            }),
            FrameKind::End => Ok(Frame::End {
                fragments: header.seq,
                total_size: header.value,
            }),
        }
    }
}
