//! 프래그먼트 분할/조립
//!
//! - split: 버퍼 스냅샷을 최대 크기 단위의 순서 있는 프래그먼트로 분할
//! - absorb: 도착 순서대로 프래그먼트를 싱크 버퍼에 이어 붙임
//!
//! I/O 없음, 상태 없음

use crate::buffer::TransferBuffer;
use crate::{Error, Result};

/// 프래그먼트 (한 번의 전송 단위에 실리는 페이로드 조각)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    /// 원본 내 오프셋 (바이트)
    pub offset: usize,

    /// 페이로드
    pub payload: &'a [u8],
}

impl<'a> Fragment<'a> {
    pub fn new(offset: usize, payload: &'a [u8]) -> Self {
        Self { offset, payload }
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// 수신 진행 상태
///
/// `expected_size == 0` 이면 아직 크기가 공지되지 않은 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferState {
    /// 예상 총 크기
    pub expected_size: usize,

    /// 수신된 크기
    pub received_size: usize,
}

impl TransferState {
    pub fn new(expected_size: usize) -> Self {
        Self {
            expected_size,
            received_size: 0,
        }
    }

    pub fn is_announced(&self) -> bool {
        self.expected_size > 0
    }

    /// 완료 여부 (수신 크기 == 예상 크기)
    pub fn is_complete(&self) -> bool {
        self.is_announced() && self.received_size == self.expected_size
    }

    pub fn remaining(&self) -> usize {
        self.expected_size.saturating_sub(self.received_size)
    }

    /// 수신률 계산
    pub fn receive_ratio(&self) -> f64 {
        if self.expected_size == 0 {
            return 0.0;
        }
        self.received_size as f64 / self.expected_size as f64
    }
}

/// `split`이 생성하는 프래그먼트 반복자
///
/// `Clone`으로 처음부터 다시 순회할 수 있음
#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    data: &'a [u8],
    max_fragment_size: usize,
    offset: usize,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }

        let end = (self.offset + self.max_fragment_size).min(self.data.len());
        let fragment = Fragment::new(self.offset, &self.data[self.offset..end]);
        self.offset = end;
        Some(fragment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = fragment_count(self.data.len() - self.offset, self.max_fragment_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Fragments<'_> {}

impl std::iter::FusedIterator for Fragments<'_> {}

/// 데이터를 `max_fragment_size` 단위로 분할
///
/// # Panics
/// `max_fragment_size`가 0이면 패닉 (설정 검증에서 이미 거부됨)
pub fn split(data: &[u8], max_fragment_size: usize) -> Fragments<'_> {
    assert!(max_fragment_size > 0, "fragment size must be non-zero");
    Fragments {
        data,
        max_fragment_size,
        offset: 0,
    }
}

/// `len` 바이트를 분할할 때 생기는 프래그먼트 수
pub fn fragment_count(len: usize, max_fragment_size: usize) -> usize {
    if max_fragment_size == 0 {
        return 0;
    }
    (len + max_fragment_size - 1) / max_fragment_size
}

/// 도착한 프래그먼트를 싱크 끝에 이어 붙이고 진행 상태 갱신
///
/// 실패 시 싱크와 상태는 변경되지 않음 (부분 쓰기 없음).
/// 도착 순서를 그대로 신뢰하며 순서 검사는 호출자가 담당.
pub fn absorb(
    state: TransferState,
    incoming: &Fragment<'_>,
    sink: &mut TransferBuffer,
) -> Result<TransferState> {
    let size = incoming.size();

    if state.is_announced() && state.received_size + size > state.expected_size {
        return Err(Error::SizeMismatch {
            expected: state.expected_size,
            received: state.received_size,
            incoming: size,
        });
    }

    sink.append(incoming.payload)?;

    Ok(TransferState {
        expected_size: state.expected_size,
        received_size: state.received_size + size,
    })
}
