//! 고정 용량 전송 버퍼
//!
//! 송신측은 파일 전체를 적재한 뒤 분할하고,
//! 수신측은 예상 크기에 도달할 때까지 프래그먼트를 이어 붙임

use std::io::Read;

use tracing::warn;

use crate::fragment::TransferState;
use crate::{Error, Result};

/// 고정 용량 바이트 아레나 + 쓰기 커서
///
/// 불변식: `0 <= length <= capacity`
#[derive(Debug)]
pub struct TransferBuffer {
    data: Box<[u8]>,
    length: usize,
}

impl TransferBuffer {
    /// 용량 `capacity`로 한 번만 할당
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            length: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// 남은 여유 공간
    pub fn remaining(&self) -> usize {
        self.capacity() - self.length
    }

    /// 길이만 0으로 (메모리는 지우지 않음)
    pub fn reset(&mut self) {
        self.length = 0;
    }

    /// 외부 소스에서 최대 `capacity` 바이트를 적재
    ///
    /// 용량보다 큰 소스는 잘림 (경고 로그). 0 바이트면 `EmptyInput`.
    pub fn load_from_source<R: Read>(&mut self, mut source: R) -> Result<usize> {
        self.reset();

        let mut filled = 0;
        while filled < self.data.len() {
            match source.read(&mut self.data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        if filled == 0 {
            return Err(Error::EmptyInput);
        }

        if filled == self.data.len() {
            // 용량을 채웠다면 남은 데이터가 있는지 확인
            let mut probe = [0u8; 1];
            if matches!(source.read(&mut probe), Ok(n) if n > 0) {
                warn!(
                    "소스가 버퍼 용량보다 큼: {} 바이트로 잘림",
                    self.data.len()
                );
            }
        }

        self.length = filled;
        Ok(filled)
    }

    /// 끝에 바이트 추가 (전부 아니면 전무)
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.length + bytes.len();
        if end > self.capacity() {
            return Err(Error::CapacityExceeded {
                length: self.length,
                incoming: bytes.len(),
                capacity: self.capacity(),
            });
        }

        self.data[self.length..end].copy_from_slice(bytes);
        self.length = end;
        Ok(())
    }

    /// 유효 구간 `[0, length)` 읽기 전용 뷰
    pub fn snapshot(&self) -> &[u8] {
        &self.data[..self.length]
    }
}

/// 세션이 소유하는 전송 컨텍스트 (버퍼 + 진행 상태)
#[derive(Debug)]
pub struct TransferContext {
    pub buffer: TransferBuffer,
    pub state: TransferState,
}

impl TransferContext {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: TransferBuffer::new(capacity),
            state: TransferState::default(),
        }
    }

    /// 새 전송 시작 전 초기화
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.state = TransferState::default();
    }
}
