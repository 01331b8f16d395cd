//! 전송 통계

use std::time::{Duration, Instant};

/// 전송 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 완료 시간
    pub end_time: Option<Instant>,

    /// 예상 프래그먼트 수
    pub expected_fragments: u64,

    /// 처리한 프래그먼트 수
    pub total_fragments: u64,

    /// 처리한 페이로드 바이트
    pub total_bytes: u64,
}

impl TransferStats {
    pub fn new(expected_fragments: u64) -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            expected_fragments,
            total_fragments: 0,
            total_bytes: 0,
        }
    }

    /// 프래그먼트 처리 기록
    pub fn record_fragment(&mut self, size: usize) {
        self.total_fragments += 1;
        self.total_bytes += size as u64;
    }

    /// 완료 시각 고정
    pub fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Instant::now());
        }
    }

    /// 경과 시간 (완료 후에는 고정)
    pub fn elapsed(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 진행률 (0.0 ~ 1.0)
    pub fn progress(&self) -> f64 {
        if self.expected_fragments == 0 {
            return 0.0;
        }
        (self.total_fragments as f64 / self.expected_fragments as f64).min(1.0)
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Fragments: {}/{} | Bytes: {} | Throughput: {:.2} KB/s",
            self.elapsed().as_secs_f64(),
            self.total_fragments,
            self.expected_fragments,
            self.total_bytes,
            self.throughput() / 1_000.0,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new(0)
    }
}
