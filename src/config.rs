//! 전송 설정
//!
//! 용량/프래그먼트 크기/페이싱은 매직 넘버가 아닌 설정값으로 관리

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::message::MAX_FRAME_PAYLOAD;
use crate::{
    Error, Result, DEFAULT_CHARACTERISTIC_ID, DEFAULT_FRAGMENT_SIZE, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_OUTPUT_PATH, DEFAULT_PACING_DELAY_MS, DEFAULT_SERVICE_ID, DEFAULT_SOURCE_PATH,
};

/// blink 전송 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 전송 버퍼 용량 (바이트)
    /// 이보다 큰 파일은 잘려서 전송됨
    pub max_file_size: usize,

    /// 프래그먼트 최대 크기 (바이트, 프레임 헤더 제외)
    pub fragment_size: usize,

    /// 프래그먼트 전송 간격 (밀리초)
    /// 0이면 간격 없이 전송
    pub pacing_delay_ms: u64,

    /// 트랜스포트 poll 대기 시간 (밀리초)
    pub poll_interval_ms: u64,

    /// 피어 탐색 타임아웃 (밀리초, None이면 무한 대기)
    pub discovery_timeout_ms: Option<u64>,

    /// 수신 정체 타임아웃 (밀리초, None이면 무한 대기)
    pub stall_timeout_ms: Option<u64>,

    /// 송신할 파일 경로
    pub source_path: PathBuf,

    /// 수신 파일 저장 경로 (기존 파일은 덮어씀)
    pub output_path: PathBuf,

    /// 서비스 ID
    pub service_id: u16,

    /// 특성(characteristic) ID
    pub characteristic_id: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            pacing_delay_ms: DEFAULT_PACING_DELAY_MS,
            poll_interval_ms: 10,
            discovery_timeout_ms: None,
            stall_timeout_ms: None,
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            service_id: DEFAULT_SERVICE_ID,
            characteristic_id: DEFAULT_CHARACTERISTIC_ID,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// TOML 파일에서 설정 로드
    ///
    /// 파일에 없는 항목은 기본값 사용
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// TOML 문자열에서 설정 파싱
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(Error::InvalidConfig("max_file_size must be > 0".into()));
        }
        if self.max_file_size > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "max_file_size {} exceeds {}",
                self.max_file_size,
                u32::MAX
            )));
        }
        if self.fragment_size == 0 {
            return Err(Error::InvalidConfig("fragment_size must be > 0".into()));
        }
        if self.fragment_size > self.max_file_size {
            return Err(Error::InvalidConfig(format!(
                "fragment_size {} exceeds max_file_size {}",
                self.fragment_size, self.max_file_size
            )));
        }
        if self.fragment_size > MAX_FRAME_PAYLOAD {
            return Err(Error::InvalidConfig(format!(
                "fragment_size {} exceeds frame payload limit {}",
                self.fragment_size, MAX_FRAME_PAYLOAD
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("poll_interval_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 주어진 크기의 파일에 필요한 프래그먼트 수
    pub fn fragments_for(&self, len: usize) -> usize {
        crate::fragment::fragment_count(len, self.fragment_size)
    }

    /// BLE 4.2+ 데이터 길이 확장(DLE) 링크용 설정
    pub fn extended_mtu() -> Self {
        Self {
            fragment_size: 244,  // ATT MTU 247 - 3
            pacing_delay_ms: 15, // 연결 간격 1회분
            ..Self::default()
        }
    }

    /// 페이싱 없는 설정 (루프백/테스트용)
    pub fn unpaced() -> Self {
        Self {
            pacing_delay_ms: 0,
            poll_interval_ms: 5,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_link_defaults() {
        let config = Config::default();
        assert_eq!(config.max_file_size, 1024 * 1024);
        assert_eq!(config.fragment_size, 20);
        assert_eq!(config.pacing_delay(), Duration::from_millis(100));
        assert_eq!(config.service_id, 0x180D);
        assert_eq!(config.characteristic_id, 0x2A37);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(Config::extended_mtu().validate().is_ok());
        assert!(Config::unpaced().validate().is_ok());
    }

    #[test]
    fn test_fragments_for() {
        let config = Config::default();
        assert_eq!(config.fragments_for(45), 3);
        assert_eq!(config.fragments_for(40), 2);
        assert_eq!(config.fragments_for(1), 1);
        assert_eq!(config.fragments_for(0), 0);
    }

    #[test]
    fn test_validate_rejects_zero_fragment_size() {
        let config = Config {
            fragment_size: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_fragment_larger_than_capacity() {
        let config = Config {
            max_file_size: 16,
            fragment_size: 20,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_toml_partial_override() {
        let config = Config::from_toml_str(
            r#"
            fragment_size = 64
            pacing_delay_ms = 5
            output_path = "/tmp/out.bin"
            "#,
        )
        .unwrap();

        assert_eq!(config.fragment_size, 64);
        assert_eq!(config.pacing_delay_ms, 5);
        assert_eq!(config.output_path, PathBuf::from("/tmp/out.bin"));
        // 지정하지 않은 항목은 기본값
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.discovery_timeout_ms, None);
    }

    #[test]
    fn test_toml_invalid_values_rejected() {
        let err = Config::from_toml_str("fragment_size = 0").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = Config::from_toml_str("fragment_size = \"big\"").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blink.toml");
        std::fs::write(&path, "max_file_size = 4096\nstall_timeout_ms = 2000\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_file_size, 4096);
        assert_eq!(config.stall_timeout_ms, Some(2000));

        let missing = Config::load(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(Error::InvalidConfig(_))));
    }
}
