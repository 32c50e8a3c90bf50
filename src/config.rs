//! 서버/클라이언트 설정

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::{DEFAULT_MAX_RETRIES, DEFAULT_PORT, DEFAULT_READ_TIMEOUT_MS};

/// RTFTP 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 요청 수신 주소
    pub bind_addr: SocketAddr,

    /// 파일 제공 루트 디렉터리
    pub root_dir: PathBuf,

    /// ACK(클라이언트는 DATA) 대기 타임아웃 (밀리초)
    pub read_timeout_ms: u64,

    /// 블록당 최대 전송 시도 횟수
    pub max_retries: u32,

    /// 최대 동시 전송 수 (0이면 제한 없음)
    pub max_concurrent_transfers: usize,

    /// 수신 버퍼 크기
    pub recv_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            root_dir: PathBuf::from("./tftp-root"),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS, // 5초
            max_retries: DEFAULT_MAX_RETRIES,
            max_concurrent_transfers: 0, // 제한 없음
            recv_buffer_size: 1024,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 루트 디렉터리 지정
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            read_timeout_ms: 10_000,
            max_retries: 6,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_protocol_constants() {
        let config = Config::default();
        assert_eq!(config.bind_addr.port(), 69);
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_concurrent_transfers, 0);
    }

    #[test]
    fn test_presets() {
        let config = Config::with_root("/srv/tftp");
        assert_eq!(config.root_dir, PathBuf::from("/srv/tftp"));

        let unstable = Config::unstable_network();
        assert!(unstable.read_timeout() > Config::default().read_timeout());
        assert!(unstable.max_retries > Config::default().max_retries);
    }
}
