//! # RTFTP
//!
//! UDP 기반 lock-step 파일 전송 (TFTP, RFC 1350) 읽기 전용 응답기
//!
//! ## 핵심 특징
//! - **패킷 코덱**: RRQ/WRQ/DATA/ACK/ERROR 다섯 가지 메시지의 순수 인코딩/디코딩
//! - **전송 상태 머신**: 블록 전송, ACK 매칭, 타임아웃 재전송, 종료 판정
//! - **전용 채널**: 전송마다 클라이언트에 연결된 소켓 사용 (다른 트래픽과 격리)
//! - **경로 격리**: 루트 디렉터리 밖으로 벗어나는 요청 거부
//! - **읽기 전용**: 쓰기 요청(WRQ)은 항상 거부

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod resolver;
pub mod server;
pub mod stats;
pub mod transfer;

pub use channel::{Channel, ReplySink, UdpChannel};
pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};
pub use message::{DecodeError, EncodeError, ErrorCode, Message, Mode, Opcode, Request};
pub use resolver::{OpenError, Resolver};
pub use server::Server;
pub use stats::{ServerStats, TransferStats};
pub use transfer::{Transfer, TransferOutcome};

/// 데이터 블록 최대 크기 (바이트)
pub const BLOCK_SIZE: usize = 512;

/// 기본 서버 포트
pub const DEFAULT_PORT: u16 = 69;

/// 기본 ACK 대기 타임아웃 (밀리초)
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

/// 블록당 최대 전송 시도 횟수
pub const DEFAULT_MAX_RETRIES: u32 = 3;
