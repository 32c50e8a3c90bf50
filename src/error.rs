//! 에러 타입 정의

use thiserror::Error;

use crate::message::{DecodeError, EncodeError, ErrorCode};

/// RTFTP 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("패킷 디코딩 에러: {0}")]
    Decode(#[from] DecodeError),

    #[error("패킷 인코딩 에러: {0}")]
    Encode(#[from] EncodeError),

    /// 상대방이 ERROR 패킷을 보냄
    #[error("원격 에러: code={code:?}, message={message}")]
    Remote { code: ErrorCode, message: String },

    #[error("응답 타임아웃: block={block}")]
    Timeout { block: u16 },

    #[error("예상하지 못한 패킷: opcode={opcode}")]
    UnexpectedPacket { opcode: u16 },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
