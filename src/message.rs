//! TFTP 패킷 코덱
//!
//! 다섯 가지 메시지를 바이트로 변환하는 순수 함수 모음 (I/O 없음)
//!
//! ```text
//!          2 bytes   string    1 byte   string   1 byte
//! RRQ/WRQ | 01/02 | Filename |   0   |  Mode  |   0   |
//!
//!          2 bytes   2 bytes   n bytes (0 ~ 512)
//! DATA    |  03   | Block #  |  Data  |
//!
//!          2 bytes   2 bytes
//! ACK     |  04   | Block #  |
//!
//!          2 bytes   2 bytes    string   1 byte
//! ERROR   |  05   | ErrorCode | ErrMsg |   0   |
//! ```
//!
//! 모든 정수는 big-endian

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::BLOCK_SIZE;

/// opcode 필드 길이
const OPCODE_LEN: usize = 2;

/// opcode + block 번호 (DATA/ACK 헤더)
const HEADER_LEN: usize = 4;

/// opcode + 빈 filename 종단 + 빈 mode 종단
const REQUEST_MIN_LEN: usize = 4;

/// opcode + error code + 빈 메시지 종단
const ERROR_MIN_LEN: usize = 5;

/// 메시지 opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// 읽기 요청
    Rrq = 1,

    /// 쓰기 요청 (디코딩만 지원, 서버는 항상 거부)
    Wrq = 2,

    /// 데이터 블록
    Data = 3,

    /// 블록 확인 응답
    Ack = 4,

    /// 에러 통지
    Error = 5,
}

impl Opcode {
    /// 종류별 최소 패킷 길이
    pub fn min_len(self) -> usize {
        match self {
            Opcode::Rrq | Opcode::Wrq => REQUEST_MIN_LEN,
            Opcode::Data | Opcode::Ack => HEADER_LEN,
            Opcode::Error => ERROR_MIN_LEN,
        }
    }
}

impl TryFrom<u16> for Opcode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, u16> {
        match value {
            1 => Ok(Opcode::Rrq),
            2 => Ok(Opcode::Wrq),
            3 => Ok(Opcode::Data),
            4 => Ok(Opcode::Ack),
            5 => Ok(Opcode::Error),
            other => Err(other),
        }
    }
}

/// 전송 모드
///
/// 인식하지 못한 모드도 디코딩 단계에서는 보존함.
/// 거부 여부는 전송 상태 머신이 판단
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Netascii,
    Octet,
    Mail,
    Unrecognized(String),
}

impl Mode {
    /// 대소문자 구분 없이 모드 문자열 해석
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "netascii" => Mode::Netascii,
            "octet" => Mode::Octet,
            "mail" => Mode::Mail,
            _ => Mode::Unrecognized(raw.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Mode::Netascii => "netascii",
            Mode::Octet => "octet",
            Mode::Mail => "mail",
            Mode::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Mode::Unrecognized(_))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ERROR 패킷 에러 코드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// 0: 정의되지 않음 (메시지 참고)
    NotDefined,
    /// 1: 파일 없음
    FileNotFound,
    /// 2: 접근 위반
    AccessViolation,
    /// 3: 디스크 가득 참
    DiskFull,
    /// 4: 잘못된 TFTP 동작
    IllegalOperation,
    /// 5: 알 수 없는 전송 ID
    UnknownTid,
    /// 6: 파일이 이미 존재
    FileExists,
    /// 7: 사용자 없음
    NoSuchUser,
    /// 표준 범위 밖의 코드
    Other(u16),
}

impl From<u16> for ErrorCode {
    fn from(code: u16) -> Self {
        match code {
            0 => ErrorCode::NotDefined,
            1 => ErrorCode::FileNotFound,
            2 => ErrorCode::AccessViolation,
            3 => ErrorCode::DiskFull,
            4 => ErrorCode::IllegalOperation,
            5 => ErrorCode::UnknownTid,
            6 => ErrorCode::FileExists,
            7 => ErrorCode::NoSuchUser,
            other => ErrorCode::Other(other),
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NotDefined => 0,
            ErrorCode::FileNotFound => 1,
            ErrorCode::AccessViolation => 2,
            ErrorCode::DiskFull => 3,
            ErrorCode::IllegalOperation => 4,
            ErrorCode::UnknownTid => 5,
            ErrorCode::FileExists => 6,
            ErrorCode::NoSuchUser => 7,
            ErrorCode::Other(other) => other,
        }
    }
}

/// RRQ/WRQ 본문
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub filename: String,
    pub mode: Mode,
}

impl Request {
    pub fn new(filename: impl Into<String>, mode: Mode) -> Self {
        Self {
            filename: filename.into(),
            mode,
        }
    }
}

/// 디코딩 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("패킷이 너무 짧음: 최소 {min} bytes, 실제 {got} bytes")]
    TooShort { min: usize, got: usize },

    #[error("opcode 불일치: expected {expected}, got {got}")]
    WrongOpcode { expected: u16, got: u16 },

    #[error("알 수 없는 opcode: {0}")]
    UnknownOpcode(u16),

    #[error("NUL 종단 문자 없음")]
    MissingTerminator,

    #[error("잘못된 패킷: {0}")]
    Malformed(&'static str),
}

/// 인코딩 에러 (호출자 프로그래밍 오류, 와이어로 보내지 않음)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("지원하지 않는 전송 모드: {0}")]
    UnsupportedMode(String),

    #[error("{field} 필드에 NUL 포함")]
    EmbeddedNul { field: &'static str },
}

/// 통합 메시지 enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ReadRequest(Request),
    WriteRequest(Request),
    Data { block: u16, payload: Bytes },
    Ack { block: u16 },
    Error { code: ErrorCode, message: String },
}

impl Message {
    /// 메시지 opcode 반환
    pub fn opcode(&self) -> Opcode {
        match self {
            Message::ReadRequest(_) => Opcode::Rrq,
            Message::WriteRequest(_) => Opcode::Wrq,
            Message::Data { .. } => Opcode::Data,
            Message::Ack { .. } => Opcode::Ack,
            Message::Error { .. } => Opcode::Error,
        }
    }

    /// 바이트로 직렬화
    ///
    /// 요청 메시지만 실패할 수 있음 (모드 미인식, 필드 내 NUL)
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        match self {
            Message::ReadRequest(req) => encode_request(Opcode::Rrq, req),
            Message::WriteRequest(req) => encode_request(Opcode::Wrq, req),
            Message::Data { block, payload } => Ok(encode_data(*block, payload)),
            Message::Ack { block } => Ok(encode_ack(*block)),
            Message::Error { code, message } => Ok(encode_error(*code, message)),
        }
    }

    /// 지정한 종류로 역직렬화
    ///
    /// 길이 검사가 opcode 검사보다 먼저 수행됨
    pub fn decode(bytes: &[u8], expected: Opcode) -> Result<Self, DecodeError> {
        let min = expected.min_len();
        if bytes.len() < min {
            return Err(DecodeError::TooShort {
                min,
                got: bytes.len(),
            });
        }

        let got = u16::from_be_bytes([bytes[0], bytes[1]]);
        if got != expected as u16 {
            return Err(DecodeError::WrongOpcode {
                expected: expected as u16,
                got,
            });
        }

        match expected {
            Opcode::Rrq => decode_request(&bytes[OPCODE_LEN..]).map(Message::ReadRequest),
            Opcode::Wrq => decode_request(&bytes[OPCODE_LEN..]).map(Message::WriteRequest),
            Opcode::Data => decode_data(bytes),
            Opcode::Ack => decode_ack(bytes),
            Opcode::Error => decode_error(bytes),
        }
    }

    /// 선두 opcode를 보고 해당 종류로 역직렬화
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw = peek_opcode(bytes)?;
        let opcode = Opcode::try_from(raw).map_err(DecodeError::UnknownOpcode)?;
        Self::decode(bytes, opcode)
    }
}

/// 선두 2바이트 opcode 값 (검증 없음)
pub fn peek_opcode(bytes: &[u8]) -> Result<u16, DecodeError> {
    if bytes.len() < OPCODE_LEN {
        return Err(DecodeError::TooShort {
            min: OPCODE_LEN,
            got: bytes.len(),
        });
    }
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn encode_request(opcode: Opcode, req: &Request) -> Result<Bytes, EncodeError> {
    if !req.mode.is_recognized() {
        return Err(EncodeError::UnsupportedMode(req.mode.as_str().to_owned()));
    }
    if req.filename.as_bytes().contains(&0) {
        return Err(EncodeError::EmbeddedNul { field: "filename" });
    }

    let filename = req.filename.as_bytes();
    let mode = req.mode.as_str().as_bytes();

    let mut buf = BytesMut::with_capacity(OPCODE_LEN + filename.len() + 1 + mode.len() + 1);
    buf.put_u16(opcode as u16);
    buf.put_slice(filename);
    buf.put_u8(0);
    buf.put_slice(mode);
    buf.put_u8(0);
    Ok(buf.freeze())
}

/// DATA 패킷 직렬화
pub fn encode_data(block: u16, payload: &[u8]) -> Bytes {
    debug_assert!(payload.len() <= BLOCK_SIZE);

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u16(Opcode::Data as u16);
    buf.put_u16(block);
    buf.put_slice(payload);
    buf.freeze()
}

/// ACK 패킷 직렬화
pub fn encode_ack(block: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    buf.put_u16(Opcode::Ack as u16);
    buf.put_u16(block);
    buf.freeze()
}

/// ERROR 패킷 직렬화
pub fn encode_error(code: ErrorCode, message: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(ERROR_MIN_LEN + message.len());
    buf.put_u16(Opcode::Error as u16);
    buf.put_u16(code.into());
    buf.put_slice(message.as_bytes());
    buf.put_u8(0);
    buf.freeze()
}

fn decode_request(body: &[u8]) -> Result<Request, DecodeError> {
    let name_end = body
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::MissingTerminator)?;

    let rest = &body[name_end + 1..];
    if rest.is_empty() {
        return Err(DecodeError::Malformed("filename 뒤에 mode 필드 없음"));
    }

    // mode 종단 이후 바이트(옵션 확장)는 무시
    let mode_end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::MissingTerminator)?;
    if mode_end == 0 {
        return Err(DecodeError::Malformed("mode 필드가 비어 있음"));
    }

    let filename = std::str::from_utf8(&body[..name_end])
        .map_err(|_| DecodeError::Malformed("filename이 UTF-8이 아님"))?;
    let mode = std::str::from_utf8(&rest[..mode_end])
        .map_err(|_| DecodeError::Malformed("mode가 UTF-8이 아님"))?;

    Ok(Request::new(filename, Mode::parse(mode)))
}

fn decode_data(bytes: &[u8]) -> Result<Message, DecodeError> {
    let payload = &bytes[HEADER_LEN..];
    if payload.len() > BLOCK_SIZE {
        return Err(DecodeError::Malformed("DATA 페이로드가 블록 크기 초과"));
    }

    Ok(Message::Data {
        block: u16::from_be_bytes([bytes[2], bytes[3]]),
        payload: Bytes::copy_from_slice(payload),
    })
}

fn decode_ack(bytes: &[u8]) -> Result<Message, DecodeError> {
    if bytes.len() != HEADER_LEN {
        return Err(DecodeError::Malformed("ACK 패킷은 정확히 4바이트"));
    }

    Ok(Message::Ack {
        block: u16::from_be_bytes([bytes[2], bytes[3]]),
    })
}

fn decode_error(bytes: &[u8]) -> Result<Message, DecodeError> {
    let (last, body) = bytes.split_last().ok_or(DecodeError::MissingTerminator)?;
    if *last != 0 {
        return Err(DecodeError::MissingTerminator);
    }

    Ok(Message::Error {
        code: ErrorCode::from(u16::from_be_bytes([bytes[2], bytes[3]])),
        message: String::from_utf8_lossy(&body[HEADER_LEN..]).into_owned(),
    })
}
