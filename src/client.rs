//! 다운로드 클라이언트 (읽기 요청 전용)
//!
//! - RRQ 송신 후 첫 DATA의 송신 주소를 서버 TID로 고정
//! - 순서대로 도착한 블록만 조립, 직전 블록 중복은 ACK 재송신
//! - 타임아웃 시 마지막 패킷(RRQ 또는 ACK) 재송신

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::message::{encode_ack, encode_error, ErrorCode, Message, Mode, Request};
use crate::{Config, Error, Result, BLOCK_SIZE};

/// 수신 버퍼 (최대 DATA 패킷보다 여유 있게)
const RECV_BUF_SIZE: usize = BLOCK_SIZE + 64;

/// TFTP 다운로드 클라이언트
pub struct Client {
    config: Config,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 서버에서 파일 하나를 받아 메모리로 반환
    pub async fn get(&self, server: SocketAddr, filename: &str, mode: Mode) -> Result<Bytes> {
        let request = Message::ReadRequest(Request::new(filename, mode)).encode()?;

        let local = match server {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        let socket = UdpSocket::bind(local).await?;
        let timeout = self.config.read_timeout();

        let mut received = BytesMut::new();
        let mut expected: u16 = 1;
        let mut last_acked: Option<u16> = None;
        let mut peer: Option<SocketAddr> = None;

        // 타임아웃 시 재송신할 패킷과 대상
        let mut last_packet = request.clone();
        let mut last_dest = server;
        let mut retries = 0u32;

        socket.send_to(&request, server).await?;
        let mut deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; RECV_BUF_SIZE];

        loop {
            let (len, from) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Err(_) => {
                    retries += 1;
                    if retries >= self.config.max_retries {
                        warn!("서버 응답 없음: block={}", expected);
                        return Err(Error::Timeout { block: expected });
                    }
                    debug!("DATA {} 타임아웃, 재시도 {}", expected, retries);
                    socket.send_to(&last_packet, last_dest).await?;
                    deadline = Instant::now() + timeout;
                    continue;
                }
                Ok(result) => result?,
            };

            if let Some(tid) = peer {
                if from != tid {
                    warn!("알 수 없는 TID 패킷: {}", from);
                    let packet = encode_error(ErrorCode::UnknownTid, "Unknown transfer ID");
                    if let Err(e) = socket.send_to(&packet, from).await {
                        warn!("ERROR 송신 실패: {} ({})", from, e);
                    }
                    continue;
                }
            }

            match Message::parse(&buf[..len]) {
                Ok(Message::Data { block, payload }) => {
                    if peer.is_none() {
                        peer = Some(from);
                    }

                    if block == expected {
                        received.extend_from_slice(&payload);

                        let ack = encode_ack(block);
                        socket.send_to(&ack, from).await?;
                        last_acked = Some(block);
                        last_packet = ack;
                        last_dest = from;
                        retries = 0;
                        deadline = Instant::now() + timeout;

                        if payload.len() < BLOCK_SIZE {
                            info!(
                                "Download complete: {} ({} bytes, {} blocks)",
                                filename,
                                received.len(),
                                block
                            );
                            return Ok(received.freeze());
                        }
                        expected = expected.wrapping_add(1);
                    } else if Some(block) == last_acked {
                        // 서버가 ACK를 못 받음
                        socket.send_to(&encode_ack(block), from).await?;
                    } else {
                        debug!("순서 밖 블록 무시: {} (expected {})", block, expected);
                    }
                }
                Ok(Message::Error { code, message }) => {
                    return Err(Error::Remote { code, message });
                }
                Ok(other) => {
                    return Err(Error::UnexpectedPacket {
                        opcode: other.opcode() as u16,
                    });
                }
                Err(e) => {
                    debug!("해석 불가 패킷 무시: {}", e);
                }
            }
        }
    }
}
