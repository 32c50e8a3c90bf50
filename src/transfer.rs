//! 전송 상태 머신 (읽기 요청 하나당 하나)
//!
//! `검증 → 열기 → 전송(블록 n) → 완료 | 중단`
//!
//! - 블록 n의 ACK를 확인하기 전에는 블록 n+1을 보내지 않음
//! - 블록 번호가 다른 ACK나 해석 불가능한 데이터그램은 잡음으로 취급 (재시도 소모 없음)
//! - 512 바이트 미만 블록의 ACK를 받으면 완료

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::channel::{Channel, ReplySink, UdpChannel};
use crate::message::{encode_error, ErrorCode, Message, Opcode, Request};
use crate::resolver::{OpenError, Resolver};
use crate::stats::TransferStats;
use crate::{message, Config, BLOCK_SIZE};

/// ACK 수신 버퍼 (4바이트보다 큰 패킷도 잘리지 않게 받음)
const ACK_BUF_SIZE: usize = BLOCK_SIZE + 4;

/// 전송 종료 결과 (전송당 정확히 하나)
#[derive(Debug)]
pub enum TransferOutcome {
    /// 마지막 블록까지 ACK 확인
    Completed(TransferStats),

    /// 요청 단계에서 ERROR 응답 후 종료
    Rejected {
        code: ErrorCode,
        message: &'static str,
    },

    /// ACK 재시도 소진, ERROR 송신 후 종료
    TimedOut { block: u16, stats: TransferStats },

    /// 전송 계층 장애로 포기 (ERROR 보장 없음)
    Abandoned { reason: String },
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed(_))
    }
}

/// 블록 ACK 대기 결과
enum AckWait {
    Acked,
    Exhausted,
}

/// 진행 중인 단일 전송
pub struct Transfer<R, C> {
    /// 클라이언트 주소
    client: SocketAddr,

    /// 파일 데이터
    reader: R,

    /// 전용 채널
    channel: C,

    /// 현재 블록 번호 (1부터 시작, 65535 다음은 0)
    block: u16,

    /// 현재 블록의 타임아웃 횟수
    retries: u32,

    /// 완료 여부
    done: bool,

    read_timeout: Duration,
    max_retries: u32,
    stats: TransferStats,
}

impl<R, C> Transfer<R, C>
where
    R: AsyncRead + Unpin,
    C: Channel,
{
    pub fn new(client: SocketAddr, reader: R, channel: C, config: &Config) -> Self {
        Self {
            client,
            reader,
            channel,
            block: 1,
            retries: 0,
            done: false,
            read_timeout: config.read_timeout(),
            max_retries: config.max_retries,
            stats: TransferStats::new(),
        }
    }

    /// 종료 조건까지 블록 전송
    pub async fn run(mut self) -> TransferOutcome {
        let mut payload = vec![0u8; BLOCK_SIZE];

        while !self.done {
            let len = match fill_block(&mut self.reader, &mut payload).await {
                Ok(len) => len,
                Err(e) => {
                    warn!("파일 읽기 에러: client={}, block={}, {}", self.client, self.block, e);
                    return TransferOutcome::Abandoned {
                        reason: format!("read error: {}", e),
                    };
                }
            };

            let packet = message::encode_data(self.block, &payload[..len]);

            match self.send_until_acked(&packet).await {
                Ok(AckWait::Acked) => {}
                Ok(AckWait::Exhausted) => return self.give_up().await,
                Err(e) => {
                    warn!("전송 채널 에러: client={}, block={}, {}", self.client, self.block, e);
                    return TransferOutcome::Abandoned {
                        reason: format!("channel error: {}", e),
                    };
                }
            }

            self.stats.record_block(len);
            debug!("블록 {} 확인: {} bytes", self.block, len);

            // ACK 확인 후에만 완료 판정
            if len < BLOCK_SIZE {
                self.done = true;
            } else {
                self.block = self.block.wrapping_add(1);
            }
        }

        info!(
            "Transfer complete: client={}, blocks={}, bytes={}, retransmits={}, {:.1} KB/s",
            self.client,
            self.stats.blocks_sent,
            self.stats.bytes_sent,
            self.stats.retransmits,
            self.stats.throughput() / 1024.0
        );
        TransferOutcome::Completed(self.stats)
    }

    /// 현재 블록을 보내고 일치하는 ACK를 기다림
    ///
    /// 시도마다 타임아웃 하나. 잡음은 같은 기한 안에서 계속 대기
    async fn send_until_acked(&mut self, packet: &[u8]) -> io::Result<AckWait> {
        let mut buf = [0u8; ACK_BUF_SIZE];
        self.retries = 0;

        while self.retries < self.max_retries {
            if self.retries > 0 {
                self.stats.record_retransmit();
            }
            self.channel.send(packet).await?;

            let deadline = Instant::now() + self.read_timeout;
            loop {
                match timeout_at(deadline, self.channel.recv(&mut buf)).await {
                    Err(_) => {
                        self.retries += 1;
                        debug!(
                            "ACK {} 타임아웃, 재시도 {}/{}",
                            self.block, self.retries, self.max_retries
                        );
                        break;
                    }
                    Ok(Err(e)) => return Err(e),
                    Ok(Ok(len)) => {
                        if self.is_current_ack(&buf[..len]) {
                            return Ok(AckWait::Acked);
                        }
                        self.stats.record_stray();
                        debug!("무시된 데이터그램: {} bytes (대기 중 block={})", len, self.block);
                    }
                }
            }
        }

        Ok(AckWait::Exhausted)
    }

    fn is_current_ack(&self, bytes: &[u8]) -> bool {
        matches!(
            Message::decode(bytes, Opcode::Ack),
            Ok(Message::Ack { block }) if block == self.block
        )
    }

    async fn give_up(self) -> TransferOutcome {
        warn!(
            "최대 재시도 초과: client={}, block={}",
            self.client, self.block
        );

        let packet = encode_error(ErrorCode::NotDefined, "Transfer failed: no ACK");
        if let Err(e) = self.channel.send(&packet).await {
            warn!("ERROR 송신 실패: client={}, {}", self.client, e);
        }

        TransferOutcome::TimedOut {
            block: self.block,
            stats: self.stats,
        }
    }
}

/// EOF 또는 블록 크기까지 채움 (짧은 읽기는 이어서 읽음)
async fn fill_block<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// 읽기 요청 하나를 종료까지 처리
///
/// 모드 검증과 경로 검사는 파일시스템 접근 전에 수행.
/// 요청 단계 ERROR는 고정 소켓(`reply`)으로, 이후는 전용 채널로 송신
pub async fn serve_read_request<S: ReplySink>(
    request: Request,
    client: SocketAddr,
    resolver: &Resolver,
    reply: &S,
    config: &Config,
) -> TransferOutcome {
    if !request.mode.is_recognized() {
        warn!("지원하지 않는 모드: client={}, mode={}", client, request.mode);
        return reject(reply, client, ErrorCode::NotDefined, "Unsupported transfer mode").await;
    }

    let path = match resolver.resolve(&request.filename) {
        Ok(path) => path,
        Err(_) => {
            warn!("경로 탈출 시도: client={}, filename={}", client, request.filename);
            return reject(reply, client, ErrorCode::AccessViolation, "Access denied").await;
        }
    };

    let file = match Resolver::open_path(&path).await {
        Ok(file) => file,
        Err(OpenError::NotFound) => {
            warn!("파일 없음: {:?}", path);
            return reject(reply, client, ErrorCode::FileNotFound, "File not found").await;
        }
        Err(OpenError::AccessDenied) => {
            warn!("파일 열기 실패: {:?}", path);
            return reject(reply, client, ErrorCode::AccessViolation, "Cannot open file").await;
        }
    };

    let channel = match UdpChannel::open(client).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!("전용 채널 생성 실패: client={}, {}", client, e);
            return TransferOutcome::Abandoned {
                reason: format!("channel open failed: {}", e),
            };
        }
    };

    match channel.local_addr() {
        Ok(tid) => info!(
            "Starting transfer: {:?} to {} via {} (mode={})",
            path,
            channel.peer(),
            tid,
            request.mode
        ),
        Err(_) => info!(
            "Starting transfer: {:?} to {} (mode={})",
            path,
            channel.peer(),
            request.mode
        ),
    }
    Transfer::new(client, file, channel, config).run().await
}

async fn reject<S: ReplySink>(
    reply: &S,
    client: SocketAddr,
    code: ErrorCode,
    message: &'static str,
) -> TransferOutcome {
    if let Err(e) = reply.send_to(&encode_error(code, message), client).await {
        warn!("ERROR 송신 실패: client={}, {}", client, e);
    }
    TransferOutcome::Rejected { code, message }
}
