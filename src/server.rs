//! 서버 (요청 수신 및 전송 태스크 생성)
//!
//! - 고정 소켓에서 요청 수신, opcode로 분기
//! - 읽기 요청마다 별도 태스크 (전송 상태는 태스크가 단독 소유)
//! - 진행 중인 클라이언트의 중복 RRQ 무시
//! - 동시 전송 수 제한 (선택)

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::message::{self, ErrorCode, Message, Opcode};
use crate::resolver::Resolver;
use crate::stats::ServerStats;
use crate::transfer::{self, TransferOutcome};
use crate::{Config, Result};

/// RTFTP 서버
pub struct Server {
    /// 설정
    config: Arc<Config>,

    /// 요청 수신 및 요청 단계 ERROR 송신용 고정 소켓
    socket: Arc<UdpSocket>,

    /// 루트 기준 경로 해석기
    resolver: Arc<Resolver>,

    /// 진행 중인 전송 (클라이언트 주소 -> 파일명)
    active: Arc<DashMap<SocketAddr, String>>,

    /// 서버 통계
    stats: Arc<RwLock<ServerStats>>,

    /// 동시 전송 제한
    limiter: Option<Arc<Semaphore>>,
}

impl Server {
    /// 루트 디렉터리 준비 후 소켓 바인딩
    pub async fn bind(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.root_dir).await?;
        let resolver = Resolver::new(&config.root_dir)?;

        let socket = UdpSocket::bind(config.bind_addr).await?;
        info!("RTFTP server listening on {} (RRQ only)", socket.local_addr()?);
        info!("Serving files from: {:?}", resolver.root());

        let limiter = if config.max_concurrent_transfers > 0 {
            info!("Max concurrent transfers: {}", config.max_concurrent_transfers);
            Some(Arc::new(Semaphore::new(config.max_concurrent_transfers)))
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            socket: Arc::new(socket),
            resolver: Arc::new(resolver),
            active: Arc::new(DashMap::new()),
            stats: Arc::new(RwLock::new(ServerStats::default())),
            limiter,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> ServerStats {
        self.stats.read().clone()
    }

    /// 진행 중인 전송 수
    pub fn active_transfers(&self) -> usize {
        self.active.len()
    }

    /// 수신 루프 (종료하지 않음)
    pub async fn run(&self) -> Result<()> {
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, addr)) => {
                    self.handle_datagram(&buf[..len], addr).await;
                }
                Err(e) => {
                    warn!("수신 에러: {}", e);
                }
            }
        }
    }

    /// 데이터그램 하나 처리
    ///
    /// 전송 태스크를 시작한 경우 그 핸들을 반환
    pub async fn handle_datagram(
        &self,
        bytes: &[u8],
        addr: SocketAddr,
    ) -> Option<JoinHandle<TransferOutcome>> {
        let raw = match message::peek_opcode(bytes) {
            Ok(raw) => raw,
            Err(_) => {
                debug!("너무 짧은 데이터그램 무시: {} bytes from {}", bytes.len(), addr);
                return None;
            }
        };

        match Opcode::try_from(raw) {
            Ok(Opcode::Rrq) => self.accept_read_request(bytes, addr).await,
            Ok(Opcode::Wrq) | Ok(Opcode::Data) | Ok(Opcode::Ack) | Ok(Opcode::Error) | Err(_) => {
                info!("Unsupported opcode {} from {}", raw, addr);
                self.reply_error(addr, ErrorCode::NotDefined, "Only RRQ is supported")
                    .await;
                None
            }
        }
    }

    async fn accept_read_request(
        &self,
        bytes: &[u8],
        addr: SocketAddr,
    ) -> Option<JoinHandle<TransferOutcome>> {
        let request = match Message::decode(bytes, Opcode::Rrq) {
            Ok(Message::ReadRequest(request)) => request,
            other => {
                warn!("잘못된 RRQ: {} ({:?})", addr, other.err());
                self.stats.write().refused += 1;
                self.reply_error(addr, ErrorCode::NotDefined, "Invalid RRQ packet")
                    .await;
                return None;
            }
        };

        // 같은 클라이언트 TID의 재전송된 요청은 진행 중인 전송이 응답함
        if self.active.contains_key(&addr) {
            debug!("중복 RRQ 무시: {} filename={}", addr, request.filename);
            return None;
        }

        let permit = match self.acquire_slot() {
            Ok(permit) => permit,
            Err(()) => {
                warn!("동시 전송 한도 초과: {} 거부", addr);
                self.stats.write().refused += 1;
                self.reply_error(addr, ErrorCode::NotDefined, "Server busy").await;
                return None;
            }
        };

        info!(
            "RRQ from {}: filename={} mode={}",
            addr, request.filename, request.mode
        );
        self.active.insert(addr, request.filename.clone());
        self.stats.write().accepted += 1;

        let config = self.config.clone();
        let socket = self.socket.clone();
        let resolver = self.resolver.clone();
        let active = self.active.clone();
        let stats = self.stats.clone();

        Some(tokio::spawn(async move {
            let outcome =
                transfer::serve_read_request(request, addr, &resolver, &*socket, &config).await;

            active.remove(&addr);
            drop(permit);
            record_outcome(&stats, &outcome);

            outcome
        }))
    }

    fn acquire_slot(&self) -> std::result::Result<Option<OwnedSemaphorePermit>, ()> {
        match &self.limiter {
            Some(limiter) => limiter
                .clone()
                .try_acquire_owned()
                .map(Some)
                .map_err(|_| ()),
            None => Ok(None),
        }
    }

    async fn reply_error(&self, addr: SocketAddr, code: ErrorCode, msg: &str) {
        let packet = message::encode_error(code, msg);
        if let Err(e) = self.socket.send_to(&packet, addr).await {
            warn!("ERROR 송신 실패: {} ({})", addr, e);
        }
    }
}

fn record_outcome(stats: &RwLock<ServerStats>, outcome: &TransferOutcome) {
    let mut stats = stats.write();
    match outcome {
        TransferOutcome::Completed(transfer) => {
            stats.completed += 1;
            stats.bytes_served += transfer.bytes_sent;
        }
        TransferOutcome::Rejected { .. } => stats.rejected += 1,
        TransferOutcome::TimedOut { .. } => stats.timed_out += 1,
        TransferOutcome::Abandoned { .. } => stats.failed += 1,
    }
    debug!(
        "전송 종료: {}/{} finished, {} in flight",
        stats.finished(),
        stats.accepted,
        stats.in_flight()
    );
}
