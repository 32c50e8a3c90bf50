//! 전송 계층 추상화
//!
//! - `ReplySink`: 서버 고정 소켓 (요청 단계의 ERROR 응답 전용)
//! - `Channel`: 전송마다 새로 여는 전용 채널 (DATA 송신, ACK 수신)

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

/// 주소 지정 송신 (고정 엔드포인트)
#[allow(async_fn_in_trait)]
pub trait ReplySink {
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<()>;
}

impl ReplySink for UdpSocket {
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<()> {
        UdpSocket::send_to(self, bytes, addr).await.map(|_| ())
    }
}

/// 한 클라이언트에 고정된 양방향 채널
///
/// 타임아웃은 호출자가 적용
#[allow(async_fn_in_trait)]
pub trait Channel {
    async fn send(&self, bytes: &[u8]) -> io::Result<()>;

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// 클라이언트 주소에 connect된 임시 포트 UDP 소켓
///
/// 커널이 다른 주소에서 온 데이터그램을 걸러내므로
/// 다른 전송의 ACK가 섞이지 않음
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpChannel {
    /// 새 전송 ID(임시 포트)로 클라이언트에 연결
    pub async fn open(peer: SocketAddr) -> io::Result<Self> {
        let local = match peer {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;

        Ok(Self { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Channel for UdpChannel {
    async fn send(&self, bytes: &[u8]) -> io::Result<()> {
        self.socket.send(bytes).await.map(|_| ())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf).await
    }
}
