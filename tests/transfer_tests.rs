//! 서버와 클라이언트를 루프백 UDP로 연결한 종단 간 테스트
//!
//! 서버 수신 루프는 별도 tokio 태스크로 실행

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use rtftp::message::{encode_ack, Message};
use rtftp::{Client, Config, Error, ErrorCode, Mode, Server, BLOCK_SIZE};

/// 임시 루트 디렉터리로 서버를 띄우고 주소 반환
async fn start_server(files: &[(&str, Vec<u8>)]) -> (tempfile::TempDir, Arc<Server>, SocketAddr) {
    let dir = tempfile::tempdir().unwrap();
    for (name, data) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, data).unwrap();
    }

    let config = Config {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        root_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let server = Arc::new(Server::bind(config).await.unwrap());
    let addr = server.local_addr().unwrap();

    let runner = server.clone();
    tokio::spawn(async move {
        let _ = runner.run().await;
    });

    (dir, server, addr)
}

fn client() -> Client {
    Client::new(Config {
        read_timeout_ms: 1000,
        ..Config::default()
    })
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_download_multi_block_file() {
    let content = pattern(BLOCK_SIZE * 3 + 100);
    let (_dir, server, addr) = start_server(&[("images/boot.img", content.clone())]).await;

    let data = client()
        .get(addr, "images/boot.img", Mode::Octet)
        .await
        .unwrap();

    assert_eq!(data.as_ref(), content.as_slice());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = server.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.bytes_served, content.len() as u64);
}

#[tokio::test]
async fn test_download_exact_multiple_and_empty() {
    let exact = pattern(BLOCK_SIZE * 2);
    let (_dir, _server, addr) =
        start_server(&[("exact.bin", exact.clone()), ("empty.bin", Vec::new())]).await;

    let data = client().get(addr, "exact.bin", Mode::Octet).await.unwrap();
    assert_eq!(data.as_ref(), exact.as_slice());

    let data = client().get(addr, "empty.bin", Mode::Netascii).await.unwrap();
    assert!(data.is_empty());
}

#[tokio::test]
async fn test_concurrent_downloads() {
    let files: Vec<(String, Vec<u8>)> = (0..4)
        .map(|i| (format!("file{}.bin", i), pattern(BLOCK_SIZE * (i + 1) + i * 17)))
        .collect();
    let refs: Vec<(&str, Vec<u8>)> = files.iter().map(|(n, d)| (n.as_str(), d.clone())).collect();
    let (_dir, _server, addr) = start_server(&refs).await;

    let handles: Vec<_> = files
        .iter()
        .cloned()
        .map(|(name, content)| {
            tokio::spawn(async move {
                let data = client().get(addr, &name, Mode::Octet).await.unwrap();
                assert_eq!(data.as_ref(), content.as_slice());
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_rejections_reach_client() {
    let (_dir, server, addr) = start_server(&[("ok.txt", b"ok".to_vec())]).await;

    match client().get(addr, "../../etc/passwd", Mode::Octet).await {
        Err(Error::Remote { code, message }) => {
            assert_eq!(code, ErrorCode::AccessViolation);
            assert_eq!(message, "Access denied");
        }
        other => panic!("unexpected result: {:?}", other),
    }

    match client().get(addr, "missing.txt", Mode::Octet).await {
        Err(Error::Remote { code, .. }) => assert_eq!(code, ErrorCode::FileNotFound),
        other => panic!("unexpected result: {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.stats().rejected, 2);
}

#[tokio::test]
async fn test_unsupported_mode_over_the_wire() {
    let (_dir, _server, addr) = start_server(&[("ok.txt", b"ok".to_vec())]).await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    socket.send_to(b"\x00\x01ok.txt\x00binary\x00", addr).await.unwrap();

    let mut buf = [0u8; 128];
    let (len, from) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(from, addr);
    assert_eq!(
        Message::parse(&buf[..len]).unwrap(),
        Message::Error {
            code: ErrorCode::NotDefined,
            message: "Unsupported transfer mode".to_owned(),
        }
    );
}

#[tokio::test]
async fn test_stale_ack_does_not_advance_transfer() {
    let content = pattern(BLOCK_SIZE + 10);
    let (_dir, _server, addr) = start_server(&[("two.bin", content.clone())]).await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    socket.send_to(b"\x00\x01two.bin\x00octet\x00", addr).await.unwrap();

    let mut buf = [0u8; 1024];
    let (len, tid) = socket.recv_from(&mut buf).await.unwrap();
    assert!(matches!(
        Message::parse(&buf[..len]).unwrap(),
        Message::Data { block: 1, .. }
    ));

    // 블록 0(존재하지 않음) ACK는 무시되어야 함
    socket.send_to(&encode_ack(0), tid).await.unwrap();
    assert!(
        tokio::time::timeout(Duration::from_millis(300), socket.recv_from(&mut buf))
            .await
            .is_err()
    );

    socket.send_to(&encode_ack(1), tid).await.unwrap();
    let (len, from) = socket.recv_from(&mut buf).await.unwrap();
    assert_eq!(from, tid);
    match Message::parse(&buf[..len]).unwrap() {
        Message::Data { block, payload } => {
            assert_eq!(block, 2);
            assert_eq!(payload.as_ref(), &content[BLOCK_SIZE..]);
        }
        other => panic!("unexpected packet: {:?}", other),
    }
    socket.send_to(&encode_ack(2), tid).await.unwrap();
}
