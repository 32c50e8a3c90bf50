//! RTFTP 서버 - 읽기 전용 TFTP 응답기
//!
//! 루트 디렉터리 아래 파일을 512 바이트 블록 단위 lock-step으로 전송
//! - 쓰기 요청(WRQ)과 옵션 협상은 지원하지 않음
//!
//! 사용법:
//!   cargo run --release --bin tftp-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 (0.0.0.0:69, ./tftp-root)
//!   cargo run --release --bin tftp-server
//!
//!   # 비특권 포트 + 루트 지정
//!   cargo run --release --bin tftp-server -- --bind 0.0.0.0:6969 --root /srv/tftp

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

use rtftp::{Config, Server};

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--root" | "-r" => {
                if i + 1 < args.len() {
                    config.root_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--timeout" => {
                if i + 1 < args.len() {
                    config.read_timeout_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--retries" => {
                if i + 1 < args.len() {
                    config.max_retries = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--max-transfers" => {
                if i + 1 < args.len() {
                    config.max_concurrent_transfers =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--unstable" => {
                let preset = Config::unstable_network();
                config.read_timeout_ms = preset.read_timeout_ms;
                config.max_retries = preset.max_retries;
            }
            "--help" | "-h" => {
                println!(
                    r#"RTFTP Server - 읽기 전용 TFTP 서버

512 바이트 블록 lock-step 전송 (RFC 1350, RRQ만 지원)

사용법:
  cargo run --release --bin tftp-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       바인드 주소 (기본: 0.0.0.0:69)
  -r, --root <PATH>       제공할 루트 디렉터리 (기본: ./tftp-root, 없으면 생성)
  --timeout <MS>          ACK 대기 타임아웃 밀리초 (기본: 5000)
  --retries <N>           블록당 최대 전송 시도 (기본: 3)
  --max-transfers <N>     최대 동시 전송 수 (기본: 0 = 제한 없음)
  --unstable              불안정한 네트워크용 타임아웃/재시도
  -h, --help              이 도움말 출력

로그 레벨은 RUST_LOG 환경 변수로 지정 (기본: info)

예시:
  cargo run --release --bin tftp-server -- -b 0.0.0.0:6969 -r /srv/tftp
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = parse_args();

    info!("RTFTP Server starting...");
    info!("Read timeout: {} ms", config.read_timeout_ms);
    info!("Max retries: {}", config.max_retries);

    let server = Server::bind(config).await?;
    server.run().await?;

    Ok(())
}
