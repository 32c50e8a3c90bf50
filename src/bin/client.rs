//! RTFTP 클라이언트 - 파일 하나 다운로드
//!
//! 사용법:
//!   cargo run --release --bin tftp-client -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin tftp-client -- --server 127.0.0.1:6969 --file boot.img -o boot.img

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use tracing::info;
use tracing_subscriber::EnvFilter;

use rtftp::{Client, Config, Mode};

/// 클라이언트 설정
struct ClientConfig {
    server_addr: SocketAddr,
    filename: Option<String>,
    output_path: Option<PathBuf>,
    mode: Mode,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], rtftp::DEFAULT_PORT)),
            filename: None,
            output_path: None,
            mode: Mode::Octet,
            config: Config::default(),
        }
    }
}

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => {
                if i + 1 < args.len() {
                    config.server_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    config.filename = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    config.output_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--mode" | "-m" => {
                if i + 1 < args.len() {
                    config.mode = Mode::parse(&args[i + 1]);
                    i += 1;
                }
            }
            "--timeout" => {
                if i + 1 < args.len() {
                    config.config.read_timeout_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--retries" => {
                if i + 1 < args.len() {
                    config.config.max_retries = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"RTFTP Client - TFTP 파일 다운로드

사용법:
  cargo run --release --bin tftp-client -- [OPTIONS]

옵션:
  -s, --server <ADDR>    서버 주소 (기본: 127.0.0.1:69)
  -f, --file <NAME>      요청할 파일명 (필수)
  -o, --output <PATH>    저장 경로 (기본: 요청 파일명의 마지막 요소)
  -m, --mode <MODE>      전송 모드 netascii | octet | mail (기본: octet)
  --timeout <MS>         DATA 대기 타임아웃 밀리초 (기본: 5000)
  --retries <N>          최대 재시도 (기본: 3)
  -h, --help             이 도움말 출력
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
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client_config = parse_args();
    let filename = client_config
        .filename
        .clone()
        .ok_or("--file 옵션 필요")?;
    let output = client_config.output_path.clone().unwrap_or_else(|| {
        PathBuf::from(
            std::path::Path::new(&filename)
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "download.bin".into()),
        )
    });

    info!("Requesting {} from {}", filename, client_config.server_addr);
    let start = Instant::now();

    let data = Client::new(client_config.config)
        .get(client_config.server_addr, &filename, client_config.mode)
        .await?;

    let elapsed = start.elapsed();
    tokio::fs::write(&output, &data).await?;

    info!("Saved {} bytes to {:?}", data.len(), output);
    info!(
        "  Time: {:.2}s, Throughput: {:.2} KB/s",
        elapsed.as_secs_f64(),
        data.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1024.0
    );

    Ok(())
}
