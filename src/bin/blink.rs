//! blink - 근거리 링크 단일 파일 전송
//!
//! 송신측은 파일 전체를 적재한 뒤 수신측을 탐색하고, 크기 공지 후
//! 프래그먼트를 고정 간격으로 전송. 수신측은 광고 후 대기하다가
//! 예상 크기만큼 받으면 파일로 저장.
//!
//! 사용법:
//!   cargo run --release --bin blink -- [OPTIONS]
//!
//! 예시:
//!   # 수신 (광고 후 대기)
//!   cargo run --release --bin blink -- --mode 2 --output received.bin
//!
//!   # 송신 (로컬 수신측으로)
//!   cargo run --release --bin blink -- --mode 1 -f data.bin --peer 127.0.0.1:9000

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use blink::mode::prompt_mode;
use blink::{Config, Mode, ReceiverSession, SenderSession, UdpTransport};

/// 기본 설정 프리셋
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    /// 기본 ATT MTU (20바이트 프래그먼트, 100ms 간격)
    Default,
    /// 데이터 길이 확장 링크 (244바이트 프래그먼트, 15ms 간격)
    ExtendedMtu,
    /// 페이싱 없음 (루프백 전송용)
    Unpaced,
}

impl Preset {
    fn config(self) -> Config {
        match self {
            Preset::Default => Config::default(),
            Preset::ExtendedMtu => Config::extended_mtu(),
            Preset::Unpaced => Config::unpaced(),
        }
    }
}

/// blink - single file transfer over a short-range link
#[derive(Parser)]
#[command(name = "blink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 1 = Sender, 2 = Receiver (생략 시 프롬프트)
    #[arg(short, long)]
    mode: Option<String>,

    /// TOML 설정 파일 (지정 시 프리셋 대신 사용)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 설정 프리셋
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,

    /// 송신할 파일
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// 수신 파일 저장 경로
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 프래그먼트 최대 크기 (바이트)
    #[arg(long)]
    fragment_size: Option<usize>,

    /// 프래그먼트 전송 간격 (밀리초)
    #[arg(long)]
    pacing_ms: Option<u64>,

    /// 전송 버퍼 용량 (바이트)
    #[arg(long)]
    max_file_size: Option<usize>,

    /// 로컬 바인드 주소 (수신측 기본 0.0.0.0:9000, 송신측 기본 0.0.0.0:0)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// 탐색 대상 주소 (송신측)
    #[arg(short, long, default_value = "255.255.255.255:9000")]
    peer: SocketAddr,
}

impl Cli {
    fn build_config(&self) -> blink::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => self.preset.config(),
        };

        if let Some(file) = &self.file {
            config.source_path = file.clone();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(fragment_size) = self.fragment_size {
            config.fragment_size = fragment_size;
        }
        if let Some(pacing_ms) = self.pacing_ms {
            config.pacing_delay_ms = pacing_ms;
        }
        if let Some(max_file_size) = self.max_file_size {
            config.max_file_size = max_file_size;
        }

        config.validate()?;
        Ok(config)
    }

    fn select_mode(&self) -> blink::Result<Mode> {
        match &self.mode {
            Some(mode) => mode.parse(),
            None => prompt_mode(io::stdin().lock(), io::stdout()),
        }
    }
}

async fn run_sender(cli: &Cli, config: Config) -> blink::Result<()> {
    let bind = cli.bind.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
    let transport = UdpTransport::new(bind)
        .with_peer(cli.peer)
        .with_poll_interval(config.poll_interval());

    info!("Sender mode: {}", config.source_path.display());
    let mut session = SenderSession::new(config, transport)?;
    let stats = session.run().await?;

    info!("Transfer complete. {}", stats.summary());
    Ok(())
}

async fn run_receiver(cli: &Cli, config: Config) -> blink::Result<()> {
    let bind = cli
        .bind
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 9000)));
    let transport = UdpTransport::new(bind).with_poll_interval(config.poll_interval());

    info!("Receiver mode: listening on {}", bind);
    let mut session = ReceiverSession::new(config, transport)?;
    let stats = session.run().await?;

    info!("Receive complete. {}", stats.summary());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정 (RUST_LOG 우선)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mode = match cli.select_mode() {
        Ok(mode) => mode,
        Err(blink::Error::InvalidModeSelection(_)) => {
            println!("Invalid mode selected.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let config = cli.build_config()?;

    let result = match mode {
        Mode::Sender => run_sender(&cli, config).await,
        Mode::Receiver => run_receiver(&cli, config).await,
    };

    if let Err(e) = result {
        error!("전송 실패: {}", e);
        return Err(e.into());
    }

    Ok(())
}
