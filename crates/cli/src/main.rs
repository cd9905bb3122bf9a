use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ipcam::redact::mask_uri;
use ipcam::transport::TcpProbeFactory;
use ipcam::{
    CameraError, ConfigStore, ConnectionConfig, ConnectionService, FrameSource, HIGH_STREAM,
    JsonConfigStore, LOW_STREAM, SavedConfig,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u32 = 554;
const DEFAULT_HIGH: &str = "rtsp://{login}:{password}@{ip}:{port}/stream1";
const DEFAULT_LOW: &str = "rtsp://{login}:{password}@{ip}:{port}/stream2";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(
    name = "ipcam",
    about = "Connect to the high and low quality streams of an IP camera"
)]
struct Args {
    /// Camera IPv4 address
    #[arg(long)]
    ip: Option<String>,

    /// RTSP port [default: 554]
    #[arg(long)]
    port: Option<u32>,

    /// Camera login
    #[arg(long)]
    login: Option<String>,

    /// Camera password (never saved)
    #[arg(long, env = "IPCAM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// URI template of the high quality stream
    #[arg(long)]
    high: Option<String>,

    /// URI template of the low quality stream
    #[arg(long)]
    low: Option<String>,

    /// Saved config file [default: ./config.json]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Save the connection settings (without the password)
    #[arg(long)]
    save: bool,

    /// Validate the settings and exit
    #[arg(long)]
    check: bool,

    /// Connect timeout per stream, in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

impl Args {
    /// Command-line values first, then the saved record, then defaults.
    fn connection_config(&self, saved: Option<SavedConfig>) -> ConnectionConfig {
        let saved = saved.unwrap_or_default();
        ConnectionConfig {
            ip: self.ip.clone().unwrap_or(saved.ip),
            port: self
                .port
                .or((saved.port != 0).then_some(saved.port))
                .unwrap_or(DEFAULT_PORT),
            login: self.login.clone().unwrap_or(saved.login),
            password: self.password.clone().unwrap_or_default(),
            rtsp_template_1: self
                .high
                .clone()
                .or(non_empty(saved.rtsp_template_1))
                .unwrap_or_else(|| DEFAULT_HIGH.to_string()),
            rtsp_template_2: self
                .low
                .clone()
                .or(non_empty(saved.rtsp_template_2))
                .unwrap_or_else(|| DEFAULT_LOW.to_string()),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, CameraError> {
    let store = match &args.config {
        Some(path) => JsonConfigStore::new(path),
        None => JsonConfigStore::in_current_dir()?,
    };
    let saved = store.load()?;
    tracing::debug!(path = %store.path().display(), found = saved.is_some(), "config store read");
    let config = args.connection_config(saved);

    let service = ConnectionService::new(Arc::new(TcpProbeFactory))
        .connect_timeout(Duration::from_secs(args.timeout));

    if args.check {
        return Ok(check(&service, &config));
    }

    if args.save {
        if save_if_valid(&store, &service, &config)? {
            println!("Saved settings to {}", store.path().display());
        } else {
            eprintln!("Settings not saved: they did not pass validation");
        }
    }

    let parent = CancellationToken::new();
    let (high, low) = service.connect(&parent, &config)?;

    let counters = [
        tokio::spawn(count_frames(HIGH_STREAM, high)),
        tokio::spawn(count_frames(LOW_STREAM, low)),
    ];

    println!("Connecting... press Ctrl+C to stop");
    let status = service.status_channel();
    let mut finished = HashSet::new();
    let mut failed = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            update = status.recv() => {
                let Some(update) = update else { break };
                match &update.error {
                    Some(error) => println!("{}: {} ({error})", update.stream_name, update.status),
                    None => println!("{}: {}", update.stream_name, update.status),
                }
                if update.status.is_terminal() {
                    failed |= update.error.is_some();
                    finished.insert(update.stream_name);
                    if finished.len() == 2 {
                        break;
                    }
                }
            }
        }
    }

    service.disconnect();
    if !service.manager().shutdown(SHUTDOWN_GRACE).await {
        eprintln!("streams did not stop within {SHUTDOWN_GRACE:?}");
    }

    for counter in counters {
        if let Ok((name, frames, bytes)) = counter.await {
            println!("{name}: {frames} frames, {bytes} bytes");
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn check(service: &ConnectionService, config: &ConnectionConfig) -> ExitCode {
    let (resolved, result) = service.validate_config(config);
    for warning in result.warnings() {
        println!("warning: {warning}");
    }

    match resolved {
        Some(resolved) => {
            println!("{HIGH_STREAM}: {}", mask_uri(&resolved.uri1));
            println!("{LOW_STREAM}: {}", mask_uri(&resolved.uri2));
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("{}", result.error_message());
            ExitCode::FAILURE
        }
    }
}

/// Persist `config` only when it validates. Returns whether it was saved.
fn save_if_valid(
    store: &impl ConfigStore,
    service: &ConnectionService,
    config: &ConnectionConfig,
) -> Result<bool, CameraError> {
    let (resolved, _) = service.validate_config(config);
    if resolved.is_none() {
        return Ok(false);
    }
    store.save(config)?;
    Ok(true)
}

async fn count_frames(name: &'static str, mut source: FrameSource) -> (&'static str, u64, usize) {
    let mut frames = 0;
    let mut bytes = 0;
    while let Some(frame) = source.recv().await {
        frames += 1;
        bytes += frame.data.len();
    }
    (name, frames, bytes)
}
