use std::ops::Range;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use playhub::{DEFAULT_MAX_UPLOAD, PlayhubServer, ServerConfig};
use playhub_room::RoomConfig;
use playhub_store::logging::{LogLevel, init_logging};

#[derive(Parser, Debug)]
#[command(name = "playhub", version, about = "playhub session orchestrator")]
struct Cli {
    /// Address clients connect to.
    #[arg(long, env = "PLAYHUB_BIND", default_value = "0.0.0.0:9800")]
    bind: String,

    /// Address of the playhub-store process.
    #[arg(long, env = "PLAYHUB_STORE", default_value = "127.0.0.1:9900")]
    store: String,

    /// Directory for uploaded artifact payloads.
    #[arg(long, env = "PLAYHUB_STORAGE_DIR", default_value = "storage")]
    storage_dir: PathBuf,

    /// Address advertised to clients for joining room relays.
    #[arg(long, env = "PLAYHUB_HOST_ADDRESS", default_value = "127.0.0.1")]
    host_address: String,

    /// Relay port range, START-END with END exclusive.
    #[arg(long, value_name = "START-END", default_value = "20000-20100", value_parser = parse_port_range)]
    relay_ports: Range<u16>,

    /// Largest accepted upload in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD)]
    max_upload: u64,

    /// Minimum log level (stderr). `RUST_LOG` overrides it.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            store_addr: self.store,
            storage_dir: self.storage_dir,
            max_upload: self.max_upload,
            room: RoomConfig {
                host_address: self.host_address,
                relay_ports: self.relay_ports,
                ..RoomConfig::default()
            },
        }
    }
}

fn parse_port_range(s: &str) -> Result<Range<u16>, String> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| format!("expected START-END, got {s:?}"))?;
    let start: u16 = start.trim().parse().map_err(|e| format!("bad start port: {e}"))?;
    let end: u16 = end.trim().parse().map_err(|e| format!("bad end port: {e}"))?;
    if start >= end {
        return Err(format!("empty port range {start}-{end}"));
    }
    Ok(start..end)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let config = cli.into_config();
    let bind = config.bind.clone();
    let server = match PlayhubServer::builder().config(config).build().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(%bind, error = %e, "cannot start playhub");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "playhub server stopped");
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("playhub shutting down");
        }
    }
    ExitCode::SUCCESS
}
