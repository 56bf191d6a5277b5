use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use playhub_store::logging::{LogLevel, init_logging};
use playhub_store::{Store, StoreServer};

#[derive(Parser, Debug)]
#[command(name = "playhub-store", version, about = "playhub persistence engine")]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "PLAYHUB_STORE_BIND", default_value = "0.0.0.0:9900")]
    bind: String,

    /// Snapshot file holding every collection.
    #[arg(long, env = "PLAYHUB_DATA_FILE", default_value = "playhub-data.json")]
    data_file: PathBuf,

    /// Minimum log level (stderr). `RUST_LOG` overrides it.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let store = Store::open(&cli.data_file);
    let server = match StoreServer::bind(&cli.bind, store).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(bind = %cli.bind, error = %e, "cannot start store");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "store server stopped");
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("store shutting down");
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["playhub-store"]).expect("defaults should parse");
        assert_eq!(cli.bind, "0.0.0.0:9900");
        assert_eq!(cli.data_file, PathBuf::from("playhub-data.json"));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = Cli::try_parse_from(["playhub-store", "--log-level", "loud"])
            .expect_err("bad level should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
