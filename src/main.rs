//! Purpose: `path-server` CLI entry point for running the server standalone.
//! Role: Binary crate root; parses args, starts the global controller, waits for a signal.
//! Invariants: Start goes through the same validate-then-start path as the C ABI.
//! Invariants: Errors are emitted as JSON on stderr; exit code comes from `to_exit_code`.
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueHint};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use path_server::logging::{self, LogLevel};
use path_server::{
    DEFAULT_DATA_PATH, DEFAULT_HTTP_PORT, DEFAULT_UI_FILE, Error, ErrorKind, ServeOptions,
    lifecycle, to_exit_code, validate,
};

#[derive(Parser, Debug)]
#[command(
    name = "path-server",
    version,
    about = "Serve a UI file and a data directory over local HTTP"
)]
struct Cli {
    /// Directory whose files are served under `/`.
    #[arg(long, default_value = DEFAULT_DATA_PATH, value_hint = ValueHint::DirPath)]
    data: String,
    /// File served for `/`.
    #[arg(long, default_value = DEFAULT_UI_FILE, value_hint = ValueHint::FilePath)]
    ui: String,
    /// HTTP port on the loopback interface.
    #[arg(short, long, default_value_t = DEFAULT_HTTP_PORT)]
    port: u16,
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    loglevel: LogLevel,
    /// Also write logs to this file.
    #[arg(long, value_hint = ValueHint::FilePath)]
    logfile: Option<PathBuf>,
    /// Disable log output to the terminal.
    #[arg(short, long)]
    quiet: bool,
    /// Upper bound on draining in-flight requests during shutdown.
    #[arg(long, default_value_t = 5_000)]
    drain_timeout_ms: u64,
}

fn main() {
    let exit_code = match run() {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    logging::init(cli.loglevel, cli.quiet, cli.logfile.as_deref())?;

    let options = ServeOptions {
        drain_timeout: Duration::from_millis(cli.drain_timeout_ms),
        ..ServeOptions::default()
    };
    let config = validate(cli.data.as_bytes(), cli.ui.as_bytes(), cli.port)?;
    let controller = lifecycle::global();
    let addr = controller.start_with_options(config, &options)?;
    info!("serving on http://{addr}, press Ctrl-C to stop");

    let signal_runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to build signal runtime")
                .with_source(err)
        })?;
    signal_runtime.block_on(shutdown_signal());

    controller.stop();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn emit_error(err: &Error) {
    eprintln!("{}", error_json(err));
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert(
        "message".to_string(),
        json!(err.message().unwrap_or("error")),
    );
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(port) = err.port() {
        inner.insert("port".to_string(), json!(port));
    }
    json!({ "error": Value::Object(inner) })
}
