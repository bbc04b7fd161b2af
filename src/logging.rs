//! Purpose: Install the tracing subscriber for the CLI and for embedded use.
//! Exports: `LogLevel`, `init`, `init_default`.
//! Role: One place that decides filter, terminal output and optional log file.
//! Invariants: `RUST_LOG` overrides the requested level when set and valid.
//! Invariants: Never replaces a subscriber the host process already installed.
//! Invariants: A log file is only created when this call will own the subscriber.

use std::fs::File;
use std::path::Path;
use std::sync::{Mutex, Once};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

/// Install a subscriber writing to stderr (unless `quiet`) and to `logfile` if given.
///
/// When a global subscriber already exists, a plain call is a no-op and a call
/// that asks for a log file fails without touching the file.
pub fn init(level: LogLevel, quiet: bool, logfile: Option<&Path>) -> Result<(), Error> {
    if tracing::dispatcher::has_been_set() {
        return match logfile {
            Some(path) => Err(subscriber_installed().with_path(path)),
            None => Ok(()),
        };
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    let file_layer = match logfile {
        Some(path) => {
            let file = File::create(path).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to create log file")
                    .with_path(path)
                    .with_source(err)
            })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let term_layer = (!quiet).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(term_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| subscriber_installed().with_source(err))
}

fn subscriber_installed() -> Error {
    Error::new(ErrorKind::Internal).with_message("a global log subscriber is already installed")
}

/// Default subscriber for foreign hosts; installed at most once per process.
pub fn init_default() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = init(LogLevel::Info, false, None);
    });
}
