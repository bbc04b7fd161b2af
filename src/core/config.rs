// Server configuration and validation of caller-supplied inputs.
// Validation is read-only: it stats and opens, never creates or writes.
use crate::core::error::{Error, ErrorKind};
use std::fs::{self, File};
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATA_PATH: &str = ".";
pub const DEFAULT_UI_FILE: &str = "www/ui.html";
pub const DEFAULT_HTTP_PORT: u16 = 3000;

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_WORKER_THREADS: usize = 2;

/// Validated inputs for one server instance.
///
/// Both paths are canonical (absolute, symlinks resolved). A config is built
/// per start call and never mutated afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerConfig {
    data_root: PathBuf,
    ui_entry: PathBuf,
    port: u16,
}

impl ServerConfig {
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn ui_entry(&self) -> &Path {
        &self.ui_entry
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// File name of the UI entry, also routable as `/<name>`.
    pub fn ui_name(&self) -> Option<&str> {
        self.ui_entry.file_name().and_then(|name| name.to_str())
    }
}

/// Runtime policy for a server instance; not part of the foreign contract.
#[derive(Clone, Debug)]
pub struct ServeOptions {
    pub host: IpAddr,
    pub drain_timeout: Duration,
    pub worker_threads: usize,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

impl ServeOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if self.drain_timeout.is_zero() {
            return Err(
                Error::new(ErrorKind::Usage).with_message("drain timeout must be greater than zero")
            );
        }
        if self.worker_threads == 0 {
            return Err(
                Error::new(ErrorKind::Usage).with_message("worker threads must be greater than zero")
            );
        }
        Ok(())
    }
}

/// Decode and check raw start arguments.
///
/// Inputs are raw bytes because the foreign caller may hand over text in an
/// undeclared encoding; anything that is not UTF-8 is rejected.
pub fn validate(
    raw_data_path: impl AsRef<[u8]>,
    raw_ui_path: impl AsRef<[u8]>,
    port: u16,
) -> Result<ServerConfig, Error> {
    let data_path = decode_path(raw_data_path.as_ref(), "data path")?;
    let ui_path = decode_path(raw_ui_path.as_ref(), "ui path")?;

    if port == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("http port must be nonzero")
            .with_port(port));
    }

    let data_root = canonical(&data_path, "data path")?;
    let meta = fs::metadata(&data_root).map_err(|err| stat_error(err, &data_root, "data path"))?;
    if !meta.is_dir() {
        return Err(Error::new(ErrorKind::NotADirectory)
            .with_message("data path is not a directory")
            .with_path(&data_root));
    }
    fs::read_dir(&data_root).map_err(|err| stat_error(err, &data_root, "data path"))?;

    let ui_entry = canonical(&ui_path, "ui path")?;
    let meta = fs::metadata(&ui_entry).map_err(|err| stat_error(err, &ui_entry, "ui path"))?;
    if !meta.is_file() {
        return Err(Error::new(ErrorKind::NotAFile)
            .with_message("ui path is not a regular file")
            .with_path(&ui_entry));
    }
    File::open(&ui_entry).map_err(|err| stat_error(err, &ui_entry, "ui path"))?;

    Ok(ServerConfig {
        data_root,
        ui_entry,
        port,
    })
}

fn decode_path(raw: &[u8], label: &str) -> Result<PathBuf, Error> {
    let text = std::str::from_utf8(raw).map_err(|err| {
        Error::new(ErrorKind::Encoding)
            .with_message(format!("{label} is not valid UTF-8"))
            .with_source(err)
    })?;
    if text.contains('\0') {
        return Err(Error::new(ErrorKind::Encoding).with_message(format!("{label} contains NUL")));
    }
    Ok(PathBuf::from(text))
}

fn canonical(path: &Path, label: &str) -> Result<PathBuf, Error> {
    if path.as_os_str().is_empty() {
        return Err(Error::new(ErrorKind::PathNotFound).with_message(format!("{label} is empty")));
    }
    path.canonicalize().map_err(|err| stat_error(err, path, label))
}

fn stat_error(err: io::Error, path: &Path, label: &str) -> Error {
    let kind = match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::PathNotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    };
    let message = match kind {
        ErrorKind::PathNotFound => format!("{label} does not exist"),
        ErrorKind::Permission => format!("{label} is not readable"),
        _ => format!("failed to inspect {label}"),
    };
    Error::new(kind)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{ServeOptions, validate};
    use crate::core::error::ErrorKind;
    use std::time::Duration;

    fn fixture() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(temp.path().join("data")).expect("data dir");
        std::fs::create_dir_all(temp.path().join("www")).expect("www dir");
        std::fs::write(temp.path().join("www/ui.html"), "<html></html>").expect("ui file");
        temp
    }

    fn as_str(path: &std::path::Path) -> &str {
        path.to_str().expect("utf8 path")
    }

    #[test]
    fn accepts_existing_dir_and_file() {
        let temp = fixture();
        let data = temp.path().join("data");
        let ui = temp.path().join("www/ui.html");
        let config = validate(as_str(&data), as_str(&ui), 3000).expect("valid config");
        assert!(config.data_root().is_absolute());
        assert_eq!(config.data_root(), data.canonicalize().expect("canonical"));
        assert_eq!(config.ui_entry(), ui.canonicalize().expect("canonical"));
        assert_eq!(config.port(), 3000);
        assert_eq!(config.ui_name(), Some("ui.html"));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let temp = fixture();
        let ui = temp.path().join("www/ui.html");
        let err = validate([0x66u8, 0xff, 0xfe], as_str(&ui), 3000).expect_err("encoding error");
        assert_eq!(err.kind(), ErrorKind::Encoding);
    }

    #[test]
    fn rejects_port_zero() {
        let temp = fixture();
        let data = temp.path().join("data");
        let ui = temp.path().join("www/ui.html");
        let err = validate(as_str(&data), as_str(&ui), 0).expect_err("usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn missing_paths_are_not_found() {
        let temp = fixture();
        let ui = temp.path().join("www/ui.html");
        let missing = temp.path().join("nope");
        let err = validate(as_str(&missing), as_str(&ui), 3000).expect_err("missing data");
        assert_eq!(err.kind(), ErrorKind::PathNotFound);

        let data = temp.path().join("data");
        let err = validate(as_str(&data), as_str(&missing), 3000).expect_err("missing ui");
        assert_eq!(err.kind(), ErrorKind::PathNotFound);

        let err = validate("", as_str(&ui), 3000).expect_err("empty data");
        assert_eq!(err.kind(), ErrorKind::PathNotFound);
    }

    #[test]
    fn wrong_kinds_are_rejected() {
        let temp = fixture();
        let data = temp.path().join("data");
        let ui = temp.path().join("www/ui.html");

        let err = validate(as_str(&ui), as_str(&ui), 3000).expect_err("file as data root");
        assert_eq!(err.kind(), ErrorKind::NotADirectory);

        let err = validate(as_str(&data), as_str(&data), 3000).expect_err("dir as ui entry");
        assert_eq!(err.kind(), ErrorKind::NotAFile);
    }

    #[test]
    fn ui_entry_may_live_outside_data_root() {
        let temp = fixture();
        let data = temp.path().join("data");
        let ui = temp.path().join("www/ui.html");
        let config = validate(as_str(&data), as_str(&ui), 3000).expect("valid config");
        assert!(!config.ui_entry().starts_with(config.data_root()));
    }

    #[test]
    fn serve_options_require_positive_limits() {
        ServeOptions::default().validate().expect("defaults are valid");

        let options = ServeOptions {
            drain_timeout: Duration::ZERO,
            ..ServeOptions::default()
        };
        assert_eq!(options.validate().expect_err("zero drain").kind(), ErrorKind::Usage);

        let options = ServeOptions {
            worker_threads: 0,
            ..ServeOptions::default()
        };
        assert_eq!(options.validate().expect_err("zero workers").kind(), ErrorKind::Usage);
    }
}
