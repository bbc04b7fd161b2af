//! Purpose: Embeddable local HTTP path server with a C ABI start/stop surface.
//! Exports: `abi` (foreign entry points), `core` (config, errors, path resolution),
//! `lifecycle` (start/stop controller), `logging`.
//! Role: Library behind `libpath_server`, the `path-server` binary and the tests.
//! Invariants: One running server per process through `lifecycle::global`.
//! Invariants: Served files never resolve outside the configured data root.
pub mod abi;
pub mod core;
pub mod lifecycle;
pub mod logging;
mod serve;

pub use crate::core::config::{
    DEFAULT_DATA_PATH, DEFAULT_HTTP_PORT, DEFAULT_UI_FILE, ServeOptions, ServerConfig, validate,
};
pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use crate::lifecycle::{Controller, LifecycleState};
