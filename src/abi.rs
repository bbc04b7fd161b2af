//! Purpose: C ABI surface for hosts that embed the path server (ctypes, P/Invoke, C).
//! Exports: `start_path_server`, `start_path_server_ex`, `stop_path_server`.
//! Role: Thin adapters over one validate-then-start path on the global controller.
//! Invariants: Foreign strings are copied into owned buffers before validation.
//! Invariants: No foreign pointer is retained after a call returns.
//! Invariants: Errors and panics collapse to `false` (start) or nothing (stop).

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};

use tracing::{error, info, warn};

use crate::core::config::validate;
use crate::core::error::{Error, ErrorKind};
use crate::lifecycle;
use crate::logging;

/// Start the server from two NUL-terminated strings in the caller's native encoding.
///
/// Native encodings that are not UTF-8 compatible are rejected rather than guessed.
#[unsafe(no_mangle)]
pub extern "C" fn start_path_server(
    data_path: *const c_char,
    ui_path: *const c_char,
    http_port: u16,
) -> bool {
    guarded_start(|| {
        let data_path = copy_c_str(data_path, "data_path")?;
        let ui_path = copy_c_str(ui_path, "ui_path")?;
        start_owned(data_path, ui_path, http_port)
    })
}

/// Start the server from two NUL-terminated UTF-8 strings.
///
/// Same signature as `start_path_server`, for callers that declare UTF-8.
#[unsafe(no_mangle)]
pub extern "C" fn start_path_server_ex(
    data_path: *const c_char,
    ui_file: *const c_char,
    http_port: u16,
) -> bool {
    guarded_start(|| {
        let data_path = copy_c_str(data_path, "data_path")?;
        let ui_file = copy_c_str(ui_file, "ui_file")?;
        start_owned(data_path, ui_file, http_port)
    })
}

/// Stop the server and wait until its port is released. Safe to call when idle.
#[unsafe(no_mangle)]
pub extern "C" fn stop_path_server() {
    if panic::catch_unwind(|| lifecycle::global().stop()).is_err() {
        error!("panic while stopping path server");
    }
}

fn start_owned(data_path: Vec<u8>, ui_path: Vec<u8>, http_port: u16) -> Result<(), Error> {
    logging::init_default();
    info!("try start path server");
    let config = validate(&data_path, &ui_path, http_port)?;
    lifecycle::global().start(config)?;
    Ok(())
}

fn guarded_start(start: impl FnOnce() -> Result<(), Error>) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(start)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!("path server start failed: {err}");
            false
        }
        Err(_) => {
            error!("panic while starting path server");
            false
        }
    }
}

fn copy_c_str(input: *const c_char, label: &str) -> Result<Vec<u8>, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{label} is null")));
    }
    Ok(unsafe { CStr::from_ptr(input) }.to_bytes().to_vec())
}
