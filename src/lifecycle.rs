//! Purpose: Own the one-server-at-a-time start/stop state machine.
//! Exports: `Controller`, `LifecycleState`, `global`.
//! Role: Binds the listener, hosts the serving runtime on a dedicated thread, drains on stop.
//! Invariants: At most one running instance per controller; the process uses `global()`.
//! Invariants: Start reports every failure through its result and leaves the controller idle.
//! Invariants: Stop returns only after the serving thread has exited and the port is released.
//! Invariants: A single mutex serializes start and stop across caller threads.

use std::net::{SocketAddr, TcpListener};
use std::sync::{Mutex, MutexGuard};
use std::thread::JoinHandle;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::core::config::{ServeOptions, ServerConfig};
use crate::core::error::{Error, ErrorKind};
use crate::serve;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    Stopping,
}

struct ServerInstance {
    port: u16,
    local_addr: SocketAddr,
    release: Option<oneshot::Sender<()>>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ServerInstance {
    /// Let the serving thread begin accepting connections.
    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
    }

    /// True once the serving thread is gone, e.g. after the serve loop failed.
    fn has_exited(&self) -> bool {
        self.thread
            .as_ref()
            .map_or(true, |thread| thread.is_finished())
    }

    fn shutdown(&mut self) {
        self.release.take();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(port = self.port, "serving thread panicked");
            }
        }
    }
}

impl Drop for ServerInstance {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Slot {
    state: LifecycleState,
    instance: Option<ServerInstance>,
}

pub struct Controller {
    slot: Mutex<Slot>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                state: LifecycleState::Idle,
                instance: None,
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// Address of the running listener, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().instance.as_ref().map(|instance| instance.local_addr)
    }

    pub fn start(&self, config: ServerConfig) -> Result<SocketAddr, Error> {
        self.start_with_options(config, &ServeOptions::default())
    }

    pub fn start_with_options(
        &self,
        config: ServerConfig,
        options: &ServeOptions,
    ) -> Result<SocketAddr, Error> {
        options.validate()?;

        let mut slot = self.lock();
        if slot.state != LifecycleState::Idle {
            let running_port = slot.instance.as_ref().map(|instance| instance.port);
            if running_port == Some(config.port()) {
                warn!(port = config.port(), "port already served by this process");
                return Err(Error::new(ErrorKind::PortInUse)
                    .with_message("port is already served by this process")
                    .with_port(config.port()));
            }
            warn!("path server already started");
            return Err(Error::new(ErrorKind::AlreadyRunning)
                .with_message("path server already started")
                .with_port(config.port()));
        }

        slot.state = LifecycleState::Starting;
        match launch(&config, options) {
            Ok(mut instance) => {
                let addr = instance.local_addr;
                slot.state = LifecycleState::Running;
                instance.release();
                slot.instance = Some(instance);
                info!(
                    data_root = %config.data_root().display(),
                    ui_entry = %config.ui_entry().display(),
                    "path server started on http://{addr}"
                );
                Ok(addr)
            }
            Err(err) => {
                slot.state = LifecycleState::Idle;
                Err(err)
            }
        }
    }

    /// Stop the running server; a no-op when idle.
    pub fn stop(&self) {
        let mut slot = self.lock();
        if slot.state == LifecycleState::Idle {
            debug!("path server already stopped");
            return;
        }

        slot.state = LifecycleState::Stopping;
        if let Some(mut instance) = slot.instance.take() {
            info!(port = instance.port, "stopping path server");
            instance.shutdown();
        }
        slot.state = LifecycleState::Idle;
        info!("path server stopped");
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        let mut slot = self.slot.lock().unwrap_or_else(|poison| {
            self.slot.clear_poison();
            poison.into_inner()
        });
        if slot.instance.as_ref().is_some_and(ServerInstance::has_exited) {
            if let Some(mut stale) = slot.instance.take() {
                warn!(port = stale.port, "serving thread exited, clearing stale instance");
                stale.shutdown();
            }
        }
        // A panic mid-transition leaves a transient phase behind.
        slot.state = if slot.instance.is_some() {
            LifecycleState::Running
        } else {
            LifecycleState::Idle
        };
        slot
    }
}

/// The process-wide controller behind the foreign entry points.
pub fn global() -> &'static Controller {
    static CONTROLLER: Controller = Controller::new();
    &CONTROLLER
}

fn launch(config: &ServerConfig, options: &ServeOptions) -> Result<ServerInstance, Error> {
    let port = config.port();
    let bind = SocketAddr::new(options.host, port);
    let listener = TcpListener::bind(bind).map_err(|err| {
        Error::new(ErrorKind::BindFailure)
            .with_message(format!("failed to bind {bind}"))
            .with_port(port)
            .with_source(err)
    })?;
    listener.set_nonblocking(true).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to configure listener")
            .with_port(port)
            .with_source(err)
    })?;
    let local_addr = listener.local_addr().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read listener address")
            .with_port(port)
            .with_source(err)
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(options.worker_threads)
        .thread_name("path-server-worker")
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to build http runtime")
                .with_source(err)
        })?;

    let app = serve::router(config);
    let drain_timeout = options.drain_timeout;
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let thread = std::thread::Builder::new()
        .name("path-server-http".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                if release_rx.await.is_err() {
                    return;
                }
                if let Err(err) = serve::serve_until(listener, app, shutdown_rx, drain_timeout).await {
                    error!("http server failed: {err}");
                }
            });
            runtime.shutdown_timeout(drain_timeout);
        })
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to spawn serving thread")
                .with_source(err)
        })?;

    Ok(ServerInstance {
        port,
        local_addr,
        release: Some(release_tx),
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    })
}
