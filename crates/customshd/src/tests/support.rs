//! Shared harness for the daemon behavioural suites.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoError;
use tempfile::TempDir;

use customsh_config::{Config, ListenerEndpoint, UnixAddress};
use customsh_protocol::{ProtocolError, Reply, encode_request};

use crate::process::{
    ConfigLoader, DaemonizeError, Daemonizer, LaunchError, RunFlag, ShutdownError,
    ShutdownSignal, build_registry,
};
use crate::service::Service;
use crate::transport::BoundListener;

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration with a filesystem listener inside `dir` and a short poll
/// interval so tests stop promptly.
pub fn test_config(socket: &Path) -> Config {
    let path = Utf8PathBuf::from_path_buf(socket.to_path_buf()).expect("utf8 temp path");
    Config {
        listeners: vec![ListenerEndpoint::new(UnixAddress::Path(path))],
        workers: 4,
        poll_interval_ms: 20,
        log_filter: "off".to_owned(),
        ..Config::default()
    }
}

/// Sends one command and reads the reply.
pub fn exchange(socket: &Path, command: &[u8]) -> Result<Reply, ProtocolError> {
    let mut stream = UnixStream::connect(socket)?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.write_all(&encode_request(command)?)?;
    Reply::read_from(&mut stream)
}

/// A daemon serving the built-in modules on a temporary socket.
pub struct RunningDaemon {
    _dir: TempDir,
    socket: PathBuf,
    run: RunFlag,
    handle: Option<thread::JoinHandle<Result<(), LaunchError>>>,
}

impl RunningDaemon {
    pub fn start() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let socket = dir.path().join("customsh.sock");
        let config = test_config(&socket);
        let registry = Arc::new(build_registry().expect("built-in registry"));
        let service = Service::start(&config, registry).expect("start workers");
        let listeners = config
            .listener_endpoints()
            .iter()
            .map(|endpoint| BoundListener::bind(endpoint).expect("bind listener"))
            .collect();
        let run = RunFlag::new();
        let loop_flag = run.clone();
        let handle = thread::spawn(move || service.run(listeners, &loop_flag));
        Self {
            _dir: dir,
            socket,
            run,
            handle: Some(handle),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub fn exchange(&self, command: &[u8]) -> Result<Reply, ProtocolError> {
        exchange(&self.socket, command)
    }

    /// Stops the event loop and returns the service result.
    pub fn stop(&mut self) -> Result<(), LaunchError> {
        self.run.stop();
        match self.handle.take() {
            Some(handle) => handle.join().expect("service thread"),
            None => Ok(()),
        }
    }
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        self.run.stop();
        if let Some(handle) = self.handle.take() {
            let _joined = handle.join();
        }
    }
}

/// Loader returning a fixed configuration.
pub struct StaticLoader(pub Config);

impl ConfigLoader for StaticLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.0.clone())
    }
}

/// Daemoniser that only counts invocations.
#[derive(Default, Clone)]
pub struct RecordingDaemonizer {
    pub calls: Arc<AtomicUsize>,
}

impl Daemonizer for RecordingDaemonizer {
    fn daemonize(&self) -> Result<(), DaemonizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl RecordingDaemonizer {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Shutdown source that requests shutdown as soon as it is installed.
pub struct ImmediateShutdown;

impl ShutdownSignal for ImmediateShutdown {
    fn install(&self, flag: &RunFlag) -> Result<(), ShutdownError> {
        flag.stop();
        Ok(())
    }
}

/// Shutdown source that leaves stopping to the test.
pub struct ManualShutdown;

impl ShutdownSignal for ManualShutdown {
    fn install(&self, _flag: &RunFlag) -> Result<(), ShutdownError> {
        Ok(())
    }
}
