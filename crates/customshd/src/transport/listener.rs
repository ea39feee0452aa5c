//! Binding of Unix stream listeners.

use std::fs;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};

use camino::Utf8Path;
use tracing::{info, warn};

use customsh_config::{ListenerEndpoint, UnixAddress};

use super::{LISTENER_TARGET, ListenerError};

/// A bound, non-blocking listener.
///
/// Dropping a filesystem listener removes its socket file.
#[derive(Debug)]
pub struct BoundListener {
    endpoint: ListenerEndpoint,
    listener: UnixListener,
}

impl BoundListener {
    /// Binds `endpoint` in the calling thread's current network namespace.
    ///
    /// A leftover socket file from a previous run is replaced when nothing
    /// accepts on it.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the socket cannot be bound.
    pub fn bind(endpoint: &ListenerEndpoint) -> Result<Self, ListenerError> {
        let address = endpoint.address();
        if let Some(path) = address.path() {
            address
                .prepare_filesystem()
                .map_err(|source| ListenerError::Prepare {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
            clear_stale_socket(path)?;
        }
        let socket_addr = address
            .to_socket_addr()
            .map_err(|source| ListenerError::Address {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let listener =
            UnixListener::bind_addr(&socket_addr).map_err(|source| ListenerError::BindUnix {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let bound = Self {
            endpoint: endpoint.clone(),
            listener,
        };
        // From here on `bound` owns the socket file and removes it on drop.
        bound
            .listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        info!(
            target: LISTENER_TARGET,
            endpoint = %bound.endpoint,
            "listener bound"
        );
        Ok(bound)
    }

    /// The endpoint this listener was bound for.
    #[must_use]
    pub const fn endpoint(&self) -> &ListenerEndpoint {
        &self.endpoint
    }

    pub(crate) fn accept(&self) -> io::Result<UnixStream> {
        self.listener.accept().map(|(stream, _)| stream)
    }
}

impl AsRawFd for BoundListener {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

impl Drop for BoundListener {
    fn drop(&mut self) {
        if let UnixAddress::Path(path) = self.endpoint.address() {
            cleanup_unix_socket(path);
        }
    }
}

fn clear_stale_socket(path: &Utf8Path) -> Result<(), ListenerError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(ListenerError::UnixMetadata {
                path: path.to_string(),
                source,
            });
        }
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::UnixNotSocket {
            path: path.to_string(),
        });
    }
    match UnixStream::connect(path) {
        Ok(_stream) => Err(ListenerError::UnixInUse {
            path: path.to_string(),
        }),
        Err(error)
            if error.kind() == io::ErrorKind::ConnectionRefused
                || error.kind() == io::ErrorKind::NotFound =>
        {
            fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                path: path.to_string(),
                source,
            })
        }
        Err(source) => Err(ListenerError::UnixConnect {
            path: path.to_string(),
            source,
        }),
    }
}

fn cleanup_unix_socket(path: &Utf8Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn endpoint_in(dir: &TempDir, name: &str) -> ListenerEndpoint {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf8 temp path");
        ListenerEndpoint::new(UnixAddress::Path(path))
    }

    #[test]
    fn binds_and_removes_socket_file() {
        let dir = TempDir::new().expect("temp dir");
        let endpoint = endpoint_in(&dir, "customsh.sock");
        let listener = BoundListener::bind(&endpoint).expect("bind");
        assert!(dir.path().join("customsh.sock").exists());
        drop(listener);
        assert!(!dir.path().join("customsh.sock").exists());
    }

    #[test]
    fn replaces_stale_socket_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("stale.sock");
        drop(UnixListener::bind(&path).expect("bind stale socket"));
        assert!(path.exists(), "std leaves the socket file behind");

        let endpoint = endpoint_in(&dir, "stale.sock");
        BoundListener::bind(&endpoint).expect("rebind over stale socket");
    }

    #[test]
    fn refuses_live_socket() {
        let dir = TempDir::new().expect("temp dir");
        let endpoint = endpoint_in(&dir, "live.sock");
        let _live = BoundListener::bind(&endpoint).expect("first bind");
        let error = BoundListener::bind(&endpoint).expect_err("second bind must fail");
        assert!(matches!(error, ListenerError::UnixInUse { .. }));
    }

    #[test]
    fn refuses_non_socket_path() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("plain"), b"not a socket").expect("write file");
        let endpoint = endpoint_in(&dir, "plain");
        let error = BoundListener::bind(&endpoint).expect_err("file must be refused");
        assert!(matches!(error, ListenerError::UnixNotSocket { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn binds_abstract_address() {
        let name = format!("customsh-test-{}", std::process::id());
        let endpoint = ListenerEndpoint::new(UnixAddress::Abstract(name));
        let listener = BoundListener::bind(&endpoint).expect("bind abstract");
        let addr = listener
            .endpoint()
            .address()
            .to_socket_addr()
            .expect("socket addr");
        UnixStream::connect_addr(&addr).expect("connect abstract");
    }
}
