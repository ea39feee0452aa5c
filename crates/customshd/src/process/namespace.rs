//! Temporary network namespace switches for binding listeners.
//!
//! `setns(2)` applies to the calling thread only, so a scope must be entered
//! and left on the same thread, and no other work should run on that thread
//! in between.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sched::{CloneFlags, setns};
use thiserror::Error;
use tracing::{debug, warn};

use super::PROCESS_TARGET;

/// Directory holding named namespaces created by `ip netns add`.
pub const NETNS_RUN_DIR: &str = "/run/netns";

const CURRENT_NET_NS: &str = "/proc/thread-self/ns/net";

/// Errors raised while switching network namespaces.
#[derive(Debug, Error)]
pub enum NamespaceError {
    /// A namespace handle could not be opened.
    #[error("failed to open network namespace '{}': {source}", path.display())]
    Open {
        /// Namespace path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// `setns` refused to enter the namespace.
    #[error("failed to enter network namespace '{}': {source}", path.display())]
    Enter {
        /// Namespace path.
        path: PathBuf,
        /// Kernel error.
        #[source]
        source: Errno,
    },
    /// `setns` refused to return to the original namespace.
    #[error("failed to restore the original network namespace: {source}")]
    Restore {
        /// Kernel error.
        #[source]
        source: Errno,
    },
}

/// Resolves a namespace identifier: absolute paths are used as given and
/// bare names are looked up under [`NETNS_RUN_DIR`].
#[must_use]
pub fn namespace_path(id: &str) -> PathBuf {
    let candidate = Path::new(id);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        Path::new(NETNS_RUN_DIR).join(candidate)
    }
}

/// The calling thread's stay inside another network namespace.
///
/// The original namespace is restored by [`NetNamespace::leave`] or, failing
/// that, when the scope is dropped.
#[derive(Debug)]
pub struct NetNamespace {
    original: File,
    entered: PathBuf,
    restored: bool,
}

impl NetNamespace {
    /// Moves the calling thread into the namespace named by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError`] when either namespace handle cannot be
    /// opened or the switch is refused.
    pub fn enter(id: &str) -> Result<Self, NamespaceError> {
        let original = open_namespace(Path::new(CURRENT_NET_NS))?;
        let entered = namespace_path(id);
        let target = open_namespace(&entered)?;
        setns(&target, CloneFlags::CLONE_NEWNET).map_err(|source| NamespaceError::Enter {
            path: entered.clone(),
            source,
        })?;
        debug!(
            target: PROCESS_TARGET,
            namespace = %entered.display(),
            "entered network namespace"
        );
        Ok(Self {
            original,
            entered,
            restored: false,
        })
    }

    /// Path of the namespace the thread is in.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.entered
    }

    /// Returns the calling thread to its original namespace.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::Restore`] when the switch back is refused.
    pub fn leave(mut self) -> Result<(), NamespaceError> {
        self.restore()
    }

    fn restore(&mut self) -> Result<(), NamespaceError> {
        if self.restored {
            return Ok(());
        }
        setns(&self.original, CloneFlags::CLONE_NEWNET)
            .map_err(|source| NamespaceError::Restore { source })?;
        self.restored = true;
        debug!(
            target: PROCESS_TARGET,
            namespace = %self.entered.display(),
            "left network namespace"
        );
        Ok(())
    }
}

impl Drop for NetNamespace {
    fn drop(&mut self) {
        if let Err(error) = self.restore() {
            warn!(target: PROCESS_TARGET, error = %error, "network namespace not restored");
        }
    }
}

fn open_namespace(path: &Path) -> Result<File, NamespaceError> {
    File::open(path).map_err(|source| NamespaceError::Open {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("test", "/run/netns/test")]
    #[case("/var/run/netns/lab", "/var/run/netns/lab")]
    fn resolves_namespace_identifiers(#[case] id: &str, #[case] expected: &str) {
        assert_eq!(namespace_path(id), PathBuf::from(expected));
    }

    #[test]
    fn missing_namespace_fails_without_switching() {
        let error = NetNamespace::enter("/nonexistent/customsh-netns").expect_err("must fail");
        assert!(matches!(error, NamespaceError::Open { .. }));
    }
}
