use std::fmt;
use std::fs::DirBuilder;
use std::io;
use std::os::unix::net::SocketAddr;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const ABSTRACT_MARKER: char = '@';
const NETNS_QUERY_KEY: &str = "netns";

/// Address of a Unix domain stream socket.
///
/// Text beginning with `@` names a Linux abstract socket; anything else is a
/// filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnixAddress {
    /// Abstract namespace socket (no filesystem entry).
    Abstract(String),
    /// Socket file on the filesystem.
    Path(Utf8PathBuf),
}

impl UnixAddress {
    /// Returns the filesystem path when the address is not abstract.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Abstract(_) => None,
            Self::Path(path) => Some(path.as_ref()),
        }
    }

    /// Builds the kernel socket address used to bind or connect.
    ///
    /// # Errors
    ///
    /// Fails when the name is too long for `sun_path` or, for abstract
    /// addresses, when the platform has no abstract namespace.
    pub fn to_socket_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Path(path) => SocketAddr::from_pathname(path.as_std_path()),
            Self::Abstract(name) => abstract_socket_addr(name),
        }
    }

    /// Ensures the socket's parent directory exists with restrictive
    /// permissions. Abstract addresses need no preparation.
    ///
    /// # Errors
    ///
    /// Returns [`SocketPreparationError`] when the directory cannot be
    /// created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
            return Ok(());
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != io::ErrorKind::AlreadyExists
        {
            return Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }
        Ok(())
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn abstract_socket_addr(name: &str) -> io::Result<SocketAddr> {
    #[cfg(target_os = "android")]
    use std::os::android::net::SocketAddrExt;
    #[cfg(target_os = "linux")]
    use std::os::linux::net::SocketAddrExt;

    SocketAddr::from_abstract_name(name.as_bytes())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn abstract_socket_addr(name: &str) -> io::Result<SocketAddr> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("abstract socket '@{name}' requires Linux"),
    ))
}

impl fmt::Display for UnixAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abstract(name) => write!(formatter, "{ABSTRACT_MARKER}{name}"),
            Self::Path(path) => write!(formatter, "{path}"),
        }
    }
}

impl FromStr for UnixAddress {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Some(name) = input.strip_prefix(ABSTRACT_MARKER) {
            if name.is_empty() {
                return Err(SocketParseError::EmptyAbstractName);
            }
            return Ok(Self::Abstract(name.to_owned()));
        }
        if input.is_empty() {
            return Err(SocketParseError::MissingUnixPath(input.to_owned()));
        }
        Ok(Self::Path(Utf8PathBuf::from(input)))
    }
}

/// A listener declaration: where to bind and, optionally, which network
/// namespace to bind it in.
///
/// The textual form is a `unix:` URL, for example `unix:@custom_sh`,
/// `unix:///run/customsh.sock`, or `unix:@custom_sh?netns=isolated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListenerEndpoint {
    address: UnixAddress,
    namespace: Option<String>,
}

impl ListenerEndpoint {
    /// Declares a listener in the daemon's own network namespace.
    #[must_use]
    pub const fn new(address: UnixAddress) -> Self {
        Self {
            address,
            namespace: None,
        }
    }

    /// Declares a listener bound inside the named network namespace.
    #[must_use]
    pub fn in_namespace(address: UnixAddress, namespace: impl Into<String>) -> Self {
        Self {
            address,
            namespace: Some(namespace.into()),
        }
    }

    /// Socket address to bind.
    #[must_use]
    pub const fn address(&self) -> &UnixAddress {
        &self.address
    }

    /// Network namespace name or absolute path, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for ListenerEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            UnixAddress::Path(path) if path.is_absolute() => write!(formatter, "unix://{path}")?,
            address => write!(formatter, "unix:{address}")?,
        }
        if let Some(namespace) = &self.namespace {
            write!(formatter, "?{NETNS_QUERY_KEY}={namespace}")?;
        }
        Ok(())
    }
}

impl FromStr for ListenerEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        if url.scheme() != "unix" {
            return Err(SocketParseError::UnsupportedScheme(url.scheme().to_owned()));
        }
        if url.host_str().is_some_and(|host| !host.is_empty()) {
            return Err(SocketParseError::UnexpectedHost(input.to_owned()));
        }
        let address = url
            .path()
            .parse::<UnixAddress>()
            .map_err(|_| SocketParseError::MissingUnixPath(input.to_owned()))?;

        let mut namespace = None;
        for (key, value) in url.query_pairs() {
            if key != NETNS_QUERY_KEY || value.is_empty() {
                return Err(SocketParseError::UnknownQuery(input.to_owned()));
            }
            namespace = Some(value.into_owned());
        }
        Ok(Self { address, namespace })
    }
}

impl TryFrom<String> for ListenerEndpoint {
    type Error = SocketParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ListenerEndpoint> for String {
    fn from(value: ListenerEndpoint) -> Self {
        value.to_string()
    }
}

/// Errors encountered while parsing socket addresses and listener URLs.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Scheme was not `unix`.
    #[error("unsupported socket scheme '{0}'")]
    UnsupportedScheme(String),
    /// Unix socket path was absent.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// `@` was given without a name.
    #[error("abstract socket name must not be empty")]
    EmptyAbstractName,
    /// A host component was supplied where only a path is meaningful.
    #[error("unexpected host component in '{0}'")]
    UnexpectedHost(String),
    /// The query string carried something other than `netns=NAME`.
    #[error("only a non-empty 'netns' query is supported in '{0}'")]
    UnknownQuery(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// Failed to create or adjust socket directories.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
}
