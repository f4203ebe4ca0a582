//! Listener binding for TCP and Unix domain sockets.
//!
//! # Responsibilities
//! - Parse the configured bind target
//! - Bind a TCP listener or a Unix socket listener
//! - Clear a stale socket file before binding and after shutdown
//!
//! # Bind Targets
//! - `host:port` binds that address (host names are resolved)
//! - `:port` binds all IPv4 interfaces
//! - `unix/<path>` binds a Unix socket at `<path>`

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;

const UNIX_PREFIX: &str = "unix/";

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// The bind target could not be understood.
    InvalidTarget(String),
    /// Failed to bind to address.
    Bind(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::InvalidTarget(t) => write!(f, "Invalid bind target: {:?}", t),
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(e) => Some(e),
            ListenerError::InvalidTarget(_) => None,
        }
    }
}

/// Where the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    Tcp(String),
    Unix(PathBuf),
}

impl FromStr for BindTarget {
    type Err = ListenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(ListenerError::InvalidTarget(s.to_string()));
            }
            return Ok(BindTarget::Unix(PathBuf::from(path)));
        }

        let Some((host, port)) = s.rsplit_once(':') else {
            return Err(ListenerError::InvalidTarget(s.to_string()));
        };
        if port.parse::<u16>().is_err() {
            return Err(ListenerError::InvalidTarget(s.to_string()));
        }
        if host.is_empty() {
            return Ok(BindTarget::Tcp(format!("0.0.0.0:{}", port)));
        }
        Ok(BindTarget::Tcp(s.to_string()))
    }
}

impl std::fmt::Display for BindTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindTarget::Tcp(addr) => write!(f, "{}", addr),
            BindTarget::Unix(path) => write!(f, "{}{}", UNIX_PREFIX, path.display()),
        }
    }
}

/// A bound listener, ready to be served.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix { listener: UnixListener, path: PathBuf },
}

impl Listener {
    /// Bind to `target`.
    pub async fn bind(target: &BindTarget) -> Result<Self, ListenerError> {
        match target {
            BindTarget::Tcp(addr) => {
                let listener = TcpListener::bind(addr.as_str())
                    .await
                    .map_err(ListenerError::Bind)?;
                let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
                tracing::info!(address = %local_addr, "Listener bound");
                Ok(Listener::Tcp(listener))
            }
            #[cfg(unix)]
            BindTarget::Unix(path) => {
                remove_socket(path);
                let listener = UnixListener::bind(path).map_err(ListenerError::Bind)?;
                tracing::info!(socket = %path.display(), "Listener bound");
                Ok(Listener::Unix {
                    listener,
                    path: path.clone(),
                })
            }
            #[cfg(not(unix))]
            BindTarget::Unix(path) => Err(ListenerError::InvalidTarget(format!(
                "{}{}",
                UNIX_PREFIX,
                path.display()
            ))),
        }
    }

    /// Local TCP address, if this is a TCP listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Listener::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Listener::Unix { .. } => None,
        }
    }
}

/// Remove a socket file left behind by a previous run. Missing is fine.
pub fn remove_socket(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(socket = %path.display(), "Removed socket file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(socket = %path.display(), error = %e, "Failed to remove socket file"),
    }
}
