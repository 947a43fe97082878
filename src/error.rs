// src/error.rs
//! Error types for the engine lifecycle and configuration loading.
//!
//! Only resource acquisition in `init`/`start` and misuse of the handle are
//! reported through these types. Errors that happen while the engine runs
//! (receive failures, buffer overflow, callback panics) are logged and counted
//! in [`crate::EngineStats`] instead.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Failure of [`Engine::init`](crate::Engine::init).
///
/// Everything acquired by the failing call has already been released.
#[derive(Debug, Error)]
pub enum InitError {
    /// Ring storage could not be allocated
    #[error("failed to allocate {bytes} byte ring buffer")]
    Allocation {
        /// Requested capacity
        bytes: usize,
    },

    /// A thread handle or registration table could not be allocated
    #[error("failed to allocate {role} table for {count} entries")]
    Table {
        /// Pool the table belongs to
        role: ThreadRole,
        /// Requested entries
        count: usize,
    },
    /// Socket creation or configuration failed
    #[error("socket setup failed: {0}")]
    Socket(#[source] io::Error),
    /// The socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },
    /// The socket could not be registered for readiness events
    #[error("failed to register listener slot {index}: {source}")]
    Registration {
        /// Listener slot index
        index: usize,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },
}

/// Which pool a thread belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadRole {
    /// Socket receive thread
    Listener,
    /// Buffer drain thread
    Worker,
}

impl std::fmt::Display for ThreadRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listener => write!(f, "listener"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

/// Failure of [`Engine::start`](crate::Engine::start).
///
/// On failure the engine is back to not-running and every thread spawned by
/// the call has been joined.
#[derive(Debug, Error)]
pub enum StartError {
    /// A thread could not be spawned
    #[error("failed to spawn {role} thread {index}: {source}")]
    Spawn {
        /// Pool of the failing thread
        role: ThreadRole,
        /// Index within that pool
        index: usize,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },
    /// A listener slot lost to a crashed thread could not be rebuilt
    #[error("failed to rebuild listener slot {index}: {source}")]
    Registration {
        /// Listener slot index
        index: usize,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },
    /// The engine has been destroyed
    #[error("engine has been destroyed")]
    Destroyed,
}

/// Operation not permitted in the engine's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// Operation requires a stopped engine
    #[error("engine is running")]
    Running,
    /// The engine has been destroyed
    #[error("engine has been destroyed")]
    Destroyed,
}

/// Failure to load a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// File is not valid configuration JSON
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<InitError> for io::Error {
    fn from(err: InitError) -> Self {
        let kind = match &err {
            InitError::Allocation { .. } | InitError::Table { .. } => io::ErrorKind::OutOfMemory,
            InitError::Socket(source)
            | InitError::Bind { source, .. }
            | InitError::Registration { source, .. } => source.kind(),
        };
        io::Error::new(kind, err)
    }
}

impl From<StartError> for io::Error {
    fn from(err: StartError) -> Self {
        let kind = match &err {
            StartError::Spawn { source, .. } | StartError::Registration { source, .. } => {
                source.kind()
            }
            StartError::Destroyed => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Extension trait for folding engine results into `std::io::Result`.
pub trait ResultExt<T> {
    /// Convert to io::Result
    fn into_io(self) -> io::Result<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<io::Error>,
{
    fn into_io(self) -> io::Result<T> {
        self.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_maps_to_out_of_memory() {
        let io_err: io::Error = InitError::Allocation { bytes: 42 }.into();
        assert_eq!(io_err.kind(), io::ErrorKind::OutOfMemory);
        assert!(io_err.to_string().contains("42"));
    }

    #[test]
    fn test_bind_keeps_os_kind() {
        let err = InitError::Bind {
            addr: "127.0.0.1:9".parse().unwrap(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::AddrInUse);
    }

    #[test]
    fn test_result_ext() {
        let result: Result<u32, StartError> = Err(StartError::Destroyed);
        let io_result = result.into_io();
        assert!(io_result.unwrap_err().to_string().contains("destroyed"));
    }

    #[test]
    fn test_spawn_error_message() {
        let err = StartError::Spawn {
            role: ThreadRole::Worker,
            index: 3,
            source: io::Error::from(io::ErrorKind::WouldBlock),
        };
        assert!(err.to_string().starts_with("failed to spawn worker thread 3"));
    }
}
