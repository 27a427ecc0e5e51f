//! Error types for the bridge.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for bridge operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The native extension could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A native operation reported a failure.
    #[error(transparent)]
    Native(#[from] NativeError),

    /// The reclamation worker thread could not be started.
    #[error("failed to spawn reclamation worker: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a load error.
    pub fn is_load(&self) -> bool {
        matches!(self, Error::Load(_))
    }

    /// Check if this is a native error.
    pub fn is_native(&self) -> bool {
        matches!(self, Error::Native(_))
    }
}

/// Failure to resolve or load the native module.
#[derive(Error, Debug)]
pub enum LoadError {
    /// No candidate path yielded a loadable library.
    #[error("failed to load native library '{name}' (tried: {})", display_paths(.tried))]
    NotFound {
        /// Base library name.
        name: String,
        /// Every path that was attempted, in order.
        tried: Vec<PathBuf>,
    },

    /// The library was found but could not be bound.
    #[error("failed to bind native library {path}: {message}")]
    Binding {
        /// Path of the library.
        path: PathBuf,
        /// Loader message.
        message: String,
    },

    /// Native initialization failed after loading.
    #[error("native initialization failed: {0}")]
    Init(#[source] NativeError),
}

impl LoadError {
    /// Check if this error only means "not at this path".
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound { .. })
    }
}

/// Failure reported by the native extension.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// The native side could not allocate a handle.
    #[error("native handle creation failed: {0}")]
    Create(String),

    /// The native reclamation step failed.
    #[error("native reclamation step failed: {0}")]
    Reclamation(String),

    /// A native initializer or method call failed.
    #[error("native call failed: {0}")]
    Call(String),

    /// Native code panicked.
    #[error("native code panicked: {0}")]
    Panic(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
