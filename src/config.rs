//! Bridge configuration.

use std::path::PathBuf;

/// Default base name of the native extension library.
pub const DEFAULT_LIBRARY_NAME: &str = "cext";

/// Default soft limit for tracked external memory (64 MiB).
pub const DEFAULT_PRESSURE_SOFT_LIMIT_BYTES: u64 = 64 * 1024 * 1024;

/// Default name of the reclamation worker thread.
pub const DEFAULT_WORKER_THREAD_NAME: &str = "cext-gc";

/// Configuration for a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base library name, without platform prefix or suffix.
    pub library_name: String,
    /// Directories searched before the system loader path.
    pub search_paths: Vec<PathBuf>,
    /// Runtime home; `<home>/lib/native/<arch>-<os>/` is the last candidate.
    pub home_dir: Option<PathBuf>,
    /// Tracked external memory at which the pressure sentinel is cleared.
    /// Zero disables automatic clearing (explicit signals still work).
    pub pressure_soft_limit_bytes: u64,
    /// Name of the reclamation worker thread.
    pub worker_thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            library_name: DEFAULT_LIBRARY_NAME.to_string(),
            search_paths: Vec::new(),
            home_dir: None,
            pressure_soft_limit_bytes: DEFAULT_PRESSURE_SOFT_LIMIT_BYTES,
            worker_thread_name: DEFAULT_WORKER_THREAD_NAME.to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn with_library_name(mut self, name: impl Into<String>) -> Self {
        self.library_name = name.into();
        self
    }

    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    pub fn with_home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(dir.into());
        self
    }

    pub fn with_pressure_soft_limit(mut self, bytes: u64) -> Self {
        self.pressure_soft_limit_bytes = bytes;
        self
    }

    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }
}
