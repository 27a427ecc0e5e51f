//! Native library resolution.
//!
//! The mechanics of opening a shared library belong to the embedder (through
//! [`NativeLoader`]); this module only decides *which* paths to try, in what
//! order, and turns the outcome into a single loaded module or a
//! [`LoadError`].

use std::env::consts::{ARCH, DLL_PREFIX, DLL_SUFFIX, OS};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::error::LoadError;
use crate::native::NativeOps;

/// Opens a native extension and binds it to [`NativeOps`].
pub trait NativeLoader {
    /// Load the library at `path`.
    ///
    /// Return [`LoadError::NotFound`] when nothing exists at `path` so the
    /// next candidate is tried; any other error aborts the search.
    fn load(&self, path: &Path) -> Result<Arc<dyn NativeOps>, LoadError>;
}

/// Computes candidate library paths for a base name.
#[derive(Debug, Clone)]
pub struct LibraryLocator {
    name: String,
    search_paths: Vec<PathBuf>,
    home_dir: Option<PathBuf>,
}

impl LibraryLocator {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            name: config.library_name.clone(),
            search_paths: config.search_paths.clone(),
            home_dir: config.home_dir.clone(),
        }
    }

    /// Base library name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Platform file name, e.g. `libcext.so` on Linux.
    pub fn mapped_name(&self) -> String {
        map_library_name(&self.name)
    }

    /// Candidate paths, in the order they should be tried.
    ///
    /// 1. each configured search directory
    /// 2. the bare file name (resolved by the system loader)
    /// 3. `<home>/lib/native/<arch>-<os>/`
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mapped = self.mapped_name();
        let mut candidates: Vec<PathBuf> = self
            .search_paths
            .iter()
            .map(|dir| dir.join(&mapped))
            .collect();

        candidates.push(PathBuf::from(&mapped));

        if let Some(home) = &self.home_dir {
            candidates.push(
                home.join("lib")
                    .join("native")
                    .join(platform_dir())
                    .join(&mapped),
            );
        }

        candidates
    }

    /// Try each candidate until one loads.
    pub fn load_with(&self, loader: &dyn NativeLoader) -> Result<Arc<dyn NativeOps>, LoadError> {
        let mut tried = Vec::new();

        for path in self.candidates() {
            match loader.load(&path) {
                Ok(ops) => {
                    log::info!("Loaded native library {}", path.display());
                    return Ok(ops);
                }
                Err(err) if err.is_not_found() => {
                    log::debug!("Native library not found at {}", path.display());
                    tried.push(path);
                }
                Err(err) => {
                    log::warn!("Failed to load native library {}: {}", path.display(), err);
                    return Err(err);
                }
            }
        }

        Err(LoadError::NotFound {
            name: self.name.clone(),
            tried,
        })
    }
}

/// Map a base name to the platform's shared library file name.
pub fn map_library_name(name: &str) -> String {
    format!("{}{}{}", DLL_PREFIX, name, DLL_SUFFIX)
}

/// Per-platform directory under `<home>/lib/native/`.
pub fn platform_dir() -> String {
    format!("{}-{}", ARCH, OS)
}
