//! Native handle registry and reclamation bridge.
//!
//! Keeps managed objects alive while a native extension references them,
//! and reclaims the association once the native side reports it dead.
//!
//! # Example
//!
//! ```ignore
//! use cext_bridge::{Bridge, BridgeConfig, ManagedSingletons, ObjectRef};
//!
//! let bridge = Bridge::load(&my_loader, ManagedSingletons::new(), BridgeConfig::default())?;
//!
//! let obj = ObjectRef::new(String::from("wrapped"));
//! let handle = bridge.create_handle(&obj)?;
//!
//! {
//!     let scope = bridge.enter_native();
//!     bridge.mark_handle(&scope, handle.native_id());
//! }
//!
//! // Later, from anywhere
//! bridge.trigger_gc();
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod gc;
pub mod handle;
pub mod loader;
pub mod native;
pub mod object;
pub mod registry;

pub use bridge::{Bridge, NativeScope};
pub use config::BridgeConfig;
pub use error::{Error, LoadError, NativeError, Result};
pub use gc::{ExclusiveGuard, ExternalMemoryGuard, GcCoordinator, PassState, PassStats};
pub use handle::{Handle, HandleKind, NativeId, SentinelKind};
pub use loader::{LibraryLocator, NativeLoader};
pub use native::NativeOps;
pub use object::{ManagedSingletons, Nil, ObjectKey, ObjectRef};
pub use registry::HandleRegistry;
