//! Reclamation of bridged handles.
//!
//! This module coordinates the managed runtime's view of bridged objects
//! with the native extension's own reference tracking.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PressureReaper                                             │
//! │  ├── Weak ref to a sentinel held by MemoryPressure          │
//! │  ├── Sentinel cleared → de-register, trigger()              │
//! │  └── Re-armed when a native scope exits                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ trigger()
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  GcCoordinator                                              │
//! │  ├── Idle → Scheduled (CAS), coalesces concurrent triggers  │
//! │  ├── Dedicated worker thread runs one pass at a time        │
//! │  └── Publishes PassStats via watch channel                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ExclusiveLock (RAII)                                       │
//! │  ├── Held for the whole pass and for native scopes          │
//! │  ├── Applies deferred frees on acquisition                  │
//! │  └── Released on every exit path                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Pass                                                       │
//! │  ├── NativeOps::run_reclamation_step()                      │
//! │  └── poll_reclaimed() until None → HandleRegistry::remove   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod coordinator;
mod deferred_free;
mod exclusive_lock;
mod external_memory;
mod pressure;

pub use coordinator::{GcCoordinator, GcTrigger, PassState, PassStats};
pub use deferred_free::DeferredFreeQueue;
pub use exclusive_lock::{ExclusiveGuard, ExclusiveLock};
pub use external_memory::ExternalMemoryGuard;
pub use pressure::{MemoryPressure, PressureReaper, PressureSentinel};
