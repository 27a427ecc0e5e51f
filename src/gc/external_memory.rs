//! External memory tracking for pressure detection.

use std::sync::Arc;

use super::pressure::MemoryPressure;

/// RAII guard that reports native memory to a [`MemoryPressure`] signal.
///
/// When created, adds the amount to the tracked total.
/// When dropped, subtracts it.
///
/// # Example
///
/// ```ignore
/// struct NativeBuffer {
///     id: NativeId,
///     _guard: ExternalMemoryGuard,
/// }
///
/// let buffer = NativeBuffer {
///     id,
///     _guard: bridge.track_external_memory(4096),
/// };
/// ```
pub struct ExternalMemoryGuard {
    pressure: Arc<MemoryPressure>,
    amount: i64,
}

impl ExternalMemoryGuard {
    /// Create a guard tracking `amount` bytes.
    pub fn new(pressure: Arc<MemoryPressure>, amount: i64) -> Self {
        pressure.adjust(amount);
        Self { pressure, amount }
    }

    /// Create a guard with zero initial amount.
    pub fn empty(pressure: Arc<MemoryPressure>) -> Self {
        Self {
            pressure,
            amount: 0,
        }
    }

    /// Adjust the tracked amount by `delta` bytes.
    pub fn adjust(&mut self, delta: i64) {
        if delta != 0 {
            self.amount = self.amount.saturating_add(delta);
            self.pressure.adjust(delta);
        }
    }

    /// Set the tracked amount to a new value.
    pub fn set(&mut self, new_amount: i64) {
        self.adjust(new_amount.saturating_sub(self.amount));
    }

    /// Get the currently tracked amount.
    pub fn amount(&self) -> i64 {
        self.amount
    }
}

impl Drop for ExternalMemoryGuard {
    fn drop(&mut self) {
        if self.amount != 0 {
            self.pressure.adjust(self.amount.saturating_neg());
        }
    }
}

impl std::fmt::Debug for ExternalMemoryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalMemoryGuard")
            .field("amount", &self.amount)
            .finish()
    }
}
