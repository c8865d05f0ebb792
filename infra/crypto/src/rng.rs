//! Process-wide secure randomness for IV generation.
//!
//! The global slot only holds a [`Weak`] reference; engines keep the source alive through
//! their own [`Arc`]. Once the last engine is destroyed or dropped the source is torn down,
//! and the next engine to ask for it creates a fresh one.

use crate::error::CryptoError;
use parking_lot::{Mutex, const_mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

static SHARED: Mutex<Weak<SecureRandom>> = const_mutex(Weak::new());
static GENERATION: AtomicU64 = AtomicU64::new(0);

/// Thread-safe handle to the operating system CSPRNG.
#[derive(Debug)]
pub struct SecureRandom {
    generation: u64,
    fills: AtomicU64,
}

impl SecureRandom {
    /// Returns the live process-wide source, creating it if none exists.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        let mut slot = SHARED.lock();
        if let Some(live) = slot.upgrade() {
            return live;
        }

        let generation = GENERATION.fetch_add(1, Ordering::Relaxed) + 1;
        let fresh = Arc::new(Self { generation, fills: AtomicU64::new(0) });
        *slot = Arc::downgrade(&fresh);
        debug!(generation, "Secure random source created");
        fresh
    }

    /// Returns `true` while at least one holder keeps the shared source alive.
    #[must_use]
    pub fn is_live() -> bool {
        SHARED.lock().strong_count() > 0
    }

    /// Fills `buf` with random bytes.
    ///
    /// # Errors
    /// Returns [`CryptoError::Engine`] if the system RNG is unavailable.
    pub fn fill(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::fill(buf).map_err(|e| CryptoError::Engine {
            message: format!("System RNG unavailable: {e}").into(),
            context: Some("IV generation".into()),
        })?;
        self.fills.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Number of successful fills served by this source.
    #[must_use]
    pub fn fills(&self) -> u64 {
        self.fills.load(Ordering::Relaxed)
    }

    /// Sequence number of this source; increments each time the source is recreated.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}
