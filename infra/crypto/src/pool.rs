//! Bounded pool of cipher instances.
//!
//! * `max_idle` caps the number of ciphers kept around between operations; extra returns
//!   are dropped.
//! * `max_total`, when set, caps live ciphers (idle + borrowed). Borrowers then wait up to
//!   `borrow_timeout` before failing with [`PoolError::Exhausted`].
//! * `idle_timeout` entries are evicted by [`CipherPool::evict_idle`], which a background
//!   thread runs every `eviction_interval` when one is configured.
//!
//! Idle ciphers are handed out most-recently-returned first.

use crate::engine::CryptoEngine;
use crate::error::CryptoError;
use parking_lot::{Condvar, Mutex};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub const DEFAULT_MAX_IDLE: usize = 8;
pub const DEFAULT_BORROW_TIMEOUT: Duration = Duration::from_secs(5);

/// Failures reported by [`CipherPool`].
#[confcrypt_derive::confcrypt_error]
pub enum PoolError {
    /// No cipher became available before the borrow deadline.
    #[error("Cipher pool exhausted{}: {message}", format_context(.context))]
    Exhausted { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The pool has been closed.
    #[error("Cipher pool closed{}", format_context(.context))]
    Closed { context: Option<Cow<'static, str>> },

    /// The factory failed to create a cipher.
    #[error("Cipher creation failed{}: {source}", format_context(.context))]
    Factory { source: CryptoError, context: Option<Cow<'static, str>> },

    /// The pool configuration is unusable.
    #[error("Invalid pool configuration{}: {message}", format_context(.context))]
    InvalidConfig { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The eviction thread could not be started.
    #[error("Failed to start pool evictor{}: {source}", format_context(.context))]
    Spawn { source: std::io::Error, context: Option<Cow<'static, str>> },
}

/// Creates ciphers on demand for a [`CipherPool`].
pub trait CipherFactory: Send + Sync + 'static {
    type Cipher: Send + 'static;

    /// # Errors
    /// Returns the underlying [`CryptoError`] when a cipher cannot be created.
    fn create(&self) -> Result<Self::Cipher, CryptoError>;
}

/// Factory bound to one engine.
#[derive(Debug)]
pub struct EngineCipherFactory<E: CryptoEngine> {
    engine: Arc<E>,
}

impl<E: CryptoEngine> EngineCipherFactory<E> {
    #[must_use]
    pub const fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }
}

impl<E: CryptoEngine> CipherFactory for EngineCipherFactory<E> {
    type Cipher = E::Cipher;

    fn create(&self) -> Result<E::Cipher, CryptoError> {
        self.engine.create_cipher()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_idle: usize,
    pub max_total: Option<usize>,
    pub idle_timeout: Option<Duration>,
    pub borrow_timeout: Duration,
    pub eviction_interval: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: DEFAULT_MAX_IDLE,
            max_total: None,
            idle_timeout: None,
            borrow_timeout: DEFAULT_BORROW_TIMEOUT,
            eviction_interval: None,
        }
    }
}

impl PoolConfig {
    /// # Errors
    /// Returns [`PoolError::InvalidConfig`] for a zero live cap or a zero eviction interval.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_total == Some(0) {
            return Err(PoolError::InvalidConfig {
                message: "max_total must be greater than zero".into(),
                context: None,
            });
        }
        if self.eviction_interval.is_some_and(|i| i.is_zero()) {
            return Err(PoolError::InvalidConfig {
                message: "eviction_interval must be greater than zero".into(),
                context: None,
            });
        }
        Ok(())
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Ciphers waiting in the pool.
    pub idle: usize,
    /// Ciphers currently borrowed.
    pub active: usize,
    /// Ciphers created by the factory since the pool was built.
    pub created: u64,
    /// Ciphers dropped by idle eviction, overflow on return, or close.
    pub evicted: u64,
    /// Successful borrows.
    pub borrowed: u64,
}

struct IdleEntry<T> {
    cipher: T,
    returned_at: Instant,
}

struct PoolState<T> {
    idle: VecDeque<IdleEntry<T>>,
    active: usize,
    closed: bool,
}

struct Shared<F: CipherFactory> {
    factory: F,
    config: PoolConfig,
    state: Mutex<PoolState<F::Cipher>>,
    available: Condvar,
    created: AtomicU64,
    evicted: AtomicU64,
    borrowed: AtomicU64,
}

impl<F: CipherFactory> Shared<F> {
    fn give_back(&self, cipher: F::Cipher) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        state.active -= 1;

        if state.closed {
            drop(state);
            drop(cipher);
            self.evicted.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::Closed { context: Some("returning cipher".into()) });
        }

        if state.idle.len() >= self.config.max_idle {
            drop(state);
            drop(cipher);
            self.evicted.fetch_add(1, Ordering::Relaxed);
            self.available.notify_one();
            return Ok(());
        }

        state.idle.push_back(IdleEntry { cipher, returned_at: Instant::now() });
        drop(state);
        self.available.notify_one();
        trace!("Cipher returned to pool");
        Ok(())
    }

    fn evict_idle(&self) -> usize {
        let mut state = self.state.lock();
        let before = state.idle.len();

        if let Some(timeout) = self.config.idle_timeout {
            let now = Instant::now();
            state.idle.retain(|entry| now.duration_since(entry.returned_at) < timeout);
        }
        while state.idle.len() > self.config.max_idle {
            state.idle.pop_front();
        }

        let evicted = before - state.idle.len();
        drop(state);

        if evicted > 0 {
            self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, "Evicted idle ciphers");
        }
        evicted
    }
}

/// Concurrency-safe pool of ciphers created on demand by a [`CipherFactory`].
pub struct CipherPool<F: CipherFactory> {
    shared: Arc<Shared<F>>,
    evictor: Mutex<Option<JoinHandle<()>>>,
}

impl<F: CipherFactory> CipherPool<F> {
    /// Creates an empty pool and, if `eviction_interval` is set, starts its evictor thread.
    ///
    /// # Errors
    /// * [`PoolError::InvalidConfig`] if `config` fails validation.
    /// * [`PoolError::Spawn`] if the evictor thread cannot be started.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            factory,
            config,
            state: Mutex::new(PoolState { idle: VecDeque::new(), active: 0, closed: false }),
            available: Condvar::new(),
            created: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            borrowed: AtomicU64::new(0),
        });

        let evictor = match config.eviction_interval {
            Some(interval) => Some(spawn_evictor(Arc::downgrade(&shared), interval)?),
            None => None,
        };

        Ok(Self { shared, evictor: Mutex::new(evictor) })
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Borrows a cipher, creating one when none is idle and the live cap allows it.
    ///
    /// Blocks for at most `borrow_timeout` when the pool is at its live cap.
    ///
    /// # Errors
    /// * [`PoolError::Closed`] if the pool is, or becomes, closed while waiting.
    /// * [`PoolError::Exhausted`] if no cipher became available in time.
    /// * [`PoolError::Factory`] if creating a new cipher failed.
    pub fn borrow(&self) -> Result<Lease<'_, F>, PoolError> {
        let deadline = Instant::now() + self.shared.config.borrow_timeout;
        let mut state = self.shared.state.lock();

        loop {
            if state.closed {
                return Err(PoolError::Closed { context: Some("borrowing cipher".into()) });
            }

            if let Some(entry) = state.idle.pop_back() {
                state.active += 1;
                drop(state);
                return Ok(self.lease(entry.cipher));
            }

            if self.shared.config.max_total.is_none_or(|max| state.active < max) {
                state.active += 1;
                drop(state);
                return self.create();
            }

            if Instant::now() >= deadline {
                return Err(PoolError::Exhausted {
                    message: format!(
                        "all {} ciphers busy after {:?}",
                        state.active, self.shared.config.borrow_timeout
                    )
                    .into(),
                    context: None,
                });
            }

            trace!("Waiting for a pooled cipher");
            self.shared.available.wait_until(&mut state, deadline);
        }
    }

    fn create(&self) -> Result<Lease<'_, F>, PoolError> {
        match self.shared.factory.create() {
            Ok(cipher) => {
                self.shared.created.fetch_add(1, Ordering::Relaxed);
                Ok(self.lease(cipher))
            },
            Err(source) => {
                self.shared.state.lock().active -= 1;
                self.shared.available.notify_one();
                Err(PoolError::Factory { source, context: Some("creating pooled cipher".into()) })
            },
        }
    }

    fn lease(&self, cipher: F::Cipher) -> Lease<'_, F> {
        self.shared.borrowed.fetch_add(1, Ordering::Relaxed);
        trace!("Cipher borrowed from pool");
        Lease { shared: &self.shared, cipher: Some(cipher) }
    }

    /// Drops idle ciphers older than `idle_timeout` and trims the idle set to `max_idle`.
    ///
    /// Returns the number of ciphers evicted.
    pub fn evict_idle(&self) -> usize {
        self.shared.evict_idle()
    }

    /// Closes the pool: drops idle ciphers, wakes waiting borrowers and stops the evictor.
    ///
    /// Ciphers still on loan are dropped when they come back. Closing twice is a no-op.
    pub fn close(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.shared.available.notify_all();

        let count = drained.len();
        drop(drained);
        self.shared.evicted.fetch_add(count as u64, Ordering::Relaxed);

        if let Some(handle) = self.evictor.lock().take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                debug!("Pool evictor thread panicked");
            }
        }
        debug!(drained = count, "Cipher pool closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            idle: state.idle.len(),
            active: state.active,
            created: self.shared.created.load(Ordering::Relaxed),
            evicted: self.shared.evicted.load(Ordering::Relaxed),
            borrowed: self.shared.borrowed.load(Ordering::Relaxed),
        }
    }
}

impl<F: CipherFactory> Drop for CipherPool<F> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<F: CipherFactory> fmt::Debug for CipherPool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherPool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn spawn_evictor<F: CipherFactory>(
    shared: Weak<Shared<F>>,
    interval: Duration,
) -> Result<JoinHandle<()>, PoolError> {
    thread::Builder::new()
        .name("confcrypt-pool-evictor".into())
        .spawn(move || {
            loop {
                thread::park_timeout(interval);
                let Some(shared) = shared.upgrade() else { break };
                if shared.state.lock().closed {
                    break;
                }
                shared.evict_idle();
            }
        })
        .map_err(|source| PoolError::Spawn { source, context: None })
}

/// A borrowed cipher. Returns itself to the pool when dropped.
///
/// Use [`Lease::release`] to observe the outcome of the return.
pub struct Lease<'a, F: CipherFactory> {
    shared: &'a Shared<F>,
    cipher: Option<F::Cipher>,
}

impl<F: CipherFactory> Lease<'_, F> {
    /// Returns the cipher to the pool.
    ///
    /// # Errors
    /// Returns [`PoolError::Closed`] if the pool was closed while the cipher was on loan;
    /// the cipher is dropped in that case.
    pub fn release(mut self) -> Result<(), PoolError> {
        match self.cipher.take() {
            Some(cipher) => self.shared.give_back(cipher),
            None => Ok(()),
        }
    }
}

impl<F: CipherFactory> Deref for Lease<'_, F> {
    type Target = F::Cipher;

    fn deref(&self) -> &F::Cipher {
        self.cipher.as_ref().unwrap_or_else(|| unreachable!("lease holds its cipher until release"))
    }
}

impl<F: CipherFactory> DerefMut for Lease<'_, F> {
    fn deref_mut(&mut self) -> &mut F::Cipher {
        self.cipher.as_mut().unwrap_or_else(|| unreachable!("lease holds its cipher until release"))
    }
}

impl<F: CipherFactory> Drop for Lease<'_, F> {
    fn drop(&mut self) {
        if let Some(cipher) = self.cipher.take() {
            if let Err(error) = self.shared.give_back(cipher) {
                debug!(%error, "Cipher dropped on return to closed pool");
            }
        }
    }
}

impl<F: CipherFactory> fmt::Debug for Lease<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("held", &self.cipher.is_some()).finish()
    }
}
