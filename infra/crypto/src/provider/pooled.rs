use crate::engine::CryptoEngine;
use crate::error::CryptoError;
use crate::key::SecretKey;
use crate::pool::{CipherPool, EngineCipherFactory, PoolConfig, PoolError, PoolStats};
use crate::provider::{CryptoProvider, ProviderCore};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Provider that borrows a cipher from a [`CipherPool`] for every operation.
///
/// The cipher always goes back to the pool, whether the operation succeeded or not.
pub struct PooledProvider<E: CryptoEngine> {
    core: ProviderCore<E>,
    pool: CipherPool<EngineCipherFactory<E>>,
}

impl<E: CryptoEngine> PooledProvider<E> {
    pub(crate) fn new(
        engine: Arc<E>,
        key: SecretKey,
        config: PoolConfig,
        destroy_engine: bool,
    ) -> Result<Self, CryptoError> {
        let pool = CipherPool::new(EngineCipherFactory::new(Arc::clone(&engine)), config)
            .map_err(from_pool_error)?;
        Ok(Self { core: ProviderCore::new(engine, key, destroy_engine), pool })
    }

    pub(crate) fn engine(&self) -> &Arc<E> {
        self.core.engine()
    }

    pub(crate) fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    fn run<T>(
        &self,
        op: impl FnOnce(&E, &SecretKey, &mut E::Cipher) -> Result<T, CryptoError>,
    ) -> Result<T, CryptoError> {
        self.core.with_key(|engine, key| {
            let mut lease = self.pool.borrow().map_err(from_pool_error)?;
            let outcome = op(engine, key, &mut *lease);
            settle(outcome, lease.release())
        })
    }
}

/// Combines an operation outcome with the outcome of returning its cipher.
fn settle<T>(
    outcome: Result<T, CryptoError>,
    returned: Result<(), PoolError>,
) -> Result<T, CryptoError> {
    match (outcome, returned) {
        (outcome, Ok(())) => outcome,
        (Ok(_), Err(e)) => Err(from_pool_error(e)),
        (Err(primary), Err(e)) => {
            let secondary = from_pool_error(e);
            warn!(
                primary = primary.variant_name(),
                suppressed = %secondary,
                "Cipher return failed after operation error"
            );
            Err(primary.with_suppressed(secondary))
        },
    }
}

fn from_pool_error(err: PoolError) -> CryptoError {
    match err {
        PoolError::Exhausted { message, context } => CryptoError::PoolExhausted { message, context },
        PoolError::Closed { context } => {
            CryptoError::State { message: "Cipher pool is closed".into(), context }
        },
        PoolError::Factory { source, .. } => source,
        PoolError::InvalidConfig { message, context } => {
            CryptoError::Configuration { message, context }
        },
        PoolError::Spawn { source, .. } => CryptoError::Engine {
            message: format!("Failed to start pool evictor: {source}").into(),
            context: None,
        },
    }
}

impl<E: CryptoEngine> CryptoProvider for PooledProvider<E> {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.run(|engine, key, cipher| engine.encrypt(plaintext, key, cipher))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        self.run(|engine, key, cipher| engine.decrypt(ciphertext, key, cipher))
    }

    fn destroy(&self) -> Result<(), CryptoError> {
        let destroyed = self.core.destroy();
        // In-flight operations have drained by now, so nothing is on loan.
        self.pool.close();
        if matches!(destroyed, Ok(true)) {
            info!(strategy = "pooled", stats = ?self.pool.stats(), "Crypto provider destroyed");
        }
        destroyed.map(|_| ())
    }

    fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }
}

impl<E: CryptoEngine> fmt::Debug for PooledProvider<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledProvider").field("core", &self.core).field("pool", &self.pool).finish()
    }
}
