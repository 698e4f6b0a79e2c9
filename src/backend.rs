use std::sync::Arc;

/// Capability trait for the non-blocking lock primitive backing a registry.
///
/// Each cooperative runtime gets one implementation, and a
/// [`LockRegistry`](crate::LockRegistry) is typed to exactly one of them.
/// Locks of different backends never share a key, even if the key strings
/// are equal.
pub trait TryLock: Send + Sync + 'static {
    /// The lock primitive stored per key.
    type Lock: Send + Sync + 'static;
    /// RAII guard releasing the lock on drop.
    type Guard: Send;

    /// Creates a fresh, unheld lock.
    fn new_lock() -> Self::Lock;

    /// Attempts to acquire the lock without waiting.
    ///
    /// Returns `None` if the lock is currently held.
    fn try_lock(lock: &Arc<Self::Lock>) -> Option<Self::Guard>;
}

/// Backend for code running under the tokio runtime.
#[cfg(feature = "tokio")]
pub struct TokioBackend;

#[cfg(feature = "tokio")]
impl TryLock for TokioBackend {
    type Lock = tokio::sync::Mutex<()>;
    type Guard = tokio::sync::OwnedMutexGuard<()>;

    fn new_lock() -> Self::Lock {
        tokio::sync::Mutex::new(())
    }

    fn try_lock(lock: &Arc<Self::Lock>) -> Option<Self::Guard> {
        Arc::clone(lock).try_lock_owned().ok()
    }
}

/// Runtime-agnostic backend built on `async-lock`; works under smol,
/// async-std, or any other executor.
#[cfg(feature = "async-lock")]
pub struct AsyncLockBackend;

#[cfg(feature = "async-lock")]
impl TryLock for AsyncLockBackend {
    type Lock = async_lock::Mutex<()>;
    type Guard = async_lock::MutexGuardArc<()>;

    fn new_lock() -> Self::Lock {
        async_lock::Mutex::new(())
    }

    fn try_lock(lock: &Arc<Self::Lock>) -> Option<Self::Guard> {
        lock.try_lock_arc()
    }
}
