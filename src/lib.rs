//! Guard async functions with named non-blocking locks.
//!
//! The [`lock_or_skip`] attribute wraps an async function so that concurrent
//! calls sharing a key never overlap: the first call acquires the key's lock
//! and runs; any call arriving while the lock is held returns
//! [`Outcome::Skipped`] immediately instead of waiting. Keys are derived from
//! an optional template rendered against the call's arguments, or default to
//! the function's name.
//!
//! ```
//! use lock_or_skip::{lock_or_skip, Outcome};
//!
//! #[lock_or_skip("lock_work_{}")]
//! async fn workwork(x: u32) -> u32 {
//!     x * 2
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // Guarded by the lock named "lock_work_3".
//! assert_eq!(workwork(3).await, Outcome::Completed(6));
//! # }
//! ```
//!
//! Locks live in a [`LockRegistry`]: created lazily per key, shared by every
//! call that resolves the same key, and reclaimed once no in-flight call
//! references them. The wrapped functions of a process share one global
//! registry by default; pass `registry = <expr>` to the attribute to use an
//! isolated one. The registry can also be driven directly through
//! [`LockRegistry::run_or_skip`] without the attribute.
//!
//! The lock primitive is chosen per registry through the [`TryLock`] backend
//! trait: `tokio` locks by default, or runtime-agnostic `async-lock` locks
//! via the `async-lock` feature.

pub mod backend;
mod outcome;
mod registry;

pub use backend::TryLock;
pub use lock_or_skip_macros::lock_or_skip;
pub use outcome::Outcome;
pub use registry::LockRegistry;

#[cfg(not(any(feature = "tokio", feature = "async-lock")))]
compile_error!(
    "lock-or-skip needs a lock backend: enable the `tokio` (default) or `async-lock` feature"
);

/// Backend used by the process-global registry.
#[cfg(feature = "tokio")]
pub type DefaultBackend = backend::TokioBackend;

/// Backend used by the process-global registry.
#[cfg(all(feature = "async-lock", not(feature = "tokio")))]
pub type DefaultBackend = backend::AsyncLockBackend;

/// Returns the process-global lock registry.
///
/// This is the registry the [`lock_or_skip`] attribute uses unless given a
/// `registry = <expr>` argument. Keys are not namespaced per function: any
/// two wrapped functions whose resolved keys are equal contend on the same
/// lock here.
#[cfg(any(feature = "tokio", feature = "async-lock"))]
pub fn global() -> &'static LockRegistry<DefaultBackend> {
    static GLOBAL: std::sync::LazyLock<LockRegistry<DefaultBackend>> =
        std::sync::LazyLock::new(LockRegistry::new);
    &GLOBAL
}
