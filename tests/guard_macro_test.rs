use std::sync::{Arc, LazyLock};
use std::time::Duration;

use lock_or_skip::backend::TokioBackend;
use lock_or_skip::{lock_or_skip, LockRegistry, Outcome, TryLock};
use tokio::time::sleep;

/// Holds the lock for `key` until dropped, bypassing the guard path.
struct Held {
    _entry: Arc<<TokioBackend as TryLock>::Lock>,
    _guard: <TokioBackend as TryLock>::Guard,
}

fn hold(registry: &LockRegistry<TokioBackend>, key: &str) -> Held {
    let entry = registry.get_or_create(key);
    let guard = TokioBackend::try_lock(&entry).expect("key already held");
    Held {
        _entry: entry,
        _guard: guard,
    }
}

#[lock_or_skip]
async fn plain_task() -> u32 {
    7
}

#[tokio::test]
async fn default_key_is_function_name() {
    let held = hold(lock_or_skip::global(), "plain_task");
    assert_eq!(plain_task().await, Outcome::Skipped);

    drop(held);
    assert_eq!(plain_task().await, Outcome::Completed(7));
}

#[lock_or_skip("lock_work_{}")]
async fn workwork(x: u32) -> u32 {
    x * 2
}

#[tokio::test]
async fn positional_template_derives_key_from_argument() {
    let held = hold(lock_or_skip::global(), "lock_work_3");
    assert_eq!(workwork(3).await, Outcome::Skipped);

    // A different argument resolves to a different key.
    assert_eq!(workwork(4).await, Outcome::Completed(8));

    drop(held);
    assert_eq!(workwork(3).await, Outcome::Completed(6));
}

#[lock_or_skip("user_{id}_{action}")]
async fn user_task(id: u64, action: &str) -> String {
    format!("{action}:{id}")
}

#[tokio::test]
async fn named_placeholders_resolve_by_parameter_name() {
    let held = hold(lock_or_skip::global(), "user_7_sync");
    assert_eq!(user_task(7, "sync").await, Outcome::Skipped);
    assert_eq!(
        user_task(8, "sync").await,
        Outcome::Completed("sync:8".to_owned())
    );
    drop(held);
}

#[lock_or_skip("second_{1}")]
async fn indexed_task(_first: u32, second: u32) -> u32 {
    second
}

#[tokio::test]
async fn indexed_placeholder_picks_parameter_by_position() {
    let held = hold(lock_or_skip::global(), "second_9");
    assert_eq!(indexed_task(1, 9).await, Outcome::Skipped);
    assert_eq!(indexed_task(9, 1).await, Outcome::Completed(1));
    drop(held);
}

#[lock_or_skip("braced_{{literal}}_{}")]
async fn braced_task(x: u32) -> u32 {
    x
}

#[tokio::test]
async fn doubled_braces_are_literal() {
    let held = hold(lock_or_skip::global(), "braced_{literal}_5");
    assert_eq!(braced_task(5).await, Outcome::Skipped);
    drop(held);
    assert_eq!(braced_task(5).await, Outcome::Completed(5));
}

static ISOLATED: LazyLock<LockRegistry<TokioBackend>> = LazyLock::new(LockRegistry::new);

#[lock_or_skip("isolated_job", registry = &*ISOLATED)]
async fn isolated_task() -> &'static str {
    "ran"
}

#[tokio::test]
async fn registry_argument_isolates_contention() {
    // Holding the same key in the global registry must not interfere.
    let global_held = hold(lock_or_skip::global(), "isolated_job");
    assert_eq!(isolated_task().await, Outcome::Completed("ran"));

    let held = hold(&ISOLATED, "isolated_job");
    assert_eq!(isolated_task().await, Outcome::Skipped);

    drop(held);
    drop(global_held);
    assert_eq!(isolated_task().await, Outcome::Completed("ran"));
}

static SHARED: LazyLock<LockRegistry<TokioBackend>> = LazyLock::new(LockRegistry::new);

#[lock_or_skip("shared_key", registry = &*SHARED)]
async fn left_task() -> &'static str {
    sleep(Duration::from_millis(50)).await;
    "left"
}

#[lock_or_skip("shared_key", registry = &*SHARED)]
async fn right_task() -> &'static str {
    "right"
}

#[tokio::test]
async fn same_literal_key_contends_across_functions() {
    let left = tokio::spawn(left_task());
    sleep(Duration::from_millis(10)).await;

    // left_task is suspended mid-execution and still holds "shared_key".
    assert_eq!(right_task().await, Outcome::Skipped);

    assert_eq!(left.await.unwrap(), Outcome::Completed("left"));
    assert_eq!(right_task().await, Outcome::Completed("right"));
}

#[lock_or_skip]
async fn slow_then_value() -> u32 {
    sleep(Duration::from_millis(50)).await;
    42
}

#[tokio::test]
async fn second_caller_finishes_first_with_skip() {
    let first = tokio::spawn(slow_then_value());
    sleep(Duration::from_millis(10)).await;

    let second = slow_then_value().await;
    assert_eq!(second, Outcome::Skipped);

    assert_eq!(first.await.unwrap(), Outcome::Completed(42));
}

#[lock_or_skip]
async fn fallible_task(fail: bool) -> Result<u32, String> {
    if fail {
        return Err("boom".to_owned());
    }
    Ok(1)
}

#[tokio::test]
async fn failure_propagates_and_releases_the_lock() {
    let outcome = fallible_task(true).await;
    assert_eq!(outcome, Outcome::Completed(Err("boom".to_owned())));

    // The failing call released the lock, so the next call runs.
    let outcome = fallible_task(false).await;
    assert_eq!(outcome, Outcome::Completed(Ok(1)));
}

#[lock_or_skip("display_{}")]
async fn generic_task<T: std::fmt::Display>(value: T) -> String {
    value.to_string()
}

#[tokio::test]
async fn generic_parameters_render_into_the_key() {
    let held = hold(lock_or_skip::global(), "display_abc");
    assert_eq!(generic_task("abc").await, Outcome::Skipped);
    drop(held);
    assert_eq!(
        generic_task("abc").await,
        Outcome::Completed("abc".to_owned())
    );
}

#[lock_or_skip]
async fn unit_task() {}

#[tokio::test]
async fn unit_return_completes_with_unit() {
    assert_eq!(unit_task().await, Outcome::Completed(()));
}
