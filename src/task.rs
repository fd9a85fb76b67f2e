//! Task spawning that carries the logical stack into the new task,
//! mirroring [`tokio::task`].
//!
//! | Item | Tokio equivalent |
//! |---|---|
//! | [`spawn`] | [`tokio::task::spawn`] |
//! | [`spawn_blocking`] | [`tokio::task::spawn_blocking`] |
//!
//! The spawner's context is captured when the task is spawned. The task
//! starts from the frames that were open at that point and anything it
//! pushes afterwards stays inside it.

use core::future::Future;

use logical_stack_internals::{Context, PropagateExt};
use tokio::task::JoinHandle;

/// Spawns a task, equivalent to [`tokio::task::spawn`].
///
/// # Examples
///
/// ```
/// use logical_stack::{DiagnosticStack, task};
///
/// # tokio::runtime::Builder::new_multi_thread().build().unwrap().block_on(async {
/// let _scope = DiagnosticStack::enter("Server.run()");
/// let depth = task::spawn(async {
///     let _inner = DiagnosticStack::enter("Server.accept()");
///     DiagnosticStack::depth()
/// })
/// .await
/// .unwrap();
///
/// assert_eq!(depth, 2);
/// assert_eq!(DiagnosticStack::depth(), 1);
/// # });
/// ```
#[track_caller]
pub fn spawn<T, F>(future: F) -> JoinHandle<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    tokio::spawn(future.propagate())
}

/// Spawns a blocking task, equivalent to [`tokio::task::spawn_blocking`].
#[track_caller]
pub fn spawn_blocking<T, F>(f: F) -> JoinHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let mut context = Context::current();
    tokio::task::spawn_blocking(move || context.run(f))
}
