//! Carrying a [`Context`] across suspension points.

use core::{
    future::Future,
    mem::ManuallyDrop,
    pin::Pin,
    task::{self, Poll},
};

use crate::cell::{Context, Entered};

/// A future that runs inside its own ambient [`Context`].
///
/// The context is captured when the wrapper is created (the fork point),
/// swapped in before every poll of the inner future and swapped out again
/// afterwards, regardless of which worker thread does the polling. Writes
/// made while polling stay with this future and never reach the poller.
///
/// The inner future is also dropped inside the context, so scope guards it
/// holds across a suspension point unwind the right stack when the future
/// is cancelled.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Propagated<F> {
    inner: ManuallyDrop<F>,
    context: Context,
}

impl<F> Propagated<F> {
    /// Wraps `inner`, forking the ambient context of the caller.
    pub fn new(inner: F) -> Self {
        Self::with_context(inner, Context::current())
    }

    /// Wraps `inner` so that it runs in `context`.
    pub fn with_context(inner: F, context: Context) -> Self {
        Self {
            inner: ManuallyDrop::new(inner),
            context,
        }
    }

    /// The context the inner future will see on its next poll.
    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl<F: Future> Future for Propagated<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        // SAFETY: `inner` is structurally pinned. It is never moved out of
        // `self`; it is only dropped in place by `Drop`. The context is not
        // pinned and is only accessed by reference.
        let this = unsafe { self.get_unchecked_mut() };
        let _entered = Entered::new(&mut this.context);
        // SAFETY: see above, `this.inner` is pinned whenever `self` is.
        let inner = unsafe { Pin::new_unchecked(&mut *this.inner) };
        inner.poll(cx)
    }
}

impl<F> Drop for Propagated<F> {
    fn drop(&mut self) {
        let _entered = Entered::new(&mut self.context);
        // SAFETY: `inner` is dropped exactly once, here, and never accessed
        // afterwards.
        unsafe { ManuallyDrop::drop(&mut self.inner) };
    }
}

/// Extension trait for running a future in the caller's forked context.
pub trait PropagateExt: Future + Sized {
    /// Wraps `self` in [`Propagated`], capturing the ambient context now.
    ///
    /// Call this at the fork point, for example right before handing the
    /// future to an executor or to a join combinator.
    fn propagate(self) -> Propagated<Self> {
        Propagated::new(self)
    }

    /// Wraps `self` so that it runs in `context`.
    fn propagate_with(self, context: Context) -> Propagated<Self> {
        Propagated::with_context(self, context)
    }
}

impl<F: Future> PropagateExt for F {}

impl Context {
    /// Wraps `future` so that it runs in this context.
    pub fn propagate<F: Future>(self, future: F) -> Propagated<F> {
        Propagated::with_context(future, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::PropagatedCell;

    static_assertions::assert_impl_all!(Propagated<core::future::Ready<()>>: Send, Sync, Unpin);

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writes_inside_do_not_reach_poller() {
        let cell = std::sync::Arc::new(PropagatedCell::new(0u8));
        let inner = cell.clone();
        async move {
            inner.set(5);
            tokio::task::yield_now().await;
            assert_eq!(inner.get(), 5);
        }
        .propagate()
        .await;
        assert_eq!(cell.get(), 0);
    }

    #[test]
    fn test_inner_dropped_inside_context() {
        struct ReadOnDrop<'a>(&'a PropagatedCell<u8>, &'a core::cell::Cell<u8>);

        impl Drop for ReadOnDrop<'_> {
            fn drop(&mut self) {
                self.1.set(self.0.get());
            }
        }

        let cell = PropagatedCell::new(0u8);
        let seen = core::cell::Cell::new(0);
        let future = Context::isolate(|| {
            cell.set(3);
            let guard = ReadOnDrop(&cell, &seen);
            async move {
                let _guard = guard;
            }
            .propagate()
        });
        assert_eq!(cell.get(), 0);
        drop(future);
        assert_eq!(seen.get(), 3);
    }
}
