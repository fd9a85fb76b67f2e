//! Logical frames for asynchronous operations.
//!
//! [`LogicalFuture`] is what an instrumented `async fn` looks like from the
//! diagnostic stack's point of view:
//!
//! ```text
//! Created --first poll: fork context, push "async <label>"--> Running
//! Running --poll, inner pending--> Running   (context carried across the suspension)
//! Running --inner ready: pop--> Completed
//! Running --dropped: pop--> (cancelled)
//! ```
//!
//! The frame is pushed at most once and popped at most once per future.

use core::{
    future::Future,
    mem::ManuallyDrop,
    pin::Pin,
    task::{self, Poll},
};

use logical_stack_internals::Context;

use crate::{CallSite, DiagnosticStack, Label};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Created,
    Running,
    Completed,
}

/// A future that holds an `async` frame on the diagnostic stack while it
/// runs.
///
/// Created by [`InstrumentExt`]. The future runs in its own fork of the
/// poller's context, so its frame (and anything pushed inside it) is
/// invisible to the code awaiting it, and survives suspension and
/// resumption on a different worker thread.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct LogicalFuture<F> {
    inner: ManuallyDrop<F>,
    label: Label,
    state: State,
    context: Context,
}

impl<F> LogicalFuture<F> {
    fn new(inner: F, label: Label) -> Self {
        Self {
            inner: ManuallyDrop::new(inner),
            label: label.asynchronous(),
            state: State::Created,
            context: Context::empty(),
        }
    }

    /// The frame label this future pushes, including the `async ` marker.
    pub fn label(&self) -> &Label {
        &self.label
    }
}

impl<F: Future> Future for LogicalFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        // SAFETY: `inner` is structurally pinned; it is never moved and is
        // only dropped in place by `Drop`. The other fields are not pinned.
        let this = unsafe { self.get_unchecked_mut() };
        match this.state {
            State::Created => this.context = Context::current(),
            State::Running => {}
            State::Completed => panic!("`LogicalFuture` polled after completion"),
        }

        let state = &mut this.state;
        let label = &this.label;
        let inner = &mut this.inner;
        this.context.run(|| {
            if *state == State::Created {
                DiagnosticStack::push(label);
                *state = State::Running;
            }

            // SAFETY: `inner` is pinned whenever `self` is, see above.
            let poll = unsafe { Pin::new_unchecked(&mut **inner) }.poll(cx);
            if poll.is_ready() {
                *state = State::Completed;
                if let Err(error) = DiagnosticStack::pop() {
                    tracing::error!(target: "logical_stack", %error, %label, "async frame already popped");
                    panic!("async frame `{label}` completed without an open frame: {error}");
                }
            }
            poll
        })
    }
}

impl<F> Drop for LogicalFuture<F> {
    fn drop(&mut self) {
        let state = &mut self.state;
        let label = &self.label;
        let inner = &mut self.inner;
        self.context.run(|| {
            // SAFETY: `inner` is dropped exactly once, here, and never
            // accessed afterwards.
            unsafe { ManuallyDrop::drop(inner) };
            if *state == State::Running {
                *state = State::Completed;
                tracing::trace!(target: "logical_stack", %label, "async frame cancelled");
                if let Err(error) = DiagnosticStack::pop() {
                    tracing::error!(target: "logical_stack", %error, %label, "async frame already popped");
                }
            }
        });
    }
}

/// Extension trait for giving a future its own `async` frame.
///
/// # Examples
///
/// ```
/// use logical_stack::{DiagnosticStack, InstrumentExt};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let frames = async {
///     tokio::task::yield_now().await;
///     DiagnosticStack::current().iter().map(|l| l.to_string()).collect::<Vec<_>>()
/// }
/// .in_logical_scope("Worker.run()")
/// .await;
///
/// assert_eq!(frames, ["async Worker.run()"]);
/// assert!(DiagnosticStack::is_empty());
/// # });
/// ```
pub trait InstrumentExt: Future + Sized {
    /// Pushes `async <label>` for as long as the future runs.
    fn in_logical_scope(self, label: impl Into<Label>) -> LogicalFuture<Self> {
        LogicalFuture::new(self, label.into())
    }

    /// Like [`in_logical_scope`](Self::in_logical_scope) with the memoized
    /// label of a call site.
    fn in_call_site(self, site: &'static CallSite) -> LogicalFuture<Self> {
        LogicalFuture::new(self, site.async_label().clone())
    }
}

impl<F: Future> InstrumentExt for F {}
