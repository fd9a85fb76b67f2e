//! The process-wide diagnostic stack.
//!
//! [`DiagnosticStack`] is one async-local [`LocalStack`] of [`Label`]s. It
//! looks like global state but every logical operation sees only the frames
//! of its own ancestry: concurrently running operations each have their own
//! view, and a future forked with [`propagate`](crate::PropagateExt) starts
//! from the frames that were open at the fork.

use core::{fmt, iter::FusedIterator};

use logical_stack_internals::{EmptyStackError, LocalStack, Stack, stack};

use crate::{
    Label,
    config::EnvOptions,
    hooks::{logical_stack::LogicalStackCollector, report_creation},
};

/// Indentation in front of every frame when a stack is rendered.
pub const FRAME_INDENT: &str = "   ";

static STACK: spin::Lazy<LocalStack<Label>> = spin::Lazy::new(LocalStack::new);

static HOOK: spin::Once = spin::Once::new();

/// A snapshot of the logical stack, most recent frame first.
///
/// Rendering it with [`Display`](fmt::Display) produces one indented line
/// per frame:
///
/// ```text
///    async Program.DoWorkAsync()
///    Program.Main()
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LogicalStack(Stack<Label>);

impl LogicalStack {
    /// Builds a snapshot from labels listed most recent first.
    pub fn from_labels<I>(labels: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Label>,
    {
        let labels: alloc::vec::Vec<Label> = labels.into_iter().map(Into::into).collect();
        Self(labels.into_iter().rev().collect())
    }

    /// Returns `true` if no frame was open.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of open frames.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the frames, most recent first.
    pub fn iter(&self) -> Frames<'_> {
        Frames(self.0.iter())
    }

    /// The underlying immutable stack.
    pub fn as_stack(&self) -> &Stack<Label> {
        &self.0
    }
}

impl fmt::Display for LogicalStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in self.iter() {
            writeln!(f, "{FRAME_INDENT}{label}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for LogicalStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<'a> IntoIterator for &'a LogicalStack {
    type Item = &'a Label;
    type IntoIter = Frames<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the frames of a [`LogicalStack`].
#[derive(Clone)]
pub struct Frames<'a>(stack::Iter<'a, Label>);

impl<'a> Iterator for Frames<'a> {
    type Item = &'a Label;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for Frames<'_> {}

impl FusedIterator for Frames<'_> {}

/// The async-aware diagnostic stack.
///
/// All operations act on the ambient stack of the calling logical
/// operation. The first call to any of them registers a
/// [`LogicalStackCollector`] so that every [`Report`](crate::Report)
/// created afterwards records the stack that was ambient when it was raised.
///
/// # Examples
///
/// ```
/// use logical_stack::DiagnosticStack;
///
/// let _request = DiagnosticStack::enter("Server.handle(Request req)");
/// {
///     let _lookup = DiagnosticStack::enter("Users.find(u64 id)");
///     let frames: Vec<_> = DiagnosticStack::current().iter().map(|l| l.to_string()).collect();
///     assert_eq!(frames, ["Users.find(u64 id)", "Server.handle(Request req)"]);
/// }
/// assert_eq!(DiagnosticStack::depth(), 1);
/// ```
#[derive(Copy, Clone, Debug)]
pub struct DiagnosticStack;

impl DiagnosticStack {
    fn stack() -> &'static LocalStack<Label> {
        Self::install_hook();
        &STACK
    }

    /// Registers the [`LogicalStackCollector`] if it has not been registered
    /// yet and `LOGICAL_STACK=manual` is not set.
    ///
    /// Runs at most once per process; every facade operation calls it.
    pub fn install_hook() {
        HOOK.call_once(|| {
            if EnvOptions::get().manual_hook {
                tracing::debug!(
                    target: "logical_stack",
                    "LOGICAL_STACK=manual, not installing the logical stack hook"
                );
            } else {
                report_creation::register_report_creation_hook(LogicalStackCollector::new());
            }
        });
    }

    /// Pushes `label` onto the ambient stack.
    ///
    /// Prefer [`enter`](Self::enter), which cannot forget the matching pop.
    pub fn push(label: impl Into<Label>) {
        let label = label.into();
        tracing::trace!(target: "logical_stack", %label, "push");
        Self::stack().push(label);
    }

    /// Pops the top frame off the ambient stack.
    ///
    /// Fails with [`EmptyStackError`] if no frame is open, which means a pop
    /// without a matching push. Other logical operations are unaffected
    /// either way.
    pub fn pop() -> Result<Label, EmptyStackError> {
        let label = Self::stack().pop()?;
        tracing::trace!(target: "logical_stack", %label, "pop");
        Ok(label)
    }

    /// Returns a snapshot of the ambient stack.
    pub fn current() -> LogicalStack {
        LogicalStack(Self::stack().snapshot())
    }

    /// Like [`current`](Self::current) but never panics and never installs
    /// the hook. Used from report creation.
    pub(crate) fn try_current() -> Option<LogicalStack> {
        STACK.try_snapshot().map(LogicalStack)
    }

    /// Returns `true` if no frame is open.
    pub fn is_empty() -> bool {
        Self::stack().is_empty()
    }

    /// Number of open frames.
    pub fn depth() -> usize {
        Self::stack().snapshot().len()
    }

    /// Closes every open frame of the ambient stack.
    pub fn clear() {
        Self::stack().clear();
    }

    /// Pushes `label` and returns a guard that pops it again.
    ///
    /// The guard belongs to the logical operation that entered it. Holding
    /// it across an `.await` is only sound inside a future that carries its
    /// own context: one run by [`task::spawn`](crate::task::spawn), wrapped
    /// with [`propagate`](crate::PropagateExt::propagate), or instrumented
    /// with [`in_logical_scope`](crate::InstrumentExt::in_logical_scope).
    /// A future spawned directly on an executor shares the worker thread's
    /// stack with every other such future, so its frames show up in theirs
    /// for as long as it is suspended.
    pub fn enter(label: impl Into<Label>) -> ScopeGuard {
        let label = label.into();
        tracing::trace!(target: "logical_stack", %label, "push");
        ScopeGuard {
            pushed: Some(Self::stack().push_tracked(label)),
        }
    }
}

/// Why a [`ScopeGuard`] could not pop its frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeExitError {
    /// No frame was open at all.
    Empty(EmptyStackError),
    /// Another frame is on top of the ambient stack. It was left in place.
    NotOnTop {
        /// The frame the guard pushed.
        expected: Label,
        /// The frame found on top instead.
        found: Label,
    },
}

impl fmt::Display for ScopeExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty(error) => fmt::Display::fmt(error, f),
            Self::NotOnTop { expected, found } => {
                write!(f, "expected `{expected}` on top of the stack, found `{found}`")
            }
        }
    }
}

impl core::error::Error for ScopeExitError {}

/// Pops the frame pushed by [`DiagnosticStack::enter`] when dropped.
///
/// The frame is popped exactly once: [`dispose`](Self::dispose) may be
/// called explicitly, and later calls as well as the drop are no-ops.
///
/// The guard remembers the exact frame it pushed and only ever pops that
/// frame. If the top of the ambient stack is a different frame, because
/// the guard moved to another logical operation or guards were released
/// out of order, the stack is left alone and the mismatch is logged.
///
/// The guard is `Send` so that futures holding one across an `.await` can
/// be spawned on a multi-threaded runtime; see
/// [`DiagnosticStack::enter`] for which futures may do that.
#[must_use = "the frame is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard {
    pushed: Option<Stack<Label>>,
}

impl ScopeGuard {
    /// Pops the frame if it has not been popped yet.
    ///
    /// Fails without touching the stack if the frame is not on top of the
    /// ambient stack. A failed guard does not retry.
    pub fn dispose(&mut self) -> Result<(), ScopeExitError> {
        let Some(pushed) = self.pushed.take() else {
            return Ok(());
        };
        match DiagnosticStack::stack().pop_exact(&pushed) {
            Ok(()) => {
                if let Ok(label) = pushed.peek() {
                    tracing::trace!(target: "logical_stack", %label, "pop");
                }
                Ok(())
            }
            Err(found) => match (pushed.peek(), found.peek()) {
                (Ok(expected), Ok(found)) => Err(ScopeExitError::NotOnTop {
                    expected: expected.clone(),
                    found: found.clone(),
                }),
                (_, Err(error)) | (Err(error), _) => Err(ScopeExitError::Empty(error)),
            },
        }
    }

    /// Returns `true` until the frame has been popped.
    pub fn is_active(&self) -> bool {
        self.pushed.is_some()
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        match self.dispose() {
            Ok(()) => {}
            Err(error @ ScopeExitError::NotOnTop { .. }) => {
                tracing::error!(target: "logical_stack", %error, "scope exited out of order, frame left in place");
            }
            Err(error @ ScopeExitError::Empty(_)) => {
                tracing::error!(target: "logical_stack", %error, "scope exited without an open frame");
                if !std::thread::panicking() {
                    panic!("logical stack scope exited without an open frame: {error}");
                }
            }
        }
    }
}
