//! Ambient, continuation-following storage.
//!
//! The ambient [`Context`] is an immutable map from slot ids to values. The
//! context of the code that is currently running lives in a thread local;
//! propagating futures ([`Propagated`](crate::Propagated)) and
//! [`Context::run`] swap their own context in before running and swap it
//! back out afterwards. Because a context is never mutated in place, a
//! snapshot taken at a fork point keeps seeing the pre-fork values no matter
//! what either side writes afterwards.

use alloc::boxed::Box;
use core::{
    any::Any,
    cell::RefCell,
    fmt,
    marker::PhantomData,
    mem,
    sync::atomic::{AtomicU64, Ordering},
};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
use triomphe::Arc;

use crate::stack::{EmptyStackError, Stack};

std::thread_local! {
    static CURRENT: RefCell<Context> = const { RefCell::new(Context::empty()) };
}

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one [`PropagatedCell`] inside a [`Context`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct SlotId(u64);

impl SlotId {
    fn next() -> Self {
        Self(NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Object-safe clone for values stored in a context.
trait SlotValue: Any + Send + Sync {
    fn clone_boxed(&self) -> Box<dyn SlotValue>;
    fn as_any(&self) -> &dyn Any;
}

impl<V: Any + Clone + Send + Sync> SlotValue for V {
    fn clone_boxed(&self) -> Box<dyn SlotValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Clone for Box<dyn SlotValue> {
    fn clone(&self) -> Self {
        (**self).clone_boxed()
    }
}

type SlotMap = HashMap<SlotId, Box<dyn SlotValue>, FxBuildHasher>;

/// A snapshot of the ambient values of one logical operation.
///
/// Cloning is `O(1)`. Writing to a [`PropagatedCell`] replaces the current
/// context with a new one; existing [`Context`] values never change.
#[derive(Clone, Default)]
pub struct Context {
    slots: Option<Arc<SlotMap>>,
}

impl Context {
    /// The context with no values in it.
    #[must_use]
    pub const fn empty() -> Self {
        Self { slots: None }
    }

    /// Captures the ambient context of the calling thread.
    ///
    /// Returns the empty context if thread-local storage is not available,
    /// for example while the thread is being torn down.
    pub fn current() -> Self {
        CURRENT
            .try_with(|current| current.try_borrow().map(|c| c.clone()).ok())
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Returns `true` if no cell has a value in this context.
    pub fn is_empty(&self) -> bool {
        self.slots.as_ref().is_none_or(|slots| slots.is_empty())
    }

    /// Runs `f` with `self` as the ambient context.
    ///
    /// The previous ambient context is restored when `f` returns or
    /// unwinds. Writes made by `f` are kept in `self`, so a later `run` or
    /// poll continues where this one left off.
    pub fn run<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let _entered = Entered::new(self);
        f()
    }

    /// Runs `f` in a copy of the ambient context so that nothing `f` writes
    /// is visible to the caller afterwards.
    pub fn isolate<R>(f: impl FnOnce() -> R) -> R {
        Self::current().run(f)
    }

    fn get(&self, id: SlotId) -> Option<&dyn Any> {
        self.slots
            .as_ref()
            .and_then(|slots| slots.get(&id))
            .map(|value| (**value).as_any())
    }

    fn with_value(&self, id: SlotId, value: Option<Box<dyn SlotValue>>) -> Self {
        let mut slots = self
            .slots
            .as_deref()
            .cloned()
            .unwrap_or_else(|| SlotMap::with_hasher(FxBuildHasher));
        match value {
            Some(value) => {
                slots.insert(id, value);
            }
            None => {
                slots.remove(&id);
            }
        }
        Self {
            slots: (!slots.is_empty()).then(|| Arc::new(slots)),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("slots", &self.slots.as_ref().map_or(0, |s| s.len()))
            .finish()
    }
}

/// Swaps a context into the thread local for as long as it is alive.
///
/// On drop the two are swapped back, which leaves the entered context
/// holding whatever was written while it was ambient.
pub(crate) struct Entered<'a> {
    context: &'a mut Context,
}

impl<'a> Entered<'a> {
    pub(crate) fn new(context: &'a mut Context) -> Self {
        swap_current(context);
        Self { context }
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        swap_current(self.context);
    }
}

fn swap_current(context: &mut Context) {
    let _ = CURRENT.try_with(|current| {
        if let Ok(mut current) = current.try_borrow_mut() {
            mem::swap(&mut *current, context);
        }
    });
}

/// Async-local storage for one immutable value.
///
/// Reads return the value most recently written by the current logical
/// operation or one of its ancestors. Writes are visible to the writer and
/// to everything it forks afterwards, but never to operations that forked
/// before the write, nor to the caller of a propagating future.
///
/// `V` should be cheap to clone; the intended use is an immutable value such
/// as a [`Stack`].
///
/// # Examples
///
/// ```
/// use logical_stack_internals::{Context, PropagatedCell};
///
/// let cell = PropagatedCell::new(0u32);
/// cell.set(1);
///
/// let mut fork = Context::current();
/// cell.set(2);
///
/// assert_eq!(fork.run(|| cell.get()), 1);
/// assert_eq!(cell.get(), 2);
/// ```
pub struct PropagatedCell<V> {
    id: SlotId,
    empty: V,
    _value: PhantomData<fn() -> V>,
}

impl<V> PropagatedCell<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cell that reads as `empty` wherever it was never set.
    pub fn new(empty: V) -> Self {
        Self {
            id: SlotId::next(),
            empty,
            _value: PhantomData,
        }
    }

    /// Returns the ambient value, or the empty value if none was set on this
    /// chain.
    pub fn get(&self) -> V {
        self.try_get().unwrap_or_else(|| self.empty.clone())
    }

    /// Like [`get`](Self::get), but returns `None` instead of the empty
    /// value when the ambient context cannot be read.
    ///
    /// Never panics, which makes it safe to call from error reporting paths.
    pub fn try_get(&self) -> Option<V> {
        CURRENT
            .try_with(|current| {
                let current = current.try_borrow().ok()?;
                Some(
                    current
                        .get(self.id)
                        .and_then(|value| value.downcast_ref::<V>())
                        .cloned()
                        .unwrap_or_else(|| self.empty.clone()),
                )
            })
            .ok()
            .flatten()
    }

    /// Makes `value` the ambient value for the current logical operation and
    /// everything it forks from now on.
    pub fn set(&self, value: V) {
        self.replace(Some(Box::new(value)));
    }

    /// Removes this cell's value from the ambient context.
    ///
    /// Contexts captured earlier (for example by suspended futures) keep
    /// their copy until they are dropped.
    pub fn dispose(self) {
        self.replace(None);
    }

    fn replace(&self, value: Option<Box<dyn SlotValue>>) {
        let _ = CURRENT.try_with(|current| {
            if let Ok(mut current) = current.try_borrow_mut() {
                let next = current.with_value(self.id, value);
                *current = next;
            }
        });
    }
}

impl<V: fmt::Debug> fmt::Debug for PropagatedCell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropagatedCell")
            .field("id", &self.id.0)
            .field("empty", &self.empty)
            .finish()
    }
}

/// An async-local [`Stack`].
///
/// Every mutation reads the ambient stack, derives a new one, and writes it
/// back, so concurrent logical operations never observe each other's
/// pushes.
#[derive(Debug)]
pub struct LocalStack<T> {
    cell: PropagatedCell<Stack<T>>,
}

impl<T> LocalStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an async-local stack that is empty everywhere.
    pub fn new() -> Self {
        Self {
            cell: PropagatedCell::new(Stack::new()),
        }
    }

    /// Returns the ambient stack.
    pub fn snapshot(&self) -> Stack<T> {
        self.cell.get()
    }

    /// Returns the ambient stack, or `None` if it cannot be read.
    pub fn try_snapshot(&self) -> Option<Stack<T>> {
        self.cell.try_get()
    }

    /// Returns `true` if the ambient stack is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Pushes `value` onto the ambient stack.
    pub fn push(&self, value: T) {
        self.cell.set(self.snapshot().push(value));
    }

    /// Pushes `value` and returns the resulting ambient stack, which
    /// identifies the pushed entry for [`pop_exact`](Self::pop_exact).
    pub fn push_tracked(&self, value: T) -> Stack<T> {
        let pushed = self.snapshot().push(value);
        self.cell.set(pushed.clone());
        pushed
    }

    /// Pops the ambient stack only if its top entry is the one that
    /// produced `pushed`.
    ///
    /// Otherwise the ambient stack is left untouched and returned as the
    /// error.
    pub fn pop_exact(&self, pushed: &Stack<T>) -> Result<(), Stack<T>> {
        let current = self.snapshot();
        if !current.ptr_eq(pushed) {
            return Err(current);
        }
        match current.pop_discard() {
            Ok(rest) => {
                self.cell.set(rest);
                Ok(())
            }
            Err(EmptyStackError) => Err(current),
        }
    }

    /// Returns a clone of the value on top of the ambient stack.
    pub fn peek(&self) -> Result<T, EmptyStackError> {
        self.snapshot().peek().cloned()
    }

    /// Pops the ambient stack and returns the removed value.
    pub fn pop(&self) -> Result<T, EmptyStackError> {
        let (rest, value) = self.snapshot().pop()?;
        self.cell.set(rest);
        Ok(value)
    }

    /// Pops the ambient stack, discarding the removed value.
    pub fn pop_discard(&self) -> Result<(), EmptyStackError> {
        let rest = self.snapshot().pop_discard()?;
        self.cell.set(rest);
        Ok(())
    }

    /// Empties the ambient stack.
    pub fn clear(&self) {
        self.cell.set(Stack::new());
    }

    /// Releases the underlying slot, see [`PropagatedCell::dispose`].
    pub fn dispose(self) {
        self.cell.dispose();
    }
}

impl<T> Default for LocalStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
