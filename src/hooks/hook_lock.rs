use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A lazily populated, process-wide slot for registered hooks.
///
/// Guards are held only long enough to read or replace the slot; hooks are
/// never run while a guard is alive.
#[repr(transparent)]
pub(crate) struct HookLock<T: 'static + Send + Sync>(RwLock<Option<T>>);

#[repr(transparent)]
pub(crate) struct HookLockReadGuard<T: 'static + Send + Sync>(RwLockReadGuard<'static, Option<T>>);

#[repr(transparent)]
pub(crate) struct HookLockWriteGuard<T: 'static + Send + Sync>(
    RwLockWriteGuard<'static, Option<T>>,
);

impl<T: 'static + Send + Sync> HookLock<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self(RwLock::new(None))
    }

    // A hook that panicked while a guard was held leaves the slot itself
    // intact, so poisoning is ignored.
    #[inline]
    pub(crate) fn read(&'static self) -> HookLockReadGuard<T> {
        HookLockReadGuard(self.0.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[inline]
    pub(crate) fn write(&'static self) -> HookLockWriteGuard<T> {
        HookLockWriteGuard(self.0.write().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<T: 'static + Send + Sync> HookLockReadGuard<T> {
    #[inline]
    pub(crate) fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }
}

impl<T: 'static + Send + Sync> HookLockWriteGuard<T> {
    #[inline]
    pub(crate) fn get(&mut self) -> &mut Option<T> {
        &mut self.0
    }
}
