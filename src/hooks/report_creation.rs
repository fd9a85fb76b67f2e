//! Report creation hooks.
//!
//! Hooks registered here run synchronously inside every [`Report`]
//! constructor, after the report is fully assembled and before it is handed
//! back to the code that raised it. That makes them the first observer of
//! every failure, which is where [`LogicalStackCollector`] captures the
//! ambient logical stack.
//!
//! # Examples
//!
//! ```rust
//! use logical_stack::{
//!     Report,
//!     hooks::report_creation::{ReportCreationHook, register_report_creation_hook},
//! };
//!
//! struct ProcessId;
//!
//! impl ReportCreationHook for ProcessId {
//!     fn on_creation(&self, report: &mut Report) {
//!         report.push_attachment(format!("process {}", std::process::id()));
//!     }
//! }
//!
//! register_report_creation_hook(ProcessId);
//! ```
//!
//! [`LogicalStackCollector`]: crate::hooks::logical_stack::LogicalStackCollector

use alloc::{sync::Arc, vec::Vec};
use core::{fmt, panic::Location};

use crate::{Report, hooks::hook_lock::HookLock};

/// Registered hooks. Registration replaces the whole set, so a running
/// report creation keeps the set it started with.
type HookSet = Arc<Vec<Arc<dyn UntypedReportCreationHook>>>;

static HOOKS: HookLock<HookSet> = HookLock::new();

trait UntypedReportCreationHook: 'static + Send + Sync + fmt::Display {
    fn on_creation(&self, report: &mut Report);
}

/// A hook that is run whenever a [`Report`] is created.
///
/// Hooks must not panic and must not create reports themselves. They may
/// use [`DiagnosticStack`](crate::DiagnosticStack) and register further
/// hooks; those apply from the next report on.
pub trait ReportCreationHook: 'static + Send + Sync {
    /// Called with the freshly created report.
    fn on_creation(&self, report: &mut Report);
}

#[track_caller]
fn creation_hook_to_untyped<H>(hook: H) -> Arc<dyn UntypedReportCreationHook>
where
    H: ReportCreationHook,
{
    struct Hook<H> {
        hook: H,
        added_at: &'static Location<'static>,
    }

    impl<H> fmt::Display for Hook<H> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "Report creation hook {} registered at {}:{}",
                core::any::type_name::<H>(),
                self.added_at.file(),
                self.added_at.line()
            )
        }
    }

    impl<H> UntypedReportCreationHook for Hook<H>
    where
        H: ReportCreationHook,
    {
        fn on_creation(&self, report: &mut Report) {
            self.hook.on_creation(report);
        }
    }

    Arc::new(Hook {
        hook,
        added_at: Location::caller(),
    })
}

/// Registers a hook that runs on every report created afterwards.
///
/// Hooks run in registration order.
#[track_caller]
pub fn register_report_creation_hook<H>(hook: H)
where
    H: ReportCreationHook,
{
    let hook = creation_hook_to_untyped(hook);
    tracing::debug!(target: "logical_stack", "{hook}");
    let mut guard = HOOKS.write();
    let slot = guard.get();
    let mut hooks = slot.as_deref().cloned().unwrap_or_default();
    hooks.push(hook);
    *slot = Some(Arc::new(hooks));
}

/// Returns the number of registered hooks.
pub fn registered_hook_count() -> usize {
    HOOKS.read().get().map_or(0, |hooks| hooks.len())
}

pub(crate) fn run_creation_hooks(report: &mut Report) {
    let hooks = HOOKS.read().get().cloned();
    for hook in hooks.iter().flat_map(|hooks| hooks.iter()) {
        hook.on_creation(report);
    }
}
