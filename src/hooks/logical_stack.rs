//! The built-in hook that tags reports with the ambient logical stack.

use crate::{DiagnosticStack, Report, config::EnvOptions, hooks::report_creation::ReportCreationHook};

/// Report creation hook that captures the ambient logical stack.
///
/// [`DiagnosticStack`] registers one automatically the first time it is
/// used, unless `LOGICAL_STACK=manual` is set. Register it yourself to
/// choose the options, or when the automatic registration is disabled:
///
/// ```
/// use logical_stack::hooks::{
///     logical_stack::LogicalStackCollector, report_creation::register_report_creation_hook,
/// };
///
/// register_report_creation_hook(LogicalStackCollector {
///     capture_for_reports_with_children: false,
/// });
/// ```
///
/// The collector never replaces a stack that is already present and never
/// fails: if the ambient stack cannot be read the report is left as it is.
#[derive(Copy, Clone, Debug)]
pub struct LogicalStackCollector {
    /// Whether to capture for all reports or only for leaf reports (those
    /// without a cause or components).
    pub capture_for_reports_with_children: bool,
}

impl LogicalStackCollector {
    /// Creates a collector configured from the `LOGICAL_STACK` environment
    /// variable.
    pub fn new() -> Self {
        Self {
            capture_for_reports_with_children: !EnvOptions::get().leafs_only,
        }
    }
}

impl Default for LogicalStackCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportCreationHook for LogicalStackCollector {
    fn on_creation(&self, report: &mut Report) {
        if report.logical_stack().is_some() {
            return;
        }
        if !self.capture_for_reports_with_children && !report.is_leaf() {
            return;
        }
        if let Some(stack) = DiagnosticStack::try_current() {
            report.set_logical_stack(stack);
        }
    }
}
