//! Rendering reports together with their logical stacks.

use alloc::string::{String, ToString};
use core::fmt::Write;

use crate::{Report, report::Children};

const LOGICAL_STACK_HEADER: &str = "Logical stack:\n";
const NO_LOGICAL_STACK: &str = "No logical stack.\n";

/// Returns the logical stack captured for `report`, rendered one indented
/// line per frame, or an empty string if none was captured.
///
/// # Examples
///
/// ```
/// use logical_stack::{DiagnosticStack, Report, annotation_of};
///
/// let report = {
///     let _outer = DiagnosticStack::enter("Service.handle()");
///     let _inner = DiagnosticStack::enter("Store.load(String key)");
///     Report::msg("not found")
/// };
///
/// assert_eq!(
///     annotation_of(&report),
///     "   Store.load(String key)\n   Service.handle()\n"
/// );
/// assert_eq!(annotation_of(&Report::msg("no frames")), "");
/// ```
pub fn annotation_of(report: &Report) -> String {
    report
        .logical_stack()
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Renders `report` followed by its logical stack.
///
/// The report's description comes first, then a `Logical stack:` block
/// (or `No logical stack.`). For a composite report every component
/// follows in order as an `--> (Inner report #i)` ... `<--` block holding
/// only that component's logical stack; a report with a single cause gets
/// one `--> (Inner report)` block. Deeper descendants are not expanded,
/// their descriptions already appear in the report's own description.
///
/// # Examples
///
/// ```
/// use logical_stack::{DiagnosticStack, Report, format_report};
///
/// let report = {
///     let _main = DiagnosticStack::enter("Program.Main()");
///     Report::msg("boom")
/// };
///
/// let text = format_report(&report);
/// assert!(text.starts_with("boom\n"));
/// assert!(text.ends_with("Logical stack:\n   Program.Main()\n"));
/// assert!(format_report(&Report::msg("quiet")).ends_with("No logical stack.\n"));
/// ```
pub fn format_report(report: &Report) -> String {
    let mut out = String::new();
    // Writing into a `String` cannot fail.
    let _ = write!(out, "{report}");
    if !out.ends_with('\n') {
        out.push('\n');
    }
    push_annotation(&mut out, report);

    match report.children() {
        Children::None => {}
        Children::Cause(cause) => {
            out.push_str("--> (Inner report)\n");
            out.push_str(&annotation_of(cause));
            out.push_str("<--\n");
        }
        Children::Components(components) => {
            for (i, component) in components.iter().enumerate() {
                let _ = writeln!(out, "--> (Inner report #{i})");
                out.push_str(&annotation_of(component));
                out.push_str("<--\n");
            }
        }
    }
    out
}

fn push_annotation(out: &mut String, report: &Report) {
    match report.logical_stack() {
        Some(stack) if !stack.is_empty() => {
            out.push_str(LOGICAL_STACK_HEADER);
            let _ = write!(out, "{stack}");
        }
        _ => out.push_str(NO_LOGICAL_STACK),
    }
}
