//! The error report that carries a logical stack.
//!
//! A [`Report`] wraps an error value without changing it and adds the side
//! channel this crate is about: the [`LogicalStack`] that was ambient when
//! the report was created. Reports form a tree. A report made with
//! [`Report::context`] has exactly one cause; a report made with
//! [`Report::aggregate`] is a composite of several independent failures.

mod collection;

use alloc::{boxed::Box, string::String, vec::Vec};
use core::{any::Any, error::Error, fmt, panic::Location};

pub use self::collection::ReportCollection;
use crate::{DiagnosticStack, LogicalStack, format, hooks::report_creation};

/// Error type used for reports created from a plain message.
#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for Message {}

/// Object-safe view of an attachment value.
trait AttachmentValue: fmt::Display + fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

impl<A> AttachmentValue for A
where
    A: fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A piece of supporting data attached to a [`Report`].
pub struct Attachment(Box<dyn AttachmentValue>);

impl Attachment {
    /// Attempts to downcast the attachment to a concrete type.
    pub fn downcast_ref<A: 'static>(&self) -> Option<&A> {
        self.0.as_any().downcast_ref()
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// The reports a report was caused by.
pub(crate) enum Children {
    None,
    Cause(Report),
    Components(ReportCollection),
}

struct ReportData {
    error: Box<dyn Error + Send + Sync + 'static>,
    type_name: Option<&'static str>,
    location: &'static Location<'static>,
    attachments: Vec<Attachment>,
    children: Children,
    logical_stack: Option<LogicalStack>,
}

/// An error report.
///
/// Every constructor runs the registered
/// [report creation hooks](crate::hooks::report_creation) before returning,
/// which is where the logical stack gets captured. Returning the same report
/// again (for example with `?`) does not run them a second time, and an
/// already captured stack is never replaced: the deepest, first capture
/// wins.
///
/// [`Report`] is pointer sized, keeping `Result<T, Report>` small.
///
/// # Examples
///
/// ```
/// use logical_stack::{DiagnosticStack, Report};
///
/// let _scope = DiagnosticStack::enter("Program.Main()");
/// let report = Report::msg("file missing").context("failed to load settings");
///
/// assert_eq!(report.to_string().lines().next(), Some("failed to load settings"));
/// assert!(report.cause().is_some());
/// ```
#[must_use]
pub struct Report(Box<ReportData>);

impl Report {
    #[track_caller]
    fn from_parts(
        error: Box<dyn Error + Send + Sync + 'static>,
        type_name: Option<&'static str>,
        children: Children,
    ) -> Self {
        let mut report = Self(Box::new(ReportData {
            error,
            type_name,
            location: Location::caller(),
            attachments: Vec::new(),
            children,
            logical_stack: None,
        }));
        report_creation::run_creation_hooks(&mut report);
        report
    }

    /// Creates a report for `error`.
    #[track_caller]
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::from_parts(
            Box::new(error),
            Some(core::any::type_name::<E>()),
            Children::None,
        )
    }

    /// Creates a report from a message.
    #[track_caller]
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::from_parts(
            Box::new(Message(alloc::format!("{message}"))),
            None,
            Children::None,
        )
    }

    /// Creates a composite report for several independent failures, for
    /// example all the branches of a fan-out that failed.
    #[track_caller]
    pub fn aggregate<I>(message: impl fmt::Display, components: I) -> Self
    where
        I: IntoIterator<Item = Report>,
    {
        Self::from_parts(
            Box::new(Message(alloc::format!("{message}"))),
            None,
            Children::Components(components.into_iter().collect()),
        )
    }

    /// Wraps this report in a new report describing the higher level
    /// operation that failed.
    #[track_caller]
    pub fn context(self, context: impl fmt::Display) -> Self {
        Self::from_parts(
            Box::new(Message(alloc::format!("{context}"))),
            None,
            Children::Cause(self),
        )
    }

    /// Wraps this report in a new report for the error `context`.
    #[track_caller]
    pub fn context_error<E>(self, context: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::from_parts(
            Box::new(context),
            Some(core::any::type_name::<E>()),
            Children::Cause(self),
        )
    }

    /// Attaches supporting data.
    pub fn attach<A>(mut self, attachment: A) -> Self
    where
        A: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.push_attachment(attachment);
        self
    }

    /// Attaches supporting data through a mutable reference.
    pub fn push_attachment<A>(&mut self, attachment: A)
    where
        A: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.attachments.push(Attachment(Box::new(attachment)));
    }

    /// The attachments, in the order they were added.
    pub fn attachments(&self) -> &[Attachment] {
        &self.0.attachments
    }

    /// The error this report was created for.
    pub fn current_context(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0.error
    }

    /// Returns the error this report was created for if it is an `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Error + 'static,
    {
        self.0.error.downcast_ref()
    }

    /// The type name of the wrapped error, or `None` for message reports.
    pub fn type_name(&self) -> Option<&'static str> {
        self.0.type_name
    }

    /// Where the report was created.
    pub fn location(&self) -> &'static Location<'static> {
        self.0.location
    }

    /// The single report this one wraps, if it was created with
    /// [`context`](Self::context).
    pub fn cause(&self) -> Option<&Report> {
        match &self.0.children {
            Children::Cause(cause) => Some(cause),
            _ => None,
        }
    }

    /// The component reports, if this is a composite made with
    /// [`aggregate`](Self::aggregate).
    pub fn components(&self) -> Option<&ReportCollection> {
        match &self.0.children {
            Children::Components(components) => Some(components),
            _ => None,
        }
    }

    /// Returns `true` if this report has neither a cause nor components.
    pub fn is_leaf(&self) -> bool {
        match &self.0.children {
            Children::None => true,
            Children::Cause(_) => false,
            Children::Components(components) => components.is_empty(),
        }
    }

    pub(crate) fn children(&self) -> &Children {
        &self.0.children
    }

    /// The logical stack captured for this report, if any.
    pub fn logical_stack(&self) -> Option<&LogicalStack> {
        self.0.logical_stack.as_ref()
    }

    /// Stores `stack` as this report's logical stack unless one was already
    /// captured.
    ///
    /// Empty stacks are not stored. Returns `true` if `stack` was stored.
    pub fn set_logical_stack(&mut self, stack: LogicalStack) -> bool {
        if self.0.logical_stack.is_some() || stack.is_empty() {
            return false;
        }
        self.0.logical_stack = Some(stack);
        true
    }

    /// Captures the ambient logical stack, see
    /// [`set_logical_stack`](Self::set_logical_stack).
    ///
    /// Use this at a handler boundary for reports that were created while
    /// no stack was ambient, for example on another thread. It may miss the
    /// innermost frames that were already exited.
    pub fn capture_logical_stack(&mut self) -> bool {
        match DiagnosticStack::try_current() {
            Some(stack) => self.set_logical_stack(stack),
            None => false,
        }
    }

    /// Renders the report followed by its logical stack and those of its
    /// direct children, see [`format_report`](crate::format_report).
    pub fn to_logical_string(&self) -> String {
        format::format_report(self)
    }

    fn fmt_description(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.type_name {
            Some(type_name) => write!(f, "{type_name}: {}", self.0.error)?,
            None => write!(f, "{}", self.0.error)?,
        }
        let location = self.0.location;
        write!(
            f,
            "\n   at {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        )?;
        for attachment in &self.0.attachments {
            write!(f, "\n   - {attachment}")?;
        }

        match &self.0.children {
            Children::None => Ok(()),
            Children::Cause(cause) => {
                f.write_str("\n ---> ")?;
                cause.fmt_description(f)?;
                f.write_str("\n   --- End of inner report ---")
            }
            Children::Components(components) => {
                for (i, component) in components.iter().enumerate() {
                    write!(f, "\n---> (Inner report #{i}) ")?;
                    component.fmt_description(f)?;
                    f.write_str("<---")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Report {
    /// The description of the report: the error, where it was created, its
    /// attachments, and the descriptions of its children.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_description(f)
    }
}

impl fmt::Debug for Report {
    /// Same as [`Report::to_logical_string`], so that returning a report
    /// from `main` prints the logical stack too.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format::format_report(self))
    }
}

impl<E> From<E> for Report
where
    E: Error + Send + Sync + 'static,
{
    #[track_caller]
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl Error for Boom {}

    static_assertions::assert_impl_all!(Report: Send, Sync);
    static_assertions::assert_not_impl_any!(Report: Clone, Error);
    static_assertions::assert_eq_size!(Report, usize);

    #[test]
    fn test_report_new_records_type_and_location() {
        let report = Report::new(Boom);
        let line = line!() - 1;

        assert!(report.type_name().unwrap().ends_with("Boom"));
        assert!(report.downcast_ref::<Boom>().is_some());
        assert_eq!(report.location().line(), line);
        assert!(report.is_leaf());

        let description = report.to_string();
        let mut lines = description.lines();
        assert!(lines.next().unwrap().ends_with("Boom: boom"));
        assert!(lines.next().unwrap().starts_with("   at "));
    }

    #[test]
    fn test_question_mark_conversion() {
        fn fails() -> Result<(), Report> {
            Err(Boom)?;
            Ok(())
        }

        let report = fails().unwrap_err();
        assert!(report.downcast_ref::<Boom>().is_some());
    }

    #[test]
    fn test_context_wraps_single_cause() {
        let report = Report::new(Boom).context("loading failed");

        assert_eq!(report.type_name(), None);
        assert!(report.components().is_none());
        let cause = report.cause().unwrap();
        assert!(cause.downcast_ref::<Boom>().is_some());

        let description = report.to_string();
        assert!(description.starts_with("loading failed\n"));
        assert!(description.contains(" ---> "));
        assert!(description.contains("Boom: boom"));
        assert!(description.ends_with("--- End of inner report ---"));
    }

    #[test]
    fn test_aggregate_keeps_order() {
        let report = Report::aggregate(
            "several failed",
            [Report::msg("first"), Report::msg("second")],
        );

        let components = report.components().unwrap();
        assert_eq!(components.len(), 2);
        let names: Vec<_> = components
            .iter()
            .map(|c| c.current_context().to_string())
            .collect();
        assert_eq!(names, ["first", "second"]);
        assert!(report.to_string().contains("(Inner report #1) second"));
    }

    #[test]
    fn test_attachments() {
        let report = Report::msg("failed").attach(42u32).attach("request 7");

        assert_eq!(report.attachments().len(), 2);
        assert_eq!(report.attachments()[0].downcast_ref::<u32>(), Some(&42));
        assert!(report.to_string().contains("\n   - request 7"));
    }

    #[test]
    fn test_set_logical_stack_first_wins() {
        let mut report = Report::msg("failed");
        assert!(report.logical_stack().is_none());

        assert!(!report.set_logical_stack(LogicalStack::default()));
        let first = LogicalStack::from_labels(["inner", "outer"]);
        assert!(report.set_logical_stack(first.clone()));
        assert!(!report.set_logical_stack(LogicalStack::from_labels(["other"])));
        assert_eq!(report.logical_stack(), Some(&first));
    }
}
