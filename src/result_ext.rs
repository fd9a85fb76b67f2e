use core::fmt;

use crate::{IntoReport, Report};

mod sealed {
    pub trait Sealed {}
    impl<A, E> Sealed for Result<A, E> {}
}

/// Extension methods for `Result`s whose error converts into a [`Report`].
///
/// # Examples
///
/// ```
/// use logical_stack::{DiagnosticStack, Report, ResultExt};
///
/// fn read_port(text: &str) -> Result<u16, Report> {
///     let _scope = DiagnosticStack::enter("Config.read_port(str text)");
///     text.parse::<u16>().context("invalid port")
/// }
///
/// let report = read_port("http").unwrap_err();
/// assert!(report.cause().is_some());
/// assert!(report.to_logical_string().contains("   Config.read_port(str text)\n"));
/// ```
pub trait ResultExt<V, E>: sealed::Sealed {
    /// Wraps the error in a new report that has it as its cause.
    #[track_caller]
    fn context<C>(self, context: C) -> Result<V, Report>
    where
        E: IntoReport,
        C: fmt::Display;

    /// Like [`context`](ResultExt::context), computing the message only on
    /// error.
    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<V, Report>
    where
        E: IntoReport,
        F: FnOnce() -> C,
        C: fmt::Display;

    /// Adds an attachment to the error report.
    #[track_caller]
    fn attach<A>(self, attachment: A) -> Result<V, Report>
    where
        E: IntoReport,
        A: fmt::Display + fmt::Debug + Send + Sync + 'static;

    /// Records the ambient logical stack on the error report unless it
    /// already carries one.
    ///
    /// Call this at the handler boundary closest to where an error entered
    /// the logical operation, for reports that were created with no
    /// ambient stack (on a foreign thread, or while the creation hook was
    /// not installed). Frames that were already exited are not part of the
    /// captured stack.
    #[track_caller]
    fn attach_logical_stack(self) -> Result<V, Report>
    where
        E: IntoReport;
}

impl<V, E> ResultExt<V, E> for Result<V, E> {
    #[inline]
    fn context<C>(self, context: C) -> Result<V, Report>
    where
        E: IntoReport,
        C: fmt::Display,
    {
        match self {
            Ok(v) => Ok(v),
            Err(error) => Err(error.into_report().context(context)),
        }
    }

    #[inline]
    fn with_context<C, F>(self, context: F) -> Result<V, Report>
    where
        E: IntoReport,
        F: FnOnce() -> C,
        C: fmt::Display,
    {
        match self {
            Ok(v) => Ok(v),
            Err(error) => Err(error.into_report().context(context())),
        }
    }

    #[inline]
    fn attach<A>(self, attachment: A) -> Result<V, Report>
    where
        E: IntoReport,
        A: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Ok(v) => Ok(v),
            Err(error) => Err(error.into_report().attach(attachment)),
        }
    }

    #[inline]
    fn attach_logical_stack(self) -> Result<V, Report>
    where
        E: IntoReport,
    {
        match self {
            Ok(v) => Ok(v),
            Err(error) => {
                let mut report = error.into_report();
                report.capture_logical_stack();
                Err(report)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;
    use crate::{DiagnosticStack, LogicalStack, annotation_of};

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn test_ok_values_pass_through() {
        let value: Result<u8, DiskFull> = Ok(7);
        assert_eq!(value.context("unused").unwrap(), 7);

        let mut called = false;
        let value: Result<u8, DiskFull> = Ok(8);
        let value = value.with_context(|| {
            called = true;
            String::from("unused")
        });
        assert_eq!(value.unwrap(), 8);
        assert!(!called);
    }

    #[test]
    fn test_context_keeps_the_cause() {
        let result: Result<(), DiskFull> = Err(DiskFull);
        let report = result.context("saving failed").unwrap_err();

        assert_eq!(report.current_context().to_string(), "saving failed");
        assert!(report.cause().unwrap().downcast_ref::<DiskFull>().is_some());
    }

    #[test]
    fn test_attach_logical_stack_does_not_overwrite() {
        let mut original = Report::msg("failed");
        original.set_logical_stack(LogicalStack::from_labels(["Inner.work()", "Outer.run()"]));

        let _handler = DiagnosticStack::enter("Handler.catch()");
        let report = Err::<(), _>(original)
            .attach_logical_stack()
            .unwrap_err();
        assert_eq!(annotation_of(&report), "   Inner.work()\n   Outer.run()\n");
    }

    #[test]
    fn test_attach_logical_stack_fills_in_missing_stack() {
        let report = std::thread::spawn(|| Report::msg("foreign"))
            .join()
            .unwrap();
        assert_eq!(annotation_of(&report), "");

        let _handler = DiagnosticStack::enter("Handler.catch()");
        let report = Err::<(), _>(report).attach_logical_stack().unwrap_err();
        assert_eq!(annotation_of(&report), "   Handler.catch()\n");
    }
}
