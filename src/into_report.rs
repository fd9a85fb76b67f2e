use core::error::Error;

use crate::Report;

/// Converts errors and reports into a [`Report`].
///
/// Implemented for every `Error + Send + Sync + 'static` type, which creates
/// a new report (running the creation hooks), and for [`Report`] itself,
/// which returns the same report unchanged. The second case is what keeps
/// a propagated report's first captured logical stack intact.
///
/// Mostly used as a bound by [`ResultExt`](crate::ResultExt) and
/// [`IteratorExt`](crate::IteratorExt).
///
/// # Examples
///
/// ```
/// use logical_stack::{IntoReport, Report};
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "settings.toml");
/// let report: Report = error.into_report();
/// assert!(report.downcast_ref::<std::io::Error>().is_some());
/// ```
pub trait IntoReport {
    /// Performs the conversion.
    #[track_caller]
    fn into_report(self) -> Report;
}

impl IntoReport for Report {
    #[inline(always)]
    fn into_report(self) -> Report {
        self
    }
}

impl<E> IntoReport for E
where
    E: Error + Send + Sync + 'static,
{
    #[track_caller]
    fn into_report(self) -> Report {
        Report::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogicalStack;

    #[test]
    fn test_report_passes_through_unchanged() {
        let mut report = Report::msg("deep failure");
        report.set_logical_stack(LogicalStack::from_labels(["Deep.work()"]));
        let location = report.location();

        let again = report.into_report();
        assert_eq!(again.location(), location);
        assert_eq!(
            again.logical_stack(),
            Some(&LogicalStack::from_labels(["Deep.work()"]))
        );
    }
}
