use alloc::{vec, vec::Vec};
use core::{fmt, slice};

use crate::Report;

/// An ordered collection of reports, typically the failures of concurrently
/// running operations.
///
/// Turn it into a composite [`Report`] with
/// [`context`](ReportCollection::context).
///
/// # Examples
///
/// ```
/// use logical_stack::{Report, ReportCollection};
///
/// let mut failures = ReportCollection::new();
/// failures.push(Report::msg("shard 1 timed out"));
/// failures.push(Report::msg("shard 4 refused the connection"));
///
/// let report = failures.context("query failed on 2 shards");
/// assert_eq!(report.components().map(|c| c.len()), Some(2));
/// ```
#[derive(Default)]
pub struct ReportCollection {
    reports: Vec<Report>,
}

impl ReportCollection {
    /// Creates an empty collection.
    pub const fn new() -> Self {
        Self {
            reports: Vec::new(),
        }
    }

    /// Appends a report.
    pub fn push(&mut self, report: Report) {
        self.reports.push(report);
    }

    /// Number of reports in the collection.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Returns `true` if the collection holds no reports.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Returns the report at `index`.
    pub fn get(&self, index: usize) -> Option<&Report> {
        self.reports.get(index)
    }

    /// Iterates over the reports in insertion order.
    pub fn iter(&self) -> slice::Iter<'_, Report> {
        self.reports.iter()
    }

    /// Creates a composite report with these reports as its components.
    #[track_caller]
    pub fn context(self, context: impl fmt::Display) -> Report {
        Report::aggregate(context, self)
    }
}

impl FromIterator<Report> for ReportCollection {
    fn from_iter<I: IntoIterator<Item = Report>>(iter: I) -> Self {
        Self {
            reports: iter.into_iter().collect(),
        }
    }
}

impl Extend<Report> for ReportCollection {
    fn extend<I: IntoIterator<Item = Report>>(&mut self, iter: I) {
        self.reports.extend(iter);
    }
}

impl IntoIterator for ReportCollection {
    type Item = Report;
    type IntoIter = vec::IntoIter<Report>;

    fn into_iter(self) -> Self::IntoIter {
        self.reports.into_iter()
    }
}

impl<'a> IntoIterator for &'a ReportCollection {
    type Item = &'a Report;
    type IntoIter = slice::Iter<'a, Report>;

    fn into_iter(self) -> Self::IntoIter {
        self.reports.iter()
    }
}

impl fmt::Debug for ReportCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.reports.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(ReportCollection: Send, Sync, Default);
    static_assertions::assert_not_impl_any!(ReportCollection: Clone);

    #[test]
    fn test_collection_into_composite() {
        let mut collection: ReportCollection = (0..3).map(|i| Report::msg(i)).collect();
        collection.extend([Report::msg(3)]);
        assert_eq!(collection.len(), 4);
        assert!(collection.get(4).is_none());

        let report = collection.context("all failed");
        let components = report.components().unwrap();
        assert_eq!(components.len(), 4);
        assert!(!report.is_leaf());
    }

    #[test]
    fn test_empty_composite_is_leaf() {
        let report = ReportCollection::new().context("nothing failed");
        assert!(report.is_leaf());
        assert!(report.components().unwrap().is_empty());
    }
}
