use alloc::vec::Vec;
use core::iter::FusedIterator;

use crate::{IntoReport, report::ReportCollection};

/// Extension methods for iterators over `Result`s to collect every failure.
///
/// [`Iterator::collect`] stops at the first error. These methods keep going
/// and gather all errors into a [`ReportCollection`], which is what a
/// fan-out of concurrent operations needs: each failure keeps the logical
/// stack of the branch it came from, and the collection turns into one
/// composite report with [`ReportCollection::context`].
///
/// # Examples
///
/// ```
/// use logical_stack::{IteratorExt, ReportCollection};
///
/// let inputs = ["1", "2", "x", "4", "y"];
/// let result: Result<Vec<u8>, ReportCollection> = inputs
///     .into_iter()
///     .map(|s| s.parse::<u8>())
///     .collect_reports_vec();
///
/// let failures = result.unwrap_err();
/// assert_eq!(failures.len(), 2);
/// let report = failures.context("2 of 5 inputs were invalid");
/// assert!(report.to_logical_string().contains("--> (Inner report #1)\n"));
/// ```
pub trait IteratorExt<A, E>: Sized + Iterator<Item = Result<A, E>> {
    /// Collects successful values into a container, or all errors into a
    /// [`ReportCollection`].
    ///
    /// ```
    /// use std::collections::BTreeSet;
    ///
    /// use logical_stack::{IteratorExt, ReportCollection};
    ///
    /// let result: Result<BTreeSet<u8>, ReportCollection> =
    ///     ["1", "2", "2"].into_iter().map(|s| s.parse::<u8>()).collect_reports();
    /// assert_eq!(result.unwrap(), BTreeSet::from([1, 2]));
    /// ```
    #[track_caller]
    fn collect_reports<Container>(self) -> Result<Container, ReportCollection>
    where
        Container: FromIterator<A>,
        E: IntoReport;

    /// Collects successful values into a `Vec`, or all errors into a
    /// [`ReportCollection`].
    #[track_caller]
    fn collect_reports_vec(self) -> Result<Vec<A>, ReportCollection>
    where
        E: IntoReport;
}

struct IteratorWrapper<'a, Iter> {
    iter: Iter,
    errors: &'a mut Option<ReportCollection>,
}

impl<Iter, Object, Error> Iterator for IteratorWrapper<'_, Iter>
where
    Iter: Iterator<Item = Result<Object, Error>>,
    Error: IntoReport,
{
    type Item = Object;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.errors.is_some() {
            return None;
        }

        match self.iter.next() {
            Some(Ok(object)) => Some(object),
            Some(Err(err)) => {
                *self.errors = Some(ReportCollection::from_iter(
                    core::iter::once(err)
                        .chain((&mut self.iter).filter_map(Result::err))
                        .map(IntoReport::into_report),
                ));
                None
            }
            None => None,
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.errors.is_some() {
            (0, Some(0))
        } else {
            let (_, upper) = self.iter.size_hint();
            (0, upper)
        }
    }
}

impl<Iter, Object, Error> FusedIterator for IteratorWrapper<'_, Iter>
where
    Iter: FusedIterator<Item = Result<Object, Error>>,
    Error: IntoReport,
{
}

impl<A, E, I> IteratorExt<A, E> for I
where
    I: Iterator<Item = Result<A, E>>,
{
    #[inline]
    fn collect_reports<Container>(self) -> Result<Container, ReportCollection>
    where
        Container: FromIterator<A>,
        E: IntoReport,
    {
        let mut errors = None;
        let result = Container::from_iter(IteratorWrapper {
            iter: self,
            errors: &mut errors,
        });
        match errors {
            Some(errors) => Err(errors),
            None => Ok(result),
        }
    }

    #[inline]
    fn collect_reports_vec(mut self) -> Result<Vec<A>, ReportCollection>
    where
        E: IntoReport,
    {
        let mut out = Vec::new();
        while let Some(v) = self.next() {
            match v {
                Ok(v) => out.push(v),
                Err(err) => {
                    let mut errors = ReportCollection::new();
                    errors.push(err.into_report());
                    errors.extend(self.filter_map(Result::err).map(IntoReport::into_report));
                    return Err(errors);
                }
            }
        }
        Ok(out)
    }
}
