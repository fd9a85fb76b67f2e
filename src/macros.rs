/// Creates a [`Report`](crate::Report).
///
/// With a format string the arguments are interpreted like [`format!()`]
/// and the resulting message becomes the report's error. A lone literal
/// must be a string literal, since it is the format string; write
/// `report!("{}", 42)` for other values. Any other single expression is
/// converted with [`IntoReport`](crate::IntoReport): errors become new
/// reports, an existing report is returned unchanged.
///
/// Like every report constructor it records the logical stack that is
/// ambient at the macro call.
///
/// [`format!()`]: std::format
///
/// # Examples
///
/// ```
/// use logical_stack::{Report, report};
///
/// let report: Report = report!("cache miss for key {}", 42);
/// assert!(report.to_string().starts_with("cache miss for key 42\n"));
///
/// let io_error = std::io::Error::other("disk unplugged");
/// let report: Report = report!(io_error);
/// assert!(report.downcast_ref::<std::io::Error>().is_some());
///
/// let report: Report = report!("{}", 42);
/// assert!(report.to_string().starts_with("42\n"));
/// ```
///
/// A non-string literal is rejected at compile time:
///
/// ```compile_fail
/// let report: logical_stack::Report = logical_stack::report!(42);
/// ```
#[macro_export]
macro_rules! report {
    ($msg:literal $(,)?) => {
        $crate::Report::msg($crate::__private::format!($msg))
    };
    ($error:expr $(,)?) => {
        $crate::IntoReport::into_report($error)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Report::msg($crate::__private::format!($fmt, $($arg)*))
    };
}

/// Return early with an error.
///
/// Takes the same arguments as [`report!`] and returns
/// `Err(report!(...).into())` from the enclosing function.
///
/// # Examples
///
/// ```
/// use logical_stack::{Report, bail};
///
/// fn check(value: i32) -> Result<(), Report> {
///     if value < 0 {
///         bail!("value must be non-negative, got {}", value);
///     }
///     Ok(())
/// }
///
/// assert!(check(-1).is_err());
/// ```
#[macro_export]
macro_rules! bail {
    ($($args:tt)*) => {
        return $crate::__private::Err($crate::report!($($args)*).into())
    };
}

/// Returns the `&'static` [`CallSite`](crate::CallSite) for `name` at the
/// macro's source location.
///
/// # Examples
///
/// ```
/// use logical_stack::call_site;
///
/// let site = call_site!("Store.flush()");
/// assert!(site.label().starts_with("Store.flush() in "));
/// assert!(site.label().contains(":line "));
/// ```
#[macro_export]
macro_rules! call_site {
    ($name:expr $(,)?) => {{
        static CALL_SITE: $crate::CallSite =
            $crate::CallSite::new($name, ::core::file!(), ::core::line!());
        &CALL_SITE
    }};
}

/// Enters a frame labelled with `name` and the macro's source location.
///
/// Expands to [`DiagnosticStack::enter`](crate::DiagnosticStack::enter)
/// with the label of a [`call_site!`], so the label is rendered once per
/// call site rather than on every call. Bind the returned guard to keep the
/// frame open.
///
/// # Examples
///
/// ```
/// use logical_stack::{DiagnosticStack, enter};
///
/// fn handle() -> usize {
///     let _frame = enter!("Server.handle()");
///     DiagnosticStack::depth()
/// }
///
/// assert_eq!(handle(), 1);
/// assert!(DiagnosticStack::is_empty());
/// ```
#[macro_export]
macro_rules! enter {
    ($name:expr $(,)?) => {
        $crate::DiagnosticStack::enter($crate::call_site!($name).label())
    };
}
