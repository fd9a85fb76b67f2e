//! Process-wide options read from the environment.
//!
//! - `LOGICAL_STACK` - Comma-separated options:
//!   - `leafs` - Only capture logical stacks for leaf reports (reports
//!     without a cause or components)
//!   - `manual` - Do not install the report creation hook automatically on
//!     first use of [`DiagnosticStack`](crate::DiagnosticStack)

use std::sync::OnceLock;

/// Name of the environment variable holding the options.
pub const ENV_VAR: &str = "LOGICAL_STACK";

/// Options parsed from [`ENV_VAR`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvOptions {
    /// Only annotate reports that have no children.
    pub leafs_only: bool,
    /// Leave hook installation to the application.
    pub manual_hook: bool,
}

impl EnvOptions {
    /// Returns the options for this process, parsing them on first call.
    pub fn get() -> &'static Self {
        static LOGICAL_STACK_FLAGS: OnceLock<EnvOptions> = OnceLock::new();

        LOGICAL_STACK_FLAGS.get_or_init(|| {
            let options = std::env::var_os(ENV_VAR)
                .map(|var| Self::parse(&var.to_string_lossy()))
                .unwrap_or_default();
            tracing::debug!(target: "logical_stack", ?options, "read environment options");
            options
        })
    }

    /// Parses a comma-separated option list. Unknown options are ignored.
    pub fn parse(value: &str) -> Self {
        let mut options = Self::default();
        for v in value.split(',').map(str::trim) {
            if v.eq_ignore_ascii_case("leafs") {
                options.leafs_only = true;
            } else if v.eq_ignore_ascii_case("manual") {
                options.manual_hook = true;
            } else if !v.is_empty() {
                tracing::warn!(target: "logical_stack", option = v, "ignoring unknown LOGICAL_STACK option");
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        assert_eq!(EnvOptions::parse(""), EnvOptions::default());
        assert_eq!(
            EnvOptions::parse("LEAFS, manual"),
            EnvOptions {
                leafs_only: true,
                manual_hook: true,
            }
        );
        assert_eq!(
            EnvOptions::parse("bogus,leafs"),
            EnvOptions {
                leafs_only: true,
                manual_hook: false,
            }
        );
    }
}
