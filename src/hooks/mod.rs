//! Hooks that observe every report as it is created.
//!
//! - **[`report_creation`]**: registering hooks and the
//!   [`ReportCreationHook`](report_creation::ReportCreationHook) trait.
//! - **[`logical_stack`]**: [`LogicalStackCollector`], the hook that
//!   attaches the ambient logical stack. It is installed automatically on
//!   first use of [`DiagnosticStack`](crate::DiagnosticStack).
//!
//! [`LogicalStackCollector`]: logical_stack::LogicalStackCollector

mod hook_lock;
pub mod logical_stack;
pub mod report_creation;
