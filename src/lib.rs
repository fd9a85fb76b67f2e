#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! An async-aware logical call stack for diagnostics.
//!
//! ## Overview
//!
//! A native backtrace of an `async` program shows executor internals and
//! whichever poll happened to be running. This crate keeps a second,
//! *logical* stack of the operations that are semantically in progress and
//! records it on every error report at the moment the report is created.
//!
//! ```
//! use logical_stack::prelude::*;
//!
//! async fn load(key: &str) -> Result<String, Report> {
//!     tokio::task::yield_now().await;
//!     bail!("no entry for {key}")
//! }
//!
//! # tokio::runtime::Builder::new_multi_thread().build().unwrap().block_on(async {
//! let _main = DiagnosticStack::enter("Program.Main()");
//! let report = load("user:7").in_logical_scope("Store.load(str key)").await.unwrap_err();
//!
//! assert!(report.to_logical_string().ends_with(
//!     "Logical stack:\n   async Store.load(str key)\n   Program.Main()\n"
//! ));
//! # });
//! ```
//!
//! ## Core Concepts
//!
//! - **Frames** are [`Label`]s pushed with [`DiagnosticStack::enter`] (or
//!   [`enter!`]) for synchronous code and with
//!   [`InstrumentExt::in_logical_scope`] for futures. [`Signature`] renders
//!   labels in `Type.method[Generics](Type name) // async` form.
//! - The stack is **ambient per logical operation**. A future that carries
//!   its own context ([`task::spawn`], [`PropagateExt::propagate`],
//!   [`InstrumentExt::in_logical_scope`]) keeps its frames across `.await`
//!   points and hops between worker threads. Concurrent branches forked
//!   from the same point each start from the frames open at the fork and
//!   never see each other's frames.
//! - A future spawned directly with `tokio::spawn` has no context of its
//!   own: it runs on the worker thread's stack, shared with every other
//!   such future. Do not hold a [`ScopeGuard`] across an `.await` there.
//!   A guard only ever pops the frame it pushed, so a mix-up is logged
//!   rather than corrupting another operation's stack.
//! - Frames are stored in an immutable, structurally shared [`Stack`], so
//!   forking is a reference count increment.
//! - Every [`Report`] constructor runs the
//!   [report creation hooks](hooks::report_creation). The built-in
//!   [`LogicalStackCollector`](hooks::logical_stack::LogicalStackCollector)
//!   records the ambient stack on the report unless it already has one. A
//!   report propagated further keeps the stack of the place it was created.
//! - [`format_report`] renders a report followed by its logical stack and
//!   those of its direct children; [`annotation_of`] returns just the stack.
//!
//! ## Configuration
//!
//! See [`config`] for the `LOGICAL_STACK` environment variable.
//!
//! ## Logging
//!
//! The crate logs through [`tracing`] with target `logical_stack`: hook
//! installation at `debug`, frame pushes and pops at `trace`, and
//! push/pop mismatches at `error`. No subscriber is installed.

extern crate alloc;

pub mod config;
mod diagnostic;
mod format;
pub mod hooks;
mod instrument;
mod into_report;
mod iterator_ext;
mod label;
mod macros;
pub mod prelude;
mod report;
mod result_ext;
pub mod task;

pub use logical_stack_internals::{
    Context, EmptyStackError, PropagateExt, Propagated, PropagatedCell, Stack,
};

pub use self::{
    diagnostic::{DiagnosticStack, FRAME_INDENT, Frames, LogicalStack, ScopeExitError, ScopeGuard},
    format::{annotation_of, format_report},
    instrument::{InstrumentExt, LogicalFuture},
    into_report::IntoReport,
    iterator_ext::IteratorExt,
    label::{ASYNC_PREFIX, ASYNC_SUFFIX, CallSite, Label, Signature},
    report::{Attachment, Report, ReportCollection},
    result_ext::ResultExt,
};

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    pub use alloc::format;
    #[doc(hidden)]
    pub use core::result::Result::Err;
}
