#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
//! Internal implementation crate for [`logical-stack`].
//!
//! # Overview
//!
//! This crate contains the policy-free building blocks behind the
//! [`logical-stack`] diagnostic stack:
//!
//! - **[`stack`]**: [`Stack`], a persistent last-in-first-out list whose
//!   push and pop return new values and never mutate existing ones.
//! - **[`cell`]**: [`Context`], the ambient map of values that follows a
//!   logical operation, and [`PropagatedCell`], one typed slot in it.
//!   [`LocalStack`] combines the two.
//! - **[`propagate`]**: [`Propagated`], the future wrapper that carries a
//!   [`Context`] across suspension points and worker threads.
//!
//! **This crate is an implementation detail.** No semantic versioning
//! guarantees are provided. Users should depend on [`logical-stack`].
//!
//! # Why an immutable stack
//!
//! Sibling futures forked from the same point start out sharing the same
//! [`Stack`] value. Since no operation mutates a node, they can each push
//! and pop on their own copy without locks and without observing each
//! other.
//!
//! [`logical-stack`]: https://docs.rs/logical-stack/latest/logical_stack/

extern crate alloc;

pub mod cell;
pub mod propagate;
pub mod stack;

pub use cell::{Context, LocalStack, PropagatedCell};
pub use propagate::{PropagateExt, Propagated};
pub use stack::{EmptyStackError, Stack};
