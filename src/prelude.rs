//! Commonly used items for convenient importing.
//!
//! ```rust
//! use logical_stack::prelude::*;
//!
//! fn divide(a: i32, b: i32) -> Result<i32, Report> {
//!     let _frame = enter!("Math.divide(i32 a, i32 b)");
//!     if b == 0 {
//!         bail!("cannot divide by zero");
//!     }
//!     Ok(a / b)
//! }
//!
//! let report = divide(1, 0).unwrap_err();
//! assert!(report.to_logical_string().contains("   Math.divide(i32 a, i32 b) in "));
//! ```

pub use crate::{
    DiagnosticStack, InstrumentExt, IteratorExt, PropagateExt, Report, ResultExt, bail, enter,
    report,
};
