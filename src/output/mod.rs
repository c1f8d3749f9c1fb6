//! Deferred output handling.
//!
//! Realized resources produce output attributes (identifiers, ARNs,
//! endpoint URLs) that downstream declarations consume before the
//! values exist. This module provides the shared [`OutputHandle`]
//! reference type and the [`OutputResolver`] that suspends callers
//! until a producer has been realized.

mod handle;
mod resolver;

pub use handle::OutputHandle;
pub use resolver::{OutputMap, OutputResolver};
