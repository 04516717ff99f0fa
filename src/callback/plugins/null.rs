//! Null callback plugin.
//!
//! Produces no output at all. Useful when the caller only needs the returned
//! report, and in tests.

use async_trait::async_trait;

use crate::callback::RunCallback;

/// Callback that suppresses all output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NullCallback;

impl NullCallback {
    /// Creates a new null callback.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RunCallback for NullCallback {}
