//! Double SHA-256 writer.

use crate::engine::Sha256Engine;
use crate::sha256::{Sha256, OUTPUT_SIZE};

/// Incremental SHA-256(SHA-256(data)).
#[derive(Clone, Debug, Default)]
pub struct Hash256 {
    inner: Sha256,
}

impl Hash256 {
    /// Create a writer on the installed engine.
    pub fn new() -> Self {
        Hash256 {
            inner: Sha256::new(),
        }
    }

    /// Create a writer pinned to `engine`.
    pub fn with_engine(engine: &'static Sha256Engine) -> Self {
        Hash256 {
            inner: Sha256::with_engine(engine),
        }
    }

    /// Append `data` to the inner hash.
    ///
    /// # Returns
    /// `self`, for chaining.
    pub fn write(&mut self, data: &[u8]) -> &mut Self {
        self.inner.write(data);
        self
    }

    /// Hash the accumulated data, then hash that digest again.
    pub fn finalize(self) -> [u8; OUTPUT_SIZE] {
        let engine = self.inner.engine();
        let first = self.inner.finalize();
        let mut outer = Sha256::with_engine(engine);
        outer.write(&first);
        outer.finalize()
    }

    /// Discard everything written so far.
    pub fn reset(&mut self) -> &mut Self {
        self.inner.reset();
        self
    }
}
