/// Proof that a response has been written for the current request.
///
/// This is a zero-sized type returned by every write-class method of
/// [`ResponseWriter`](crate::ResponseWriter). It cannot be constructed outside
/// this crate, so an [`Outcome::Written`] always means a writer actually
/// produced a response.
#[derive(Debug)]
#[must_use = "a Written token should be returned as the Outcome of the hook or handler"]
pub struct Written {
    // Private field prevents construction outside the crate
    _private: (),
}

impl Written {
    /// Creates a new Written token.
    ///
    /// This is `pub(crate)` so only the engine can mint it.
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// What a Before hook or a handler did with the response.
///
/// # Examples
///
/// ```compile_fail
/// use safeflight::{Outcome, Written};
///
/// // Written cannot be forged:
/// let outcome = Outcome::Written(Written { _private: () });
/// ```
#[derive(Debug)]
#[must_use]
pub enum Outcome {
    /// A response was written; the chain stops here.
    Written(Written),
    /// Nothing was written; the chain continues.
    NotWritten,
}

impl Outcome {
    /// Returns `Ok(Outcome::NotWritten)`, the usual result of a Before hook
    /// that only sets headers.
    pub fn not_written<E>() -> Result<Outcome, E> {
        Ok(Outcome::NotWritten)
    }

    /// Returns true for [`Outcome::Written`].
    pub fn is_written(&self) -> bool {
        matches!(self, Outcome::Written(_))
    }
}

impl From<Written> for Outcome {
    fn from(written: Written) -> Self {
        Outcome::Written(written)
    }
}
