//! Time-sortable unique identifiers.

use crate::error::Error;
use std::sync::{Mutex, PoisonError};
use ulid::Ulid;

/// A thread-safe, monotonic ULID source.
///
/// IDs are timestamp-seeded and strictly increasing within a millisecond, so
/// they double as creation timestamps and sort keys. The generator is passed
/// explicitly to everything that mints IDs rather than living in a global, and
/// a single instance may be shared across listener tasks.
pub struct IdGenerator(Mutex<ulid::Generator>);

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self(Mutex::new(ulid::Generator::new()))
    }

    /// Generate the next ULID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdGeneration`] if the random component overflows
    /// within the current millisecond.
    pub fn generate(&self) -> Result<Ulid, Error> {
        let mut gen = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        gen.generate().map_err(|_| Error::IdGeneration)
    }
}

#[cfg(test)]
mod tests {
    use super::IdGenerator;

    #[test]
    fn ids_are_distinct_and_increasing() {
        let ids = IdGenerator::new();
        let mut previous = ids.generate().unwrap();
        for _ in 0..1_000 {
            let next = ids.generate().unwrap();
            assert!(next > previous);
            previous = next;
        }
    }
}
