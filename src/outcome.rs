/// Result of a guarded call.
///
/// `Skipped` is a normal outcome, not an error: the key's lock was already
/// held, so the wrapped function was never invoked. It is deliberately
/// distinguishable from `Completed(())` so that callers never have to guess
/// whether the body ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The lock was acquired and the wrapped function ran to completion.
    Completed(T),
    /// The lock was held by another call; the wrapped function did not run.
    Skipped,
}

impl<T> Outcome<T> {
    /// Returns `true` if the wrapped function ran.
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    /// Returns `true` if the call was skipped because the lock was held.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }

    /// Converts into `Some(value)` if the wrapped function ran, `None` if
    /// the call was skipped.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Skipped => None,
        }
    }
}

impl<T> From<Outcome<T>> for Option<T> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_accessors() {
        let outcome = Outcome::Completed(7);
        assert!(outcome.is_completed());
        assert!(!outcome.is_skipped());
        assert_eq!(outcome.completed(), Some(7));
    }

    #[test]
    fn skipped_accessors() {
        let outcome: Outcome<u32> = Outcome::Skipped;
        assert!(outcome.is_skipped());
        assert_eq!(outcome.completed(), None);
        assert_eq!(Option::<u32>::from(outcome), None);
    }

    #[test]
    fn skipped_is_distinct_from_unit_completion() {
        assert_ne!(Outcome::Completed(()), Outcome::Skipped);
    }
}
