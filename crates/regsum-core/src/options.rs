//! Process-wide reporting options
//!
//! A single global setting: the default number of display digits, used
//! by the summary builder only when a configuration leaves `digits`
//! unset. Resolution happens once, at the configuration boundary, via
//! [`resolve_digits`].

use std::sync::atomic::{AtomicUsize, Ordering};

/// Display digits used when neither the config nor the process sets one
pub const FALLBACK_DIGITS: usize = 2;

const UNSET: usize = usize::MAX;

static DEFAULT_DIGITS: AtomicUsize = AtomicUsize::new(UNSET);

/// Set the process-wide default display digits
pub fn set_default_digits(digits: usize) {
    DEFAULT_DIGITS.store(digits, Ordering::Relaxed);
}

/// Clear the process-wide default, restoring the built-in fallback
pub fn clear_default_digits() {
    DEFAULT_DIGITS.store(UNSET, Ordering::Relaxed);
}

/// Current process-wide default, if one has been set
pub fn default_digits() -> Option<usize> {
    match DEFAULT_DIGITS.load(Ordering::Relaxed) {
        UNSET => None,
        d => Some(d),
    }
}

/// Resolve an optional per-call digit setting against the process default
pub fn resolve_digits(explicit: Option<usize>) -> usize {
    explicit
        .or_else(default_digits)
        .unwrap_or(FALLBACK_DIGITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the default is process-global, so exercising the whole
    // fallback chain in one place avoids cross-test interference.
    #[test]
    fn digits_fallback_chain() {
        clear_default_digits();
        assert_eq!(default_digits(), None);
        assert_eq!(resolve_digits(None), FALLBACK_DIGITS);
        assert_eq!(resolve_digits(Some(5)), 5);

        set_default_digits(3);
        assert_eq!(default_digits(), Some(3));
        assert_eq!(resolve_digits(None), 3);
        assert_eq!(resolve_digits(Some(1)), 1);

        clear_default_digits();
        assert_eq!(resolve_digits(None), FALLBACK_DIGITS);
    }
}
