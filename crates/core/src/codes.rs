//! Promo-code usability rules and code generation.
//!
//! A code is usable iff it is active, has uses remaining (or is
//! unlimited), and has not expired. The database-side consume applies
//! the same predicate atomically; this module is the single place the
//! rule (and its human-readable rejection reasons) is written down.

use crate::types::Timestamp;

/// Length of auto-generated codes (admin creation and compensation).
pub const GENERATED_CODE_LEN: usize = 8;

const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Canonical form of a user-supplied code: trimmed and uppercased.
pub fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Generate a random code of `len` characters (A–Z, 0–9).
pub fn generate_code(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Outcome of evaluating the usability predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeUsability {
    Usable,
    /// No active code with this value exists.
    Invalid,
    /// Finite use count reached zero.
    FullyUsed,
    /// `expires_at` is in the past.
    Expired,
}

impl CodeUsability {
    /// Human-readable rejection reason; empty for `Usable`.
    pub fn reason(&self) -> &'static str {
        match self {
            CodeUsability::Usable => "",
            CodeUsability::Invalid => "Invalid promo code",
            CodeUsability::FullyUsed => "This code has been fully used",
            CodeUsability::Expired => "This code has expired",
        }
    }
}

/// Evaluate the usability invariant for a code row (or its absence).
///
/// `uses_remaining = None` means unlimited; `expires_at = None` means no
/// expiry. Expiry is checked even when uses remain.
pub fn evaluate(
    found_active: bool,
    uses_remaining: Option<i64>,
    expires_at: Option<Timestamp>,
    now: Timestamp,
) -> CodeUsability {
    if !found_active {
        return CodeUsability::Invalid;
    }
    if let Some(expiry) = expires_at {
        if expiry <= now {
            return CodeUsability::Expired;
        }
    }
    if let Some(uses) = uses_remaining {
        if uses <= 0 {
            return CodeUsability::FullyUsed;
        }
    }
    CodeUsability::Usable
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize("  free99 "), "FREE99");
    }

    #[test]
    fn generated_codes_use_allowed_alphabet() {
        let code = generate_code(GENERATED_CODE_LEN);
        assert_eq!(code.len(), GENERATED_CODE_LEN);
        assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
    }

    #[test]
    fn generated_codes_differ() {
        assert_ne!(generate_code(16), generate_code(16));
    }

    #[test]
    fn unknown_code_is_invalid() {
        assert_eq!(
            evaluate(false, None, None, Utc::now()),
            CodeUsability::Invalid
        );
    }

    #[test]
    fn unlimited_unexpired_code_is_usable() {
        assert_eq!(
            evaluate(true, None, None, Utc::now()),
            CodeUsability::Usable
        );
    }

    #[test]
    fn zero_uses_is_fully_used() {
        assert_eq!(
            evaluate(true, Some(0), None, Utc::now()),
            CodeUsability::FullyUsed
        );
    }

    #[test]
    fn expiry_rejects_even_with_uses_remaining() {
        let now = Utc::now();
        assert_eq!(
            evaluate(true, Some(5), Some(now - Duration::hours(1)), now),
            CodeUsability::Expired
        );
    }

    #[test]
    fn future_expiry_is_usable() {
        let now = Utc::now();
        assert_eq!(
            evaluate(true, Some(1), Some(now + Duration::hours(1)), now),
            CodeUsability::Usable
        );
    }
}
