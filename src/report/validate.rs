//! Composable character-class validation for untrusted report fields.
//!
//! A field is valid when every character belongs to the union of the
//! requested classes (if any were requested) and the length bounds (when
//! nonzero) hold. The ingest path uses this to gate `crashappversion`
//! before the value participates in any catalog query.

use std::ops::BitOr;

/// A composable set of allowed character classes.
///
/// Compose with `|`: `CharClasses::DIGITS | CharClasses::WHITESPACE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharClasses(u8);

impl CharClasses {
    /// No class restriction — only length bounds apply.
    pub const NONE: Self = Self(0);
    /// ASCII digits `0-9`.
    pub const DIGITS: Self = Self(1);
    /// ASCII lowercase letters.
    pub const LOWERCASE: Self = Self(1 << 1);
    /// ASCII uppercase letters.
    pub const UPPERCASE: Self = Self(1 << 2);
    /// Unicode whitespace.
    pub const WHITESPACE: Self = Self(1 << 3);
    /// The fixed punctuation set `.,;:&"'?!()`.
    pub const PUNCTUATION: Self = Self(1 << 4);

    /// Returns `true` when no class restriction was requested.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` when `c` belongs to one of the requested classes.
    pub fn permits(self, c: char) -> bool {
        if self.0 & Self::DIGITS.0 != 0 && c.is_ascii_digit() {
            return true;
        }
        if self.0 & Self::LOWERCASE.0 != 0 && c.is_ascii_lowercase() {
            return true;
        }
        if self.0 & Self::UPPERCASE.0 != 0 && c.is_ascii_uppercase() {
            return true;
        }
        if self.0 & Self::WHITESPACE.0 != 0 && c.is_whitespace() {
            return true;
        }
        if self.0 & Self::PUNCTUATION.0 != 0
            && matches!(c, '.' | ',' | ';' | ':' | '&' | '"' | '\'' | '?' | '!' | '(' | ')')
        {
            return true;
        }
        false
    }
}

impl BitOr for CharClasses {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Validate a field value against character classes and length bounds.
///
/// Length bounds of `0` are unconstrained, matching the original contract
/// where only nonzero bounds were checked.
pub fn validate_field(value: &str, classes: CharClasses, min_len: usize, max_len: usize) -> bool {
    if !classes.is_empty() && !value.chars().all(|c| classes.permits(c)) {
        return false;
    }
    if min_len != 0 && value.len() < min_len {
        return false;
    }
    if max_len != 0 && value.len() > max_len {
        return false;
    }
    true
}

/// The class union allowed for `crashappversion` values.
pub fn version_classes() -> CharClasses {
    CharClasses::DIGITS | CharClasses::WHITESPACE | CharClasses::PUNCTUATION
}
