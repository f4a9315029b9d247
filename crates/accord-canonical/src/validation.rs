use thiserror::Error;

/// Rejection of an identifier or digest at a parse boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Text length falls outside the accepted range for its kind.
    #[error("{kind} must be {min}..={max} characters, got {len}")]
    Length {
        /// Kind of value being parsed.
        kind: &'static str,
        /// Observed length.
        len: usize,
        /// Shortest accepted length.
        min: usize,
        /// Longest accepted length.
        max: usize,
    },
    /// Text contains characters outside the alphabet for its kind.
    #[error("{kind} contains characters outside {alphabet}: '{value}'")]
    Alphabet {
        /// Kind of value being parsed.
        kind: &'static str,
        /// Human-readable description of the accepted characters.
        alphabet: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Character set and length range a textual value must satisfy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextRule {
    pub kind: &'static str,
    pub min: usize,
    pub max: usize,
    pub alphabet: &'static str,
    pub allowed: fn(char) -> bool,
}

impl TextRule {
    pub(crate) fn check(&self, value: &str) -> Result<(), ValidationError> {
        let len = value.chars().count();
        if len < self.min || len > self.max {
            return Err(ValidationError::Length {
                kind: self.kind,
                len,
                min: self.min,
                max: self.max,
            });
        }
        if !value.chars().all(self.allowed) {
            return Err(ValidationError::Alphabet {
                kind: self.kind,
                alphabet: self.alphabet,
                value: value.to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn is_base64url(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

pub(crate) fn is_name(c: char) -> bool {
    is_base64url(c) || c == '.' || c == ':'
}

pub(crate) fn is_lower_hex(c: char) -> bool {
    c.is_ascii_digit() || ('a'..='f').contains(&c)
}

pub(crate) const LOWER_HEX: &str = "lowercase hex";

#[cfg(test)]
mod tests {
    use super::*;

    const RULE: TextRule = TextRule {
        kind: "sample",
        min: 2,
        max: 4,
        alphabet: LOWER_HEX,
        allowed: is_lower_hex,
    };

    #[test]
    fn length_is_checked_before_alphabet() {
        assert_eq!(
            RULE.check("zzzzz"),
            Err(ValidationError::Length {
                kind: "sample",
                len: 5,
                min: 2,
                max: 4
            })
        );
    }

    #[test]
    fn alphabet_violation_reports_value() {
        let err = RULE.check("AB").unwrap_err();
        assert!(err.to_string().contains("'AB'"));
        assert!(RULE.check("ab").is_ok());
    }
}
