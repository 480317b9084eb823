//! Primitive types shared by the openEHR and FHIR sides of Ferry.
//!
//! - [`CodedText`]: a terminology-bound value (system, code, display) as found in openEHR
//!   `DV_CODED_TEXT` and FHIR `Coding`.
//! - [`CodeField`]: names one of the three parts of a [`CodedText`].

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing shared text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input did not name one of `code`, `terminology` or `value`
    #[error("unknown coded text field: {0}")]
    UnknownCodeField(String),
}

/// A value bound to a terminology.
///
/// Any part may be missing: flat files frequently carry only the display text, or only the
/// code and its terminology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodedText {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
}

impl CodedText {
    pub fn new(
        system: Option<String>,
        code: Option<String>,
        display: Option<String>,
    ) -> Self {
        Self {
            system: system.filter(|s| !s.is_empty()),
            code: code.filter(|s| !s.is_empty()),
            display: display.filter(|s| !s.is_empty()),
        }
    }

    /// Plain text with no terminology binding.
    pub fn text(display: impl Into<String>) -> Self {
        Self::new(None, None, Some(display.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.system.is_none() && self.code.is_none() && self.display.is_none()
    }

    /// Returns the part of this value named by `field`.
    pub fn field(&self, field: CodeField) -> Option<&str> {
        match field {
            CodeField::Code => self.code.as_deref(),
            CodeField::Terminology => self.system.as_deref(),
            CodeField::Value => self.display.as_deref(),
        }
    }
}

/// One of the three parts of a grouped coded concept.
///
/// The names match the suffixes used in openEHR flat files (`substance|code`,
/// `substance|terminology`, `substance|value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeField {
    Code,
    Terminology,
    Value,
}

impl CodeField {
    pub const ALL: [CodeField; 3] = [CodeField::Terminology, CodeField::Code, CodeField::Value];

    pub fn as_str(self) -> &'static str {
        match self {
            CodeField::Code => "code",
            CodeField::Terminology => "terminology",
            CodeField::Value => "value",
        }
    }
}

impl fmt::Display for CodeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeField {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(CodeField::Code),
            "terminology" => Ok(CodeField::Terminology),
            "value" => Ok(CodeField::Value),
            other => Err(TextError::UnknownCodeField(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_text_drops_empty_parts() {
        let coded = CodedText::new(Some(String::new()), Some("at0102".into()), None);
        assert_eq!(coded.system, None);
        assert_eq!(coded.field(CodeField::Code), Some("at0102"));
        assert!(!coded.is_empty());
        assert!(CodedText::default().is_empty());
    }

    #[test]
    fn code_field_parses_flat_file_suffixes() {
        assert_eq!("terminology".parse::<CodeField>(), Ok(CodeField::Terminology));
        assert!(matches!(
            "magnitude".parse::<CodeField>(),
            Err(TextError::UnknownCodeField(f)) if f == "magnitude"
        ));
    }
}
