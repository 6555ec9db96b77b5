//! Declared specification sets.
//!
//! A product declares its specifications as a JSON object mapping each
//! dimension to the values a shopper may pick, e.g.
//! `{"spec": ["red / XL", "blue / L"]}`.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Specifications(BTreeMap<String, Vec<String>>);

impl Specifications {
    /// Parse a stored specification document.
    ///
    /// # Errors
    ///
    /// Returns an error when the document is not an object of string arrays.
    pub fn parse(document: &str) -> Result<Self, serde_json::Error> {
        if document.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(document)
    }

    /// Whether `specification`, ignoring surrounding whitespace, is one of the
    /// declared values.
    pub fn contains(&self, specification: &str) -> bool {
        let wanted = specification.trim();

        !wanted.is_empty()
            && self
                .0
                .values()
                .flatten()
                .any(|declared| declared.trim() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn membership_ignores_surrounding_whitespace() -> TestResult {
        let specs = Specifications::parse(r#"{"spec": ["red / XL", "blue / L"]}"#)?;

        assert!(specs.contains("  red / XL "));
        assert!(specs.contains("blue / L"));
        assert!(!specs.contains("green / S"));

        Ok(())
    }

    #[test]
    fn blank_specification_is_never_a_member() -> TestResult {
        let specs = Specifications::parse(r#"{"spec": [""]}"#)?;

        assert!(!specs.contains("   "));

        Ok(())
    }

    #[test]
    fn empty_document_declares_nothing() -> TestResult {
        let specs = Specifications::parse("")?;

        assert!(!specs.contains("red"));

        Ok(())
    }

    #[test]
    fn rejects_non_array_values() {
        assert!(Specifications::parse(r#"{"spec": "red"}"#).is_err());
    }
}
