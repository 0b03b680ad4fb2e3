//! Per-field validation errors shared by the HTTP services
//!
//! Serializes as `{"field": ["message", ...]}` so clients can attach each
//! message to the offending input.

use serde::Serialize;
use std::collections::BTreeMap;

/// Validation messages keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Create an empty set of errors
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding a single message
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a message against a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Record the error of a field check, if any
    pub fn check(&mut self, field: &str, result: Result<(), String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    /// Messages recorded for a field
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing was recorded, the errors otherwise
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_messages_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("email", "This field is required.");
        errors.check("email", Err("Enter a valid email address.".to_string()));
        errors.check("name", Ok(()));

        assert_eq!(errors.get("email").map(|m| m.len()), Some(2));
        assert!(errors.get("name").is_none());
        assert!(errors.clone().into_result().is_err());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let errors = FieldErrors::single("price", "A valid number is required.");
        let json = serde_json::to_string(&errors).unwrap();
        assert_eq!(json, r#"{"price":["A valid number is required."]}"#);
    }

    #[test]
    fn test_empty_is_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
