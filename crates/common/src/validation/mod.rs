// Validation Module - field-level validation framework
use std::fmt;

/// Type alias for validation results
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error with detailed field-level errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Create with a single field error
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.add_field_error(field, message);
        err
    }

    /// Add a field-level error
    pub fn add_field_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Check if there are any errors
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get error count
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Get errors for a specific field
    pub fn field_errors(&self, field: &str) -> Vec<&FieldError> {
        self.errors.iter().filter(|e| e.field == field).collect()
    }

    /// Names of every field that failed, in the order they were checked
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "Validation error with no specific field errors")?;
        } else if self.errors.len() == 1 {
            write!(f, "Validation failed: {}: {}", self.errors[0].field, self.errors[0].message)?;
        } else {
            write!(f, "Validation failed with {} errors: ", self.errors.len())?;
            for (i, error) in self.errors.iter().enumerate() {
                if i > 0 {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", error.field, error.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Individual field error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// Accumulating validator: every check records a field error instead of
/// returning early, so callers see all violated rules at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationError,
}

impl Validator {
    /// Create a new validator
    pub fn new() -> Self {
        Self { errors: ValidationError::new() }
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.add_field_error(field, message);
    }

    /// Validate a value lies within `[min, max]` (inclusive)
    pub fn validate_range<T>(&mut self, field: &str, value: T, min: T, max: T)
    where
        T: PartialOrd + fmt::Display,
    {
        // NaN compares false against both bounds, so check containment
        // positively rather than looking for an out-of-range comparison.
        if !(value >= min && value <= max) {
            self.add_error(field, format!("must be between {} and {}", min, max));
        }
    }

    /// Validate minimum value
    pub fn validate_min<T>(&mut self, field: &str, value: T, min: T)
    where
        T: PartialOrd + fmt::Display,
    {
        if !(value >= min) {
            self.add_error(field, format!("must be at least {}", min));
        }
    }

    /// Validate string is not empty
    pub fn validate_not_empty(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add_error(field, "cannot be empty");
        }
    }

    /// Validate string length in characters (not bytes)
    pub fn validate_max_length(&mut self, field: &str, value: &str, max: usize) {
        let length = value.chars().count();
        if length > max {
            self.add_error(field, format!("must not exceed {} characters (got {})", max, length));
        }
    }

    /// Check if validation has errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get error count
    pub fn error_count(&self) -> usize {
        self.errors.error_count()
    }

    /// Get errors without consuming validator
    pub fn errors(&self) -> &ValidationError {
        &self.errors
    }

    /// Finalize and return result
    pub fn finalize(self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_validator_finalizes_ok() {
        let validator = Validator::new();
        assert!(!validator.has_errors());
        assert!(validator.finalize().is_ok());
    }

    #[test]
    fn range_is_inclusive() {
        let mut validator = Validator::new();
        validator.validate_range("lat", -90.0, -90.0, 90.0);
        validator.validate_range("lat", 90.0, -90.0, 90.0);
        assert!(!validator.has_errors());

        validator.validate_range("lat", 90.0001, -90.0, 90.0);
        assert_eq!(validator.error_count(), 1);
    }

    #[test]
    fn nan_fails_range_and_min_checks() {
        let mut validator = Validator::new();
        validator.validate_range("lon", f64::NAN, -180.0, 180.0);
        validator.validate_min("mass", f64::NAN, 0.0);
        assert_eq!(validator.error_count(), 2);
    }

    #[test]
    fn max_length_counts_characters() {
        let mut validator = Validator::new();
        // 3 characters, 6 bytes
        validator.validate_max_length("name", "äöü", 3);
        assert!(!validator.has_errors());

        validator.validate_max_length("name", "äöüß", 3);
        assert_eq!(validator.errors().field_errors("name").len(), 1);
    }

    #[test]
    fn display_lists_every_field() {
        let mut err = ValidationError::field("a", "bad");
        err.add_field_error("b", "worse");
        assert_eq!(err.to_string(), "Validation failed with 2 errors: a: bad; b: worse");
        assert_eq!(err.fields(), vec!["a", "b"]);
    }
}
