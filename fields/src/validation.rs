use crate::{Field, FieldType, FieldsError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // Unwrap is safe: the pattern is a compile-time constant
    Regex::new(r"^[\w.+-]+@[\w-]+(\.[\w-]+)+$").unwrap()
});

/// Field validator for validating field values
pub struct FieldValidator;

impl FieldValidator {
    /// Validate a field value against its field definition
    pub fn validate_field_value(field: &Field, value: &JsonValue) -> Result<()> {
        if value.is_null() {
            if field.required {
                return Err(FieldsError::Validation(format!(
                    "Required field '{}' cannot be null",
                    field.id
                )));
            }
            return Ok(());
        }

        match field.field_type {
            FieldType::Text | FieldType::LongText => Self::validate_text(field, value)?,
            FieldType::Integer => Self::validate_integer(field, value)?,
            FieldType::Float => Self::validate_float(field, value)?,
            FieldType::Boolean => Self::validate_boolean(field, value)?,
            FieldType::Timestamp => Self::validate_timestamp(field, value)?,
            FieldType::EntityReference => Self::validate_entity_reference(field, value)?,
        }

        Ok(())
    }

    /// Validate every field of a definition against a value map, joining all
    /// failures into one message so the caller can report them together
    pub fn validate_all(fields: &[Field], values: &serde_json::Map<String, JsonValue>) -> Result<()> {
        let mut messages = Vec::new();

        for field in fields {
            match values.get(&field.id) {
                None | Some(JsonValue::Null) => {
                    if field.required && field.default_value.is_none() {
                        messages.push(format!("{} is required", field.label));
                    }
                }
                Some(value) => {
                    if let Err(e) = Self::validate_field_value(field, value) {
                        messages.push(e.to_string());
                    }
                }
            }
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(FieldsError::Validation(messages.join(", ")))
        }
    }

    /// Validate text field value and its length/format constraints
    fn validate_text(field: &Field, value: &JsonValue) -> Result<()> {
        let Some(text) = value.as_str() else {
            return Err(FieldsError::TypeConversion(format!(
                "Field '{}' expects a string value",
                field.id
            )));
        };

        if field.required && text.trim().is_empty() {
            return Err(FieldsError::Validation(format!(
                "{} cannot be empty",
                field.label
            )));
        }

        if let Some(max_length) = field.max_length {
            if text.chars().count() > max_length {
                return Err(FieldsError::Validation(format!(
                    "{} cannot be longer than {} characters",
                    field.label, max_length
                )));
            }
        }

        if field.email_format && !EMAIL_PATTERN.is_match(text) {
            return Err(FieldsError::Validation(format!(
                "{} must be a valid email address",
                field.label
            )));
        }

        Ok(())
    }

    /// Validate integer field value
    fn validate_integer(field: &Field, value: &JsonValue) -> Result<()> {
        let parsed = if let Some(n) = value.as_i64() {
            Some(n)
        } else if let Some(s) = value.as_str() {
            s.parse::<i64>().ok()
        } else {
            None
        };

        let Some(n) = parsed else {
            return Err(FieldsError::TypeConversion(format!(
                "Field '{}' expects an integer value",
                field.id
            )));
        };

        if let Some(min) = field.min_value {
            if (n as f64) < min {
                return Err(FieldsError::Validation(format!(
                    "{} must be at least {}",
                    field.label, min
                )));
            }
        }

        Ok(())
    }

    /// Validate float field value
    fn validate_float(field: &Field, value: &JsonValue) -> Result<()> {
        let parsed = if let Some(n) = value.as_f64() {
            Some(n)
        } else if let Some(s) = value.as_str() {
            s.parse::<f64>().ok()
        } else {
            None
        };

        let Some(n) = parsed else {
            return Err(FieldsError::TypeConversion(format!(
                "Field '{}' expects a numeric value",
                field.id
            )));
        };

        if let Some(min) = field.min_value {
            if n < min {
                return Err(FieldsError::Validation(format!(
                    "{} must be at least {}",
                    field.label, min
                )));
            }
        }

        Ok(())
    }

    /// Validate boolean field value
    fn validate_boolean(field: &Field, value: &JsonValue) -> Result<()> {
        if !value.is_boolean() {
            // Accept 0/1 as boolean values
            if let Some(n) = value.as_i64() {
                if n != 0 && n != 1 {
                    return Err(FieldsError::TypeConversion(format!(
                        "Field '{}' expects a boolean value (true/false or 0/1)",
                        field.id
                    )));
                }
            } else {
                return Err(FieldsError::TypeConversion(format!(
                    "Field '{}' expects a boolean value",
                    field.id
                )));
            }
        }
        Ok(())
    }

    /// Validate timestamp field value
    fn validate_timestamp(field: &Field, value: &JsonValue) -> Result<()> {
        if let Some(s) = value.as_str() {
            if chrono::DateTime::parse_from_rfc3339(s).is_err() {
                return Err(FieldsError::Validation(format!(
                    "Field '{}' expects a valid ISO 8601 datetime string",
                    field.id
                )));
            }
        } else {
            return Err(FieldsError::TypeConversion(format!(
                "Field '{}' expects a datetime string",
                field.id
            )));
        }
        Ok(())
    }

    /// Validate entity reference field value
    fn validate_entity_reference(field: &Field, value: &JsonValue) -> Result<()> {
        if field.target_entity.is_none() {
            return Err(FieldsError::Validation(format!(
                "Field '{}' is missing target_entity configuration",
                field.id
            )));
        }

        // Entity references are string IDs
        if !value.is_string() {
            return Err(FieldsError::TypeConversion(format!(
                "Field '{}' expects a string ID for entity reference",
                field.id
            )));
        }

        Ok(())
    }
}
