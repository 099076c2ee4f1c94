use serde::{Deserialize, Serialize};

/// Field types supported by the field system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    LongText,
    Integer,
    Float,
    Boolean,
    Timestamp,
    EntityReference,
}

impl FieldType {
    /// Get the SQL type for this field type
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Text | FieldType::LongText => "TEXT",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "REAL",
            FieldType::Boolean => "INTEGER", // SQLite uses 0/1 for boolean
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::EntityReference => "TEXT", // Store reference ID
        }
    }

    /// Check if this field type requires additional configuration
    pub fn requires_config(&self) -> bool {
        matches!(self, FieldType::EntityReference)
    }

    /// Check if values of this field type compare numerically
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }

    /// Check if this field type is a reference to another entity
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::EntityReference)
    }
}

/// Field definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    /// Hidden fields are stored but excluded from projections, filters and sorts
    #[serde(default)]
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub email_format: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl Field {
    /// Create a new field with minimal configuration
    pub fn new(id: impl Into<String>, field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type,
            label: label.into(),
            required: false,
            unique: false,
            hidden: false,
            description: None,
            max_length: None,
            min_value: None,
            email_format: false,
            target_entity: None,
            default_value: None,
        }
    }

    /// Set the field as required
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Set a unique constraint on the field
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Exclude the field from projections, filters and sorts
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Set the field description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the maximum character length for text values
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set the minimum accepted numeric value
    pub fn with_min_value(mut self, min_value: f64) -> Self {
        self.min_value = Some(min_value);
        self
    }

    /// Require values to look like an email address
    pub fn email(mut self) -> Self {
        self.email_format = true;
        self
    }

    /// Set the target entity for entity reference fields
    pub fn with_target_entity(mut self, target: impl Into<String>) -> Self {
        self.target_entity = Some(target.into());
        self
    }

    /// Set a literal SQL default for the column
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Get the SQL column definition for this field
    pub fn to_sql_column(&self) -> String {
        let mut column_def = format!("{} {}", self.id, self.field_type.sql_type());

        if self.required {
            column_def.push_str(" NOT NULL");
        }

        if self.unique {
            column_def.push_str(" UNIQUE");
        }

        if let Some(default) = &self.default_value {
            column_def.push_str(&format!(" DEFAULT '{}'", default));
        }

        column_def
    }

    /// Validate the field configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("Field ID cannot be empty".to_string());
        }

        if self.label.is_empty() {
            return Err(format!("Field '{}' label cannot be empty", self.id));
        }

        if self.field_type == FieldType::EntityReference && self.target_entity.is_none() {
            return Err(format!(
                "Field '{}' is an entity_reference but has no target_entity",
                self.id
            ));
        }

        if self.min_value.is_some() && !self.field_type.is_numeric() {
            return Err(format!(
                "Field '{}' has min_value but is not numeric",
                self.id
            ));
        }

        Ok(())
    }
}
