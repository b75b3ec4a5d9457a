//! Input schemas declared by plugins
//!
//! A schema is a flat set of named fields with a type and a required flag.
//! It is checked by the validator before a plugin is invoked and can be
//! exported as JSON Schema for callers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Schema field type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Enum(Vec<String>),
    Any,
}

/// Schema for a single field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSchema {
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// Declared shape of a plugin's request payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InputSchema {
    pub fields: BTreeMap<String, FieldSchema>,
}

impl InputSchema {
    pub fn builder() -> InputSchemaBuilder {
        InputSchemaBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check a single present value against its field declaration
    pub fn check_field(&self, name: &str, value: &Value) -> Option<String> {
        let schema = self.fields.get(name)?;
        check_type(name, value, &schema.field_type).err()
    }

    /// Names of required fields absent from the payload
    pub fn missing_required<'a>(
        &'a self,
        payload: &'a serde_json::Map<String, Value>,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(name, field)| field.required && !payload.contains_key(*name))
            .map(|(name, _)| name.as_str())
    }

    /// Convert to JSON Schema format
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for (field_name, field_schema) in &self.fields {
            let mut property = field_type_to_json_schema(&field_schema.field_type);
            if !field_schema.description.is_empty() {
                property["description"] = json!(field_schema.description);
            }
            properties.insert(field_name.clone(), property);
            if field_schema.required {
                required.push(Value::String(field_name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }
}

/// Builder for input schemas
#[derive(Debug, Default)]
pub struct InputSchemaBuilder {
    fields: BTreeMap<String, FieldSchema>,
}

impl InputSchemaBuilder {
    pub fn field(mut self, name: &str, field_type: FieldType, required: bool, description: &str) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldSchema {
                field_type,
                required,
                description: description.to_string(),
            },
        );
        self
    }

    pub fn string_field(self, name: &str, required: bool, description: &str) -> Self {
        self.field(name, FieldType::String, required, description)
    }

    pub fn integer_field(self, name: &str, required: bool, description: &str) -> Self {
        self.field(name, FieldType::Integer, required, description)
    }

    pub fn number_field(self, name: &str, required: bool, description: &str) -> Self {
        self.field(name, FieldType::Number, required, description)
    }

    pub fn boolean_field(self, name: &str, required: bool, description: &str) -> Self {
        self.field(name, FieldType::Boolean, required, description)
    }

    pub fn enum_field(self, name: &str, values: &[&str], required: bool, description: &str) -> Self {
        let values = values.iter().map(|v| v.to_string()).collect();
        self.field(name, FieldType::Enum(values), required, description)
    }

    pub fn build(self) -> InputSchema {
        InputSchema { fields: self.fields }
    }
}

fn check_type(name: &str, value: &Value, field_type: &FieldType) -> Result<(), String> {
    match field_type {
        FieldType::String if !value.is_string() => {
            Err(format!("Field '{}' must be a string", name))
        }
        FieldType::Integer if !value.is_i64() && !value.is_u64() => {
            Err(format!("Field '{}' must be an integer", name))
        }
        FieldType::Number if !value.is_number() => {
            Err(format!("Field '{}' must be a number", name))
        }
        FieldType::Boolean if !value.is_boolean() => {
            Err(format!("Field '{}' must be a boolean", name))
        }
        FieldType::Array if !value.is_array() => {
            Err(format!("Field '{}' must be an array", name))
        }
        FieldType::Object if !value.is_object() => {
            Err(format!("Field '{}' must be an object", name))
        }
        FieldType::Enum(valid_values) => match value.as_str() {
            Some(s) if valid_values.iter().any(|v| v == s) => Ok(()),
            Some(_) => Err(format!("Field '{}' must be one of: {:?}", name, valid_values)),
            None => Err(format!("Field '{}' must be a string enum value", name)),
        },
        _ => Ok(()),
    }
}

fn field_type_to_json_schema(field_type: &FieldType) -> Value {
    match field_type {
        FieldType::String => json!({"type": "string"}),
        FieldType::Integer => json!({"type": "integer"}),
        FieldType::Number => json!({"type": "number"}),
        FieldType::Boolean => json!({"type": "boolean"}),
        FieldType::Array => json!({"type": "array"}),
        FieldType::Object => json!({"type": "object"}),
        FieldType::Enum(values) => json!({"type": "string", "enum": values}),
        FieldType::Any => json!({}),
    }
}
