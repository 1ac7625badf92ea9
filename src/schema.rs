//! Typed field descriptors. The schema governs which normalizer is
//! applied before comparison and which built-in strategies are
//! admissible for a field.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, ResolverError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameComponent {
    First,
    Last,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Name,
    Email,
    Phone,
    Date,
    Number,
    String,
    Boolean,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Number)
    }
}

/// Format hints further qualifying a field, e.g. expected date formats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatHints {
    pub date_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub field_type: FieldType,
    pub name_component: Option<NameComponent>,
    pub format_hints: FormatHints,
}

impl FieldDescriptor {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            name_component: None,
            format_hints: FormatHints::default(),
        }
    }

    pub fn name(component: NameComponent) -> Self {
        Self {
            field_type: FieldType::Name,
            name_component: Some(component),
            format_hints: FormatHints::default(),
        }
    }

    pub fn with_date_formats(mut self, formats: impl IntoIterator<Item = String>) -> Self {
        self.format_hints.date_formats = formats.into_iter().collect();
        self
    }
}

/// An ordered mapping from field name to [`FieldDescriptor`]; order is
/// preserved because downstream components (blocking clauses, match
/// configs) iterate fields in schema order for deterministic output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: IndexMap<String, FieldDescriptor>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldDescriptor)> {
        self.fields.iter()
    }

    pub fn validate(&self) -> Result<(), ResolverError> {
        let mut seen = std::collections::HashSet::new();
        for name in self.fields.keys() {
            if !seen.insert(name) {
                let mut ctx = ErrorContext::new();
                ctx.insert("field".to_string(), name.clone());
                return Err(ResolverError::configuration_with(
                    format!("duplicate field '{name}' in schema"),
                    ctx,
                ));
            }
        }
        Ok(())
    }
}
