//! # Views
//!
//! A view declares, for one collection, which names a filter may reference,
//! their types, and the storage expression each maps to. Views are immutable
//! once built and safe to share between requests.

mod records;
mod results;

use std::collections::BTreeMap;

use crate::cel::{Literal, Type};

pub use records::{records, RECORDS_VIEW};
pub use results::{results, RESULTS_VIEW, SUMMARY_MESSAGE};

/// Public field name to storage column renames
pub const COLUMN_RENAMES: &[(&str, &str)] = &[
    ("uid", "id"),
    ("create_time", "created_time"),
    ("update_time", "updated_time"),
    ("data_type", "type"),
];

/// Storage column for a public field name
pub fn column_for(name: &str) -> &str {
    COLUMN_RENAMES
        .iter()
        .find(|(public, _)| *public == name)
        .map(|(_, column)| *column)
        .unwrap_or(name)
}

/// A field a filter may reference
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Public name used in filters
    pub name: String,
    /// Declared type
    pub ty: Type,
    /// SQL expression the field maps to
    pub column: String,
}

/// A nested message type whose fields can be selected
#[derive(Debug, Clone, PartialEq)]
pub struct MessageType {
    pub name: String,
    fields: BTreeMap<String, Type>,
}

impl MessageType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    pub fn field_type(&self, name: &str) -> Option<&Type> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Literal value of a named constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantValue {
    String(String),
    Int32(i32),
}

impl ConstantValue {
    pub fn ty(&self) -> Type {
        match self {
            ConstantValue::String(_) => Type::String,
            ConstantValue::Int32(_) => Type::Int,
        }
    }

    pub fn literal(&self) -> Literal {
        match self {
            ConstantValue::String(s) => Literal::String(s.clone()),
            ConstantValue::Int32(v) => Literal::Int(i64::from(*v)),
        }
    }
}

/// Field and constant declarations for one collection
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    name: &'static str,
    fields: BTreeMap<String, FieldDescriptor>,
    constants: BTreeMap<String, ConstantValue>,
    messages: BTreeMap<String, MessageType>,
}

impl View {
    pub fn builder(name: &'static str) -> ViewBuilder {
        ViewBuilder {
            view: View {
                name,
                fields: BTreeMap::new(),
                constants: BTreeMap::new(),
                messages: BTreeMap::new(),
            },
        }
    }

    /// Collection name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolve a field by public name
    pub fn resolve(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&ConstantValue> {
        self.constants.get(name)
    }

    pub fn message(&self, name: &str) -> Option<&MessageType> {
        self.messages.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn constants(&self) -> impl Iterator<Item = (&str, &ConstantValue)> {
        self.constants.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Builder for [`View`]
#[derive(Debug)]
pub struct ViewBuilder {
    view: View,
}

impl ViewBuilder {
    /// Declare a field stored under its renamed column
    pub fn field(self, name: &str, ty: Type) -> Self {
        let column = column_for(name).to_string();
        self.field_with_column(name, ty, column)
    }

    pub fn field_with_column(mut self, name: &str, ty: Type, column: impl Into<String>) -> Self {
        self.view.fields.insert(
            name.to_string(),
            FieldDescriptor {
                name: name.to_string(),
                ty,
                column: column.into(),
            },
        );
        self
    }

    pub fn message(mut self, message: MessageType) -> Self {
        self.view.messages.insert(message.name.clone(), message);
        self
    }

    pub fn constant(mut self, name: &str, value: ConstantValue) -> Self {
        self.view.constants.insert(name.to_string(), value);
        self
    }

    pub fn build(self) -> View {
        self.view
    }
}

/// Record type names shared by both views
pub(crate) const RECORD_TYPES: &[(&str, &str)] = &[
    ("PIPELINE_RUN", "tekton.dev/v1.PipelineRun"),
    ("TASK_RUN", "tekton.dev/v1.TaskRun"),
    ("LOG", "results.tekton.dev/v1alpha3.Log"),
    ("EVENT_LIST", "results.tekton.dev/v1.EventList"),
];
