//! Field and property descriptors, and the events a field stream yields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describes one matchable node of a submission.
///
/// Descriptors are usually loaded from JSON, where the property mapping is
/// spelled `propertyName`:
///
/// ```json
/// { "name": "age", "path": "/age", "propertyName": "age" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Local name of the node (last path segment)
    pub name: String,

    /// Location below the submission root, e.g. `/meta/entity/label`
    pub path: String,

    /// XML attributes of the matched element, filled in by the stream
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,

    /// Entity property populated by this field's text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,

    /// Group node reported on its opening tag rather than for its text
    #[serde(default)]
    pub structural: bool,
}

impl FieldDescriptor {
    /// Creates a value field with no property mapping.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        FieldDescriptor {
            name: name.into(),
            path: path.into(),
            attrs: BTreeMap::new(),
            property_name: None,
            structural: false,
        }
    }

    /// Creates a structural (group) field.
    pub fn structure(name: impl Into<String>, path: impl Into<String>) -> Self {
        FieldDescriptor {
            structural: true,
            ..FieldDescriptor::new(name, path)
        }
    }

    /// Maps this field's text onto the given entity property.
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property_name = Some(property.into());
        self
    }
}

/// One matched node, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEvent {
    /// The matching descriptor, with `attrs` taken from the element
    pub field: FieldDescriptor,

    /// Unescaped text content (empty for structural nodes)
    pub text: String,
}

/// A dataset property exported as a CSV column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        PropertyDescriptor { name: name.into() }
    }
}
