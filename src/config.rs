//! Loading of per-run configuration: field descriptors and export properties.

use crate::error::Result;
use crate::field::{FieldDescriptor, PropertyDescriptor};
use log::debug;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Loads a JSON array of field descriptors.
pub fn load_fields(path: &Path) -> Result<Vec<FieldDescriptor>> {
    let fields: Vec<FieldDescriptor> = load_json(path)?;
    debug!("Loaded {} field descriptors from {}", fields.len(), path.display());
    Ok(fields)
}

/// Loads a JSON array of export properties.
pub fn load_properties(path: &Path) -> Result<Vec<PropertyDescriptor>> {
    let properties: Vec<PropertyDescriptor> = load_json(path)?;
    debug!("Loaded {} properties from {}", properties.len(), path.display());
    Ok(properties)
}

/// Derives export columns from the property-mapped fields, in field order.
///
/// Fields under the entity group feed system values, not properties, and
/// are left out.
pub fn properties_from_fields(fields: &[FieldDescriptor]) -> Vec<PropertyDescriptor> {
    fields
        .iter()
        .filter(|f| !f.path.starts_with("/meta/entity"))
        .filter_map(|f| f.property_name.as_deref())
        .map(PropertyDescriptor::new)
        .collect()
}
