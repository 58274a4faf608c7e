//! Entity extraction from submission XML.
//!
//! A submission that creates or updates an entity carries a `meta/entity`
//! group. Its attributes name the target dataset, its children hold system
//! values such as the label, and ordinary form fields mapped to a dataset
//! property hold the entity's data:
//!
//! ```xml
//! <data xmlns:entities="http://www.opendatakit.org/xforms">
//!   <first_name>Alice</first_name>
//!   <meta>
//!     <entity entities:dataset="people" id="uuid:1234">
//!       <label>Alice</label>
//!     </entity>
//!   </meta>
//! </data>
//! ```

use crate::error::{EntityError, Result};
use crate::export::{EntityDef, EntityRow};
use crate::field::{FieldDescriptor, FieldEvent};
use crate::submission::FieldStream;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;

/// Path prefix of the entity group and everything below it.
const ENTITY_PATH: &str = "/meta/entity";

/// Name of the structural field carrying the dataset attributes.
const ENTITY_FIELD: &str = "entity";

/// Prefix some clients put in front of instance and entity ids.
const UUID_PREFIX: &str = "uuid:";

/// Structural attributes of an entity.
///
/// `dataset`, `id` and `label` are typed; any other system value (version
/// markers and the like) is kept by name in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl SystemFields {
    /// Looks up a system value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "dataset" => self.dataset.as_deref(),
            "id" => self.id.as_deref(),
            "label" => self.label.as_deref(),
            _ => self.extra.get(name).map(String::as_str),
        }
    }

    fn set(&mut self, name: &str, value: String) {
        match name {
            "dataset" => self.dataset = Some(value),
            "id" => self.id = Some(value),
            "label" => self.label = Some(value),
            _ => {
                self.extra.insert(name.to_string(), value);
            }
        }
    }
}

/// An entity extracted from one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    system: SystemFields,
    data: BTreeMap<String, String>,
}

impl EntityRecord {
    pub fn system(&self) -> &SystemFields {
        &self.system
    }

    /// Property values keyed by property name.
    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    /// Converts the record into an exportable row.
    ///
    /// The row's `uuid` is the entity id without its `uuid:` prefix. Both
    /// id and label must be present.
    pub fn into_row(self) -> Result<EntityRow> {
        let id = self
            .system
            .id
            .ok_or(EntityError::MissingField { field: "id" })?;
        let label = self
            .system
            .label
            .ok_or(EntityError::MissingField { field: "label" })?;

        let uuid = id.strip_prefix(UUID_PREFIX).unwrap_or(&id).to_string();

        Ok(EntityRow {
            uuid,
            label,
            def: EntityDef { data: self.data },
        })
    }
}

/// Accumulates an [`EntityRecord`] from field events.
///
/// Later values for the same key replace earlier ones.
#[derive(Debug, Default)]
pub struct EntityBuilder {
    system: SystemFields,
    data: BTreeMap<String, String>,
}

impl EntityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or clears) the dataset name.
    pub fn dataset(&mut self, dataset: Option<String>) -> &mut Self {
        self.system.dataset = dataset;
        self
    }

    /// Sets a system value by name.
    pub fn system(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.system.set(name, value.into());
        self
    }

    /// Sets a property value.
    pub fn property(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.data.insert(name.into(), value.into());
        self
    }

    /// Folds one field event into the entity.
    pub fn apply(&mut self, event: FieldEvent) -> &mut Self {
        let FieldEvent { field, text } = event;

        if field.name == ENTITY_FIELD && !field.attrs.is_empty() {
            let dataset = resolve_dataset(&field.attrs);
            if dataset.is_none() {
                warn!("Entity node has attributes but no dataset name");
            }
            self.dataset(dataset);
        } else if field.structural {
            trace!("Structural field {} carries nothing to capture", field.path);
        } else if field.path.starts_with(ENTITY_PATH) {
            self.system(&field.name, text);
        } else if let Some(property) = field.property_name {
            self.property(property, text);
        } else {
            trace!("Ignoring field {} with no entity mapping", field.path);
        }

        self
    }

    /// Completes the entity.
    pub fn finish(self) -> EntityRecord {
        EntityRecord {
            system: self.system,
            data: self.data,
        }
    }
}

/// Picks the dataset name from the entity node's attributes.
///
/// An unprefixed `dataset` wins over `entities:dataset`.
fn resolve_dataset(attrs: &BTreeMap<String, String>) -> Option<String> {
    attrs
        .get("dataset")
        .filter(|name| !name.is_empty())
        .or_else(|| attrs.get("entities:dataset"))
        .cloned()
}

/// Reduces a sequence of field events into an entity.
///
/// Stops at the first error; no partial entity is returned.
pub fn extract_entity<I>(events: I) -> Result<EntityRecord>
where
    I: IntoIterator<Item = Result<FieldEvent>>,
{
    let mut builder = EntityBuilder::new();
    for event in events {
        builder.apply(event?);
    }
    Ok(builder.finish())
}

/// Parses one submission into an entity.
///
/// `fields` should contain the structural `meta/entity` descriptor, the
/// descriptors for system values under it, and the property-mapped form
/// fields.
pub fn parse_entity<R: BufRead>(fields: &[FieldDescriptor], xml: R) -> Result<EntityRecord> {
    let entity = extract_entity(FieldStream::new(fields, xml, true))?;
    debug!(
        "Extracted entity {:?} for dataset {:?} with {} properties",
        entity.system.id,
        entity.system.dataset,
        entity.data.len()
    );
    Ok(entity)
}
