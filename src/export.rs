//! Streaming CSV export of entities.
//!
//! [`EntityCsvStream`] turns entity rows into CSV records one at a time and
//! owns the header policy: the header goes out exactly once, ahead of the
//! first data row, or on its own when there are no entities at all.
//! [`write_entity_csv`] drives the stream into a `csv::Writer`.

use crate::error::{EntityError, Result};
use crate::field::PropertyDescriptor;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Fixed leading columns of every export.
const FIXED_COLUMNS: [&str; 2] = ["name", "label"];

/// An entity as handed to the exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRow {
    /// Entity id, exported in the `name` column
    pub uuid: String,

    pub label: String,

    /// Current entity definition
    pub def: EntityDef,
}

/// Versioned definition of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Property values keyed by property name
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Builds the CSV header for the given properties.
pub fn entity_csv_header(properties: &[PropertyDescriptor]) -> Vec<String> {
    FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(properties.iter().map(|p| p.name.clone()))
        .collect()
}

/// Iterator adapter from entity rows to CSV records, header first.
///
/// Pulls exactly one entity per data row, so nothing is buffered beyond the
/// item held back while the header is emitted. The first error, whether from
/// upstream or from formatting, is yielded once and ends the stream. A
/// formatting error on the very first entity still follows the header.
pub struct EntityCsvStream<I> {
    rows: I,
    header: Vec<String>,
    properties: Vec<String>,
    header_sent: bool,
    pending: Option<Result<Vec<String>>>,
    position: usize,
    finished: bool,
}

impl<I> EntityCsvStream<I>
where
    I: Iterator<Item = Result<EntityRow>>,
{
    pub fn new(properties: &[PropertyDescriptor], rows: I) -> Self {
        EntityCsvStream {
            rows,
            header: entity_csv_header(properties),
            properties: properties.iter().map(|p| p.name.clone()).collect(),
            header_sent: false,
            pending: None,
            position: 0,
            finished: false,
        }
    }

    fn take_header(&mut self) -> Vec<String> {
        self.header_sent = true;
        debug!("Emitting CSV header with {} columns", self.header.len());
        std::mem::take(&mut self.header)
    }

    fn fail(&mut self, err: EntityError) -> Option<Result<Vec<String>>> {
        self.finished = true;
        Some(Err(err))
    }
}

impl<I> Iterator for EntityCsvStream<I>
where
    I: Iterator<Item = Result<EntityRow>>,
{
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.pending.take() {
            return Some(item);
        }
        if self.finished {
            return None;
        }

        match self.rows.next() {
            Some(Ok(entity)) => {
                self.position += 1;
                let item = format_row(&entity, &self.properties, self.position);
                if item.is_err() {
                    self.finished = true;
                } else {
                    trace!("Formatted entity {} at row {}", entity.uuid, self.position);
                }

                if self.header_sent {
                    Some(item)
                } else {
                    self.pending = Some(item);
                    Some(Ok(self.take_header()))
                }
            }
            Some(Err(e)) => self.fail(e),
            None => {
                self.finished = true;
                if self.header_sent {
                    None
                } else {
                    Some(Ok(self.take_header()))
                }
            }
        }
    }
}

/// Formats one entity as `[uuid, label, ...property values]`.
///
/// Properties missing from the entity become empty cells. An entity with an
/// empty `uuid` is rejected: its `name` cell would not identify it.
fn format_row(entity: &EntityRow, properties: &[String], position: usize) -> Result<Vec<String>> {
    if entity.uuid.is_empty() {
        return Err(EntityError::InvalidRecord {
            row: position,
            message: "entity has no uuid".to_string(),
        });
    }

    let mut row = Vec::with_capacity(FIXED_COLUMNS.len() + properties.len());
    row.push(entity.uuid.clone());
    row.push(entity.label.clone());
    for prop in properties {
        row.push(entity.def.data.get(prop).cloned().unwrap_or_default());
    }
    Ok(row)
}

/// Streams entities to `writer` as CSV.
///
/// Returns the number of entities written. On error, the rows already
/// written are flushed as far as possible and the original error is
/// returned.
pub fn write_entity_csv<I, W>(
    properties: &[PropertyDescriptor],
    rows: I,
    writer: W,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<EntityRow>>,
    W: Write,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut records = 0usize;

    for row in EntityCsvStream::new(properties, rows.into_iter()) {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                if let Err(flush_err) = csv_writer.flush() {
                    warn!("Failed to flush CSV output after error: {}", flush_err);
                }
                return Err(e);
            }
        };
        csv_writer.write_record(&row)?;
        records += 1;
    }

    csv_writer.flush()?;

    // Every export has exactly one header record.
    let entities = records.saturating_sub(1);
    debug!("Exported {} entities", entities);
    Ok(entities)
}

/// Reads entity rows from a stream of JSON values (typically JSON lines).
///
/// Rows are decoded lazily; a malformed value ends the sequence with an
/// error.
pub fn read_entity_rows<R: Read>(reader: R) -> impl Iterator<Item = Result<EntityRow>> {
    serde_json::Deserializer::from_reader(reader)
        .into_iter::<EntityRow>()
        .map(|row| row.map_err(EntityError::from))
}
