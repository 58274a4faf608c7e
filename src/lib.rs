//! # Entity Export
//!
//! Extracts entity records from form submission XML and streams entities
//! out as CSV.
//!
//! ## Design Principles
//!
//! - **Pull-based streaming**: XML is read and CSV is written one item at a time
//! - **Explicit results**: every stage is an iterator of `Result`, fused on the first error
//! - **Stable columns**: every CSV row has `2 + properties` cells, missing values are empty
//! - **Deterministic output**: the same input always produces the same entity
//!
//! ## Example
//!
//! ```no_run
//! use entity_export::{parse_entity, write_entity_csv, FieldDescriptor, PropertyDescriptor};
//!
//! let fields = vec![
//!     FieldDescriptor::structure("entity", "/meta/entity"),
//!     FieldDescriptor::new("id", "/meta/entity/id"),
//!     FieldDescriptor::new("label", "/meta/entity/label"),
//!     FieldDescriptor::new("age", "/age").with_property("age"),
//! ];
//! let xml = r#"<data><age>42</age><meta><entity dataset="people">
//!   <id>uuid:1</id><label>Alice</label></entity></meta></data>"#;
//!
//! let entity = parse_entity(&fields, xml.as_bytes()).unwrap();
//! let properties = vec![PropertyDescriptor::new("age")];
//! write_entity_csv(&properties, [entity.into_row()], std::io::stdout()).unwrap();
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod export;
pub mod field;
pub mod submission;

pub use entity::{extract_entity, parse_entity, EntityBuilder, EntityRecord, SystemFields};
pub use error::{EntityError, Result};
pub use export::{
    entity_csv_header, read_entity_rows, write_entity_csv, EntityCsvStream, EntityDef, EntityRow,
};
pub use field::{FieldDescriptor, FieldEvent, PropertyDescriptor};
pub use submission::FieldStream;
