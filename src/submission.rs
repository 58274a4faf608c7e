//! Streams field events out of submission XML.
//!
//! The stream walks the document once, tracking the path of every open
//! element below the submission root. Elements whose path matches a
//! [`FieldDescriptor`] produce a [`FieldEvent`]:
//!
//! - value fields when they close, carrying their text;
//! - structural fields when they open, carrying their attributes, if
//!   structural capture was requested.
//!
//! Element names are compared by local name, so `<orx:meta>` matches
//! `/meta`. Attribute keys keep their prefixes (`entities:dataset`).

use crate::error::{EntityError, Result};
use crate::field::{FieldDescriptor, FieldEvent};
use log::trace;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::io::BufRead;

/// Lazy iterator of field events over one submission.
///
/// Yields `Some(Ok(event))` per matched node, `None` once the root element
/// has closed and input is exhausted, or a single `Some(Err(_))` on
/// malformed input after which it is fused.
pub struct FieldStream<'f, R: BufRead> {
    reader: Reader<R>,
    fields: &'f [FieldDescriptor],
    include_structural: bool,
    buf: Vec<u8>,
    open: Vec<OpenElement>,
    root_seen: bool,
    done: bool,
}

/// Bookkeeping for an element that has not closed yet.
struct OpenElement {
    name: String,
    path: String,
    attrs: BTreeMap<String, String>,
    text: String,
    field: Option<usize>,
}

/// Owned form of the reader events the stream reacts to.
enum Step {
    Open(String, BTreeMap<String, String>),
    OpenClose(String, BTreeMap<String, String>),
    Close(String),
    Text(String),
    Eof,
}

impl<'f, R: BufRead> FieldStream<'f, R> {
    /// Creates a stream over `xml` matching against `fields`.
    ///
    /// `include_structural` enables events for structural descriptors such
    /// as the `meta/entity` node.
    pub fn new(fields: &'f [FieldDescriptor], xml: R, include_structural: bool) -> Self {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        FieldStream {
            reader,
            fields,
            include_structural,
            buf: Vec::new(),
            open: Vec::new(),
            root_seen: false,
            done: false,
        }
    }

    /// Reads until the next field event, end of input or error.
    fn advance(&mut self) -> Result<Option<FieldEvent>> {
        loop {
            self.buf.clear();
            let step = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) => {
                    let (name, attrs) = element_parts(&start)?;
                    Step::Open(name, attrs)
                }
                Event::Empty(start) => {
                    let (name, attrs) = element_parts(&start)?;
                    Step::OpenClose(name, attrs)
                }
                Event::End(end) => {
                    Step::Close(String::from_utf8_lossy(end.local_name().as_ref()).into_owned())
                }
                Event::Text(text) => Step::Text(text.unescape()?.into_owned()),
                Event::CData(cdata) => {
                    Step::Text(String::from_utf8_lossy(&cdata.into_inner()).into_owned())
                }
                Event::Eof => Step::Eof,
                _ => continue,
            };

            let event = match step {
                Step::Open(name, attrs) => self.open_element(name, attrs)?,
                Step::OpenClose(name, attrs) => {
                    let opened = self.open_element(name.clone(), attrs)?;
                    let closed = self.close_element(&name)?;
                    opened.or(closed)
                }
                Step::Close(name) => self.close_element(&name)?,
                Step::Text(text) => {
                    if let Some(current) = self.open.last_mut() {
                        current.text.push_str(&text);
                    }
                    None
                }
                Step::Eof => return self.finish().map(|_| None),
            };

            if event.is_some() {
                return Ok(event);
            }
        }
    }

    fn open_element(
        &mut self,
        name: String,
        attrs: BTreeMap<String, String>,
    ) -> Result<Option<FieldEvent>> {
        let path = match self.open.last() {
            Some(parent) => format!("{}/{}", parent.path, name),
            None if self.root_seen => {
                return Err(malformed(format!(
                    "second root element <{}> after the submission root closed",
                    name
                )));
            }
            None => {
                // The submission root itself is not addressable by path.
                self.root_seen = true;
                String::new()
            }
        };

        let field = if path.is_empty() {
            None
        } else {
            self.fields.iter().position(|f| f.path == path)
        };

        let event = match field {
            Some(idx) if self.fields[idx].structural && self.include_structural => {
                trace!("Structural field {} opened", path);
                Some(self.event_for(idx, attrs.clone(), String::new()))
            }
            _ => None,
        };

        self.open.push(OpenElement {
            name,
            path,
            attrs,
            text: String::new(),
            field,
        });

        Ok(event)
    }

    fn close_element(&mut self, name: &str) -> Result<Option<FieldEvent>> {
        let element = self
            .open
            .pop()
            .ok_or_else(|| malformed(format!("closing tag </{}> without an open element", name)))?;

        if element.name != name {
            return Err(malformed(format!(
                "closing tag </{}> does not match <{}>",
                name, element.name
            )));
        }

        match element.field {
            Some(idx) if !self.fields[idx].structural => {
                trace!("Field {} closed", element.path);
                Ok(Some(self.event_for(idx, element.attrs, element.text)))
            }
            _ => Ok(None),
        }
    }

    fn finish(&self) -> Result<()> {
        if let Some(element) = self.open.last() {
            return Err(malformed(format!(
                "unexpected end of input inside <{}>",
                element.name
            )));
        }
        if !self.root_seen {
            return Err(malformed("document has no root element".to_string()));
        }
        Ok(())
    }

    fn event_for(&self, idx: usize, attrs: BTreeMap<String, String>, text: String) -> FieldEvent {
        let mut field = self.fields[idx].clone();
        field.attrs = attrs;
        FieldEvent { field, text }
    }
}

impl<R: BufRead> Iterator for FieldStream<'_, R> {
    type Item = Result<FieldEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.advance() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Extracts the local name and attributes of an opening tag.
fn element_parts(start: &BytesStart<'_>) -> Result<(String, BTreeMap<String, String>)> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attrs = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }

    Ok((name, attrs))
}

fn malformed(message: String) -> EntityError {
    EntityError::MalformedXml { message }
}
