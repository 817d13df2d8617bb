//! Streaming extraction of export entities
//!
//! The export is read event by event with `quick-xml`; no document tree is
//! ever built. Each element's attributes are copied out and the event buffer
//! is reused for the next element, so memory stays flat however large the
//! export grows. The one element held across events is the currently open
//! `Record`, which collects its nested `MetadataEntry` children until its end
//! tag arrives.

use crate::error::{IngestError, Result};
use crate::export::models::{
    AttributeList, ElementKind, EntityKind, ExportEntity, MetadataEntry, Record,
};
use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Byte source of an opened export
pub type ExportSource = Box<dyn BufRead + Send>;

/// Forward-only iterator over the entities of an export
pub struct ExportExtractor<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    capture_metadata: bool,
    max_elements: Option<u64>,
    emitted: u64,
    open_record: Option<Record>,
    done: bool,
}

impl ExportExtractor<ExportSource> {
    /// Open an export file, decompressing `.gz` exports on the fly
    ///
    /// Fails with [`IngestError::MissingInputFile`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| IngestError::MissingInputFile {
            path: path.to_path_buf(),
            source,
        })?;

        let gzipped = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

        let source: ExportSource = if gzipped {
            debug!(path = %path.display(), "Reading gzip-compressed export");
            Box::new(BufReader::new(GzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        Ok(Self::from_reader(source))
    }
}

impl<R: BufRead> ExportExtractor<R> {
    pub fn from_reader(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);

        Self {
            reader,
            buf: Vec::with_capacity(4096),
            capture_metadata: false,
            max_elements: None,
            emitted: 0,
            open_record: None,
            done: false,
        }
    }

    /// Collect `MetadataEntry` children of records
    pub fn with_metadata(mut self, capture: bool) -> Self {
        self.capture_metadata = capture;
        self
    }

    /// Stop after this many entities
    pub fn with_limit(mut self, max_elements: Option<u64>) -> Self {
        self.max_elements = max_elements;
        self
    }

    /// Number of entities yielded so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn next_entity(&mut self) -> Result<Option<ExportEntity>> {
        if self.max_elements.is_some_and(|max| self.emitted >= max) {
            debug!(limit = self.emitted, "Element limit reached");
            return Ok(None);
        }

        loop {
            self.buf.clear();

            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => match ElementKind::classify(e.name().as_ref()) {
                    ElementKind::Entity(EntityKind::Record) => {
                        self.open_record = Some(Record::from_attributes(collect_attributes(&e)?));
                    },
                    ElementKind::Entity(kind) => {
                        let entity = kind.build(collect_attributes(&e)?);
                        self.emitted += 1;
                        return Ok(Some(entity));
                    },
                    ElementKind::MetadataEntry => {
                        capture_entry(&mut self.open_record, self.capture_metadata, &e)?;
                    },
                    ElementKind::Unrecognized => {},
                },
                Event::Empty(e) => match ElementKind::classify(e.name().as_ref()) {
                    ElementKind::Entity(kind) => {
                        let entity = kind.build(collect_attributes(&e)?);
                        self.emitted += 1;
                        return Ok(Some(entity));
                    },
                    ElementKind::MetadataEntry => {
                        capture_entry(&mut self.open_record, self.capture_metadata, &e)?;
                    },
                    ElementKind::Unrecognized => {},
                },
                Event::End(e) => {
                    if e.name().as_ref() == EntityKind::Record.tag().as_bytes() {
                        if let Some(record) = self.open_record.take() {
                            self.emitted += 1;
                            return Ok(Some(ExportEntity::Record(record)));
                        }
                    }
                },
                Event::Eof => return Ok(None),
                _ => {},
            }
        }
    }
}

impl<R: BufRead> Iterator for ExportExtractor<R> {
    type Item = Result<ExportEntity>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_entity() {
            Ok(Some(entity)) => Some(Ok(entity)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            },
        }
    }
}

/// Copy an element's attributes out of the event buffer
fn collect_attributes(element: &BytesStart<'_>) -> Result<AttributeList> {
    let mut attrs = AttributeList::new();

    for attr in element.attributes() {
        let attr = attr.map_err(|e| IngestError::parse(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| IngestError::parse(e.to_string()))?;
        attrs.push(String::from_utf8_lossy(attr.key.as_ref()), value);
    }

    Ok(attrs)
}

/// Attach a metadata entry to the open record, if capture is on
fn capture_entry(
    open_record: &mut Option<Record>,
    capture: bool,
    element: &BytesStart<'_>,
) -> Result<()> {
    if !capture {
        return Ok(());
    }

    if let Some(record) = open_record.as_mut() {
        record
            .metadata
            .push(MetadataEntry::from_attributes(collect_attributes(element)?));
    }

    Ok(())
}
