//! GPX track point parsing
//!
//! Tags are compared by local name, so `trkpt`, `gpx:trkpt` and friends all
//! match. Elevation and time are read only from direct children of a point.

use crate::error::{IngestError, Result};
use crate::export::models::parse_number;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One `trkpt`, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackPoint {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub ele: Option<f64>,
    pub time: Option<String>,
}

impl TrackPoint {
    pub fn at(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            ..Self::default()
        }
    }

    /// `(lat, lon)` when both are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointField {
    Elevation,
    Time,
}

/// Point being read plus the direct child whose text is wanted
struct OpenPoint {
    point: TrackPoint,
    depth: usize,
    field: Option<PointField>,
    text: String,
}

pub fn parse_gpx_file(path: &Path) -> Result<Vec<TrackPoint>> {
    parse_gpx(BufReader::new(File::open(path)?))
}

pub fn parse_gpx<R: BufRead>(source: R) -> Result<Vec<TrackPoint>> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut points = Vec::new();
    let mut open: Option<OpenPoint> = None;

    loop {
        buf.clear();

        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match open.as_mut() {
                Some(current) => {
                    current.depth += 1;
                    if current.depth == 1 {
                        current.field = point_field(e.local_name().as_ref());
                        current.text.clear();
                    }
                },
                None if e.local_name().as_ref() == b"trkpt" => {
                    open = Some(OpenPoint {
                        point: start_point(&e)?,
                        depth: 0,
                        field: None,
                        text: String::new(),
                    });
                },
                None => {},
            },
            Event::Empty(e) => {
                if open.is_none() && e.local_name().as_ref() == b"trkpt" {
                    points.push(start_point(&e)?);
                }
            },
            Event::Text(t) => {
                if let Some(current) = open.as_mut() {
                    if current.depth == 1 && current.field.is_some() {
                        current.text.push_str(&String::from_utf8_lossy(&t));
                    }
                }
            },
            Event::End(_) => match open.take() {
                Some(mut current) if current.depth > 0 => {
                    if current.depth == 1 {
                        match current.field.take() {
                            Some(PointField::Elevation) => {
                                current.point.ele = parse_number(&current.text);
                            },
                            Some(PointField::Time) => {
                                let text = std::mem::take(&mut current.text);
                                current.point.time = (!text.is_empty()).then_some(text);
                            },
                            None => {},
                        }
                    }
                    current.depth -= 1;
                    open = Some(current);
                },
                Some(current) => points.push(current.point),
                None => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(points)
}

fn point_field(local_name: &[u8]) -> Option<PointField> {
    match local_name {
        b"ele" => Some(PointField::Elevation),
        b"time" => Some(PointField::Time),
        _ => None,
    }
}

fn start_point(element: &BytesStart<'_>) -> Result<TrackPoint> {
    let mut point = TrackPoint::default();

    for attr in element.attributes() {
        let attr = attr.map_err(|e| IngestError::parse(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| IngestError::parse(e.to_string()))?;

        match attr.key.local_name().as_ref() {
            b"lat" => point.lat = parse_number(&value),
            b"lon" => point.lon = parse_number(&value),
            _ => {},
        }
    }

    Ok(point)
}
