//! Typed entities of the health export
//!
//! Every recognized element becomes one of a closed set of shapes. Attributes
//! are pulled out of an [`AttributeList`] by name; whatever is left over on the
//! opaque kinds (clinical records, audiograms, vision prescriptions) is kept
//! in order and stored as a JSON object.

use crate::error::Result;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Sentinel stored for absent descriptive attributes
pub const UNKNOWN: &str = "Unknown";

/// Parse a numeric attribute permissively
///
/// Surrounding whitespace is ignored. Empty, unparsable and non-finite values
/// all become `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Attributes of one element, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList(Vec<(String, String)>);

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Set a value, replacing an existing key in place
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove an attribute and return its value
    pub fn take(&mut self, key: &str) -> Option<String> {
        let position = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(position).1)
    }

    /// Remove a descriptive attribute, falling back to [`UNKNOWN`]
    pub fn text(&mut self, key: &str) -> String {
        self.take(key).unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Remove a numeric attribute, parsed with [`parse_number`]
    pub fn number(&mut self, key: &str) -> Option<f64> {
        self.take(key).as_deref().and_then(parse_number)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize as a JSON object, keeping attribute order
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl FromIterator<(String, String)> for AttributeList {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for AttributeList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Who produced an entity
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub source_name: String,
    pub source_version: String,
    pub device: String,
}

impl SourceInfo {
    fn take_from(attrs: &mut AttributeList) -> Self {
        Self {
            source_name: attrs.text("sourceName"),
            source_version: attrs.text("sourceVersion"),
            device: attrs.text("device"),
        }
    }
}

/// Creation, start and end timestamps as written in the export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timestamps {
    pub creation_date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl Timestamps {
    fn take_from(attrs: &mut AttributeList) -> Self {
        Self {
            creation_date: attrs.take("creationDate"),
            start_date: attrs.take("startDate"),
            end_date: attrs.take("endDate"),
        }
    }
}

/// Key/value pair nested inside a record
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub key: Option<String>,
    pub value: Option<String>,
}

impl MetadataEntry {
    pub fn from_attributes(mut attrs: AttributeList) -> Self {
        Self {
            key: attrs.take("key"),
            value: attrs.take("value"),
        }
    }
}

/// A single timestamped measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub record_type: String,
    pub unit: String,
    /// Raw value; coerced to a number only in the normalized view
    pub value: Option<String>,
    pub source: SourceInfo,
    pub times: Timestamps,
    pub metadata: Vec<MetadataEntry>,
}

impl Record {
    pub fn from_attributes(mut attrs: AttributeList) -> Self {
        Self {
            record_type: attrs.text("type"),
            unit: attrs.text("unit"),
            value: attrs.take("value"),
            source: SourceInfo::take_from(&mut attrs),
            times: Timestamps::take_from(&mut attrs),
            metadata: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workout {
    pub activity_type: String,
    pub duration: Option<f64>,
    pub duration_unit: String,
    pub total_energy_burned: Option<f64>,
    pub total_energy_burned_unit: String,
    pub total_distance: Option<f64>,
    pub total_distance_unit: String,
    pub source: SourceInfo,
    pub times: Timestamps,
}

impl Workout {
    pub fn from_attributes(mut attrs: AttributeList) -> Self {
        Self {
            activity_type: attrs.text("workoutActivityType"),
            duration: attrs.number("duration"),
            duration_unit: attrs.text("durationUnit"),
            total_energy_burned: attrs.number("totalEnergyBurned"),
            total_energy_burned_unit: attrs.text("totalEnergyBurnedUnit"),
            total_distance: attrs.number("totalDistance"),
            total_distance_unit: attrs.text("totalDistanceUnit"),
            source: SourceInfo::take_from(&mut attrs),
            times: Timestamps::take_from(&mut attrs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub correlation_type: String,
    pub source: SourceInfo,
    pub times: Timestamps,
}

impl Correlation {
    pub fn from_attributes(mut attrs: AttributeList) -> Self {
        Self {
            correlation_type: attrs.text("type"),
            source: SourceInfo::take_from(&mut attrs),
            times: Timestamps::take_from(&mut attrs),
        }
    }
}

/// Daily activity ring totals and goals
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySummary {
    pub date_components: Option<String>,
    pub active_energy_burned: Option<f64>,
    pub active_energy_burned_goal: Option<f64>,
    pub active_energy_burned_unit: String,
    pub apple_move_time: Option<f64>,
    pub apple_move_time_goal: Option<f64>,
    pub apple_exercise_time: Option<f64>,
    pub apple_exercise_time_goal: Option<f64>,
    pub apple_stand_hours: Option<f64>,
    pub apple_stand_hours_goal: Option<f64>,
}

impl ActivitySummary {
    pub fn from_attributes(mut attrs: AttributeList) -> Self {
        Self {
            date_components: attrs.take("dateComponents"),
            active_energy_burned: attrs.number("activeEnergyBurned"),
            active_energy_burned_goal: attrs.number("activeEnergyBurnedGoal"),
            active_energy_burned_unit: attrs.text("activeEnergyBurnedUnit"),
            apple_move_time: attrs.number("appleMoveTime"),
            apple_move_time_goal: attrs.number("appleMoveTimeGoal"),
            apple_exercise_time: attrs.number("appleExerciseTime"),
            apple_exercise_time_goal: attrs.number("appleExerciseTimeGoal"),
            apple_stand_hours: attrs.number("appleStandHours"),
            apple_stand_hours_goal: attrs.number("appleStandHoursGoal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalRecord {
    pub record_type: String,
    pub source: SourceInfo,
    pub times: Timestamps,
    pub display_name: String,
    /// Attributes without a dedicated column
    pub extra: AttributeList,
}

impl ClinicalRecord {
    pub fn from_attributes(mut attrs: AttributeList) -> Self {
        Self {
            record_type: attrs.text("type"),
            source: SourceInfo::take_from(&mut attrs),
            times: Timestamps::take_from(&mut attrs),
            display_name: attrs.text("displayName"),
            extra: attrs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Audiogram {
    pub source: SourceInfo,
    pub times: Timestamps,
    pub extra: AttributeList,
}

impl Audiogram {
    pub fn from_attributes(mut attrs: AttributeList) -> Self {
        Self {
            source: SourceInfo::take_from(&mut attrs),
            times: Timestamps::take_from(&mut attrs),
            extra: attrs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisionPrescription {
    pub source: SourceInfo,
    pub times: Timestamps,
    pub extra: AttributeList,
}

impl VisionPrescription {
    pub fn from_attributes(mut attrs: AttributeList) -> Self {
        Self {
            source: SourceInfo::take_from(&mut attrs),
            times: Timestamps::take_from(&mut attrs),
            extra: attrs,
        }
    }
}

/// Kinds of entity the export carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Record,
    Workout,
    Correlation,
    ActivitySummary,
    ClinicalRecord,
    Audiogram,
    VisionPrescription,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Record,
        EntityKind::Workout,
        EntityKind::Correlation,
        EntityKind::ActivitySummary,
        EntityKind::ClinicalRecord,
        EntityKind::Audiogram,
        EntityKind::VisionPrescription,
    ];

    /// Element tag name in the export
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::Record => "Record",
            EntityKind::Workout => "Workout",
            EntityKind::Correlation => "Correlation",
            EntityKind::ActivitySummary => "ActivitySummary",
            EntityKind::ClinicalRecord => "ClinicalRecord",
            EntityKind::Audiogram => "Audiogram",
            EntityKind::VisionPrescription => "VisionPrescription",
        }
    }

    /// Destination table
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Record => "records",
            EntityKind::Workout => "workouts",
            EntityKind::Correlation => "correlations",
            EntityKind::ActivitySummary => "activity_summaries",
            EntityKind::ClinicalRecord => "clinical_records",
            EntityKind::Audiogram => "audiograms",
            EntityKind::VisionPrescription => "vision_prescriptions",
        }
    }

    /// Build the typed entity from an element's attributes
    pub fn build(self, attrs: AttributeList) -> ExportEntity {
        match self {
            EntityKind::Record => ExportEntity::Record(Record::from_attributes(attrs)),
            EntityKind::Workout => ExportEntity::Workout(Workout::from_attributes(attrs)),
            EntityKind::Correlation => {
                ExportEntity::Correlation(Correlation::from_attributes(attrs))
            },
            EntityKind::ActivitySummary => {
                ExportEntity::ActivitySummary(ActivitySummary::from_attributes(attrs))
            },
            EntityKind::ClinicalRecord => {
                ExportEntity::ClinicalRecord(ClinicalRecord::from_attributes(attrs))
            },
            EntityKind::Audiogram => ExportEntity::Audiogram(Audiogram::from_attributes(attrs)),
            EntityKind::VisionPrescription => {
                ExportEntity::VisionPrescription(VisionPrescription::from_attributes(attrs))
            },
        }
    }
}

/// What an element tag means to the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Entity(EntityKind),
    /// `MetadataEntry`, only meaningful inside an open record
    MetadataEntry,
    Unrecognized,
}

impl ElementKind {
    pub fn classify(tag: &[u8]) -> Self {
        match tag {
            b"Record" => ElementKind::Entity(EntityKind::Record),
            b"Workout" => ElementKind::Entity(EntityKind::Workout),
            b"Correlation" => ElementKind::Entity(EntityKind::Correlation),
            b"ActivitySummary" => ElementKind::Entity(EntityKind::ActivitySummary),
            b"ClinicalRecord" => ElementKind::Entity(EntityKind::ClinicalRecord),
            b"Audiogram" => ElementKind::Entity(EntityKind::Audiogram),
            b"VisionPrescription" => ElementKind::Entity(EntityKind::VisionPrescription),
            b"MetadataEntry" => ElementKind::MetadataEntry,
            _ => ElementKind::Unrecognized,
        }
    }
}

/// One entity extracted from the export
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEntity {
    Record(Record),
    Workout(Workout),
    Correlation(Correlation),
    ActivitySummary(ActivitySummary),
    ClinicalRecord(ClinicalRecord),
    Audiogram(Audiogram),
    VisionPrescription(VisionPrescription),
}

impl ExportEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            ExportEntity::Record(_) => EntityKind::Record,
            ExportEntity::Workout(_) => EntityKind::Workout,
            ExportEntity::Correlation(_) => EntityKind::Correlation,
            ExportEntity::ActivitySummary(_) => EntityKind::ActivitySummary,
            ExportEntity::ClinicalRecord(_) => EntityKind::ClinicalRecord,
            ExportEntity::Audiogram(_) => EntityKind::Audiogram,
            ExportEntity::VisionPrescription(_) => EntityKind::VisionPrescription,
        }
    }
}
