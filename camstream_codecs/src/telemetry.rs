use crate::Fps;
use serde_json::{Map, Value};

/// Typed view of one telemetry message.
///
/// Telemetry is loosely structured event data: a message carrying both a
/// numeric `fps` and a `plate` is valid for both facets.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryRecord {
    Stats { fps: Fps },
    PlateEvent { plate_number: String },
    Combined { fps: Fps, plate_number: String },
    Unknown,
}

impl TelemetryRecord {
    pub fn fps(&self) -> Option<Fps> {
        match self {
            TelemetryRecord::Stats { fps } | TelemetryRecord::Combined { fps, .. } => Some(*fps),
            _ => None,
        }
    }

    pub fn plate_number(&self) -> Option<&str> {
        match self {
            TelemetryRecord::PlateEvent { plate_number }
            | TelemetryRecord::Combined { plate_number, .. } => Some(plate_number),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TelemetryRecord::Unknown)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetryParser;

impl TelemetryParser {
    const FPS: &'static str = "fps";
    const PLATE: &'static str = "plate";

    /// Never fails: anything that is not a JSON object with a recognized
    /// field degrades to [`TelemetryRecord::Unknown`].
    pub fn parse(&self, payload: &str) -> TelemetryRecord {
        match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(fields)) => Self::classify(&fields),
            Ok(other) => {
                tracing::trace!("Telemetry is not an object: {other}");
                TelemetryRecord::Unknown
            }
            Err(e) => {
                tracing::trace!("Telemetry is not json: {e}");
                TelemetryRecord::Unknown
            }
        }
    }

    fn classify(fields: &Map<String, Value>) -> TelemetryRecord {
        let fps = fields
            .get(Self::FPS)
            .and_then(Value::as_f64)
            .filter(|fps| fps.is_finite());
        let plate = fields
            .get(Self::PLATE)
            .and_then(Value::as_str)
            .filter(|plate| !plate.is_empty())
            .map(str::to_string);

        match (fps, plate) {
            (Some(fps), Some(plate_number)) => TelemetryRecord::Combined { fps, plate_number },
            (Some(fps), None) => TelemetryRecord::Stats { fps },
            (None, Some(plate_number)) => TelemetryRecord::PlateEvent { plate_number },
            (None, None) => TelemetryRecord::Unknown,
        }
    }
}
