use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of emergency being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyType {
    Medical,
    Fire,
    Police,
}

impl EmergencyType {
    pub const ALL: [EmergencyType; 3] = [
        EmergencyType::Medical,
        EmergencyType::Fire,
        EmergencyType::Police,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyType::Medical => "medical",
            EmergencyType::Fire => "fire",
            EmergencyType::Police => "police",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "medical" => Some(EmergencyType::Medical),
            "fire" => Some(EmergencyType::Fire),
            "police" => Some(EmergencyType::Police),
            _ => None,
        }
    }
}

impl fmt::Display for EmergencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Medical severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Severe,
    Moderate,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Critical, Severity::Severe, Severity::Moderate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Severe => "severe",
            Severity::Moderate => "moderate",
        }
    }
}

/// Three-step scale shared by fire priority and police threat level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    High,
    Medium,
    Low,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::High, Level::Medium, Level::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::High => "high",
            Level::Medium => "medium",
            Level::Low => "low",
        }
    }
}

/// The type-specific field of a task.
///
/// Each variant belongs to exactly one [`EmergencyType`], so a task can never
/// carry an attribute that does not match its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAttribute {
    Severity(Severity),
    Priority(Level),
    ThreatLevel(Level),
}

impl TaskAttribute {
    pub fn emergency_type(&self) -> EmergencyType {
        match self {
            TaskAttribute::Severity(_) => EmergencyType::Medical,
            TaskAttribute::Priority(_) => EmergencyType::Fire,
            TaskAttribute::ThreatLevel(_) => EmergencyType::Police,
        }
    }

    /// Field name as it appears in the payload.
    pub fn field_name(&self) -> &'static str {
        match self {
            TaskAttribute::Severity(_) => "severity",
            TaskAttribute::Priority(_) => "priority",
            TaskAttribute::ThreatLevel(_) => "threat_level",
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            TaskAttribute::Severity(s) => s.as_str(),
            TaskAttribute::Priority(l) | TaskAttribute::ThreatLevel(l) => l.as_str(),
        }
    }
}

/// A geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Location { lat, lon }
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Region {
    pub fn contains(&self, location: &Location) -> bool {
        (self.lat_min..=self.lat_max).contains(&location.lat)
            && (self.lon_min..=self.lon_max).contains(&location.lon)
    }

    /// Draw a point uniformly from the box.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Location {
        Location {
            lat: rng.gen_range(self.lat_min..self.lat_max),
            lon: rng.gen_range(self.lon_min..self.lon_max),
        }
    }
}

/// Service area covered by the dispatch fleet.
pub const HOME_REGION: Region = Region {
    lat_min: 12.8,
    lat_max: 13.1,
    lon_min: 77.5,
    lon_max: 77.7,
};

/// Disjoint area used to exercise geofencing in the consumers.
pub const OUT_OF_REGION: Region = Region {
    lat_min: 10.0,
    lat_max: 12.0,
    lon_min: 75.0,
    lon_max: 77.0,
};

/// One synthesized emergency event.
///
/// Serializes to the payload shape consumers expect, e.g.
/// `{"location": {"lat": 12.95, "lon": 77.6}, "severity": "critical"}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmergencyTask {
    pub location: Location,
    #[serde(flatten)]
    pub attribute: TaskAttribute,
}

impl EmergencyTask {
    pub fn new(location: Location, attribute: TaskAttribute) -> Self {
        EmergencyTask { location, attribute }
    }

    pub fn emergency_type(&self) -> EmergencyType {
        self.attribute.emergency_type()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "location": { "lat": self.location.lat, "lon": self.location.lon },
            self.attribute.field_name(): self.attribute.value(),
        })
    }
}

/// Opaque identifier returned by the queue for a submitted task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        TaskHandle(id.into())
    }

    pub fn generate() -> Self {
        TaskHandle(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskHandle {
    fn from(value: &str) -> Self {
        TaskHandle::new(value)
    }
}
