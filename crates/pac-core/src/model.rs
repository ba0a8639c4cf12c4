use crate::wire::{deserialize_id, deserialize_opt_id};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type JobId = u64;
pub type ElementId = u64;

/// Amplitude range shared by the store, the grid color scale and the KPIs.
pub const AMPLITUDE_MIN: f64 = 0.0;
pub const AMPLITUDE_MAX: f64 = 100.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown job status: {0}")]
    UnknownJobStatus(String),
    #[error("unknown element status: {0}")]
    UnknownElementStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Completed => 2,
            JobStatus::Failed => 3,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(JobStatus::Pending),
            1 => Some(JobStatus::Running),
            2 => Some(JobStatus::Completed),
            3 => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn stage(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Pending -> Running -> {Completed | Failed}. Staying put is allowed so
    /// that replays are no-ops; everything else regresses or crosses
    /// terminal states and is refused.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        self == next || next.stage() > self.stage()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ModelError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "pending" | "queued" => Ok(JobStatus::Pending),
            "running" | "in-progress" | "in_progress" => Ok(JobStatus::Running),
            "completed" | "done" => Ok(JobStatus::Completed),
            "failed" | "error" => Ok(JobStatus::Failed),
            other => match other.parse::<u64>().ok().and_then(JobStatus::from_code) {
                Some(status) => Ok(status),
                None => Err(ModelError::UnknownJobStatus(input.to_string())),
            },
        }
    }
}

impl Serialize for JobStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .and_then(JobStatus::from_code)
                .ok_or_else(|| {
                    serde::de::Error::custom(ModelError::UnknownJobStatus(n.to_string()))
                }),
            Value::String(s) => s.parse().map_err(serde::de::Error::custom),
            _ => Err(serde::de::Error::custom("expected status code or label")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementStatus {
    #[default]
    Idle,
    Active,
    Fault,
}

impl ElementStatus {
    pub const ALL: [ElementStatus; 3] = [
        ElementStatus::Idle,
        ElementStatus::Active,
        ElementStatus::Fault,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementStatus::Idle => "Idle",
            ElementStatus::Active => "Active",
            ElementStatus::Fault => "Fault",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ElementStatus::Idle => 0,
            ElementStatus::Active => 1,
            ElementStatus::Fault => 2,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(ElementStatus::Idle),
            1 => Some(ElementStatus::Active),
            2 => Some(ElementStatus::Fault),
            _ => None,
        }
    }
}

impl fmt::Display for ElementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementStatus {
    type Err = ModelError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "idle" => Ok(ElementStatus::Idle),
            "active" => Ok(ElementStatus::Active),
            "fault" | "faulted" => Ok(ElementStatus::Fault),
            other => match other.parse::<u64>().ok().and_then(ElementStatus::from_code) {
                Some(status) => Ok(status),
                None => Err(ModelError::UnknownElementStatus(input.to_string())),
            },
        }
    }
}

impl Serialize for ElementStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ElementStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .and_then(ElementStatus::from_code)
                .ok_or_else(|| {
                    serde::de::Error::custom(ModelError::UnknownElementStatus(n.to_string()))
                }),
            Value::String(s) => s.parse().map_err(serde::de::Error::custom),
            _ => Err(serde::de::Error::custom("expected status code or label")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: JobId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, rename = "neededAntennas", alias = "neededElements")]
    pub needed_elements: u32,
    #[serde(default, rename = "duration", alias = "durationSeconds")]
    pub duration_seconds: u64,
    #[serde(default, rename = "createTime", alias = "createdAt")]
    pub created_at: String,
    #[serde(
        default,
        rename = "resourceType",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPos {
    pub x: i64,
    pub y: i64,
}

/// One physical unit of the array. `id` and `grid` are fixed for the session;
/// the remaining fields follow the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireElement", into = "WireElement")]
pub struct ArrayElement {
    pub id: ElementId,
    pub grid: Option<GridPos>,
    pub status: ElementStatus,
    pub amplitude: f64,
    pub phase: f64,
    pub code: String,
    pub assigned_job: Option<JobId>,
}

impl ArrayElement {
    pub fn idle(id: ElementId, grid: Option<GridPos>) -> Self {
        Self {
            id,
            grid,
            status: ElementStatus::Idle,
            amplitude: 0.0,
            phase: 0.0,
            code: String::new(),
            assigned_job: None,
        }
    }
}

/// Element as it travels over REST. Canonical fields are `xPos`/`yPos` and
/// `amplitude`; `x`/`y` and `signalStrength` come from the older schema and
/// are folded into the canonical ones on decode, never written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireElement {
    #[serde(deserialize_with = "deserialize_id")]
    id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x_pos: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y_pos: Option<i64>,
    #[serde(default, skip_serializing)]
    x: Option<i64>,
    #[serde(default, skip_serializing)]
    y: Option<i64>,
    #[serde(default)]
    status: ElementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    amplitude: Option<f64>,
    #[serde(default, skip_serializing)]
    signal_strength: Option<f64>,
    #[serde(default)]
    phase: f64,
    #[serde(default)]
    code: String,
    #[serde(default, alias = "assignedJobId", deserialize_with = "deserialize_opt_id")]
    task_id: Option<u64>,
}

impl From<WireElement> for ArrayElement {
    fn from(wire: WireElement) -> Self {
        let x = wire.x_pos.or(wire.x);
        let y = wire.y_pos.or(wire.y);
        let grid = match (x, y) {
            (Some(x), Some(y)) => Some(GridPos { x, y }),
            _ => None,
        };
        Self {
            id: wire.id,
            grid,
            status: wire.status,
            amplitude: wire.amplitude.or(wire.signal_strength).unwrap_or(0.0),
            phase: wire.phase,
            code: wire.code,
            assigned_job: wire.task_id,
        }
    }
}

impl From<ArrayElement> for WireElement {
    fn from(element: ArrayElement) -> Self {
        Self {
            id: element.id,
            x_pos: element.grid.map(|pos| pos.x),
            y_pos: element.grid.map(|pos| pos.y),
            x: None,
            y: None,
            status: element.status,
            amplitude: Some(element.amplitude),
            signal_strength: None,
            phase: element.phase,
            code: element.code,
            task_id: element.assigned_job,
        }
    }
}

/// Full authoritative read of scheduler state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub jobs: Vec<Job>,
    pub elements: Vec<ArrayElement>,
}

/// Body of `POST /task/submit`. The scheduler assigns id, creation time and
/// the initial Pending status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub name: String,
    pub priority: i64,
    #[serde(rename = "neededAntennas")]
    pub needed_elements: u32,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    pub status: JobStatus,
    #[serde(rename = "createTime")]
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

impl JobSubmission {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 50,
            needed_elements: 16,
            duration_seconds: 60,
            status: JobStatus::Pending,
            created_at: chrono::Utc::now().to_rfc3339(),
            resource_type: Some("FPGA".to_string()),
        }
    }
}
