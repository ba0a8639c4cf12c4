use crate::model::{ElementId, JobId};
use crate::wire::{deserialize_id, deserialize_id_list};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Delta notification delivered over the monitor stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    JobStarted {
        job_id: JobId,
        element_ids: Vec<ElementId>,
    },
    JobEnded {
        job_id: JobId,
    },
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not a json object")]
    NotAnObject,
    #[error("message has no type/kind discriminator")]
    MissingKind,
    #[error("unknown message kind: {0}")]
    UnknownKind(String),
    #[error("invalid {kind} payload: {source}")]
    Fields {
        kind: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct StartedFields {
    #[serde(rename = "taskId", alias = "jobId", deserialize_with = "deserialize_id")]
    job_id: u64,
    #[serde(
        rename = "antennas",
        alias = "elementIds",
        default,
        deserialize_with = "deserialize_id_list"
    )]
    element_ids: Vec<u64>,
}

#[derive(Deserialize)]
struct EndedFields {
    #[serde(rename = "taskId", alias = "jobId", deserialize_with = "deserialize_id")]
    job_id: u64,
}

impl StreamEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            StreamEvent::JobStarted { job_id, .. } | StreamEvent::JobEnded { job_id } => *job_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::JobStarted { .. } => "JobStarted",
            StreamEvent::JobEnded { .. } => "JobEnded",
        }
    }

    /// Parse one text frame. Accepts the scheduler's `type: TASK_START|TASK_END`
    /// framing as well as `kind: JobStarted|JobEnded`.
    pub fn parse(text: &str) -> Result<Self, EventError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let Value::Object(map) = value else {
            return Err(EventError::NotAnObject);
        };
        let kind = discriminator(&map)?;
        match kind.as_str() {
            "TASK_START" | "JobStarted" | "job_started" => {
                let fields: StartedFields = serde_json::from_value(Value::Object(map))
                    .map_err(|source| EventError::Fields {
                        kind: "JobStarted",
                        source,
                    })?;
                Ok(StreamEvent::JobStarted {
                    job_id: fields.job_id,
                    element_ids: fields.element_ids,
                })
            }
            "TASK_END" | "JobEnded" | "job_ended" => {
                let fields: EndedFields = serde_json::from_value(Value::Object(map))
                    .map_err(|source| EventError::Fields {
                        kind: "JobEnded",
                        source,
                    })?;
                Ok(StreamEvent::JobEnded {
                    job_id: fields.job_id,
                })
            }
            _ => Err(EventError::UnknownKind(kind)),
        }
    }
}

fn discriminator(map: &Map<String, Value>) -> Result<String, EventError> {
    map.get("type")
        .or_else(|| map.get("kind"))
        .and_then(Value::as_str)
        .map(|kind| kind.trim().to_string())
        .ok_or(EventError::MissingKind)
}
