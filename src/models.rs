use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

use crate::{error::OrchestratorError, i18n::Language, store::{GenerationTask, SessionPhase, TaskState}};

const SUPPORTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// The uploaded photo every task of the current session is generated from.
#[derive(Debug, Clone)]
pub struct SourceImage {
    data: Bytes,
    mime_type: String,
}

impl SourceImage {
    pub fn new(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self { data: data.into(), mime_type: mime_type.into() }
    }

    /// Accepts plain base64 or a `data:<mime>;base64,<payload>` URL. An
    /// explicit `mime_type` wins over the one embedded in the URL.
    pub fn from_upload(image: &str, mime_type: Option<&str>) -> Result<Self, OrchestratorError> {
        let (embedded_mime, payload) = match image.split_once(',') {
            Some((header, payload)) if header.starts_with("data:") => {
                let mime = header.trim_start_matches("data:").split(';').next().filter(|m| !m.is_empty());
                (mime, payload)
            }
            _ => (None, image),
        };
        let mime = mime_type
            .filter(|m| !m.trim().is_empty())
            .or(embedded_mime)
            .ok_or_else(|| OrchestratorError::InvalidInput("mime_type is required".into()))?;

        let data = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| OrchestratorError::InvalidInput(format!("image is not valid base64: {e}")))?;

        let source = Self::new(data, mime.trim());
        source.validate()?;
        Ok(source)
    }

    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.data.is_empty() {
            return Err(OrchestratorError::InvalidInput("image payload is empty".into()));
        }
        match ImageFormat::from_mime_type(&self.mime_type) {
            Some(f) if SUPPORTED_FORMATS.contains(&f) => Ok(()),
            _ => Err(OrchestratorError::InvalidInput(format!("unsupported mime type: {}", self.mime_type))),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubmitRequest {
    pub image: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LanguageSetting {
    pub language: Language,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Succeeded,
    Failed,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub struct TaskView {
    pub id: Uuid,
    pub style_id: String,
    pub state: TaskStatus,
    pub image_data: Option<String>,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&GenerationTask> for TaskView {
    fn from(task: &GenerationTask) -> Self {
        let (state, image_data, error_message) = match &task.state {
            TaskState::Pending => (TaskStatus::Pending, None, None),
            TaskState::Succeeded(img) => (TaskStatus::Succeeded, Some(img.clone()), None),
            TaskState::Failed(msg) => (TaskStatus::Failed, None, Some(msg.clone())),
        };
        Self { id: task.id, style_id: task.style_id.clone(), state, image_data, error_message, updated_at: task.updated_at }
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub struct SnapshotResponse {
    pub session_id: Option<Uuid>,
    pub phase: SessionPhase,
    pub language: Language,
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Serialize, Clone)]
pub struct StyleSummary {
    pub id: String,
    pub name_en: String,
    pub name_cn: String,
    pub icon: String,
}
