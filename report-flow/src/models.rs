use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FlowError, Result};

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Structured analysis of one uploaded report, as returned by the extraction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResult {
    pub summary: String,
    /// Grounding context for every question asked about this report.
    pub extracted_text: String,
    #[serde(default)]
    pub medical_terms: Vec<MedicalTerm>,
}

/// A lab term detected in the report.
///
/// `status` and `is_abnormal` come from the extractor independently and are shown as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalTerm {
    pub term: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_abnormal: bool,
    #[serde(default)]
    pub explanation: String,
}

impl MedicalTerm {
    /// `"{value} {unit}"`, or `None` when the term carries no value.
    pub fn display_value(&self) -> Option<String> {
        let value = self.value.as_deref().filter(|v| !v.is_empty())?;
        match self.unit.as_deref() {
            Some(unit) if !unit.is_empty() => Some(format!("{} {}", value, unit)),
            _ => Some(value.to_string()),
        }
    }

    pub fn status_label(&self) -> Option<String> {
        self.status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_uppercase)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One transcript entry. Entries are never edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A file offered for upload, with the media type it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ReportFile {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, declaring its media type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            FlowError::UploadRejected(format!("Cannot read {}: {}", path.display(), e))
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.pdf".to_string());
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            file_name,
            media_type,
            bytes,
        })
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type.eq_ignore_ascii_case(PDF_MEDIA_TYPE)
    }
}
