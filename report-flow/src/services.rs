use async_trait::async_trait;

use crate::{
    error::Result,
    models::{ReportFile, ReportResult},
};

/// The extraction service: turns an uploaded PDF into a structured [`ReportResult`].
#[async_trait]
pub trait ReportExtractor: Send + Sync {
    async fn extract_report(&self, file: &ReportFile) -> Result<ReportResult>;
}

/// The question-answering service, grounded in a report's extracted text.
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    /// Answer `question` using `report_context`. Failures should carry the server detail in
    /// [`crate::FlowError::AnswerFailed`] when one was supplied.
    async fn answer_question(&self, question: &str, report_context: &str) -> Result<String>;
}
