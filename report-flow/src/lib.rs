pub mod chat;
pub mod error;
pub mod findings;
pub mod models;
pub mod services;
pub mod session;
pub mod storage;
pub mod store;
pub mod theme;
pub mod upload;
pub mod view;

// Re-export commonly used types
pub use chat::{ChatController, ChatKey, ChatState, KeyOutcome, PendingQuestion, SendOutcome};
pub use error::{FlowError, Result};
pub use findings::extract_summary_points;
pub use models::{MedicalTerm, Message, MessageRole, ReportFile, ReportResult};
pub use services::{QuestionAnswerer, ReportExtractor};
pub use session::{Session, SessionEffect, SessionOrchestrator, SessionPhase, SessionSnapshot};
pub use storage::{FilePreferenceStore, InMemoryPreferenceStore, PreferenceStore};
pub use store::Store;
pub use theme::{Theme, ThemeController};
pub use upload::{UploadController, UploadOutcome, UploadState};
pub use view::{AnalysisView, UploadView, View, select_view};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoAnswerer;

    #[async_trait]
    impl QuestionAnswerer for EchoAnswerer {
        async fn answer_question(&self, question: &str, report_context: &str) -> Result<String> {
            Ok(format!("{} (from {} chars)", question, report_context.len()))
        }
    }

    struct FixedExtractor;

    #[async_trait]
    impl ReportExtractor for FixedExtractor {
        async fn extract_report(&self, file: &ReportFile) -> Result<ReportResult> {
            Ok(ReportResult {
                summary: format!("* {} was analyzed without any abnormal values", file.file_name),
                extracted_text: "Hemoglobin 14.1 g/dL".to_string(),
                medical_terms: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_simple_session_flow() {
        let session = SessionOrchestrator::new(Arc::new(FixedExtractor), Arc::new(EchoAnswerer));

        let file = ReportFile::new("cbc.pdf", "application/pdf", b"%PDF".to_vec());
        let outcome = session.submit(file).await;
        assert!(matches!(outcome, UploadOutcome::Ready(_)));

        let chat = session.chat().unwrap();
        let outcome = chat.send("Hello").await;
        assert_eq!(
            outcome,
            SendOutcome::Answered("Hello (from 20 chars)".to_string())
        );

        let View::Analysis(view) = session.view() else {
            panic!("expected analysis view");
        };
        assert_eq!(
            view.key_findings,
            vec!["cbc.pdf was analyzed without any abnormal values".to_string()]
        );
        assert_eq!(view.transcript.len(), 3);
    }
}
