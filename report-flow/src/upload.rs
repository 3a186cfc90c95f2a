use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    error::FlowError,
    models::{ReportFile, ReportResult},
    services::ReportExtractor,
    store::Store,
};

pub const UPLOAD_FAILED_MESSAGE: &str = "Error uploading file. Please try again.";
pub const NOT_PDF_MESSAGE: &str = "Only PDF files are supported.";

/// What the upload surface shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadState {
    /// True while the single extraction request is outstanding. The surface is disabled.
    pub in_flight: bool,
    /// User-visible error from the last rejected or failed attempt.
    pub error: Option<String>,
}

/// Result of one `submit` call.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Extraction succeeded; the report goes to the orchestrator.
    Ready(ReportResult),
    /// Nothing happened: no file, or an upload was already in flight.
    Ignored,
    /// Refused on the client, no network call made.
    Rejected(FlowError),
    /// The extraction call failed; the surface is retryable.
    Failed(FlowError),
    /// The owning session was closed before the response could be applied.
    Discarded,
}

enum Admission {
    Accepted,
    Busy,
    NotPdf,
}

/// Owns the upload lifecycle: at most one PDF in flight, errors folded into [`UploadState`].
#[derive(Clone)]
pub struct UploadController {
    extractor: Arc<dyn ReportExtractor>,
    state: Store<UploadState>,
    lifetime: CancellationToken,
}

impl UploadController {
    pub fn new(extractor: Arc<dyn ReportExtractor>, lifetime: CancellationToken) -> Self {
        Self {
            extractor,
            state: Store::default(),
            lifetime,
        }
    }

    pub fn state(&self) -> &Store<UploadState> {
        &self.state
    }

    pub fn in_flight(&self) -> bool {
        self.state.read(|s| s.in_flight)
    }

    /// Drag-and-drop and file-picker entry point: only the first file is considered.
    pub async fn submit_many(&self, files: impl IntoIterator<Item = ReportFile>) -> UploadOutcome {
        let outcome = self.hold_many(files).await;
        if matches!(outcome, UploadOutcome::Ready(_)) {
            self.finish();
        }
        outcome
    }

    pub async fn submit(&self, file: ReportFile) -> UploadOutcome {
        self.submit_many(std::iter::once(file)).await
    }

    /// Like [`UploadController::submit_many`], but a successful upload stays in flight until
    /// [`UploadController::finish`], so the report can be published before the surface frees up.
    pub(crate) async fn hold_many(
        &self,
        files: impl IntoIterator<Item = ReportFile>,
    ) -> UploadOutcome {
        let mut files = files.into_iter();
        let Some(file) = files.next() else {
            return UploadOutcome::Ignored;
        };

        let extra = files.count();
        if extra > 0 {
            info!("Ignoring {} extra file(s); only one report per upload", extra);
        }

        self.hold(file).await
    }

    /// Clear the in-flight flag left by a successful [`UploadController::hold_many`].
    pub(crate) fn finish(&self) {
        self.state
            .update(|s| std::mem::replace(&mut s.in_flight, false));
    }

    async fn hold(&self, file: ReportFile) -> UploadOutcome {
        if self.lifetime.is_cancelled() {
            return UploadOutcome::Discarded;
        }

        let mut admission = Admission::Accepted;
        self.state.update(|s| {
            if s.in_flight {
                admission = Admission::Busy;
                return false;
            }
            if !file.is_pdf() {
                admission = Admission::NotPdf;
                s.error = Some(NOT_PDF_MESSAGE.to_string());
                return true;
            }
            s.in_flight = true;
            s.error = None;
            true
        });

        match admission {
            Admission::Busy => {
                info!("Upload already in flight, ignoring {}", file.file_name);
                return UploadOutcome::Ignored;
            }
            Admission::NotPdf => {
                warn!(
                    "Rejected {}: declared type {} is not a PDF",
                    file.file_name, file.media_type
                );
                return UploadOutcome::Rejected(FlowError::UploadRejected(format!(
                    "{} is not a PDF ({})",
                    file.file_name, file.media_type
                )));
            }
            Admission::Accepted => {}
        }

        info!(
            "Uploading {} ({} bytes) for analysis",
            file.file_name,
            file.bytes.len()
        );

        let result = tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => {
                info!("Session closed, dropping extraction of {}", file.file_name);
                return UploadOutcome::Discarded;
            }
            result = self.extractor.extract_report(&file) => result,
        };

        match result {
            Ok(report) => {
                info!(
                    "Extraction finished: {} terms, {} characters of text",
                    report.medical_terms.len(),
                    report.extracted_text.len()
                );
                UploadOutcome::Ready(report)
            }
            Err(e) => {
                error!("Upload error: {}", e);
                self.state.update(|s| {
                    s.in_flight = false;
                    s.error = Some(UPLOAD_FAILED_MESSAGE.to_string());
                    true
                });
                UploadOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fakes::{Script, pdf, report};

    fn controller(script: Arc<Script<ReportResult>>) -> UploadController {
        UploadController::new(script, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_non_pdf_never_reaches_the_network() {
        let script = Arc::new(Script::immediate(vec![Ok(report("ABC"))]));
        let upload = controller(script.clone());

        let outcome = upload
            .submit(ReportFile::new("scan.png", "image/png", vec![1, 2, 3]))
            .await;

        assert!(matches!(
            outcome,
            UploadOutcome::Rejected(FlowError::UploadRejected(_))
        ));
        assert_eq!(script.calls(), 0);
        let state = upload.state().snapshot();
        assert!(!state.in_flight);
        assert_eq!(state.error.as_deref(), Some(NOT_PDF_MESSAGE));
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight_is_ignored() {
        let script = Arc::new(Script::gated(vec![Ok(report("ABC")), Ok(report("DEF"))]));
        let upload = controller(script.clone());

        let first = tokio::spawn({
            let upload = upload.clone();
            async move { upload.submit(pdf("labs.pdf")).await }
        });
        script.wait_entered().await;
        assert!(upload.in_flight());

        let second = upload.submit(pdf("other.pdf")).await;
        assert_eq!(second, UploadOutcome::Ignored);
        assert_eq!(script.calls(), 1);

        script.release();
        let first = first.await.unwrap();
        assert_eq!(first, UploadOutcome::Ready(report("ABC")));
        assert!(!upload.in_flight());
        assert_eq!(script.seen(), vec!["labs.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_clears_in_flight_and_allows_retry() {
        let script = Arc::new(Script::immediate(vec![
            Err(FlowError::ExtractionFailed("HTTP 500".to_string())),
            Ok(report("ABC")),
        ]));
        let upload = controller(script.clone());

        let outcome = upload.submit(pdf("labs.pdf")).await;
        assert!(matches!(
            outcome,
            UploadOutcome::Failed(FlowError::ExtractionFailed(_))
        ));
        let state = upload.state().snapshot();
        assert!(!state.in_flight);
        assert_eq!(state.error.as_deref(), Some(UPLOAD_FAILED_MESSAGE));

        let outcome = upload.submit(pdf("labs.pdf")).await;
        assert_eq!(outcome, UploadOutcome::Ready(report("ABC")));
        assert_eq!(upload.state().snapshot().error, None);
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test]
    async fn test_only_first_of_many_files_is_uploaded() {
        let script = Arc::new(Script::immediate(vec![Ok(report("ABC"))]));
        let upload = controller(script.clone());

        let outcome = upload
            .submit_many(vec![pdf("first.pdf"), pdf("second.pdf")])
            .await;

        assert!(matches!(outcome, UploadOutcome::Ready(_)));
        assert_eq!(script.seen(), vec!["first.pdf".to_string()]);

        assert_eq!(upload.submit_many(Vec::new()).await, UploadOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_extra_files_do_not_rescue_a_non_pdf_first_file() {
        let script = Arc::new(Script::immediate(vec![Ok(report("ABC"))]));
        let upload = controller(script.clone());

        let outcome = upload
            .submit_many(vec![
                ReportFile::new("notes.txt", "text/plain", b"hi".to_vec()),
                pdf("labs.pdf"),
            ])
            .await;

        assert!(matches!(outcome, UploadOutcome::Rejected(_)));
        assert_eq!(script.calls(), 0);
    }

    #[tokio::test]
    async fn test_held_upload_stays_in_flight_until_finished() {
        let script = Arc::new(Script::immediate(vec![Ok(report("ABC"))]));
        let upload = controller(script);

        let outcome = upload.hold_many(vec![pdf("labs.pdf")]).await;
        assert!(matches!(outcome, UploadOutcome::Ready(_)));
        assert!(upload.in_flight());
        assert_eq!(upload.submit(pdf("labs.pdf")).await, UploadOutcome::Ignored);

        upload.finish();
        assert!(!upload.in_flight());
    }

    #[tokio::test]
    async fn test_response_after_close_is_discarded() {
        let script = Arc::new(Script::gated(vec![Ok(report("ABC"))]));
        let lifetime = CancellationToken::new();
        let upload = UploadController::new(script.clone(), lifetime.clone());

        let pending = tokio::spawn({
            let upload = upload.clone();
            async move { upload.submit(pdf("labs.pdf")).await }
        });
        script.wait_entered().await;

        lifetime.cancel();
        script.release();

        assert_eq!(pending.await.unwrap(), UploadOutcome::Discarded);
        assert_eq!(
            upload.submit(pdf("labs.pdf")).await,
            UploadOutcome::Discarded
        );
    }
}
