//! Session orchestration: owns the single report slot of a session and composes the upload and
//! chat controllers around it.
//!
//! The session only ever moves forward:
//!
//! ```text
//! Idle ──submit──▶ Uploading ──success──▶ Analyzed ──send──▶ Conversing
//!   ▲                  │
//!   └────failure───────┘
//! ```
//!
//! [`SessionOrchestrator::report_ready`] is the only writer of the report slot. Once it has run,
//! the upload surface is gone and further uploads are ignored. Every asynchronous call made by
//! the controllers is bound to a child of the session's [`CancellationToken`], so responses that
//! arrive after [`SessionOrchestrator::shutdown`] are dropped without touching state.

use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    chat::{ChatController, ChatState},
    models::{MessageRole, ReportFile, ReportResult},
    services::{QuestionAnswerer, ReportExtractor},
    store::Store,
    upload::{UploadController, UploadOutcome, UploadState},
    view::{View, select_view},
};

/// The report slot. `report` goes from `None` to `Some` at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub report: Option<Arc<ReportResult>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Uploading,
    Analyzed,
    Conversing,
}

/// One-shot side effects for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    /// Emitted on the frame the analysis view first appears, never again.
    ScrollToAnalysis,
}

/// Everything a view needs, captured at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub report: Option<Arc<ReportResult>>,
    pub upload: UploadState,
    pub chat: Option<ChatState>,
}

impl SessionSnapshot {
    pub fn upload_in_flight(&self) -> bool {
        self.upload.in_flight
    }
}

pub struct SessionOrchestrator {
    session: Store<Session>,
    upload: UploadController,
    answerer: Arc<dyn QuestionAnswerer>,
    chat: OnceLock<ChatController>,
    effects: broadcast::Sender<SessionEffect>,
    lifetime: CancellationToken,
}

impl SessionOrchestrator {
    pub fn new(extractor: Arc<dyn ReportExtractor>, answerer: Arc<dyn QuestionAnswerer>) -> Self {
        let lifetime = CancellationToken::new();
        let id = Uuid::new_v4();
        let (effects, _) = broadcast::channel(8);
        info!("Session {} started", id);

        Self {
            session: Store::new(Session { id, report: None }),
            upload: UploadController::new(extractor, lifetime.child_token()),
            answerer,
            chat: OnceLock::new(),
            effects,
            lifetime,
        }
    }

    pub fn id(&self) -> Uuid {
        self.session.read(|s| s.id)
    }

    pub fn report(&self) -> Option<Arc<ReportResult>> {
        self.session.read(|s| s.report.clone())
    }

    pub fn upload(&self) -> &UploadController {
        &self.upload
    }

    /// The chat controller, present once a report has been analyzed.
    pub fn chat(&self) -> Option<&ChatController> {
        self.chat.get()
    }

    pub fn effects(&self) -> broadcast::Receiver<SessionEffect> {
        self.effects.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.snapshot();
        let upload = self.upload.state().snapshot();
        let chat = self.chat.get().map(|c| c.state().snapshot());

        let phase = match (&session.report, &chat) {
            (None, _) if upload.in_flight => SessionPhase::Uploading,
            (None, _) => SessionPhase::Idle,
            (Some(_), Some(chat))
                if chat.messages.iter().any(|m| m.role == MessageRole::User) =>
            {
                SessionPhase::Conversing
            }
            (Some(_), _) => SessionPhase::Analyzed,
        };

        SessionSnapshot {
            id: session.id,
            phase,
            report: session.report,
            upload,
            chat,
        }
    }

    pub fn view(&self) -> View {
        select_view(&self.snapshot())
    }

    /// Upload one file. Ignored once a report is loaded, since the upload surface is gone.
    pub async fn submit(&self, file: ReportFile) -> UploadOutcome {
        self.submit_many(std::iter::once(file)).await
    }

    /// Drop/picker path: the first file is uploaded, the rest are ignored.
    pub async fn submit_many(&self, files: impl IntoIterator<Item = ReportFile>) -> UploadOutcome {
        if self.report().is_some() {
            info!("Report already analyzed, upload surface is closed");
            return UploadOutcome::Ignored;
        }

        // busy until the report slot is written
        let outcome = self.upload.hold_many(files).await;
        if let UploadOutcome::Ready(report) = &outcome {
            self.report_ready(report.clone());
            self.upload.finish();
        }
        outcome
    }

    /// Publish the analyzed report. Sole writer of the report slot; returns whether the report
    /// was taken. A second report is not reachable from the UI and is dropped.
    pub fn report_ready(&self, result: ReportResult) -> bool {
        if self.lifetime.is_cancelled() {
            warn!("Session closed, dropping analyzed report");
            return false;
        }
        if self.chat.get().is_some() {
            warn!("Report already loaded, ignoring a second one");
            return false;
        }

        let report = Arc::new(result);
        let chat = ChatController::initialize(
            self.answerer.clone(),
            report.extracted_text.clone(),
            self.lifetime.child_token(),
        );
        if self.chat.set(chat).is_err() {
            warn!("Report already loaded, ignoring a second one");
            return false;
        }

        self.session.update(|s| {
            s.report = Some(report.clone());
            true
        });
        info!(
            "Session {} analyzed: {} medical terms",
            self.id(),
            report.medical_terms.len()
        );

        // no receivers is fine: nobody is rendering
        let _ = self.effects.send(SessionEffect::ScrollToAnalysis);
        true
    }

    /// Tear the session down. In-flight responses are dropped when they arrive.
    pub fn shutdown(&self) {
        if !self.lifetime.is_cancelled() {
            info!("Session {} closed", self.id());
            self.lifetime.cancel();
        }
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
