//! View selection. Every view is a pure function of a [`SessionSnapshot`].

use crate::{
    findings::extract_summary_points,
    models::{MedicalTerm, Message},
    session::SessionSnapshot,
};

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Upload(UploadView),
    Analysis(AnalysisView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadView {
    /// Surface disabled, busy indicator shown.
    pub busy: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisView {
    pub key_findings: Vec<String>,
    pub terms: Vec<MedicalTerm>,
    pub transcript: Vec<Message>,
    /// Shows the typing indicator and disables the input.
    pub awaiting_answer: bool,
    pub draft: String,
}

pub fn select_view(snapshot: &SessionSnapshot) -> View {
    let Some(report) = &snapshot.report else {
        return View::Upload(UploadView {
            busy: snapshot.upload.in_flight,
            error: snapshot.upload.error.clone(),
        });
    };

    let (transcript, awaiting_answer, draft) = match &snapshot.chat {
        Some(chat) => (chat.messages.clone(), chat.pending, chat.draft.clone()),
        None => (Vec::new(), false, String::new()),
    };

    View::Analysis(AnalysisView {
        key_findings: extract_summary_points(&report.summary),
        terms: report.medical_terms.clone(),
        transcript,
        awaiting_answer,
        draft,
    })
}
