use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use report_flow::{FlowError, QuestionAnswerer, ReportExtractor, ReportFile, ReportResult};
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use tracing::{debug, error, info};

use crate::models::{
    ChatRequest, ChatResponse, ErrorBody, ServiceStatus, ValueCheckRequest, ValueCheckResult,
};

/// HTTP client for the report backend (`/upload-report`, `/chat`, `/`, `/check-value`).
///
/// No request timeout is set; the transport default decides when a call has failed.
#[derive(Clone)]
pub struct HttpReportService {
    client: Client,
    base_url: String,
}

impl HttpReportService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Probe the backend root for its status.
    pub async fn status(&self) -> anyhow::Result<ServiceStatus> {
        let response = self
            .client
            .get(self.endpoint("/"))
            .send()
            .await
            .with_context(|| format!("Cannot reach {}", self.base_url))?;

        if !response.status().is_success() {
            return Err(anyhow!("Status request failed: {}", response.status()));
        }

        Ok(response.json().await?)
    }

    /// Check one lab value against the backend's reference ranges.
    pub async fn check_value(&self, request: &ValueCheckRequest) -> anyhow::Result<ValueCheckResult> {
        let response = self
            .client
            .post(self.endpoint("/check-value"))
            .json(request)
            .send()
            .await
            .with_context(|| format!("Cannot reach {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let detail = ErrorBody::parse(&body).detail_message();
            return Err(anyhow!(
                "Value check failed: {}{}",
                status,
                detail.map(|d| format!(" ({})", d)).unwrap_or_default()
            ));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ReportExtractor for HttpReportService {
    async fn extract_report(&self, file: &ReportFile) -> report_flow::Result<ReportResult> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| FlowError::ExtractionFailed(format!("Invalid media type: {}", e)))?;
        let form = Form::new().part("file", part);

        debug!("POST {} ({})", self.endpoint("/upload-report"), file.file_name);
        let response = self
            .client
            .post(self.endpoint("/upload-report"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| FlowError::ExtractionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let detail = ErrorBody::parse(&body).detail_message();
            error!(
                "Report extraction rejected with {}: {}",
                status,
                detail.as_deref().unwrap_or("no detail")
            );
            return Err(FlowError::ExtractionFailed(format!("HTTP {}", status)));
        }

        let report = response
            .json::<ReportResult>()
            .await
            .map_err(|e| FlowError::ExtractionFailed(format!("Malformed report payload: {}", e)))?;

        info!(
            "Received report for {}: {} medical terms",
            file.file_name,
            report.medical_terms.len()
        );
        Ok(report)
    }
}

#[async_trait]
impl QuestionAnswerer for HttpReportService {
    async fn answer_question(
        &self,
        question: &str,
        report_context: &str,
    ) -> report_flow::Result<String> {
        let request = ChatRequest {
            question: question.to_string(),
            report_context: report_context.to_string(),
        };

        let response = self
            .client
            .post(self.endpoint("/chat"))
            .json(&request)
            .send()
            .await
            .map_err(|e| FlowError::answer_failed(e.to_string(), None))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let detail = ErrorBody::parse(&body).detail_message();
            return Err(FlowError::answer_failed(format!("HTTP {}", status), detail));
        }

        let response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| FlowError::answer_failed(format!("Malformed answer: {}", e), None))?;

        debug!("Answer received with {} source(s)", response.sources.len());
        Ok(response.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Multipart,
        http::StatusCode,
        routing::{get, post},
    };
    use report_flow::{
        MessageRole, SendOutcome, SessionOrchestrator, SessionPhase, UploadOutcome,
        chat::GREETING,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn upload_report(mut multipart: Multipart) -> Result<Json<Value>, StatusCode> {
        while let Some(field) = multipart.next_field().await.unwrap() {
            if field.name() != Some("file") {
                continue;
            }
            if field.content_type() != Some("application/pdf") {
                return Err(StatusCode::BAD_REQUEST);
            }
            let name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap();
            return Ok(Json(json!({
                "summary": format!("* {} contained {} bytes of lab results", name, bytes.len()),
                "extracted_text": "LDL 190 mg/dL",
                "medical_terms": [{
                    "term": "LDL",
                    "value": "190",
                    "unit": "mg/dL",
                    "status": "high",
                    "is_abnormal": true,
                    "explanation": "Low-density lipoprotein"
                }]
            })));
        }
        Err(StatusCode::UNPROCESSABLE_ENTITY)
    }

    async fn chat(Json(request): Json<ChatRequest>) -> (StatusCode, Json<Value>) {
        match request.question.as_str() {
            "slow down" => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "detail": "rate limited" })),
            ),
            "broken" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
            question => (
                StatusCode::OK,
                Json(json!({
                    "answer": format!("{} -> {}", question, request.report_context),
                    "sources": ["medical_knowledge.txt"]
                })),
            ),
        }
    }

    fn backend() -> Router {
        Router::new()
            .route(
                "/",
                get(|| async {
                    Json(json!({
                        "message": "Medical Report Explainer API",
                        "status": "running",
                        "rag_initialized": true
                    }))
                }),
            )
            .route("/upload-report", post(upload_report))
            .route("/chat", post(chat))
            .route(
                "/check-value",
                post(|Json(request): Json<ValueCheckRequest>| async move {
                    let high = request.value > 129.0;
                    let status = if high { "high" } else { "normal" };
                    Json(json!({
                        "is_abnormal": high,
                        "status": status,
                        "message": format!("{} checked", request.term),
                        "reference_range": "0-129 mg/dL"
                    }))
                }),
            )
    }

    fn pdf() -> ReportFile {
        ReportFile::new("labs.pdf", "application/pdf", b"%PDF-1.4 test".to_vec())
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_file_field() {
        let base = spawn_backend(backend()).await;
        let service = HttpReportService::new(format!("{}/", base));

        let report = service.extract_report(&pdf()).await.unwrap();

        assert_eq!(report.extracted_text, "LDL 190 mg/dL");
        assert!(report.summary.contains("labs.pdf contained 13 bytes"));
        assert_eq!(report.medical_terms[0].status.as_deref(), Some("high"));
        assert!(report.medical_terms[0].is_abnormal);
    }

    #[tokio::test]
    async fn test_upload_server_error_is_extraction_failure() {
        let router = Router::new().route(
            "/upload-report",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "pdf parser crashed" })),
                )
            }),
        );
        let service = HttpReportService::new(spawn_backend(router).await);

        let result = service.extract_report(&pdf()).await;
        assert_eq!(
            result,
            Err(FlowError::ExtractionFailed(
                "HTTP 500 Internal Server Error".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_malformed_report_is_extraction_failure() {
        let router = Router::new().route(
            "/upload-report",
            post(|| async { Json(json!({ "unexpected": true })) }),
        );
        let service = HttpReportService::new(spawn_backend(router).await);

        let result = service.extract_report(&pdf()).await;
        assert!(matches!(result, Err(FlowError::ExtractionFailed(msg)) if msg.starts_with("Malformed")));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_extraction_failure() {
        // bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let service = HttpReportService::new(format!("http://{}", addr));
        assert!(matches!(
            service.extract_report(&pdf()).await,
            Err(FlowError::ExtractionFailed(_))
        ));
        assert!(matches!(
            service.answer_question("Q", "").await,
            Err(FlowError::AnswerFailed { detail: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_chat_answer_and_error_detail() {
        let service = HttpReportService::new(spawn_backend(backend()).await);

        let answer = service.answer_question("What is LDL?", "ctx").await.unwrap();
        assert_eq!(answer, "What is LDL? -> ctx");

        let limited = service.answer_question("slow down", "ctx").await;
        assert!(matches!(
            limited,
            Err(FlowError::AnswerFailed { detail: Some(ref d), .. }) if d == "rate limited"
        ));

        let broken = service.answer_question("broken", "ctx").await;
        assert!(matches!(
            broken,
            Err(FlowError::AnswerFailed { detail: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_status_and_value_check() {
        let service = HttpReportService::new(spawn_backend(backend()).await);

        let status = service.status().await.unwrap();
        assert_eq!(status.status, "running");
        assert!(status.rag_initialized);

        let result = service
            .check_value(&ValueCheckRequest {
                term: "LDL".to_string(),
                value: 190.0,
                unit: "mg/dL".to_string(),
                age: None,
                gender: None,
            })
            .await
            .unwrap();
        assert!(result.is_abnormal);
        assert_eq!(result.status.as_deref(), Some("high"));
        assert_eq!(result.reference_range.as_deref(), Some("0-129 mg/dL"));
    }

    #[tokio::test]
    async fn test_session_over_http() {
        let service = Arc::new(HttpReportService::new(spawn_backend(backend()).await));
        let session = SessionOrchestrator::new(service.clone(), service);

        let outcome = session.submit(pdf()).await;
        assert!(matches!(outcome, UploadOutcome::Ready(_)));
        assert_eq!(session.chat().unwrap().context(), "LDL 190 mg/dL");

        let chat = session.chat().unwrap();
        assert!(matches!(
            chat.send("Is my cholesterol normal?").await,
            SendOutcome::Answered(_)
        ));
        assert!(matches!(chat.send("slow down").await, SendOutcome::Failed(_)));

        let transcript: Vec<_> = chat
            .messages()
            .into_iter()
            .map(|m| (m.role, m.content))
            .collect();
        assert_eq!(
            transcript,
            vec![
                (MessageRole::Assistant, GREETING.to_string()),
                (MessageRole::User, "Is my cholesterol normal?".to_string()),
                (
                    MessageRole::Assistant,
                    "Is my cholesterol normal? -> LDL 190 mg/dL".to_string()
                ),
                (MessageRole::User, "slow down".to_string()),
                (MessageRole::Assistant, "rate limited".to_string()),
            ]
        );
        assert_eq!(session.snapshot().phase, SessionPhase::Conversing);
    }

    #[tokio::test]
    async fn test_session_over_http_keeps_upload_view_on_500() {
        let router = Router::new().route(
            "/upload-report",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let service = Arc::new(HttpReportService::new(spawn_backend(router).await));
        let session = SessionOrchestrator::new(service.clone(), service);

        let outcome = session.submit(pdf()).await;
        assert!(matches!(outcome, UploadOutcome::Failed(_)));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.report, None);
        assert!(!snapshot.upload_in_flight());
        assert_eq!(snapshot.phase, SessionPhase::Idle);
    }
}
