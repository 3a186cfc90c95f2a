use report_flow::{FilePreferenceStore, PreferenceStore, SessionOrchestrator, ThemeController};
use std::sync::Arc;
use tracing::debug;

use crate::{config::ClientConfig, service::HttpReportService};

pub fn create_report_service(config: &ClientConfig) -> Arc<HttpReportService> {
    Arc::new(HttpReportService::new(config.api_url.clone()))
}

/// One session, with both collaborators served by the same backend.
pub fn create_report_session(service: Arc<HttpReportService>) -> Arc<SessionOrchestrator> {
    Arc::new(SessionOrchestrator::new(service.clone(), service))
}

pub async fn create_theme_controller(config: &ClientConfig) -> anyhow::Result<ThemeController> {
    let store = FilePreferenceStore::open(&config.preferences_path).await?;
    debug!("Theme preference stored in {}", store.path().display());

    let store: Arc<dyn PreferenceStore> = Arc::new(store);
    Ok(ThemeController::load(store).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_flow::{SessionPhase, Theme};

    #[tokio::test]
    async fn test_wiring() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            api_url: "http://localhost:8000".to_string(),
            preferences_path: dir.path().join("preferences.json"),
        };

        let service = create_report_service(&config);
        assert_eq!(service.base_url(), "http://localhost:8000");

        let session = create_report_session(service);
        assert_eq!(session.snapshot().phase, SessionPhase::Idle);

        let themes = create_theme_controller(&config).await.unwrap();
        assert_eq!(themes.current(), Theme::Dark);
        themes.set(Theme::Light).await.unwrap();

        let themes = create_theme_controller(&config).await.unwrap();
        assert_eq!(themes.current(), Theme::Light);

        themes.reset().await.unwrap();
        let themes = create_theme_controller(&config).await.unwrap();
        assert_eq!(themes.current(), Theme::Dark);
    }
}
