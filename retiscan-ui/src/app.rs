//! Service wiring: one backend selected by configuration, shared by every view

use crate::flow::UploadController;
use crate::history::HistoryView;
use crate::hosted::HostedClient;
use crate::persistence::{HostedStore, LocalStore, PredictionStore};
use crate::prediction::{HttpPredictionClient, Predictor};
use crate::session::hosted::HostedAuth;
use crate::session::local::LocalAuth;
use crate::session::{AuthProvider, SessionStore};
use retiscan_common::config::{AppConfig, BackendMode};
use retiscan_common::db::init_database;
use retiscan_common::events::EventBus;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Common(#[from] retiscan_common::Error),

    #[error("HTTP client setup failed: {0}")]
    Http(String),
}

/// Everything a front end needs, built once per process
pub struct Services {
    pub config: AppConfig,
    pub events: EventBus,
    pub session: SessionStore,
    pub predictor: Arc<dyn Predictor>,
    pub store: Arc<dyn PredictionStore>,
}

impl Services {
    /// Connect the configured backend and restore a saved session
    pub async fn start(config: AppConfig) -> Result<Self, StartupError> {
        config.ensure_root_folder()?;
        let events = EventBus::default();

        let (auth, store): (Arc<dyn AuthProvider>, Arc<dyn PredictionStore>) = match config.backend.mode {
            BackendMode::Local => {
                let db_path = config.database_path();
                info!("Local backend: {}", db_path.display());
                let db = init_database(&db_path).await?;
                (Arc::new(LocalAuth::new(db.clone())), Arc::new(LocalStore::new(db)))
            }
            BackendMode::Hosted => {
                let (Some(url), Some(key)) = (&config.backend.url, &config.backend.anon_key) else {
                    return Err(retiscan_common::Error::Config(
                        "Hosted backend requires a URL and API key".to_string(),
                    )
                    .into());
                };
                info!("Hosted backend: {}", url);
                let client = HostedClient::new(url, key, config.prediction.timeout)
                    .map_err(|e| StartupError::Http(e.to_string()))?;
                (
                    Arc::new(HostedAuth::new(client.clone(), config.backend.redirect_url.clone())),
                    Arc::new(HostedStore::new(client)),
                )
            }
        };

        let predictor = HttpPredictionClient::new(&config.prediction.base_url, config.prediction.timeout)
            .map_err(|e| StartupError::Http(e.detail))?;
        info!("Prediction endpoint: {}", predictor.endpoint());

        let session = SessionStore::new(auth, events.clone()).with_token_file(config.session_path());
        match session.restore().await {
            Ok(Some(restored)) => info!(user_id = %restored.user.id, "Session restored"),
            Ok(None) => {}
            Err(e) => warn!("Could not verify saved session: {}", e),
        }

        Ok(Self { config, events, session, predictor: Arc::new(predictor), store })
    }

    pub fn upload_controller(&self) -> UploadController {
        UploadController::new(
            self.session.clone(),
            self.predictor.clone(),
            self.store.clone(),
            self.events.clone(),
            self.config.max_image_bytes,
        )
    }

    pub fn history(&self) -> HistoryView {
        HistoryView::new(self.session.clone(), self.store.clone(), self.events.clone())
    }
}
