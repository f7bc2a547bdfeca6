//! Hosted store: PostgREST-style `/rest/v1/predictions`

use super::{check_owner, PredictionStore, StoreError};
use crate::hosted::{HostedClient, ServiceError};
use crate::session::Session;
use reqwest::{Method, Response, StatusCode};
use retiscan_common::{NewPrediction, Prediction, PredictionId};
use tracing::{debug, info};

const TABLE: &str = "predictions";

/// Postgres `invalid_text_representation`: an id filter that is not a UUID
const INVALID_TEXT: &str = "22P02";

pub struct HostedStore {
    client: HostedClient,
}

impl HostedStore {
    pub fn new(client: HostedClient) -> Self {
        Self { client }
    }

    fn url(&self) -> String {
        self.client.rest_url(TABLE)
    }

    /// Decode a row set; `lookup` is the id filtered on, whose malformed form
    /// can never match a row
    async fn rows(response: Response, lookup: Option<&PredictionId>) -> Result<Vec<Prediction>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let error = ServiceError::from_response(response).await;
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(StoreError::Unauthorized(error.message));
            }
            if let Some(id) = lookup {
                if status == StatusCode::BAD_REQUEST && error.has_code(INVALID_TEXT) {
                    debug!(record_id = %id, message = %error.message, "Id is not a valid key");
                    return Err(StoreError::NotFound(id.clone()));
                }
            }
            return Err(StoreError::Backend(error.message));
        }

        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl PredictionStore for HostedStore {
    async fn list_by_owner(&self, session: &Session) -> Result<Vec<Prediction>, StoreError> {
        let owner_filter = format!("eq.{}", session.user.id);
        let response = self
            .client
            .authorized(Method::GET, &self.url(), &session.access_token)
            .query(&[
                ("select", "*"),
                ("user_id", owner_filter.as_str()),
                ("order", "created_at.desc"),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows = Self::rows(response, None).await?;
        debug!(count = rows.len(), "Listed predictions");
        Ok(rows)
    }

    async fn get_by_id(&self, session: &Session, id: &PredictionId) -> Result<Prediction, StoreError> {
        let id_filter = format!("eq.{}", id);
        let response = self
            .client
            .authorized(Method::GET, &self.url(), &session.access_token)
            .query(&[("select", "*"), ("id", id_filter.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Self::rows(response, Some(id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn insert(&self, session: &Session, record: &NewPrediction) -> Result<Prediction, StoreError> {
        check_owner(session, record)?;

        let response = self
            .client
            .authorized(Method::POST, &self.url(), &session.access_token)
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let stored = Self::rows(response, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no row".to_string()))?;

        info!(record_id = %stored.id, class = stored.class.index(), "Prediction saved");
        Ok(stored)
    }

    async fn delete_by_id(&self, session: &Session, id: &PredictionId) -> Result<(), StoreError> {
        let id_filter = format!("eq.{}", id);
        let response = self
            .client
            .authorized(Method::DELETE, &self.url(), &session.access_token)
            .header("Prefer", "return=representation")
            .query(&[("id", id_filter.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if Self::rows(response, Some(id)).await?.is_empty() {
            return Err(StoreError::NotFound(id.clone()));
        }

        info!(record_id = %id, "Prediction deleted");
        Ok(())
    }
}
