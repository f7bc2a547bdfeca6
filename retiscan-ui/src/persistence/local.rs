//! Local store on the SQLite `predictions` table
//!
//! Every statement is filtered by the session's user id, so one user can
//! neither see nor delete another user's rows.

use super::{check_owner, PredictionStore, StoreError};
use crate::session::Session;
use chrono::{DateTime, SecondsFormat, Utc};
use retiscan_common::{ConfidenceScores, DrClass, NewPrediction, Prediction, PredictionId};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

type PredictionRow = (String, String, String, i64, String, String, String, String);

const SELECT_COLUMNS: &str = "SELECT id, user_id, created_at, prediction_class, confidence_scores, \
     image_url, gradcam_url, ai_explanation FROM predictions";

pub struct LocalStore {
    db: SqlitePool,
}

impl LocalStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn decode(row: PredictionRow) -> Result<Prediction, StoreError> {
    let (id, owner, created_at, class, scores, source_image, attention_map_image, explanation) = row;

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::Decode(format!("created_at '{}': {}", created_at, e)))?
        .with_timezone(&Utc);
    let class = DrClass::from_index(class)
        .ok_or_else(|| StoreError::Decode(format!("prediction_class {}", class)))?;
    let confidence_scores: ConfidenceScores =
        serde_json::from_str(&scores).map_err(|e| StoreError::Decode(e.to_string()))?;

    Ok(Prediction {
        id: PredictionId::new(id),
        owner,
        created_at,
        class,
        confidence_scores,
        source_image,
        attention_map_image,
        explanation,
    })
}

#[async_trait::async_trait]
impl PredictionStore for LocalStore {
    async fn list_by_owner(&self, session: &Session) -> Result<Vec<Prediction>, StoreError> {
        let rows: Vec<PredictionRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
            SELECT_COLUMNS
        ))
        .bind(session.user_id())
        .fetch_all(&self.db)
        .await
        .map_err(db_error)?;

        debug!(count = rows.len(), "Listed predictions");
        rows.into_iter().map(decode).collect()
    }

    async fn get_by_id(&self, session: &Session, id: &PredictionId) -> Result<Prediction, StoreError> {
        let row: Option<PredictionRow> =
            sqlx::query_as(&format!("{} WHERE id = ? AND user_id = ?", SELECT_COLUMNS))
                .bind(id.as_str())
                .bind(session.user_id())
                .fetch_optional(&self.db)
                .await
                .map_err(db_error)?;

        row.map(decode).unwrap_or_else(|| Err(StoreError::NotFound(id.clone())))
    }

    async fn insert(&self, session: &Session, record: &NewPrediction) -> Result<Prediction, StoreError> {
        check_owner(session, record)?;

        let id = Uuid::new_v4().to_string();
        // Fixed-width UTC timestamps sort correctly as text
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let scores = serde_json::to_string(&record.confidence_scores)
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO predictions (id, user_id, created_at, prediction_class, confidence_scores, \
             image_url, gradcam_url, ai_explanation) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&record.owner)
        .bind(&created_at)
        .bind(i64::from(record.class.index()))
        .bind(&scores)
        .bind(&record.source_image)
        .bind(&record.attention_map_image)
        .bind(&record.explanation)
        .execute(&self.db)
        .await
        .map_err(db_error)?;

        info!(record_id = %id, class = record.class.index(), "Prediction saved");
        self.get_by_id(session, &PredictionId::new(id)).await
    }

    async fn delete_by_id(&self, session: &Session, id: &PredictionId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM predictions WHERE id = ? AND user_id = ?")
            .bind(id.as_str())
            .bind(session.user_id())
            .execute(&self.db)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }

        info!(record_id = %id, "Prediction deleted");
        Ok(())
    }
}
