//! History orchestration: detection recording, reads, deletes.

use crate::models::{DiseaseDetail, HistoryDetail, HistoryEntry, RankedScore};
use crate::services::metrics::DETECTIONS_TOTAL;
use crate::services::{Database, DiseaseCatalog, PredictionClient, Storage};
use service_core::error::AppError;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// How many ranked scores are retained per detection.
const TOP_SCORES: usize = 3;

#[derive(Clone)]
pub struct HistoryService {
    db: Database,
    predictor: PredictionClient,
    storage: Arc<dyn Storage>,
    catalog: Arc<DiseaseCatalog>,
}

impl HistoryService {
    pub fn new(
        db: Database,
        predictor: PredictionClient,
        storage: Arc<dyn Storage>,
        catalog: Arc<DiseaseCatalog>,
    ) -> Self {
        Self {
            db,
            predictor,
            storage,
            catalog,
        }
    }

    /// Run a detection for an already-uploaded image and persist the ranked
    /// result as a new history entry.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn record_detection(
        &self,
        user_id: Uuid,
        image_url: String,
    ) -> Result<HistoryEntry, AppError> {
        let predictions = match self.predictor.predict(&image_url).await {
            Ok(predictions) => predictions,
            Err(e) => {
                DETECTIONS_TOTAL.with_label_values(&["error"]).inc();
                return Err(e);
            }
        };

        let ranked = rank_scores(predictions);
        let entry = self.db.create_history(user_id, &image_url, &ranked).await?;

        DETECTIONS_TOTAL.with_label_values(&["ok"]).inc();
        tracing::info!(
            history_id = entry.history.history_id,
            diseases = entry.diseases.len(),
            "Detection recorded"
        );

        Ok(entry)
    }

    /// All history entries for a user, newest first.
    pub async fn list_history(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, AppError> {
        self.db.list_histories(user_id).await
    }

    /// A single owned history entry, each score enriched with symptoms from
    /// the reference catalog. Unknown disease names get an empty list.
    pub async fn get_history(
        &self,
        history_id: i64,
        user_id: Uuid,
    ) -> Result<HistoryDetail, AppError> {
        let entry = self
            .db
            .get_history(history_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("history not found")))?;

        let diseases = entry
            .diseases
            .into_iter()
            .map(|score| {
                let symptoms = self.catalog.symptoms(&score.disease).to_vec();
                DiseaseDetail { score, symptoms }
            })
            .collect();

        Ok(HistoryDetail {
            history: entry.history,
            diseases,
        })
    }

    /// Delete an owned history entry. The stored image is removed first; if
    /// that fails the record is left untouched so no entry ever references a
    /// half-deleted object.
    #[tracing::instrument(skip(self), fields(history_id = history_id, user_id = %user_id))]
    pub async fn delete_history(&self, history_id: i64, user_id: Uuid) -> Result<(), AppError> {
        let entry = self
            .db
            .get_history(history_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("history not found")))?;

        self.storage
            .delete(&entry.history.image_url)
            .await
            .map_err(|e| {
                tracing::error!(
                    history_id = history_id,
                    image_url = %entry.history.image_url,
                    error = %e,
                    "Image deletion failed, keeping history record"
                );
                e
            })?;

        let deleted = self.db.delete_history(history_id, user_id).await?;
        if !deleted {
            // Lost a race with a concurrent delete of the same entry.
            return Err(AppError::NotFound(anyhow::anyhow!("history not found")));
        }

        Ok(())
    }
}

/// Convert raw probabilities to integer percentages, rank descending and
/// keep the top entries. Stable sort: equal percentages keep the mapping's
/// iteration order.
fn rank_scores(predictions: BTreeMap<String, f64>) -> Vec<RankedScore> {
    let mut scores: Vec<RankedScore> = predictions
        .into_iter()
        .map(|(disease, probability)| RankedScore {
            disease,
            percentage: (probability * 100.0).floor() as i16,
        })
        .collect();

    scores.sort_by(|a, b| b.percentage.cmp(&a.percentage));
    scores.truncate(TOP_SCORES);
    scores
}
