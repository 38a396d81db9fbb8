//! Database service for detect-service.

use crate::models::{DiseaseScore, History, HistoryEntry, RankedScore};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "detect-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // History Operations
    // -------------------------------------------------------------------------

    /// Persist a history entry together with its ranked scores in a single
    /// transaction. `scores` must already be ranked and truncated.
    #[instrument(skip(self, scores), fields(user_id = %user_id, score_count = scores.len()))]
    pub async fn create_history(
        &self,
        user_id: Uuid,
        image_url: &str,
        scores: &[RankedScore],
    ) -> Result<HistoryEntry, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_history"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let history = sqlx::query_as::<_, History>(
            r#"
            INSERT INTO histories (user_id, image_url)
            VALUES ($1, $2)
            RETURNING history_id, user_id, image_url, created_utc
            "#,
        )
        .bind(user_id)
        .bind(image_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create history: {}", e)))?;

        let mut diseases = Vec::with_capacity(scores.len());
        for score in scores {
            let inserted = sqlx::query_as::<_, DiseaseScore>(
                r#"
                INSERT INTO disease_scores (history_id, disease, percentage)
                VALUES ($1, $2, $3)
                RETURNING score_id, history_id, disease, percentage
                "#,
            )
            .bind(history.history_id)
            .bind(&score.disease)
            .bind(score.percentage)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert disease score: {}", e))
            })?;
            diseases.push(inserted);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            history_id = history.history_id,
            diseases = diseases.len(),
            "History entry created"
        );

        Ok(HistoryEntry { history, diseases })
    }

    /// List all history entries owned by `user_id`, newest first, each with
    /// its ranked scores.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_histories(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_histories"])
            .start_timer();

        let histories = sqlx::query_as::<_, History>(
            r#"
            SELECT history_id, user_id, image_url, created_utc
            FROM histories
            WHERE user_id = $1
            ORDER BY created_utc DESC, history_id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list histories: {}", e)))?;

        let history_ids: Vec<i64> = histories.iter().map(|h| h.history_id).collect();
        let scores = self.scores_for(&history_ids).await?;
        let entries = group_scores(histories, scores);

        timer.observe_duration();
        Ok(entries)
    }

    /// Get a single history entry, only if it exists AND is owned by
    /// `user_id`. An ownership mismatch is indistinguishable from absence.
    #[instrument(skip(self), fields(history_id = history_id, user_id = %user_id))]
    pub async fn get_history(
        &self,
        history_id: i64,
        user_id: Uuid,
    ) -> Result<Option<HistoryEntry>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_history"])
            .start_timer();

        let history = sqlx::query_as::<_, History>(
            r#"
            SELECT history_id, user_id, image_url, created_utc
            FROM histories
            WHERE history_id = $1 AND user_id = $2
            "#,
        )
        .bind(history_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get history: {}", e)))?;

        let entry = match history {
            Some(history) => {
                let diseases = self.scores_for(&[history.history_id]).await?;
                Some(HistoryEntry { history, diseases })
            }
            None => None,
        };

        timer.observe_duration();
        Ok(entry)
    }

    /// Delete a history entry and its scores (FK cascade), only if owned by
    /// `user_id`. Returns false when nothing matched.
    #[instrument(skip(self), fields(history_id = history_id, user_id = %user_id))]
    pub async fn delete_history(&self, history_id: i64, user_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_history"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM histories
            WHERE history_id = $1 AND user_id = $2
            "#,
        )
        .bind(history_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete history: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(history_id = history_id, "History entry deleted");
        }
        Ok(deleted)
    }

    /// Fetch scores for a batch of history ids, ranked order preserved.
    async fn scores_for(&self, history_ids: &[i64]) -> Result<Vec<DiseaseScore>, AppError> {
        if history_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, DiseaseScore>(
            r#"
            SELECT score_id, history_id, disease, percentage
            FROM disease_scores
            WHERE history_id = ANY($1)
            ORDER BY history_id, percentage DESC, score_id
            "#,
        )
        .bind(history_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch disease scores: {}", e))
        })
    }
}

/// Attach fetched scores to their history rows, preserving history order.
fn group_scores(histories: Vec<History>, scores: Vec<DiseaseScore>) -> Vec<HistoryEntry> {
    let mut by_history: HashMap<i64, Vec<DiseaseScore>> = HashMap::new();
    for score in scores {
        by_history.entry(score.history_id).or_default().push(score);
    }

    histories
        .into_iter()
        .map(|history| {
            let diseases = by_history.remove(&history.history_id).unwrap_or_default();
            HistoryEntry { history, diseases }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn history(id: i64) -> History {
        History {
            history_id: id,
            user_id: Uuid::new_v4(),
            image_url: format!("http://localhost/uploads/{}.jpg", id),
            created_utc: Utc::now(),
        }
    }

    fn score(history_id: i64, disease: &str, percentage: i16) -> DiseaseScore {
        DiseaseScore {
            score_id: 0,
            history_id,
            disease: disease.to_string(),
            percentage,
        }
    }

    #[test]
    fn scores_are_grouped_under_their_history() {
        let entries = group_scores(
            vec![history(1), history(2)],
            vec![
                score(2, "Acne", 92),
                score(2, "Eczema", 50),
                score(1, "Rosacea", 10),
            ],
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].history.history_id, 1);
        assert_eq!(entries[0].diseases.len(), 1);
        assert_eq!(entries[1].diseases.len(), 2);
    }

    #[test]
    fn history_without_scores_gets_empty_list() {
        let entries = group_scores(vec![history(1)], vec![]);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].diseases.is_empty());
    }
}
