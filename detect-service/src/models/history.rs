//! History entry and disease score models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One stored detection result, owned by a single user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct History {
    pub history_id: i64,
    pub user_id: Uuid,
    pub image_url: String,
    pub created_utc: DateTime<Utc>,
}

/// A (disease, percentage) pair attached to a history entry.
///
/// `percentage` is an integer in [0, 100], computed as
/// `floor(raw_probability * 100)` at detection time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DiseaseScore {
    pub score_id: i64,
    pub history_id: i64,
    pub disease: String,
    pub percentage: i16,
}

/// A history row together with its ranked scores, ordered descending by
/// percentage as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub history: History,
    pub diseases: Vec<DiseaseScore>,
}

/// Input for persisting one ranked score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedScore {
    pub disease: String,
    pub percentage: i16,
}

/// A disease score enriched with symptoms from the reference catalog.
#[derive(Debug, Clone, Serialize)]
pub struct DiseaseDetail {
    pub score: DiseaseScore,
    pub symptoms: Vec<String>,
}

/// A history entry enriched for the get-by-id path.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryDetail {
    pub history: History,
    pub diseases: Vec<DiseaseDetail>,
}
