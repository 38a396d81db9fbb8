//! Response shaping for the history endpoints.
//!
//! Percentages are persisted as integers in [0, 100] and re-expressed as
//! fractions in [0, 1] at the API boundary.

use crate::models::{DiseaseScore, HistoryDetail, HistoryEntry};
use serde::Serialize;
use uuid::Uuid;

/// Uniform success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            message: "Success".to_string(),
            data,
        }
    }
}

/// One disease score as returned to the client.
#[derive(Debug, Serialize)]
pub struct DiseaseScoreData {
    pub disease: String,
    /// Fraction in [0, 1], derived from the stored integer percentage.
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<Vec<String>>,
}

impl From<DiseaseScore> for DiseaseScoreData {
    fn from(score: DiseaseScore) -> Self {
        Self {
            disease: score.disease,
            percentage: f64::from(score.percentage) / 100.0,
            symptoms: None,
        }
    }
}

/// A shaped history entry.
#[derive(Debug, Serialize)]
pub struct HistoryData {
    pub id: i64,
    pub user_id: Uuid,
    pub image_url: String,
    pub diseases: Vec<DiseaseScoreData>,
}

impl From<HistoryEntry> for HistoryData {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.history.history_id,
            user_id: entry.history.user_id,
            image_url: entry.history.image_url,
            diseases: entry
                .diseases
                .into_iter()
                .map(DiseaseScoreData::from)
                .collect(),
        }
    }
}

impl From<HistoryDetail> for HistoryData {
    fn from(detail: HistoryDetail) -> Self {
        Self {
            id: detail.history.history_id,
            user_id: detail.history.user_id,
            image_url: detail.history.image_url,
            diseases: detail
                .diseases
                .into_iter()
                .map(|d| {
                    let mut data = DiseaseScoreData::from(d.score);
                    data.symptoms = Some(d.symptoms);
                    data
                })
                .collect(),
        }
    }
}
