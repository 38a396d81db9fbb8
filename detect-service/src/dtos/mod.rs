pub mod history;

pub use history::{ApiResponse, DiseaseScoreData, HistoryData};
