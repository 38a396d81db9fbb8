pub mod history;

pub use history::{DiseaseDetail, DiseaseScore, History, HistoryDetail, HistoryEntry, RankedScore};
