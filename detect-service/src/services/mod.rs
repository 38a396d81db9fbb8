pub mod catalog;
pub mod database;
pub mod history;
pub mod metrics;
pub mod predictor;
pub mod storage;

pub use catalog::DiseaseCatalog;
pub use database::Database;
pub use history::HistoryService;
pub use metrics::{get_metrics, init_metrics};
pub use predictor::PredictionClient;
pub use storage::{GcsStorage, LocalStorage, Storage};
