pub mod detect;
pub mod health;

pub use detect::{delete_history, detect, get_history, list_history};
pub use health::{health_check, metrics_endpoint};
