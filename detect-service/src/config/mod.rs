use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct DetectConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub predictor: PredictorConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: Option<String>,
    pub local_public_base_url: Option<String>,
    pub gcs_api_base: String,
    pub gcs_bucket: Option<String>,
    pub gcs_access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Gcs,
}

impl DetectConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(DetectConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("detect-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!("DATABASE_MAX_CONNECTIONS: {}", e))
                    })?,
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!("DATABASE_MIN_CONNECTIONS: {}", e))
                    })?,
            },
            auth: AuthConfig {
                jwt_secret: get_env("JWT_SECRET", Some("dev-secret-change-me"), is_prod)?,
            },
            predictor: PredictorConfig {
                endpoint: get_env("PREDICTOR_ENDPOINT", None, is_prod)?,
                timeout_secs: get_env("PREDICTOR_TIMEOUT_SECS", Some("30"), is_prod)?
                    .parse()
                    .map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!("PREDICTOR_TIMEOUT_SECS: {}", e))
                    })?,
            },
            storage: StorageConfig {
                backend: get_env("STORAGE_BACKEND", Some("local"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                local_path: Some(get_env("STORAGE_LOCAL_PATH", Some("storage"), is_prod)?),
                local_public_base_url: Some(get_env(
                    "STORAGE_LOCAL_PUBLIC_BASE_URL",
                    Some("http://localhost:8080/uploads"),
                    is_prod,
                )?),
                gcs_api_base: get_env(
                    "STORAGE_GCS_API_BASE",
                    Some("https://storage.googleapis.com"),
                    is_prod,
                )?,
                gcs_bucket: env::var("STORAGE_GCS_BUCKET").ok(),
                gcs_access_token: env::var("STORAGE_GCS_ACCESS_TOKEN").ok(),
            },
            catalog: CatalogConfig {
                path: get_env("CATALOG_PATH", Some("data/diseases.json"), is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("*"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        })
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "gcs" => Ok(StorageBackend::Gcs),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}
