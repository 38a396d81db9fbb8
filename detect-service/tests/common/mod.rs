//! Common test utilities for detect-service integration tests.

use detect_service::config::{
    AuthConfig, CatalogConfig, DatabaseConfig, DetectConfig, PredictorConfig, SecurityConfig,
    StorageBackend, StorageConfig,
};
use detect_service::middleware::AccessClaims;
use detect_service::startup::Application;
use jsonwebtoken::{encode, EncodingKey, Header};
use service_core::config::Config as CommonConfig;
use std::sync::Once;
use tempfile::TempDir;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,detect_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const TEST_JWT_SECRET: &str = "test-secret";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub storage_dir: TempDir,
    pub public_base_url: String,
}

impl TestApp {
    /// Mint a valid access token for `user_id`.
    pub fn token(&self, user_id: Uuid) -> String {
        let claims = AccessClaims {
            sub: user_id,
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .expect("Failed to encode test token")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Spawn a stub prediction service returning a fixed ranking.
async fn spawn_predictor_stub() -> String {
    use axum::{routing::post, Json, Router};

    let app = Router::new().route(
        "/",
        post(|| async {
            Json(serde_json::json!({
                "data": {
                    "Acne": 0.92,
                    "Eczema": 0.91999,
                    "Psoriasis": 0.5,
                    "Rosacea": 0.1
                }
            }))
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind predictor stub");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    format!("http://{}/", addr)
}

/// Build the test configuration against `TEST_DATABASE_URL`.
pub fn test_config(
    predictor_endpoint: String,
    storage_dir: &TempDir,
    public_base_url: &str,
) -> DetectConfig {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run integration tests");

    DetectConfig {
        common: CommonConfig { port: 0 },
        service_name: "detect-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: database_url,
            max_connections: 2,
            min_connections: 1,
        },
        auth: AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
        },
        predictor: PredictorConfig {
            endpoint: predictor_endpoint,
            timeout_secs: 5,
        },
        storage: StorageConfig {
            backend: StorageBackend::Local,
            local_path: Some(storage_dir.path().to_string_lossy().into_owned()),
            local_public_base_url: Some(public_base_url.to_string()),
            gcs_api_base: "https://storage.googleapis.com".to_string(),
            gcs_bucket: None,
            gcs_access_token: None,
        },
        catalog: CatalogConfig {
            path: "data/diseases.json".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["*".to_string()],
        },
    }
}

/// Spawn a test application over a stub predictor and local storage.
pub async fn spawn_app() -> TestApp {
    init_tracing();

    let predictor_endpoint = spawn_predictor_stub().await;
    let storage_dir = TempDir::new().expect("Failed to create storage dir");
    let public_base_url = "http://localhost:8080/uploads";

    let config = test_config(predictor_endpoint, &storage_dir, public_base_url);

    let app = Application::build(config)
        .await
        .expect("Failed to build application");

    let port = app.port();
    let address = format!("http://127.0.0.1:{}", port);

    // Start the application in the background
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();

    // Wait for server to be ready with retry
    let mut attempts = 0;
    loop {
        match client.get(format!("{}/health", address)).send().await {
            Ok(_) => break,
            Err(_) if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }
            Err(e) => panic!("Server not reachable after 20 attempts: {}", e),
        }
    }

    TestApp {
        address,
        client,
        storage_dir,
        public_base_url: public_base_url.to_string(),
    }
}

/// Upload a small fake image through POST /detect and return the response.
pub async fn post_detection(app: &TestApp, token: &str) -> reqwest::Response {
    let part = reqwest::multipart::Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
        .file_name("lesion.jpg")
        .mime_str("image/jpeg")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("detectImage", part);

    app.client
        .post(app.url("/detect"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .expect("Failed to post detection")
}
