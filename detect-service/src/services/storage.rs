//! Object storage for uploaded detection images.
//!
//! The service only ever needs two operations: put bytes under a key and get
//! back a public URL, and later delete the object that URL points at.

use async_trait::async_trait;
use reqwest::header;
use service_core::error::AppError;
use std::path::PathBuf;
use tokio::fs;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload `data` under `key` and return the public URL of the object.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<String, AppError>;

    /// Delete the object a previously returned public URL points at.
    async fn delete(&self, url: &str) -> Result<(), AppError>;
}

/// Filesystem-backed storage for development and tests.
pub struct LocalStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub async fn new(
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        let public_base_url: String = public_base_url.into();
        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn key_from_url<'a>(&self, url: &'a str) -> Result<&'a str, AppError> {
        key_from_url(url, &self.public_base_url)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, AppError> {
        let path = self.base_path.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn delete(&self, url: &str) -> Result<(), AppError> {
        let key = self.key_from_url(url)?;
        let path = self.base_path.join(key);
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }
}

/// Google Cloud Storage JSON API client.
///
/// Uploads via `uploadType=media` and serves objects through the standard
/// `https://storage.googleapis.com/{bucket}/{key}` public URL. The access
/// token, when configured, is attached as a bearer credential.
pub struct GcsStorage {
    client: reqwest::Client,
    api_base: String,
    bucket: String,
    access_token: Option<String>,
}

impl GcsStorage {
    pub fn new(
        api_base: impl Into<String>,
        bucket: impl Into<String>,
        access_token: Option<String>,
    ) -> Self {
        let api_base: String = api_base.into();
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            access_token,
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.api_base, self.bucket, key)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl Storage for GcsStorage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        let upload_url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.api_base,
            self.bucket,
            urlencoding::encode(key)
        );

        let response = self
            .authorized(self.client.post(&upload_url))
            .header(header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("GCS upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, key = %key, "GCS upload rejected");
            return Err(AppError::InternalError(anyhow::anyhow!(
                "GCS upload returned {}",
                status
            )));
        }

        Ok(self.public_url(key))
    }

    async fn delete(&self, url: &str) -> Result<(), AppError> {
        let public_base = format!("{}/{}", self.api_base, self.bucket);
        let key = key_from_url(url, &public_base)?;
        let delete_url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.api_base,
            self.bucket,
            urlencoding::encode(key)
        );

        let response = self
            .authorized(self.client.delete(&delete_url))
            .send()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("GCS delete failed: {}", e)))?;

        let status = response.status();
        // An already-gone object is not a failure for our callers.
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, key = %key, "GCS delete rejected");
            return Err(AppError::InternalError(anyhow::anyhow!(
                "GCS delete returned {}",
                status
            )));
        }

        Ok(())
    }
}

/// Resolve the object key back out of a public URL produced by `upload`.
fn key_from_url<'a>(url: &'a str, public_base: &str) -> Result<&'a str, AppError> {
    let base = public_base.trim_end_matches('/');
    url.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "image URL {} does not belong to storage base {}",
                url,
                base
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_recovered_from_public_url() {
        let key = key_from_url(
            "https://storage.googleapis.com/detect-images/u1/abc.jpg",
            "https://storage.googleapis.com/detect-images",
        )
        .unwrap();
        assert_eq!(key, "u1/abc.jpg");
    }

    #[test]
    fn foreign_url_is_rejected() {
        assert!(key_from_url(
            "https://elsewhere.example/detect-images/u1/abc.jpg",
            "https://storage.googleapis.com/detect-images",
        )
        .is_err());
    }

    #[test]
    fn bare_base_url_is_rejected() {
        assert!(key_from_url(
            "https://storage.googleapis.com/detect-images/",
            "https://storage.googleapis.com/detect-images",
        )
        .is_err());
    }

    #[tokio::test]
    async fn local_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/uploads")
            .await
            .unwrap();

        let url = storage
            .upload("u1/test.jpg", b"bytes".to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8080/uploads/u1/test.jpg");
        assert!(dir.path().join("u1/test.jpg").exists());

        storage.delete(&url).await.unwrap();
        assert!(!dir.path().join("u1/test.jpg").exists());
    }

    #[tokio::test]
    async fn local_delete_tolerates_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/uploads")
            .await
            .unwrap();
        storage
            .delete("http://localhost:8080/uploads/u1/never-uploaded.jpg")
            .await
            .unwrap();
    }
}
