//! Permanent storage for compiled artifacts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

/// Moves a compiled artifact out of its temporary directory.
/// Returns the permanent `file_path` persisted on the résumé record.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn store(&self, local_path: &Path, file_name: &str) -> Result<String>;
}

/// Copies artifacts into a directory on local disk.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn store(&self, local_path: &Path, file_name: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating artifact dir {}", self.root.display()))?;

        let destination = self.root.join(file_name);
        tokio::fs::copy(local_path, &destination)
            .await
            .with_context(|| format!("copying artifact to {}", destination.display()))?;

        info!("Stored artifact at {}", destination.display());
        Ok(destination.to_string_lossy().into_owned())
    }
}

/// Uploads artifacts to an S3-compatible bucket under `resumes/`.
pub struct S3ArtifactStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ArtifactStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn store(&self, local_path: &Path, file_name: &str) -> Result<String> {
        let bytes = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("reading artifact {}", local_path.display()))?;

        let key = format!("resumes/{file_name}");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type("application/pdf")
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

        info!("Uploaded artifact to s3://{}/{}", self.bucket, key);
        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_store_copies_into_root() {
        let scratch = tempfile::tempdir().unwrap();
        let source = scratch.path().join("resume.pdf");
        tokio::fs::write(&source, b"%PDF-1.5").await.unwrap();

        let root = scratch.path().join("artifacts/nested");
        let store = LocalArtifactStore::new(&root);
        let path = store.store(&source, "resume_1.pdf").await.unwrap();

        assert_eq!(PathBuf::from(&path), root.join("resume_1.pdf"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.5");
    }

    #[tokio::test]
    async fn test_local_store_missing_source_fails() {
        let scratch = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(scratch.path());
        let result = store.store(&scratch.path().join("absent.pdf"), "x.pdf").await;
        assert!(result.is_err());
    }
}
