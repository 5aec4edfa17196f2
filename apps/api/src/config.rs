use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// S3 (or MinIO) credentials. Present only when `S3_BUCKET` is set.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,

    pub artifact_dir: PathBuf,
    pub s3: Option<S3Config>,

    pub compile_work_dir: PathBuf,
    pub compiler_program: String,
    pub compiler_image: String,
    pub compile_timeout: Duration,
    pub compile_max_output_bytes: usize,

    pub queue_workers: usize,
    pub queue_capacity: usize,
    pub queue_attempts: u32,
    pub queue_backoff: Duration,
    pub queue_attempt_timeout: Duration,
    pub job_retention: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3 = match std::env::var("S3_BUCKET") {
            Ok(bucket) if !bucket.trim().is_empty() => Some(S3Config {
                bucket,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            _ => None,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),

            artifact_dir: std::env::var("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./storage/resumes")),
            s3,

            compile_work_dir: std::env::var("COMPILE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            compiler_program: std::env::var("COMPILER_PROGRAM")
                .unwrap_or_else(|_| "docker".to_string()),
            compiler_image: std::env::var("COMPILER_IMAGE")
                .unwrap_or_else(|_| "texlive/texlive:latest".to_string()),
            compile_timeout: Duration::from_secs(parse_env("COMPILE_TIMEOUT_SECS", 30)?),
            compile_max_output_bytes: parse_env("COMPILE_MAX_OUTPUT_BYTES", 1024 * 1024)?,

            queue_workers: parse_env("QUEUE_WORKERS", 2)?,
            queue_capacity: parse_env("QUEUE_CAPACITY", 256)?,
            queue_attempts: parse_env("QUEUE_ATTEMPTS", 3)?,
            queue_backoff: Duration::from_millis(parse_env("QUEUE_BACKOFF_MS", 2000)?),
            queue_attempt_timeout: Duration::from_secs(parse_env(
                "QUEUE_ATTEMPT_TIMEOUT_SECS",
                120,
            )?),
            job_retention: Duration::from_secs(parse_env("JOB_RETENTION_SECS", 7 * 24 * 60 * 60)?),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
