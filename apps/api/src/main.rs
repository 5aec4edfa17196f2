mod compiler;
mod config;
mod db;
mod errors;
mod generation;
mod llm_client;
mod models;
mod queue;
mod render;
mod repository;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::compiler::artifacts::{ArtifactStore, LocalArtifactStore, S3ArtifactStore};
use crate::compiler::{CompilerConfig, DocumentCompiler};
use crate::config::{Config, S3Config};
use crate::db::create_pool;
use crate::generation::pipeline::GenerationPipeline;
use crate::llm_client::LlmClient;
use crate::queue::status::RedisStatusStore;
use crate::queue::{GenerationQueue, QueuePolicy};
use crate::repository::{PgRepository, Repositories};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let repos = Repositories::from_backend(Arc::new(PgRepository::new(db)));

    // Initialize Redis-backed job status store
    let redis = redis::Client::open(config.redis_url.clone())?;
    let statuses = RedisStatusStore::connect(&redis, config.job_retention).await?;
    info!("Redis job status store initialized");

    // Initialize artifact storage (S3 / MinIO when configured, local disk otherwise)
    let artifacts: Arc<dyn ArtifactStore> = match &config.s3 {
        Some(s3) => {
            info!("Storing artifacts in S3 bucket '{}'", s3.bucket);
            Arc::new(S3ArtifactStore::new(build_s3_client(s3).await, s3.bucket.clone()))
        }
        None => {
            info!("Storing artifacts under {}", config.artifact_dir.display());
            Arc::new(LocalArtifactStore::new(config.artifact_dir.clone()))
        }
    };

    // Initialize document compiler
    let compiler = DocumentCompiler::new(
        CompilerConfig::docker(
            config.compiler_program.clone(),
            &config.compiler_image,
            config.compile_work_dir.clone(),
            config.compile_timeout,
            config.compile_max_output_bytes,
        ),
        artifacts,
    );
    info!(
        "Document compiler: {} ({}), timeout {}s",
        config.compiler_program,
        config.compiler_image,
        config.compile_timeout.as_secs()
    );

    // Initialize LLM client
    let llm = Arc::new(LlmClient::new(config.anthropic_api_key.clone())?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Start the generation queue
    let pipeline = GenerationPipeline::new(repos.clone(), llm, compiler);
    let policy = QueuePolicy {
        attempts: config.queue_attempts.max(1),
        backoff: config.queue_backoff,
        attempt_timeout: config.queue_attempt_timeout,
    };
    let queue = GenerationQueue::start(
        Arc::new(pipeline),
        Arc::new(statuses),
        policy,
        config.queue_workers,
        config.queue_capacity,
    );

    // Build app state
    let state = AppState { repos, queue };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &S3Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        "forge-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
