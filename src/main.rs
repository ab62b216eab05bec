use anyhow::Result;
use axum::Router;
use cloud_gateway::{
    AppState,
    config::AppConfig,
    routes,
    services::{
        object_store::S3ObjectStore, payload_offload::PayloadOffloader,
        queue_client::SqsQueueClient, queue_service::QueueService,
        storage_service::StorageService,
    },
};
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting cloud-gateway with config: {:?}", cfg);

    // --- Ensure transfer directory exists ---
    if !Path::new(&cfg.transfer_dir).exists() {
        fs::create_dir_all(&cfg.transfer_dir)?;
        tracing::info!("Created transfer directory at {}", cfg.transfer_dir);
    }

    // --- Initialize SDK clients ---
    let sdk_config = cfg.load_sdk_config().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(cfg.endpoint_url.is_some())
        .build();
    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    let sqs_client = aws_sdk_sqs::Client::new(&sdk_config);
    tracing::debug!(
        region = %cfg.region,
        endpoint = cfg.endpoint_url.as_deref().unwrap_or("default"),
        "SDK clients ready"
    );

    // --- Initialize core services ---
    let store = Arc::new(S3ObjectStore::new(s3_client));
    let offloader =
        PayloadOffloader::new(store.clone(), cfg.bucket.clone(), cfg.large_payload_threshold);
    let state = AppState {
        storage: StorageService::new(store, cfg.bucket.clone(), cfg.transfer_dir.clone()),
        queues: QueueService::new(Arc::new(SqsQueueClient::new(sqs_client)), offloader),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_body_bytes).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
