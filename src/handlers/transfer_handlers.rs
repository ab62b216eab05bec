//! Handlers that move data between the object store and the local transfer
//! directory. All local paths in request bodies are relative to it.

use crate::{
    errors::AppError, models::object::StoredObjectRef, services::storage_service::StorageService,
};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UploadFileReq {
    /// Key prefix the file name is appended to.
    pub s3_path: String,
    pub local_path: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadDataReq {
    pub s3_path: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadFileReq {
    pub key: String,
    pub destination_dir: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadPrefixReq {
    pub bucket: Option<String>,
    pub prefix: String,
    pub destination_dir: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    /// Written files, relative to the transfer directory.
    pub files: Vec<String>,
}

/// POST `/uploads/file`
pub async fn upload_file(
    State(service): State<StorageService>,
    Json(req): Json<UploadFileReq>,
) -> Result<Json<StoredObjectRef>, AppError> {
    let stored = service.upload_file(&req.s3_path, &req.local_path).await?;
    Ok(Json(stored))
}

/// POST `/uploads/data`
pub async fn upload_data(
    State(service): State<StorageService>,
    Json(req): Json<UploadDataReq>,
) -> Result<Json<StoredObjectRef>, AppError> {
    let stored = service.upload_data(&req.s3_path, req.data).await?;
    Ok(Json(stored))
}

/// POST `/downloads/file`
pub async fn download_file(
    State(service): State<StorageService>,
    Json(req): Json<DownloadFileReq>,
) -> Result<Json<DownloadResponse>, AppError> {
    let written = service
        .download_file(
            &req.key,
            req.destination_dir.as_deref(),
            req.file_name.as_deref(),
        )
        .await?;
    Ok(Json(DownloadResponse {
        files: vec![written],
    }))
}

/// POST `/downloads/prefix` — download every object under a prefix.
pub async fn download_prefix(
    State(service): State<StorageService>,
    Json(req): Json<DownloadPrefixReq>,
) -> Result<Json<DownloadResponse>, AppError> {
    let files = service
        .download_prefix(req.bucket.as_deref(), &req.prefix, &req.destination_dir)
        .await?;
    Ok(Json(DownloadResponse { files }))
}
