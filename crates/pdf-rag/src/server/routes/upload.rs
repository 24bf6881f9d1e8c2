//! PDF upload endpoint

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempPath;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::ingestion::{is_pdf_filename, sanitize_filename, IngestReport, PdfExtractor};
use crate::server::state::AppState;
use crate::types::{Chunk, UploadResponse};

/// Multipart field carrying the PDF
const FILE_FIELD: &str = "file";

/// POST /upload_pdf/ - Save, extract, chunk, embed and index one PDF
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let start = Instant::now();

    let (filename, data) = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| Error::input(format!("Failed to read multipart field: {}", e)))?
            .ok_or_else(|| Error::input("No file provided"))?;

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::input("No file provided"))?;
        if !is_pdf_filename(&filename) {
            return Err(Error::input("File must be a PDF"));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::input(format!("Failed to read file: {}", e)))?;
        break (filename, data);
    };

    let safe_filename = sanitize_filename(&filename)?;
    tracing::info!("Processing file: {} ({} bytes)", safe_filename, data.len());

    // Refuse early when the name is taken; concurrent uploads race to the upsert
    let first_id = Chunk::record_id(&safe_filename, 0);
    if state.service().index().contains(&first_id).await? {
        return Err(Error::DuplicateId(first_id));
    }

    let folder = state.upload_folder().to_path_buf();
    let file_path = folder.join(&safe_filename);
    let staged = stage_upload(folder, data).await?;
    tracing::info!("Upload staged at: {}", staged.display());

    let document_timeout = state.config().processing.document_timeout();
    let result = match timeout(
        document_timeout,
        process_staged_pdf(&state, &safe_filename, &staged),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "processing {} after {}s",
            safe_filename,
            document_timeout.as_secs()
        ))),
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Error processing file {}: {}", safe_filename, e);
            discard_staged(staged).await;
            return Err(e);
        }
    };

    // Only the upload that won the index write gets the final name
    let target = file_path.clone();
    tokio::task::spawn_blocking(move || staged.persist(&target))
        .await
        .map_err(|e| Error::internal(format!("Saving upload failed: {}", e)))?
        .map_err(|e| Error::Io(e.error))?;
    tracing::info!("File saved successfully at: {}", file_path.display());

    tracing::info!(
        "Ingested {} ({} chunks) in {:.1}s",
        safe_filename,
        report.chunk_count,
        start.elapsed().as_secs_f64()
    );
    Ok(Json(UploadResponse {
        message: format!("Successfully processed {}", safe_filename),
        chunks_count: report.chunk_count,
    }))
}

/// Write the upload under a unique hidden name in the upload folder
///
/// The returned path deletes its file when dropped, so a cancelled request
/// leaves nothing behind.
async fn stage_upload(folder: PathBuf, data: Bytes) -> Result<TempPath> {
    tokio::task::spawn_blocking(move || -> Result<TempPath> {
        std::fs::create_dir_all(&folder)?;
        let mut file = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(".pdf")
            .tempfile_in(&folder)?;
        file.write_all(&data)?;
        Ok(file.into_temp_path())
    })
    .await
    .map_err(|e| Error::internal(format!("Staging upload failed: {}", e)))?
}

async fn process_staged_pdf(state: &AppState, document_id: &str, path: &Path) -> Result<IngestReport> {
    let text = PdfExtractor::extract_file(path).await?;
    tracing::info!("Text extraction completed for {}", document_id);
    state.service().ingest_document(document_id, &text).await
}

async fn discard_staged(staged: TempPath) {
    let path = staged.to_path_buf();
    match tokio::task::spawn_blocking(move || staged.close()).await {
        Ok(Ok(())) => tracing::info!("Cleaned up file: {}", path.display()),
        Ok(Err(e)) => tracing::error!("Error cleaning up file {}: {}", path.display(), e),
        Err(e) => tracing::error!("Cleanup task for {} failed: {}", path.display(), e),
    }
}
