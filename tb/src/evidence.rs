//! Evidence ingestion
//!
//! Uploaded media is copied into the media directory under a generated
//! name; the session only keeps the resulting [`EvidenceFile`] reference.

use std::path::Path;

use eyre::{Context, Result, eyre};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::EvidenceFile;

const FALLBACK_MIME: &str = "application/octet-stream";

/// MIME type inferred from a file extension
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "mp4" => "video/mp4",
        "3gp" => "video/3gpp",
        "ogg" | "opus" => "audio/ogg",
        "mp3" => "audio/mpeg",
        _ => FALLBACK_MIME,
    }
}

/// Copy an uploaded file into `media_dir` and describe it
///
/// The stored name is `<sender>_<uuid>.<ext>` so uploads never collide.
pub async fn store_media(media_dir: &Path, phone: &str, source: &Path) -> Result<EvidenceFile> {
    debug!(?media_dir, %phone, ?source, "store_media: called");
    let metadata = tokio::fs::metadata(source)
        .await
        .context(format!("Failed to read {}", source.display()))?;
    if !metadata.is_file() {
        return Err(eyre!("{} is not a file", source.display()));
    }

    tokio::fs::create_dir_all(media_dir)
        .await
        .context("Failed to create media directory")?;

    let mime_type = mime_for(source);
    let file_name = match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", phone, Uuid::now_v7(), ext.to_lowercase()),
        None => format!("{}_{}", phone, Uuid::now_v7()),
    };
    let target = media_dir.join(&file_name);
    tokio::fs::copy(source, &target)
        .await
        .context(format!("Failed to copy evidence to {}", target.display()))?;

    info!(%file_name, %mime_type, bytes = metadata.len(), "Evidence stored");
    Ok(EvidenceFile {
        file_name,
        file_path: target.to_string_lossy().into_owned(),
        mime_type: mime_type.to_string(),
    })
}
