//! Project import/export as gzipped tar archives.
//!
//! Text files travel as UTF-8; binary assets are stored in the virtual
//! project as `data:` URIs so the assembler can inline them into `<img>`
//! tags directly, and are decoded back to raw bytes on export.

use std::io::Read;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

use crate::store::VirtualFileStore;
use crate::util::file_extension;
use crate::VirtualFile;

/// Extensions stored as UTF-8 text rather than data URIs.
const TEXT_EXTENSIONS: [&str; 16] = [
    "html", "htm", "css", "js", "jsx", "ts", "tsx", "json", "md", "txt", "svg", "xml", "yaml",
    "yml", "env", "csv",
];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid data uri in '{0}'")]
    InvalidDataUri(String),
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Read a gzipped tar archive into virtual files. Directory entries are
/// skipped; paths are normalized to the store's leading-slash form.
pub fn import_archive(bytes: &[u8]) -> Result<Vec<VirtualFile>, ArchiveError> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut files = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = VirtualFileStore::normalize_path(&entry.path()?.to_string_lossy());
        let mut raw = Vec::new();
        entry.read_to_end(&mut raw)?;

        let content = if is_text_path(&path) {
            String::from_utf8_lossy(&raw).into_owned()
        } else {
            format!("data:{};base64,{}", mime_for(&path), BASE64.encode(&raw))
        };
        files.push(VirtualFile::text(path, content));
    }
    tracing::debug!(files = files.len(), "imported archive");
    Ok(files)
}

/// Write virtual files out as a gzipped tar archive. Data-URI contents are
/// decoded back to their raw bytes.
pub fn export_archive(files: &[VirtualFile]) -> Result<Vec<u8>, ArchiveError> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for file in files {
        let bytes = match decode_data_uri(&file.content) {
            Some(decoded) => decoded.map_err(|_| ArchiveError::InvalidDataUri(file.path.clone()))?,
            None => file.content.as_bytes().to_vec(),
        };
        let name = file.path.trim_start_matches('/');

        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, bytes.as_slice())?;
    }

    Ok(builder.into_inner()?.finish()?)
}

fn is_text_path(path: &str) -> bool {
    match file_extension(path) {
        Some(ext) => TEXT_EXTENSIONS.contains(&ext.as_str()),
        None => true,
    }
}

fn mime_for(path: &str) -> &'static str {
    match file_extension(path).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        _ => "application/octet-stream",
    }
}

/// `Some(result)` when the content is a base64 data URI, `None` otherwise.
fn decode_data_uri(content: &str) -> Option<Result<Vec<u8>, base64::DecodeError>> {
    let rest = content.strip_prefix("data:")?;
    let (_, payload) = rest.split_once(";base64,")?;
    Some(BASE64.decode(payload))
}
