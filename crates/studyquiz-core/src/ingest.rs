//! Document ingestion.
//!
//! Checks an uploaded document's declared type and size and hands its bytes
//! to the generator. Nothing is stored.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::error::IngestError;

pub const PDF: &str = "application/pdf";
pub const PLAIN_TEXT: &str = "text/plain";
pub const MARKDOWN: &str = "text/markdown";

const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// An accepted document, buffered in memory.
#[derive(Clone, PartialEq)]
pub struct RawDocument {
    /// File name as uploaded.
    pub name: String,
    /// Normalized media type.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type == PDF
    }
}

impl fmt::Debug for RawDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawDocument")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Lowercase a declared type, drop parameters, and expand short aliases.
pub fn normalize_media_type(declared: &str) -> String {
    let base = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match base.as_str() {
        "pdf" => PDF.to_string(),
        "txt" | "text" => PLAIN_TEXT.to_string(),
        "md" | "markdown" | "text/x-markdown" => MARKDOWN.to_string(),
        _ => base,
    }
}

/// Guess a media type from a file extension.
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(PDF),
        "txt" => Some(PLAIN_TEXT),
        "md" | "markdown" => Some(MARKDOWN),
        _ => None,
    }
}

/// Validates uploads against an allow-list and a size ceiling.
#[derive(Debug, Clone)]
pub struct DocumentIngestor {
    allowed_types: Vec<String>,
    max_size_bytes: usize,
}

impl Default for DocumentIngestor {
    fn default() -> Self {
        Self {
            allowed_types: vec![PDF.into(), PLAIN_TEXT.into(), MARKDOWN.into()],
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
        }
    }
}

impl DocumentIngestor {
    pub fn new(allowed_types: Vec<String>, max_size_bytes: usize) -> Self {
        Self {
            allowed_types: allowed_types
                .iter()
                .map(|t| normalize_media_type(t))
                .collect(),
            max_size_bytes,
        }
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.allowed_types
    }

    /// Accept a document or say why not.
    pub fn ingest(&self, name: &str, bytes: Vec<u8>, declared_type: &str) -> Result<RawDocument, IngestError> {
        let media_type = normalize_media_type(declared_type);
        if !self.allowed_types.contains(&media_type) {
            return Err(IngestError::UnsupportedType(declared_type.to_string()));
        }
        if bytes.is_empty() {
            return Err(IngestError::Empty);
        }
        if bytes.len() > self.max_size_bytes {
            return Err(IngestError::TooLarge {
                size: bytes.len(),
                max: self.max_size_bytes,
            });
        }
        if media_type == PDF && !bytes.starts_with(PDF_SIGNATURE) {
            return Err(IngestError::ContentMismatch(media_type));
        }

        debug!(name, %media_type, size = bytes.len(), "document ingested");
        Ok(RawDocument {
            name: name.to_string(),
            media_type,
            bytes,
        })
    }

    /// Read and ingest a file, taking its type from the extension. Type and
    /// size are checked against the file's metadata before it is read.
    pub fn ingest_path(&self, path: &Path) -> anyhow::Result<RawDocument> {
        let declared = media_type_for_path(path).unwrap_or("application/octet-stream");
        let media_type = normalize_media_type(declared);
        if !self.allowed_types.contains(&media_type) {
            return Err(IngestError::UnsupportedType(declared.to_string()).into());
        }

        let size = std::fs::metadata(path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .len();
        if size > self.max_size_bytes as u64 {
            return Err(IngestError::TooLarge {
                size: usize::try_from(size).unwrap_or(usize::MAX),
                max: self.max_size_bytes,
            }
            .into());
        }

        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.ingest(&name, bytes, declared)?)
    }
}
