//! Input validation for evidence uploads
//!
//! Filename sanitization plus the fixed extension and MIME allow-lists.
//! The MIME check is defense in depth only; the declared content type is
//! never treated as proof of what the bytes actually are.

use std::path::Path;
use thiserror::Error;

/// File extensions accepted for evidence uploads
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    ".pdf", ".png", ".jpg", ".jpeg", ".gif", // documents and images
    ".txt", ".md", ".csv", // text
    ".doc", ".docx", ".xls", ".xlsx", // office
    ".zip", ".rar", ".7z", // archives
    ".json", ".xml", // structured data
];

/// Declared MIME types accepted for evidence uploads
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/gif",
    "text/plain",
    "text/markdown",
    "text/csv",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/zip",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
    "application/json",
    "application/xml",
    "text/xml",
];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Filename is required")]
    EmptyFilename,
    #[error("File type not allowed. Allowed extensions: {0}")]
    ExtensionNotAllowed(String),
    #[error("File MIME type not allowed: {0}")]
    MimeNotAllowed(String),
    #[error("File is empty")]
    EmptyFile,
}

/// Strip every directory component from a client-supplied name, leaving the
/// bare filename to use as a storage key (path-traversal defense). Handles
/// both `/` and `\` separators regardless of the client platform.
pub fn sanitize_filename(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or("").to_string()
}

/// Lowercased extension of a filename, dot included
fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// Validate a client-supplied filename: non-empty, extension allow-listed
pub fn validate_filename(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyFilename);
    }

    match file_extension(name) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => {
            let mut allowed: Vec<&str> = ALLOWED_EXTENSIONS.to_vec();
            allowed.sort_unstable();
            Err(ValidationError::ExtensionNotAllowed(allowed.join(", ")))
        }
    }
}

/// Validate a declared content type, when one was supplied
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ValidationError> {
    match content_type {
        Some(mime) if !ALLOWED_MIME_TYPES.contains(&mime) => {
            Err(ValidationError::MimeNotAllowed(mime.to_string()))
        }
        _ => Ok(()),
    }
}
