//! Classification of files by type, used for the kind filter and uploads.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extensions the upload flow accepts.
pub const ACCEPTED_UPLOAD_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
    Other,
}

impl FileKind {
    /// Classifies the `file_type` field reported by the server, which holds
    /// either a category ("image") or a bare extension ("png").
    pub fn from_file_type(file_type: &str) -> Self {
        match file_type.trim().to_ascii_lowercase().as_str() {
            "pdf" => FileKind::Pdf,
            "image" | "png" | "jpg" | "jpeg" => FileKind::Image,
            _ => FileKind::Other,
        }
    }

    pub fn from_filename(filename: &str) -> Self {
        extension_of(filename)
            .map(|ext| Self::from_file_type(&ext))
            .unwrap_or(FileKind::Other)
    }
}

/// The "All / PDF / Images" chips of the search screen.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KindFilter {
    #[default]
    All,
    Pdf,
    Images,
}

impl KindFilter {
    pub fn admits(self, kind: FileKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Pdf => kind == FileKind::Pdf,
            KindFilter::Images => kind == FileKind::Image,
        }
    }
}

/// Lowercased extension without the dot.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_accepted_upload(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| ACCEPTED_UPLOAD_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// MIME type to send with an upload.
pub fn content_type_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
