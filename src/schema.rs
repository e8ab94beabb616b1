//! Study session data model.
//!
//! These types travel between the generation backend, the session state
//! machine and the HTTP layer, so they all (de)serialize with serde.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Media types accepted for upload.
pub const SUPPORTED_MEDIA_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

/// An uploaded document image. Consumed by text extraction.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

impl UploadedDocument {
    /// Build a document from an upload, resolving its media type.
    ///
    /// The declared type wins when it is one of the supported image types.
    /// Otherwise the type is sniffed from the payload's magic bytes.
    /// Returns `None` when neither yields a supported type.
    pub fn from_upload(filename: String, declared: Option<&str>, data: Vec<u8>) -> Option<Self> {
        let media_type = declared
            .filter(|m| is_supported_media_type(m))
            .map(str::to_string)
            .or_else(|| sniff_media_type(&data).map(str::to_string))?;

        Some(Self {
            filename,
            media_type,
            data,
        })
    }

    /// Summary of the upload that is safe to keep after the payload is dropped.
    pub fn info(&self) -> DocumentInfo {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        DocumentInfo {
            filename: self.filename.clone(),
            media_type: self.media_type.clone(),
            size_bytes: self.data.len(),
            sha256: format!("{:x}", hasher.finalize()),
        }
    }
}

pub fn is_supported_media_type(media_type: &str) -> bool {
    SUPPORTED_MEDIA_TYPES.contains(&media_type)
}

/// Detect a supported image type from magic bytes.
fn sniff_media_type(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

/// Metadata about the document a session was started from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub media_type: String,
    pub size_bytes: usize,
    pub sha256: String,
}

/// Full OCR output of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractedText(String);

impl ExtractedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl QuizQuestion {
    /// Whether the correct answer is actually one of the options.
    pub fn answer_in_options(&self) -> bool {
        self.options.iter().any(|o| *o == self.correct_answer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub term: String,
    pub definition: String,
}

/// The presentation currently selected within a ready session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StudyMode {
    #[default]
    Summary,
    Quiz,
    Flashcards,
    FullText,
}

/// Outcome of a structured-output generation call.
///
/// `Items` may be empty when the backend returned an empty array.
/// `Degraded` means the output could not be parsed at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Generated<T> {
    Items { items: Vec<T> },
    Degraded { reason: String },
}

impl<T> Generated<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Generated::Items { items } => items,
            Generated::Degraded { .. } => &[],
        }
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Generated::Items { .. } => None,
            Generated::Degraded { reason } => Some(reason),
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

impl<T> From<Vec<T>> for Generated<T> {
    fn from(items: Vec<T>) -> Self {
        Generated::Items { items }
    }
}

/// Everything produced for one uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    pub extracted_text: ExtractedText,
    pub summary: String,
    pub quiz: Generated<QuizQuestion>,
    pub flashcards: Generated<Flashcard>,
}
