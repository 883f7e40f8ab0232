//! Domain types shared by the indexing, retrieval and answering crates.

use serde::{Deserialize, Serialize};

pub type SegmentId = String;

/// File format a source document arrived in. Extraction happens upstream;
/// this only drives citation formatting and display.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Srt,
    Txt,
    Md,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            "srt" => Some(FileType::Srt),
            "txt" => Some(FileType::Txt),
            "md" | "markdown" => Some(FileType::Md),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Srt => "srt",
            FileType::Txt => "txt",
            FileType::Md => "md",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::from_extension(s)
    }

    /// How the type reads in a citation, e.g. "[Title (Transcript)]".
    pub fn display_label(self) -> &'static str {
        match self {
            FileType::Pdf => "PDF",
            FileType::Srt => "Transcript",
            FileType::Txt => "TXT",
            FileType::Md => "MD",
        }
    }

    /// Paginated sources carry page ranges into citations; everything else
    /// is cited once per source.
    pub fn is_paginated(self) -> bool {
        matches!(self, FileType::Pdf)
    }
}

/// Inclusive, 1-indexed page span within a paginated source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSpan {
    pub start: u32,
    pub end: u32,
}

impl PageSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn single(page: u32) -> Self {
        Self { start: page, end: page }
    }
}

/// Where a segment came from: the stable source document id plus the page
/// span it was cut from, when the source is paginated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub source_id: String,
    pub pages: Option<PageSpan>,
}

impl SourceRef {
    pub fn unpaged(source_id: impl Into<String>) -> Self {
        Self { source_id: source_id.into(), pages: None }
    }

    pub fn paged(source_id: impl Into<String>, span: PageSpan) -> Self {
        Self { source_id: source_id.into(), pages: Some(span) }
    }
}

/// A chunk of a source document that is independently embedded and indexed.
///
/// Segments are immutable once stored; re-ingesting a source replaces its
/// segments wholesale (delete, then insert).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    pub text: String,
    pub source: SourceRef,
    pub title: String,
    pub file_type: FileType,
    pub course_id: Option<String>,
}

/// Which search path produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Vector,
    Lexical,
    Hybrid,
}

/// A segment with its retrieval score.
///
/// Vector-origin scores are cosine similarities in [0, 1]; hybrid scores are
/// unbounded reciprocal-rank-fusion sums.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSegment {
    pub segment: Segment,
    pub score: f32,
    pub origin: Origin,
}

/// A row returned by the vector store: the stored segment, its cosine
/// distance to the query, and the vector captured at ingestion time.
#[derive(Debug, Clone)]
pub struct StoredHit {
    pub segment: Segment,
    pub distance: f32,
    pub vector: Vec<f32>,
}

impl StoredHit {
    /// Cosine similarity; the store's distance convention is `1 - cos`.
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Metadata predicate understood by the vector store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataFilter {
    Source(String),
    Course(String),
}

/// Chat message for the generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}
