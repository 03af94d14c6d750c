//! Core domain types for studyshelf.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

mod render;

pub use render::{EngineEvent, Generation, RenderId, RgbaBitmap, ViewerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u32);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub category: String,
    pub path: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub glyph: String,
    pub color: String,
}

impl CategoryInfo {
    /// Parses `color` as `#rrggbb`.
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.color.trim().strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some((r, g, b))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate document id {0}")]
    DuplicateId(DocumentId),
    #[error("document {id} references unknown category {category:?}")]
    UnknownCategory { id: DocumentId, category: String },
    #[error("document {id} is missing a {field}")]
    MissingField { id: DocumentId, field: &'static str },
}

/// Validated, immutable set of documents and the categories they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    documents: Vec<Document>,
    categories: BTreeMap<String, CategoryInfo>,
}

impl Catalog {
    pub fn new(
        documents: Vec<Document>,
        categories: BTreeMap<String, CategoryInfo>,
    ) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for doc in &documents {
            if !seen.insert(doc.id) {
                return Err(CatalogError::DuplicateId(doc.id));
            }
            for (field, value) in [
                ("title", &doc.title),
                ("path", &doc.path),
                ("filename", &doc.filename),
            ] {
                if value.trim().is_empty() {
                    return Err(CatalogError::MissingField { id: doc.id, field });
                }
            }
            if !categories.contains_key(&doc.category) {
                return Err(CatalogError::UnknownCategory {
                    id: doc.id,
                    category: doc.category.clone(),
                });
            }
        }
        Ok(Self {
            documents,
            categories,
        })
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn categories(&self) -> &BTreeMap<String, CategoryInfo> {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&CategoryInfo> {
        self.categories.get(name)
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Where a document's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Local(PathBuf),
    Remote(String),
}

impl SourceLocator {
    pub fn parse(path: &str, base_dir: &Path) -> Self {
        let trimmed = path.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return SourceLocator::Remote(trimmed.to_string());
        }
        let local = PathBuf::from(trimmed);
        if local.is_absolute() {
            SourceLocator::Local(local)
        } else {
            SourceLocator::Local(base_dir.join(local))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceLocator::Remote(_))
    }
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocator::Local(path) => write!(f, "{}", path.display()),
            SourceLocator::Remote(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub thumbnail_width: u32,
    pub search_debounce_ms: u64,
    pub notice_secs: u64,
    pub swipe_threshold: u16,
    pub download_dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thumbnail_width: 120,
            search_debounce_ms: 300,
            notice_secs: 3,
            swipe_threshold: 6,
            download_dir: None,
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        self.thumbnail_width = self.thumbnail_width.clamp(40, 400);
        self.search_debounce_ms = self.search_debounce_ms.min(2000);
        self.notice_secs = self.notice_secs.clamp(1, 60);
        self.swipe_threshold = self.swipe_threshold.clamp(2, 80);
        self.download_dir = self
            .download_dir
            .take()
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty());
    }
}
