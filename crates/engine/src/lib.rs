//! Rendering engine boundary: document sources, Pdfium rasterization and the
//! worker thread that serves a viewer session.

use std::path::Path;

use anyhow::Context as _;
use pdf::file::FileOptions;
use studyshelf_core::RgbaBitmap;

mod pdfium;
mod service;
mod source;

pub use pdfium::{PdfiumDocument, PdfiumEngine};
pub use service::{CancelToken, RenderService};
pub use source::{fetch, fetch_local, fetch_remote};

/// Opens documents from raw bytes.
///
/// Implementations are not required to be `Send`; [`RenderService`] builds
/// the engine on its worker thread and keeps it there.
pub trait RenderEngine {
    type Handle<'a>: DocumentHandle
    where
        Self: 'a;

    fn open<'a>(&'a self, bytes: Vec<u8>) -> anyhow::Result<Self::Handle<'a>>;
}

pub trait DocumentHandle {
    fn page_count(&self) -> u32;

    /// Rasterizes a 1-based page at `width_px`, height following the page aspect.
    fn render_page(&self, page: u32, width_px: u32) -> anyhow::Result<RgbaBitmap>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentMeta {
    pub page_count: u32,
    pub size_bytes: u64,
}

impl DocumentMeta {
    pub fn size_label(&self) -> String {
        const KIB: f64 = 1024.0;
        const MIB: f64 = KIB * 1024.0;
        let bytes = self.size_bytes as f64;
        if bytes >= MIB {
            format!("{:.1} MB", bytes / MIB)
        } else if bytes >= KIB {
            format!("{:.0} KB", bytes / KIB)
        } else {
            format!("{} B", self.size_bytes)
        }
    }
}

/// Reads page count and size of a local PDF without rasterizing anything.
pub fn read_meta(path: &Path) -> anyhow::Result<DocumentMeta> {
    let size_bytes = std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    let file = FileOptions::cached()
        .open(path)
        .with_context(|| format!("open pdf for metadata: {}", path.display()))?;
    Ok(DocumentMeta {
        page_count: file.num_pages(),
        size_bytes,
    })
}
