//! Test helpers and fixtures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use studyshelf_application::{ViewerCommand, ViewerEffect, ViewerSession};
use studyshelf_core::{
    Catalog, CategoryInfo, Document, DocumentId, RgbaBitmap, Settings, SourceLocator,
};
use studyshelf_engine::{DocumentHandle, RenderEngine, RenderService};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn make_settings(search_debounce_ms: u64) -> Settings {
    Settings {
        search_debounce_ms,
        ..Settings::default()
    }
}

fn category(glyph: &str, color: &str) -> CategoryInfo {
    CategoryInfo {
        glyph: glyph.to_string(),
        color: color.to_string(),
    }
}

fn document(id: u32, title: &str, category: &str, description: Option<&str>) -> Document {
    let filename = format!("doc-{id}.pdf");
    Document {
        id: DocumentId(id),
        title: title.to_string(),
        category: category.to_string(),
        path: format!("pdfs/{filename}"),
        filename,
        description: description.map(str::to_string),
    }
}

/// Three subjects with documents and one (`Art`) without any.
pub fn sample_catalog() -> Catalog {
    let categories = BTreeMap::from([
        ("Art".to_string(), category("🎨", "#ec4899")),
        ("History".to_string(), category("🏛", "#8b5cf6")),
        ("Mathematics".to_string(), category("∫", "#3b82f6")),
        ("Science".to_string(), category("⚛", "#10b981")),
    ]);
    let documents = vec![
        document(1, "Calculus Basics", "Mathematics", Some("Limits and derivatives")),
        document(2, "Matrix Operations", "Mathematics", None),
        document(3, "Newton's Laws", "Science", Some("Forces and motion")),
        document(4, "Cell Biology", "Science", Some("Structure of the cell")),
        document(5, "Industrial Revolution", "History", Some("Machines change the world")),
    ];
    match Catalog::new(documents, categories) {
        Ok(catalog) => catalog,
        Err(err) => panic!("sample catalog is invalid: {err}"),
    }
}

/// Contents of a document the [`FakeEngine`] understands.
#[derive(Debug, Clone, Default)]
pub struct FakeDoc {
    pub pages: u32,
    pub failing: Vec<u32>,
    pub delay_ms: u64,
}

impl FakeDoc {
    pub fn pages(pages: u32) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn failing(mut self, page: u32) -> Self {
        self.failing.push(page);
        self
    }

    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let failing = self
            .failing
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "pages={};fail={failing};delay_ms={}",
            self.pages, self.delay_ms
        )
        .into_bytes()
    }

    pub fn write(&self, dir: &Path, name: &str) -> std::io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, self.to_bytes())?;
        Ok(path)
    }

    fn parse(bytes: &[u8]) -> anyhow::Result<Self> {
        let text = std::str::from_utf8(bytes)?;
        let mut doc = FakeDoc::default();
        let mut saw_pages = false;
        for field in text.trim().split(';').filter(|f| !f.is_empty()) {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("malformed field {field:?}"))?;
            match key {
                "pages" => {
                    doc.pages = value.parse()?;
                    saw_pages = true;
                }
                "fail" => {
                    for page in value.split(',').filter(|p| !p.is_empty()) {
                        doc.failing.push(page.parse()?);
                    }
                }
                "delay_ms" => doc.delay_ms = value.parse()?,
                other => anyhow::bail!("unknown field {other:?}"),
            }
        }
        if !saw_pages {
            anyhow::bail!("not a document");
        }
        Ok(doc)
    }
}

/// Rendering engine over [`FakeDoc`] bytes. Page `n` is filled with a gray
/// level of `n`, so tests can tell bitmaps apart.
#[derive(Debug, Default)]
pub struct FakeEngine;

impl RenderEngine for FakeEngine {
    type Handle<'a> = FakeDoc;

    fn open<'a>(&'a self, bytes: Vec<u8>) -> anyhow::Result<FakeDoc> {
        FakeDoc::parse(&bytes)
    }
}

impl DocumentHandle for FakeDoc {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn render_page(&self, page: u32, width_px: u32) -> anyhow::Result<RgbaBitmap> {
        if self.delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.delay_ms));
        }
        if page == 0 || page > self.pages {
            anyhow::bail!("page {page} out of range");
        }
        if self.failing.contains(&page) {
            anyhow::bail!("page {page} is corrupt");
        }
        let level = page.min(255) as u8;
        let height = (width_px.saturating_mul(4) / 3).max(1);
        Ok(RgbaBitmap::filled(width_px, height, [level, level, level, 255]))
    }
}

/// A viewer session wired to a live render service, the way the UI wires them.
pub struct ViewerHarness {
    pub session: ViewerSession,
    pub service: RenderService,
    /// Page renders handed to the service so far.
    pub page_requests: usize,
}

impl Default for ViewerHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerHarness {
    pub fn new() -> Self {
        Self {
            session: ViewerSession::new(40),
            service: RenderService::spawn(|| Ok(FakeEngine)),
            page_requests: 0,
        }
    }

    pub fn open(&mut self, path: &Path) {
        self.apply(ViewerCommand::Open {
            source: SourceLocator::Local(path.to_path_buf()),
            title: "Fixture".to_string(),
            filename: "fixture.pdf".to_string(),
        });
    }

    pub fn apply(&mut self, cmd: ViewerCommand) {
        let effects = self.session.apply(cmd);
        self.run(effects);
    }

    /// Feeds engine events back into the session until `done` holds.
    /// Returns false on timeout.
    pub fn pump_until(&mut self, mut done: impl FnMut(&ViewerSession) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while !done(&self.session) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            if let Some(event) = self.service.recv_timeout(remaining.min(Duration::from_millis(50)))
            {
                let effects = self.session.handle(event);
                self.run(effects);
            }
        }
        true
    }

    /// Waits for the current page and every thumbnail to settle.
    pub fn settle(&mut self) -> bool {
        self.pump_until(|s| {
            s.state() == studyshelf_application::ViewerState::Ready
                && s.displayed().is_some_and(|d| d.page == s.current_page())
                && s.cached_thumbnails() == s.total_pages() as usize
        })
    }

    /// Handles whatever arrives within `window` without waiting for a condition.
    pub fn drain_for(&mut self, window: Duration) {
        let deadline = Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if let Some(event) = self.service.recv_timeout(remaining) {
                let effects = self.session.handle(event);
                self.run(effects);
            }
        }
    }

    fn run(&mut self, effects: Vec<ViewerEffect>) {
        for effect in effects {
            match effect {
                ViewerEffect::OpenDocument { generation, source } => {
                    self.service.open(generation, source)
                }
                ViewerEffect::RenderPage {
                    generation,
                    render_id,
                    page,
                    width_px,
                } => {
                    self.page_requests += 1;
                    self.service.render_page(generation, render_id, page, width_px)
                }
                ViewerEffect::RenderThumbnail {
                    generation,
                    page,
                    width_px,
                } => self.service.render_thumbnail(generation, page, width_px),
                ViewerEffect::CancelRender { generation } => self.service.cancel_render(generation),
                ViewerEffect::ReleaseDocument { generation } => self.service.release(generation),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_settings() {
        let settings = make_settings(0);
        assert_eq!(settings.search_debounce_ms, 0);
        assert_eq!(settings.thumbnail_width, 120);
    }

    #[test]
    fn sample_catalog_has_an_empty_subject() {
        let catalog = sample_catalog();
        assert_eq!(catalog.categories().len(), 4);
        assert!(catalog.documents().iter().all(|d| d.category != "Art"));
    }

    #[test]
    fn fake_doc_bytes_parse_back() {
        let doc = FakeDoc::pages(4).failing(2).failing(3).delay_ms(7);
        let parsed = FakeDoc::parse(&doc.to_bytes()).unwrap();
        assert_eq!(parsed.pages, 4);
        assert_eq!(parsed.failing, vec![2, 3]);
        assert_eq!(parsed.delay_ms, 7);
        assert!(FakeDoc::parse(b"hello").is_err());
    }

    #[test]
    fn fake_pages_differ_by_gray_level() {
        let doc = FakeDoc::pages(3).failing(3);
        let one = doc.render_page(1, 30).unwrap();
        let two = doc.render_page(2, 30).unwrap();
        assert_eq!((one.width, one.height), (30, 40));
        assert_ne!(one.pixels, two.pixels);
        assert!(doc.render_page(3, 30).is_err());
        assert!(doc.render_page(4, 30).is_err());
    }
}
