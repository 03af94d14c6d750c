//! Viewer session: paging, zoom and thumbnail state for one open document.
//!
//! The session never talks to the rendering engine directly. Commands and
//! engine completions go in, and the effects the caller has to run against
//! the engine come out. Every request is tagged with the session
//! [`Generation`], so completions that arrive after a close or a reopen are
//! recognised as stale and dropped.

use std::collections::BTreeMap;
use std::sync::Arc;

use studyshelf_core::{
    EngineEvent, Generation, RenderId, RgbaBitmap, SourceLocator, ViewerError,
};

pub const DEFAULT_SCALE: f32 = 1.0;
pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.25;
pub const DEFAULT_SURFACE_WIDTH: u32 = 800;
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Closed,
    Loading,
    Ready,
    Rendering,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    Open {
        source: SourceLocator,
        title: String,
        filename: String,
    },
    Next,
    Previous,
    GoTo(u32),
    SelectThumbnail(u32),
    ZoomIn,
    ZoomOut,
    ResetZoom,
    SetSurfaceWidth(u32),
    Suspend,
    Resume,
    Retry,
    DismissNotice,
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEffect {
    OpenDocument {
        generation: Generation,
        source: SourceLocator,
    },
    RenderPage {
        generation: Generation,
        render_id: RenderId,
        page: u32,
        width_px: u32,
    },
    RenderThumbnail {
        generation: Generation,
        page: u32,
        width_px: u32,
    },
    CancelRender {
        generation: Generation,
    },
    ReleaseDocument {
        generation: Generation,
    },
}

/// What is currently painted on the output surface.
#[derive(Debug, Clone)]
pub struct DisplayedPage {
    pub page: u32,
    pub scale: f32,
    pub width_px: u32,
    pub bitmap: Arc<RgbaBitmap>,
}

#[derive(Debug, Clone)]
pub enum Thumbnail {
    Ready(Arc<RgbaBitmap>),
    Placeholder,
}

impl Thumbnail {
    pub fn label(page: u32) -> String {
        format!("Page {page}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
struct OpenRequest {
    source: SourceLocator,
    title: String,
    filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RenderTarget {
    page: u32,
    scale: f32,
    width_px: u32,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    id: RenderId,
    target: RenderTarget,
}

#[derive(Debug)]
pub struct ViewerSession {
    phase: Phase,
    generation: Generation,
    request: Option<OpenRequest>,
    current_page: u32,
    total_pages: u32,
    scale: f32,
    surface_width: u32,
    thumbnail_width: u32,
    in_flight: Option<InFlight>,
    last_render_id: RenderId,
    displayed: Option<DisplayedPage>,
    thumbnails: BTreeMap<u32, Thumbnail>,
    load_progress: f32,
    error: Option<ViewerError>,
    notice: Option<Notice>,
    next_notice_id: u64,
    suspended: bool,
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_WIDTH)
    }
}

impl ViewerSession {
    pub fn new(thumbnail_width: u32) -> Self {
        Self {
            phase: Phase::Closed,
            generation: Generation::default(),
            request: None,
            current_page: 1,
            total_pages: 0,
            scale: DEFAULT_SCALE,
            surface_width: DEFAULT_SURFACE_WIDTH,
            thumbnail_width: thumbnail_width.max(1),
            in_flight: None,
            last_render_id: RenderId::default(),
            displayed: None,
            thumbnails: BTreeMap::new(),
            load_progress: 0.0,
            error: None,
            notice: None,
            next_notice_id: 1,
            suspended: false,
        }
    }

    pub fn state(&self) -> ViewerState {
        match self.phase {
            Phase::Closed => ViewerState::Closed,
            Phase::Loading => ViewerState::Loading,
            Phase::Ready if self.in_flight.is_some() => ViewerState::Rendering,
            Phase::Ready => ViewerState::Ready,
            Phase::Error => ViewerState::Error,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase != Phase::Closed
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn zoom_percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }

    pub fn surface_width(&self) -> u32 {
        self.surface_width
    }

    pub fn load_progress(&self) -> f32 {
        self.load_progress
    }

    pub fn title(&self) -> Option<&str> {
        self.request.as_ref().map(|r| r.title.as_str())
    }

    pub fn filename(&self) -> Option<&str> {
        self.request.as_ref().map(|r| r.filename.as_str())
    }

    pub fn source(&self) -> Option<&SourceLocator> {
        self.request.as_ref().map(|r| &r.source)
    }

    pub fn displayed(&self) -> Option<&DisplayedPage> {
        self.displayed.as_ref()
    }

    pub fn thumbnail(&self, page: u32) -> Thumbnail {
        self.thumbnails
            .get(&page)
            .cloned()
            .unwrap_or(Thumbnail::Placeholder)
    }

    /// One entry per page, in page order.
    pub fn thumbnails(&self) -> impl Iterator<Item = (u32, Thumbnail)> + '_ {
        (1..=self.total_pages).map(|page| (page, self.thumbnail(page)))
    }

    pub fn cached_thumbnails(&self) -> usize {
        self.thumbnails.len()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn error(&self) -> Option<&ViewerError> {
        self.error.as_ref()
    }

    pub fn can_go_previous(&self) -> bool {
        self.phase == Phase::Ready && self.current_page > 1
    }

    pub fn can_go_next(&self) -> bool {
        self.phase == Phase::Ready && self.current_page < self.total_pages
    }

    pub fn page_label(&self) -> String {
        if self.total_pages == 0 {
            "Page - of -".to_string()
        } else {
            format!("Page {} of {}", self.current_page, self.total_pages)
        }
    }

    pub fn apply(&mut self, cmd: ViewerCommand) -> Vec<ViewerEffect> {
        match cmd {
            ViewerCommand::Open {
                source,
                title,
                filename,
            } => self.open(OpenRequest {
                source,
                title,
                filename,
            }),
            ViewerCommand::Retry => {
                if self.phase != Phase::Error {
                    return Vec::new();
                }
                match self.request.clone() {
                    Some(request) => self.open(request),
                    None => Vec::new(),
                }
            }
            ViewerCommand::Next => {
                if self.can_go_next() {
                    self.go_to(self.current_page + 1)
                } else {
                    Vec::new()
                }
            }
            ViewerCommand::Previous => {
                if self.can_go_previous() {
                    self.go_to(self.current_page - 1)
                } else {
                    Vec::new()
                }
            }
            ViewerCommand::GoTo(page) | ViewerCommand::SelectThumbnail(page) => self.go_to(page),
            ViewerCommand::ZoomIn => self.set_scale(self.scale + ZOOM_STEP),
            ViewerCommand::ZoomOut => self.set_scale(self.scale - ZOOM_STEP),
            ViewerCommand::ResetZoom => self.set_scale(DEFAULT_SCALE),
            ViewerCommand::SetSurfaceWidth(width) => {
                let width = width.max(1);
                if width == self.surface_width {
                    return Vec::new();
                }
                self.surface_width = width;
                self.request_render()
            }
            ViewerCommand::Suspend => self.suspend(),
            ViewerCommand::Resume => {
                self.suspended = false;
                if self.needs_render() {
                    self.request_render()
                } else {
                    Vec::new()
                }
            }
            ViewerCommand::DismissNotice => {
                self.notice = None;
                Vec::new()
            }
            ViewerCommand::Close => self.close(),
        }
    }

    pub fn handle(&mut self, event: EngineEvent) -> Vec<ViewerEffect> {
        if event.generation() != self.generation {
            log::debug!(
                "dropping stale engine event for {} (current {})",
                event.generation(),
                self.generation
            );
            return Vec::new();
        }

        match event {
            EngineEvent::OpenProgress { fraction, .. } => {
                if self.phase == Phase::Loading {
                    self.load_progress = fraction.clamp(0.0, 1.0);
                }
                Vec::new()
            }
            EngineEvent::Opened { page_count, .. } => self.on_opened(page_count),
            EngineEvent::OpenFailed { error, .. } => {
                self.on_open_failed(error);
                Vec::new()
            }
            EngineEvent::PageRendered {
                render_id,
                page,
                width_px,
                bitmap,
                ..
            } => self.on_page_rendered(render_id, page, width_px, bitmap),
            EngineEvent::PageFailed {
                render_id,
                page,
                error,
                ..
            } => self.on_page_failed(render_id, page, error),
            EngineEvent::ThumbnailRendered { page, bitmap, .. } => {
                if self.phase == Phase::Ready && (1..=self.total_pages).contains(&page) {
                    self.thumbnails.insert(page, Thumbnail::Ready(bitmap));
                }
                Vec::new()
            }
            EngineEvent::ThumbnailFailed { page, error, .. } => {
                log::debug!("{error}");
                if self.phase == Phase::Ready && (1..=self.total_pages).contains(&page) {
                    self.thumbnails.insert(page, Thumbnail::Placeholder);
                }
                Vec::new()
            }
            EngineEvent::RenderCancelled { render_id, page, .. } => {
                if !self.is_in_flight(render_id) {
                    log::debug!("ignoring cancellation of {render_id} for page {page}");
                    return Vec::new();
                }
                self.in_flight = None;
                if self.needs_render() {
                    self.request_render()
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn open(&mut self, request: OpenRequest) -> Vec<ViewerEffect> {
        if matches!(self.state(), ViewerState::Loading | ViewerState::Rendering) {
            log::debug!("ignoring open of {} while busy", request.source);
            return Vec::new();
        }

        let mut effects = self.teardown();
        self.reset();
        self.generation = self.generation.next();
        log::info!("opening {} as {}", request.source, self.generation);
        effects.push(ViewerEffect::OpenDocument {
            generation: self.generation,
            source: request.source.clone(),
        });
        self.request = Some(request);
        self.phase = Phase::Loading;
        effects
    }

    fn close(&mut self) -> Vec<ViewerEffect> {
        if self.phase == Phase::Closed {
            return Vec::new();
        }
        log::info!("closing viewer session {}", self.generation);
        let effects = self.teardown();
        self.reset();
        self.request = None;
        self.generation = self.generation.next();
        self.phase = Phase::Closed;
        effects
    }

    fn teardown(&mut self) -> Vec<ViewerEffect> {
        let mut effects = Vec::new();
        if self.phase == Phase::Closed {
            return effects;
        }
        if self.in_flight.take().is_some() {
            effects.push(ViewerEffect::CancelRender {
                generation: self.generation,
            });
        }
        effects.push(ViewerEffect::ReleaseDocument {
            generation: self.generation,
        });
        effects
    }

    fn reset(&mut self) {
        self.current_page = 1;
        self.total_pages = 0;
        self.scale = DEFAULT_SCALE;
        self.in_flight = None;
        self.displayed = None;
        self.thumbnails.clear();
        self.load_progress = 0.0;
        self.error = None;
        self.notice = None;
    }

    fn on_opened(&mut self, page_count: u32) -> Vec<ViewerEffect> {
        if self.phase != Phase::Loading {
            return Vec::new();
        }
        if page_count == 0 {
            let name = self
                .request
                .as_ref()
                .map(|r| r.source.to_string())
                .unwrap_or_default();
            self.on_open_failed(ViewerError::open(name, "document has no pages"));
            return Vec::new();
        }

        self.total_pages = page_count;
        self.current_page = 1;
        self.load_progress = 1.0;
        self.phase = Phase::Ready;
        log::info!("{} ready with {page_count} pages", self.generation);

        let mut effects = self.request_render();
        effects.extend((1..=page_count).map(|page| ViewerEffect::RenderThumbnail {
            generation: self.generation,
            page,
            width_px: self.thumbnail_width,
        }));
        effects
    }

    fn on_open_failed(&mut self, error: ViewerError) {
        if self.phase != Phase::Loading {
            return;
        }
        log::warn!("{error}");
        self.phase = Phase::Error;
        self.raise(NoticeLevel::Error, "Failed to load document. Press r to retry.");
        self.error = Some(error);
    }

    fn on_page_rendered(
        &mut self,
        render_id: RenderId,
        page: u32,
        width_px: u32,
        bitmap: Arc<RgbaBitmap>,
    ) -> Vec<ViewerEffect> {
        let Some(InFlight { id, target }) = self.in_flight else {
            return Vec::new();
        };
        if id != render_id || target.page != page || target.width_px != width_px {
            log::debug!("ignoring completion {render_id} for page {page} at {width_px}px");
            return Vec::new();
        }

        self.in_flight = None;
        self.displayed = Some(DisplayedPage {
            page,
            scale: target.scale,
            width_px,
            bitmap,
        });
        if self.needs_render() {
            self.request_render()
        } else {
            Vec::new()
        }
    }

    fn on_page_failed(
        &mut self,
        render_id: RenderId,
        page: u32,
        error: ViewerError,
    ) -> Vec<ViewerEffect> {
        let Some(InFlight { id, target }) = self.in_flight else {
            return Vec::new();
        };
        if id != render_id || target.page != page {
            log::debug!("ignoring failure {render_id} for page {page}");
            return Vec::new();
        }

        log::warn!("{error}");
        self.in_flight = None;
        self.raise(NoticeLevel::Error, format!("Could not render page {page}."));

        if self.current_target() == target {
            if let Some(shown) = &self.displayed {
                self.current_page = shown.page;
                self.scale = shown.scale;
            }
            Vec::new()
        } else {
            self.request_render()
        }
    }

    fn suspend(&mut self) -> Vec<ViewerEffect> {
        self.suspended = true;
        if self.in_flight.take().is_some() {
            vec![ViewerEffect::CancelRender {
                generation: self.generation,
            }]
        } else {
            Vec::new()
        }
    }

    fn go_to(&mut self, page: u32) -> Vec<ViewerEffect> {
        if self.phase != Phase::Ready || !(1..=self.total_pages).contains(&page) {
            return Vec::new();
        }
        if page == self.current_page {
            return Vec::new();
        }
        self.current_page = page;
        self.request_render()
    }

    fn set_scale(&mut self, scale: f32) -> Vec<ViewerEffect> {
        if self.phase != Phase::Ready {
            return Vec::new();
        }
        let scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        if scale == self.scale {
            return Vec::new();
        }
        self.scale = scale;
        self.request_render()
    }

    fn current_target(&self) -> RenderTarget {
        RenderTarget {
            page: self.current_page,
            scale: self.scale,
            width_px: ((self.surface_width as f32) * self.scale).round().max(1.0) as u32,
        }
    }

    fn is_in_flight(&self, render_id: RenderId) -> bool {
        self.in_flight.is_some_and(|f| f.id == render_id)
    }

    fn needs_render(&self) -> bool {
        if self.phase != Phase::Ready {
            return false;
        }
        let target = self.current_target();
        match &self.displayed {
            Some(shown) => shown.page != target.page || shown.width_px != target.width_px,
            None => true,
        }
    }

    fn request_render(&mut self) -> Vec<ViewerEffect> {
        if self.phase != Phase::Ready || self.suspended || self.in_flight.is_some() {
            return Vec::new();
        }
        if !self.needs_render() {
            return Vec::new();
        }
        let target = self.current_target();
        self.last_render_id = self.last_render_id.next();
        self.in_flight = Some(InFlight {
            id: self.last_render_id,
            target,
        });
        vec![ViewerEffect::RenderPage {
            generation: self.generation,
            render_id: self.last_render_id,
            page: target.page,
            width_px: target.width_px,
        }]
    }

    fn raise(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notice = Some(Notice {
            id: self.next_notice_id,
            level,
            message: message.into(),
        });
        self.next_notice_id += 1;
    }
}
