use std::sync::Arc;

/// Identifies one open request of a viewer session. Every open and close
/// allocates a new value, so completions tagged with an older one are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Identifies one page render request within a session. Ids only grow, so a
/// completion or cancellation for an earlier request of the same page is
/// never mistaken for the one currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RenderId(pub u64);

impl RenderId {
    pub fn next(self) -> Self {
        RenderId(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for RenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Tightly packed RGBA8 pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbaBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaBitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = (width as usize).saturating_mul(height as usize);
        let mut pixels = Vec::with_capacity(count.saturating_mul(4));
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }
}

impl std::fmt::Debug for RgbaBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbaBitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    #[error("could not open {source_name}: {reason}")]
    OpenFailure { source_name: String, reason: String },
    #[error("page {page} failed to render: {reason}")]
    RenderFailure { page: u32, reason: String },
    #[error("thumbnail for page {page} failed: {reason}")]
    ThumbnailFailure { page: u32, reason: String },
}

impl ViewerError {
    pub fn open(source_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ViewerError::OpenFailure {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn render(page: u32, reason: impl std::fmt::Display) -> Self {
        ViewerError::RenderFailure {
            page,
            reason: reason.to_string(),
        }
    }

    pub fn thumbnail(page: u32, reason: impl std::fmt::Display) -> Self {
        ViewerError::ThumbnailFailure {
            page,
            reason: reason.to_string(),
        }
    }
}

/// Completion messages produced by the rendering engine for a session.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    OpenProgress {
        generation: Generation,
        fraction: f32,
    },
    Opened {
        generation: Generation,
        page_count: u32,
    },
    OpenFailed {
        generation: Generation,
        error: ViewerError,
    },
    PageRendered {
        generation: Generation,
        render_id: RenderId,
        page: u32,
        width_px: u32,
        bitmap: Arc<RgbaBitmap>,
    },
    PageFailed {
        generation: Generation,
        render_id: RenderId,
        page: u32,
        error: ViewerError,
    },
    ThumbnailRendered {
        generation: Generation,
        page: u32,
        bitmap: Arc<RgbaBitmap>,
    },
    ThumbnailFailed {
        generation: Generation,
        page: u32,
        error: ViewerError,
    },
    RenderCancelled {
        generation: Generation,
        render_id: RenderId,
        page: u32,
    },
}

impl EngineEvent {
    pub fn generation(&self) -> Generation {
        match self {
            EngineEvent::OpenProgress { generation, .. }
            | EngineEvent::Opened { generation, .. }
            | EngineEvent::OpenFailed { generation, .. }
            | EngineEvent::PageRendered { generation, .. }
            | EngineEvent::PageFailed { generation, .. }
            | EngineEvent::ThumbnailRendered { generation, .. }
            | EngineEvent::ThumbnailFailed { generation, .. }
            | EngineEvent::RenderCancelled { generation, .. } => *generation,
        }
    }
}
