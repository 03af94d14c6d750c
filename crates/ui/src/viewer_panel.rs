//! Full-screen document viewer: page image, thumbnail strip, gauge and notices.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Gauge, Paragraph, Wrap};
use ratatui_image::picker::Picker;
use ratatui_image::protocol::Protocol as ImageProtocol;
use ratatui_image::{Image as ImageWidget, Resize};
use studyshelf_application::{
    NoticeLevel, Thumbnail, ViewerCommand, ViewerEffect, ViewerSession, ViewerState,
};
use studyshelf_core::{EngineEvent, Generation, RgbaBitmap};

use crate::image_protocol;
use crate::keymap::Swipe;

const THUMB_SLOT_WIDTH: u16 = 12;
const THUMB_SLOT_HEIGHT: u16 = 7;
const SCROLL_LINES: u32 = 3;

pub(crate) struct ViewerLayout {
    pub header: Rect,
    pub notice: Rect,
    pub page: Rect,
    pub strip: Rect,
    pub footer: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageKey {
    generation: Generation,
    page: u32,
    width_px: u32,
    scroll_y_px: u32,
    cells: (u16, u16),
    font: (u16, u16),
}

struct PageImage {
    generation: Generation,
    page: u32,
    width_px: u32,
    image: image::DynamicImage,
}

pub(crate) struct ViewerPanel {
    pub session: ViewerSession,
    thumb_focus: u32,
    scroll_y_px: u32,
    scrolled_page: Option<(Generation, u32)>,
    page_image: Option<PageImage>,
    page_protocol: Option<(PageKey, ImageProtocol)>,
    thumb_protocols: HashMap<u32, ImageProtocol>,
    thumb_key: (Generation, u16, u16),
    thumb_hits: Vec<(Rect, u32)>,
    page_area: Rect,
    notice_seen: Option<(u64, Instant)>,
    pub swipe: Swipe,
}

impl ViewerPanel {
    pub(crate) fn new(thumbnail_width: u32, swipe_threshold: u16) -> Self {
        Self {
            session: ViewerSession::new(thumbnail_width),
            thumb_focus: 1,
            scroll_y_px: 0,
            scrolled_page: None,
            page_image: None,
            page_protocol: None,
            thumb_protocols: HashMap::new(),
            thumb_key: (Generation::default(), 0, 0),
            thumb_hits: Vec::new(),
            page_area: Rect::default(),
            notice_seen: None,
            swipe: Swipe::new(swipe_threshold),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.session.is_open()
    }

    pub(crate) fn is_busy(&self) -> bool {
        matches!(
            self.session.state(),
            ViewerState::Loading | ViewerState::Rendering
        )
    }

    pub(crate) fn apply(&mut self, cmd: ViewerCommand) -> Vec<ViewerEffect> {
        let follows_page = matches!(
            cmd,
            ViewerCommand::Next
                | ViewerCommand::Previous
                | ViewerCommand::GoTo(_)
                | ViewerCommand::SelectThumbnail(_)
        );
        let before = self.session.generation();
        let effects = self.session.apply(cmd);
        if self.session.generation() != before {
            self.reset_visuals();
        }
        if follows_page {
            self.thumb_focus = self.session.current_page();
        }
        effects
    }

    pub(crate) fn handle(&mut self, event: EngineEvent) -> Vec<ViewerEffect> {
        self.session.handle(event)
    }

    pub(crate) fn thumb_focus(&self) -> u32 {
        self.thumb_focus
    }

    pub(crate) fn move_thumb_focus(&mut self, delta: i32) {
        let total = self.session.total_pages();
        if total == 0 {
            return;
        }
        let next = i64::from(self.thumb_focus) + i64::from(delta);
        self.thumb_focus = next.clamp(1, i64::from(total)) as u32;
    }

    pub(crate) fn scroll(&mut self, lines: i32, font_height: u16) {
        let step = SCROLL_LINES * u32::from(font_height.max(1));
        let amount = lines.unsigned_abs().saturating_mul(step);
        self.scroll_y_px = if lines < 0 {
            self.scroll_y_px.saturating_sub(amount)
        } else {
            self.scroll_y_px.saturating_add(amount)
        };
    }

    pub(crate) fn thumbnail_at(&self, column: u16, row: u16) -> Option<u32> {
        self.thumb_hits
            .iter()
            .find(|(rect, _)| {
                column >= rect.x
                    && column < rect.x.saturating_add(rect.width)
                    && row >= rect.y
                    && row < rect.y.saturating_add(rect.height)
            })
            .map(|(_, page)| *page)
    }

    pub(crate) fn in_page_area(&self, column: u16, row: u16) -> bool {
        let area = self.page_area;
        column >= area.x
            && column < area.x.saturating_add(area.width)
            && row >= area.y
            && row < area.y.saturating_add(area.height)
    }

    /// Auto-dismisses a notice once it has been on screen for `ttl`.
    pub(crate) fn expire_notice(&mut self, now: Instant, ttl: Duration) -> Vec<ViewerEffect> {
        let Some(id) = self.session.notice().map(|n| n.id) else {
            self.notice_seen = None;
            return Vec::new();
        };
        match self.notice_seen {
            Some((seen, at)) if seen == id => {
                if now.saturating_duration_since(at) >= ttl {
                    self.notice_seen = None;
                    return self.session.apply(ViewerCommand::DismissNotice);
                }
            }
            _ => self.notice_seen = Some((id, now)),
        }
        Vec::new()
    }

    pub(crate) fn layout(&self, area: Rect) -> ViewerLayout {
        let strip_height = if self.session.total_pages() > 0 {
            THUMB_SLOT_HEIGHT
        } else {
            0
        };
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(strip_height),
                Constraint::Length(1),
            ])
            .split(area);
        ViewerLayout {
            header: rows[0],
            notice: rows[1],
            page: rows[2],
            strip: rows[3],
            footer: rows[4],
        }
    }

    /// Pixel width available to the page image inside the frame border.
    pub(crate) fn surface_width_px(&self, area: Rect, font_width: u16) -> u32 {
        let inner = page_block().inner(self.layout(area).page);
        u32::from(inner.width).saturating_mul(u32::from(font_width.max(1)))
    }

    pub(crate) fn draw(&mut self, frame: &mut ratatui::Frame, area: Rect, picker: &Picker) {
        let layout = self.layout(area);
        self.draw_header(frame, layout.header, picker);
        self.draw_notice(frame, layout.notice);
        self.draw_page(frame, layout.page, picker);
        self.draw_strip(frame, layout.strip, picker);
        self.draw_footer(frame, layout.footer);
    }

    fn reset_visuals(&mut self) {
        self.thumb_focus = 1;
        self.scroll_y_px = 0;
        self.scrolled_page = None;
        self.page_image = None;
        self.page_protocol = None;
        self.thumb_protocols.clear();
        self.thumb_hits.clear();
        self.notice_seen = None;
        self.swipe.release();
    }

    fn draw_header(&self, frame: &mut ratatui::Frame, area: Rect, picker: &Picker) {
        let title = self.session.title().unwrap_or("Document").to_string();
        let mut status = vec![
            Span::raw(self.session.page_label()),
            Span::raw(" · "),
            Span::raw(format!("{}%", self.session.zoom_percent())),
            Span::raw(" · "),
            Span::styled(
                image_protocol::protocol_label(picker),
                Style::default().fg(Color::DarkGray),
            ),
        ];
        if self.session.state() == ViewerState::Rendering {
            status.push(Span::styled(
                "  rendering…",
                Style::default().fg(Color::Yellow),
            ));
        }
        let header = Paragraph::new(vec![
            Line::from(Span::styled(
                title,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(status),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(header, area);
    }

    fn draw_notice(&self, frame: &mut ratatui::Frame, area: Rect) {
        let Some(notice) = self.session.notice() else {
            return;
        };
        let color = match notice.level {
            NoticeLevel::Info => Color::Cyan,
            NoticeLevel::Error => Color::Red,
        };
        let line = Line::from(vec![
            Span::styled(notice.message.clone(), Style::default().fg(color)),
            Span::styled("  (x to dismiss)", Style::default().fg(Color::DarkGray)),
        ]);
        frame.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
    }

    fn draw_page(&mut self, frame: &mut ratatui::Frame, area: Rect, picker: &Picker) {
        let block = page_block();
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.page_area = inner;

        match self.session.state() {
            ViewerState::Closed => {}
            ViewerState::Loading => {
                let progress = f64::from(self.session.load_progress()).clamp(0.0, 1.0);
                let gauge_area = Rect::new(
                    inner.x + inner.width / 6,
                    inner.y + inner.height / 2,
                    inner.width - inner.width / 3,
                    1.min(inner.height),
                );
                let gauge = Gauge::default()
                    .gauge_style(Style::default().fg(Color::Cyan))
                    .ratio(progress)
                    .label(format!("Loading… {:.0}%", progress * 100.0));
                frame.render_widget(gauge, gauge_area);
            }
            ViewerState::Error => {
                let reason = self
                    .session
                    .error()
                    .map(|err| err.to_string())
                    .unwrap_or_else(|| "Failed to load document.".to_string());
                let text = vec![
                    Line::from(Span::styled(
                        "Failed to load document.",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )),
                    Line::raw(""),
                    Line::raw(reason),
                    Line::raw(""),
                    Line::from(Span::styled(
                        "r retry · Esc close",
                        Style::default().fg(Color::DarkGray),
                    )),
                ];
                let body = Paragraph::new(text)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true });
                frame.render_widget(body, inner);
            }
            ViewerState::Ready | ViewerState::Rendering => {
                self.ensure_page_protocol(picker, inner);
                if let Some((_, protocol)) = self.page_protocol.as_ref() {
                    let proto_area = protocol.area();
                    let draw_width = proto_area.width.min(inner.width);
                    let draw_height = proto_area.height.min(inner.height);
                    let draw_area = Rect::new(
                        inner.x + inner.width.saturating_sub(draw_width) / 2,
                        inner.y + inner.height.saturating_sub(draw_height) / 2,
                        draw_width,
                        draw_height,
                    );
                    frame.render_widget(ImageWidget::new(protocol), draw_area);
                } else {
                    let waiting = Paragraph::new(format!(
                        "Rendering page {}…",
                        self.session.current_page()
                    ))
                    .alignment(Alignment::Center);
                    frame.render_widget(waiting, inner);
                }
            }
        }
    }

    fn ensure_page_protocol(&mut self, picker: &Picker, inner: Rect) {
        let Some(displayed) = self.session.displayed() else {
            self.page_protocol = None;
            return;
        };
        let generation = self.session.generation();
        let page = displayed.page;
        let width_px = displayed.width_px;
        let bitmap = Arc::clone(&displayed.bitmap);

        if self.scrolled_page != Some((generation, page)) {
            self.scrolled_page = Some((generation, page));
            self.scroll_y_px = 0;
        }

        let (font_w, font_h) = picker.font_size();
        let font = (font_w.max(1), font_h.max(1));
        let key = PageKey {
            generation,
            page,
            width_px,
            scroll_y_px: self.scroll_y_px,
            cells: (inner.width, inner.height),
            font,
        };
        if self.page_protocol.as_ref().is_some_and(|(k, _)| *k == key) {
            return;
        }

        let cached = self
            .page_image
            .as_ref()
            .is_some_and(|p| p.generation == generation && p.page == page && p.width_px == width_px);
        if !cached {
            let Some(image) = bitmap_to_image(&bitmap) else {
                log::warn!("page {page} bitmap has an invalid pixel buffer");
                self.page_protocol = None;
                return;
            };
            self.page_image = Some(PageImage {
                generation,
                page,
                width_px,
                image,
            });
        }
        let Some(page_image) = self.page_image.as_ref() else {
            return;
        };

        let viewport_w = u32::from(inner.width).saturating_mul(u32::from(font.0));
        let viewport_h = u32::from(inner.height).saturating_mul(u32::from(font.1));
        let pan_x = page_image.image.width().saturating_sub(viewport_w) / 2;
        let (viewport, _, pan_y) = build_viewport_image(
            &page_image.image,
            viewport_w,
            viewport_h,
            pan_x,
            self.scroll_y_px,
        );
        self.scroll_y_px = pan_y;
        let key = PageKey {
            scroll_y_px: pan_y,
            ..key
        };

        let size = Rect::new(0, 0, inner.width, inner.height);
        match picker.new_protocol(viewport, size, Resize::Fit(None)) {
            Ok(protocol) => self.page_protocol = Some((key, protocol)),
            Err(err) => {
                log::warn!("image protocol for page {page} failed: {err}");
                self.page_protocol = None;
            }
        }
    }

    fn draw_strip(&mut self, frame: &mut ratatui::Frame, area: Rect, picker: &Picker) {
        self.thumb_hits.clear();
        let total = self.session.total_pages();
        if total == 0 || area.height == 0 || area.width < THUMB_SLOT_WIDTH {
            return;
        }

        let inner_cells = (
            THUMB_SLOT_WIDTH.saturating_sub(2),
            THUMB_SLOT_HEIGHT.saturating_sub(2),
        );
        let key = (self.session.generation(), inner_cells.0, inner_cells.1);
        if self.thumb_key != key {
            self.thumb_key = key;
            self.thumb_protocols.clear();
        }

        let slots = u32::from(area.width / THUMB_SLOT_WIDTH).max(1);
        let start = window_start(self.thumb_focus, total, slots);
        let current = self.session.current_page();
        for (slot, page) in (start..=total).take(slots as usize).enumerate() {
            let rect = Rect::new(
                area.x + slot as u16 * THUMB_SLOT_WIDTH,
                area.y,
                THUMB_SLOT_WIDTH,
                area.height,
            );
            let mut border = Style::default().fg(Color::DarkGray);
            if page == current {
                border = border.fg(Color::Cyan);
            }
            let mut block = Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(format!("{page}"));
            if page == self.thumb_focus {
                block = block
                    .border_type(BorderType::Thick)
                    .border_style(border.add_modifier(Modifier::BOLD));
            }
            let inner = block.inner(rect);
            frame.render_widget(block, rect);

            match self.session.thumbnail(page) {
                Thumbnail::Ready(bitmap) => {
                    if !self.thumb_protocols.contains_key(&page)
                        && let Some(image) = bitmap_to_image(&bitmap)
                    {
                        let size = Rect::new(0, 0, inner.width, inner.height);
                        match picker.new_protocol(image, size, Resize::Fit(None)) {
                            Ok(protocol) => {
                                self.thumb_protocols.insert(page, protocol);
                            }
                            Err(err) => log::debug!("thumbnail {page} protocol failed: {err}"),
                        }
                    }
                    if let Some(protocol) = self.thumb_protocols.get(&page) {
                        frame.render_widget(ImageWidget::new(protocol), inner);
                    } else {
                        draw_placeholder(frame, inner, page);
                    }
                }
                Thumbnail::Placeholder => draw_placeholder(frame, inner, page),
            }
            self.thumb_hits.push((rect, page));
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame, area: Rect) {
        let hints = match self.session.state() {
            ViewerState::Error => "r retry · d download · Esc close",
            ViewerState::Loading => "Esc close",
            _ => {
                "←/→ page · +/- zoom · 0 reset · [/] thumbnails · Enter go · ↑/↓ scroll · d download · Esc close"
            }
        };
        let footer = Paragraph::new(Line::from(Span::styled(
            hints,
            Style::default().fg(Color::DarkGray),
        )))
        .alignment(Alignment::Center);
        frame.render_widget(footer, area);
    }
}

fn page_block() -> Block<'static> {
    Block::default().borders(Borders::ALL)
}

fn draw_placeholder(frame: &mut ratatui::Frame, area: Rect, page: u32) {
    let label = Paragraph::new(Thumbnail::label(page))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
    frame.render_widget(label, area);
}

/// First page shown in a strip of `slots` so that `focus` stays visible.
fn window_start(focus: u32, total: u32, slots: u32) -> u32 {
    if total <= slots {
        return 1;
    }
    focus
        .saturating_sub(slots / 2)
        .max(1)
        .min(total - slots + 1)
}

fn bitmap_to_image(bitmap: &RgbaBitmap) -> Option<image::DynamicImage> {
    image::RgbaImage::from_raw(bitmap.width, bitmap.height, bitmap.pixels.clone())
        .map(image::DynamicImage::ImageRgba8)
}

/// Crops `full` to the viewport at the given pan, centring it when smaller.
/// Returns the viewport and the pan actually used after clamping.
fn build_viewport_image(
    full: &image::DynamicImage,
    viewport_w_px: u32,
    viewport_h_px: u32,
    pan_x_px: u32,
    pan_y_px: u32,
) -> (image::DynamicImage, u32, u32) {
    let viewport_w_px = viewport_w_px.max(1);
    let viewport_h_px = viewport_h_px.max(1);
    let img_w = full.width();
    let img_h = full.height();

    let pan_x_px = pan_x_px.min(img_w.saturating_sub(viewport_w_px));
    let pan_y_px = pan_y_px.min(img_h.saturating_sub(viewport_h_px));

    let mut viewport: image::DynamicImage = image::ImageBuffer::from_pixel(
        viewport_w_px,
        viewport_h_px,
        image::Rgba([255u8, 255u8, 255u8, 255u8]),
    )
    .into();

    let crop_w = viewport_w_px.min(img_w.saturating_sub(pan_x_px));
    let crop_h = viewport_h_px.min(img_h.saturating_sub(pan_y_px));
    if crop_w > 0 && crop_h > 0 {
        let region = full.crop_imm(pan_x_px, pan_y_px, crop_w, crop_h);
        let dest_x = i64::from(viewport_w_px.saturating_sub(img_w) / 2);
        let dest_y = i64::from(viewport_h_px.saturating_sub(img_h) / 2);
        image::imageops::overlay(&mut viewport, &region, dest_x, dest_y);
    }

    (viewport, pan_x_px, pan_y_px)
}
