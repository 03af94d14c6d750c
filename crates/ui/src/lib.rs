//! ratatui-based UI.

use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use crossterm::event::{
    DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{event, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, BorderType, Borders, Clear, HighlightSpacing, List, ListItem, ListState, Paragraph,
    Wrap,
};
use ratatui_image::picker::Picker;
use studyshelf_application::{
    AppContext, EMPTY_CATEGORY_PLACEHOLDER, SearchOutcome, ViewerCommand, ViewerEffect,
    category_grid,
};
use studyshelf_core::{Document, DocumentId, SourceLocator};
use studyshelf_engine::{PdfiumEngine, RenderService};
use unicode_width::UnicodeWidthStr;

mod doc_meta;
mod image_protocol;
mod keymap;
mod viewer_panel;

use doc_meta::{MetaLookup, MetaStatus};
use image_protocol::TerminalHints;
use keymap::ViewerAction;
use viewer_panel::ViewerPanel;

const GRID_COLUMNS: usize = 2;
const CARD_HEIGHT: u16 = 4;

#[derive(Debug, Clone)]
pub struct UiOptions {
    pub download_dir: PathBuf,
    /// Opens this document in the viewer as soon as the terminal is ready.
    pub open_on_start: Option<DocumentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Categories,
    Documents,
    Search,
}

#[derive(Debug, Clone)]
struct Flash {
    message: String,
    error: bool,
    at: Instant,
}

#[derive(Debug)]
struct DownloadOutcome {
    filename: String,
    result: Result<PathBuf, String>,
}

pub struct Ui {
    ctx: AppContext,
    options: UiOptions,
    focus: Focus,
    viewer: ViewerPanel,
    service: RenderService,
    image_picker: Picker,
    meta: MetaLookup,
    flash: Option<Flash>,
    download_tx: flume::Sender<DownloadOutcome>,
    download_rx: flume::Receiver<DownloadOutcome>,
    downloads_pending: usize,
    should_quit: bool,
}

impl Ui {
    pub fn new(ctx: AppContext, options: UiOptions) -> Self {
        let viewer = ViewerPanel::new(
            ctx.settings.thumbnail_width,
            ctx.settings.swipe_threshold,
        );
        let focus = if ctx.subject.is_some() {
            Focus::Documents
        } else {
            Focus::Categories
        };
        let (download_tx, download_rx) = flume::unbounded();
        Self {
            ctx,
            options,
            focus,
            viewer,
            service: RenderService::spawn(PdfiumEngine::new),
            image_picker: Picker::halfblocks(),
            meta: MetaLookup::new(),
            flash: None,
            download_tx,
            download_rx,
            downloads_pending: 0,
            should_quit: false,
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let hints = TerminalHints::from_env();
        let mut terminal = setup_terminal()?;
        self.image_picker = image_protocol::build_picker(&hints);
        terminal.clear().ok();

        if let Some(id) = self.options.open_on_start.take() {
            self.open_document_by_id(id);
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.event_loop(&mut terminal)
        }));
        let restore_result = restore_terminal(&mut terminal);
        self.service.shutdown();

        match (result, restore_result) {
            (Ok(Ok(())), Ok(())) => Ok(()),
            (Ok(Err(err)), Ok(())) => Err(err),
            (Ok(_), Err(err)) => Err(err),
            (Err(panic), Ok(())) => Err(anyhow::anyhow!(panic_to_string(panic))),
            (Err(panic), Err(err)) => Err(anyhow::anyhow!(
                "{}\n(additionally failed to restore terminal: {err})",
                panic_to_string(panic)
            )),
        }
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<()> {
        let mut needs_redraw = true;

        while !self.should_quit {
            let now = Instant::now();
            needs_redraw |= self.ctx.tick(now);
            needs_redraw |= self.pump_engine();
            needs_redraw |= self.pump_downloads();
            needs_redraw |= self.meta.pump();
            needs_redraw |= self.expire_notices(now);

            if needs_redraw {
                let (width, height) = terminal::size().context("query terminal size")?;
                self.sync_surface_width(Rect::new(0, 0, width, height));
                terminal.draw(|frame| self.draw(frame.area(), frame))?;
                needs_redraw = false;
            }

            if !event::poll(self.tick_rate())? {
                continue;
            }

            match event::read()? {
                Event::Resize(_, _) => needs_redraw = true,
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    needs_redraw = true;
                    if is_ctrl_c(&key) {
                        self.should_quit = true;
                    } else if self.viewer.is_open() {
                        self.handle_viewer_key(key);
                    } else {
                        self.handle_main_key(key);
                    }
                }
                Event::Mouse(mouse) => {
                    needs_redraw |= if self.viewer.is_open() {
                        self.handle_viewer_mouse(mouse)
                    } else {
                        self.handle_main_mouse(mouse)
                    };
                }
                other => {
                    if self.viewer.is_open()
                        && let Some(cmd) = keymap::focus_command(&other)
                    {
                        self.viewer_command(cmd);
                        needs_redraw = true;
                    }
                }
            }
        }
        Ok(())
    }

    fn tick_rate(&self) -> Duration {
        if self.viewer.is_busy()
            || self.downloads_pending > 0
            || self.meta.is_busy()
            || self.ctx.debouncer.is_pending()
        {
            Duration::from_millis(50)
        } else {
            Duration::from_millis(250)
        }
    }

    fn pump_engine(&mut self) -> bool {
        let events = self.service.drain();
        let changed = !events.is_empty();
        for event in events {
            let effects = self.viewer.handle(event);
            self.run_effects(effects);
        }
        changed
    }

    fn pump_downloads(&mut self) -> bool {
        let mut changed = false;
        while let Ok(outcome) = self.download_rx.try_recv() {
            self.downloads_pending = self.downloads_pending.saturating_sub(1);
            changed = true;
            match outcome.result {
                Ok(path) => self.flash(format!("Saved {}", path.display()), false),
                Err(reason) => {
                    log::warn!("download of {} failed: {reason}", outcome.filename);
                    self.flash(format!("Download of {} failed", outcome.filename), true);
                }
            }
        }
        changed
    }

    fn expire_notices(&mut self, now: Instant) -> bool {
        let ttl = Duration::from_secs(self.ctx.settings.notice_secs);
        let had_notice = self.viewer.session.notice().is_some();
        let effects = self.viewer.expire_notice(now, ttl);
        self.run_effects(effects);
        let mut changed = had_notice && self.viewer.session.notice().is_none();

        if self
            .flash
            .as_ref()
            .is_some_and(|f| now.saturating_duration_since(f.at) >= ttl)
        {
            self.flash = None;
            changed = true;
        }
        changed
    }

    fn sync_surface_width(&mut self, area: Rect) {
        if !self.viewer.is_open() {
            return;
        }
        let (font_w, _) = self.image_picker.font_size();
        let width = self.viewer.surface_width_px(area, font_w);
        if width > 0 && width != self.viewer.session.surface_width() {
            self.viewer_command(ViewerCommand::SetSurfaceWidth(width));
        }
    }

    fn viewer_command(&mut self, cmd: ViewerCommand) {
        let effects = self.viewer.apply(cmd);
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<ViewerEffect>) {
        for effect in effects {
            log::debug!("viewer effect: {effect:?}");
            match effect {
                ViewerEffect::OpenDocument { generation, source } => {
                    self.service.open(generation, source)
                }
                ViewerEffect::RenderPage {
                    generation,
                    render_id,
                    page,
                    width_px,
                } => self.service.render_page(generation, render_id, page, width_px),
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

    fn flash(&mut self, message: impl Into<String>, error: bool) {
        self.flash = Some(Flash {
            message: message.into(),
            error,
            at: Instant::now(),
        });
    }

    fn open_document_by_id(&mut self, id: DocumentId) {
        let Some(doc) = self.ctx.catalog.document(id).cloned() else {
            self.flash(format!("No document with id {}", id.0), true);
            return;
        };
        self.open_document(&doc);
    }

    fn open_document(&mut self, doc: &Document) {
        let source = self.ctx.source_for(doc);
        log::info!("opening {} from {source}", doc.title);
        self.viewer_command(ViewerCommand::Open {
            source,
            title: doc.title.clone(),
            filename: doc.filename.clone(),
        });
    }

    fn start_download(&mut self, source: SourceLocator, filename: String) {
        let tx = self.download_tx.clone();
        let dir = self.options.download_dir.clone();
        self.downloads_pending += 1;
        self.flash(format!("Downloading {filename}…"), false);
        std::thread::spawn(move || {
            let result = studyshelf_engine::fetch(&source, |_| {})
                .and_then(|bytes| studyshelf_storage::save_download(&dir, &filename, &bytes))
                .map_err(|err| format!("{err:#}"));
            let _ = tx.send(DownloadOutcome { filename, result });
        });
    }

    fn download_selected(&mut self) {
        let Some(doc) = self.ctx.selected().cloned() else {
            return;
        };
        let source = self.ctx.source_for(&doc);
        self.start_download(source, doc.filename);
    }

    fn download_open_document(&mut self) {
        let session = &self.viewer.session;
        let (Some(source), Some(filename)) = (session.source().cloned(), session.filename()) else {
            return;
        };
        let filename = filename.to_string();
        self.start_download(source, filename);
    }

    fn handle_main_key(&mut self, key: KeyEvent) {
        let now = Instant::now();
        if self.focus == Focus::Search {
            match key.code {
                KeyCode::Esc => {
                    self.ctx.clear_query();
                    self.focus = Focus::Documents;
                }
                KeyCode::Enter | KeyCode::Down | KeyCode::Tab => self.focus = Focus::Documents,
                KeyCode::Backspace => {
                    let mut query = self.ctx.query.clone();
                    query.pop();
                    self.ctx.edit_query(query, now);
                }
                KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.ctx.edit_query(String::new(), now);
                }
                KeyCode::Char(c) => {
                    let mut query = self.ctx.query.clone();
                    query.push(c);
                    self.ctx.edit_query(query, now);
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => self.focus = Focus::Search,
            KeyCode::Esc => {
                if !self.ctx.query.is_empty() {
                    self.ctx.clear_query();
                } else if self.focus == Focus::Documents && self.ctx.subject.is_none() {
                    self.focus = Focus::Categories;
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Tab if self.ctx.subject.is_none() => {
                self.focus = match self.focus {
                    Focus::Categories => Focus::Documents,
                    _ => Focus::Categories,
                };
            }
            _ if self.focus == Focus::Categories && !self.ctx.is_searching() => {
                self.handle_category_key(key)
            }
            _ => self.handle_document_key(key),
        }
    }

    fn handle_category_key(&mut self, key: KeyEvent) {
        let current = self.ctx.selected_category;
        match key.code {
            KeyCode::Left => self.ctx.select_category(current.saturating_sub(1)),
            KeyCode::Right => self.ctx.select_category(current + 1),
            KeyCode::Up => self.ctx.select_category(current.saturating_sub(GRID_COLUMNS)),
            KeyCode::Down => {
                let next = current + GRID_COLUMNS;
                if next < self.ctx.catalog.categories().len() {
                    self.ctx.select_category(next);
                }
            }
            KeyCode::Enter => self.focus = Focus::Documents,
            _ => {}
        }
    }

    fn handle_document_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.ctx.move_document(-1),
            KeyCode::Down => self.ctx.move_document(1),
            KeyCode::PageUp => self.ctx.move_document(-10),
            KeyCode::PageDown => self.ctx.move_document(10),
            KeyCode::Home => self.ctx.selected_document = 0,
            KeyCode::Enter => {
                if let Some(doc) = self.ctx.selected().cloned() {
                    self.open_document(&doc);
                }
            }
            KeyCode::Char('d') => self.download_selected(),
            _ => {}
        }
    }

    fn handle_main_mouse(&mut self, mouse: MouseEvent) -> bool {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.ctx.move_document(-1),
            MouseEventKind::ScrollDown => self.ctx.move_document(1),
            _ => return false,
        }
        self.focus = Focus::Documents;
        true
    }

    fn handle_viewer_key(&mut self, key: KeyEvent) {
        let Some(action) = keymap::viewer_action(key) else {
            return;
        };
        self.handle_viewer_action(action);
    }

    fn handle_viewer_action(&mut self, action: ViewerAction) {
        match action {
            ViewerAction::Command(cmd) => self.viewer_command(cmd),
            ViewerAction::ThumbnailFocus(delta) => self.viewer.move_thumb_focus(delta),
            ViewerAction::OpenFocusedThumbnail => {
                let page = self.viewer.thumb_focus();
                self.viewer_command(ViewerCommand::SelectThumbnail(page));
            }
            ViewerAction::Scroll(lines) => {
                let (_, font_h) = self.image_picker.font_size();
                self.viewer.scroll(lines, font_h);
            }
            ViewerAction::Download => self.download_open_document(),
        }
    }

    fn handle_viewer_mouse(&mut self, mouse: MouseEvent) -> bool {
        if let Some(action) = keymap::viewer_mouse_wheel(&mouse) {
            self.handle_viewer_action(action);
            return true;
        }
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(page) = self.viewer.thumbnail_at(mouse.column, mouse.row) {
                    self.viewer_command(ViewerCommand::SelectThumbnail(page));
                    return true;
                }
                if self.viewer.in_page_area(mouse.column, mouse.row) {
                    self.viewer.swipe.press(mouse.column);
                }
                false
            }
            MouseEventKind::Drag(MouseButton::Left) if self.viewer.swipe.is_dragging() => {
                match self.viewer.swipe.drag(mouse.column) {
                    Some(cmd) => {
                        self.viewer_command(cmd);
                        true
                    }
                    None => false,
                }
            }
            MouseEventKind::Up(_) => {
                self.viewer.swipe.release();
                false
            }
            _ => false,
        }
    }

    fn draw(&mut self, area: Rect, frame: &mut ratatui::Frame) {
        frame.render_widget(Clear, area);
        if self.viewer.is_open() {
            self.viewer.draw(frame, area, &self.image_picker);
            self.draw_flash(frame, area);
            return;
        }

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(area);

        let title = Paragraph::new(Text::from(self.main_header_lines()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(title, layout[0]);

        self.draw_search_bar(frame, layout[1]);

        if self.ctx.subject.is_some() {
            self.draw_documents(frame, layout[2]);
        } else {
            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
                .split(layout[2]);
            self.draw_categories(frame, body[0]);
            self.draw_documents(frame, body[1]);
        }

        let footer = Paragraph::new(Text::from(self.main_footer_lines()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::TOP));
        frame.render_widget(footer, layout[3]);

        self.draw_flash(frame, area);
    }

    fn main_header_lines(&self) -> Vec<Line<'static>> {
        let heading = match &self.ctx.subject {
            Some(subject) => format!("Study Materials · {}", subject.subject()),
            None => "Study Materials".to_string(),
        };
        let summary = match &self.ctx.subject {
            Some(subject) => subject.count_label(&self.ctx.catalog),
            None => format!(
                "{} documents in {} subjects",
                self.ctx.catalog.documents().len(),
                self.ctx.catalog.categories().len()
            ),
        };
        vec![
            Line::from(Span::styled(
                heading,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(summary, Style::default().fg(Color::DarkGray))),
        ]
    }

    fn main_footer_lines(&self) -> Vec<Line<'static>> {
        let hints = match self.focus {
            Focus::Search => "type to search · Enter results · Esc clear · Ctrl+u erase",
            Focus::Categories => "arrows choose subject · Enter documents · / search · Tab switch · q quit",
            Focus::Documents => "↑/↓ select · Enter view · d download · / search · Esc back · q quit",
        };
        vec![Line::from(Span::styled(
            hints,
            Style::default().fg(Color::DarkGray),
        ))]
    }

    fn draw_search_bar(&self, frame: &mut ratatui::Frame, area: Rect) {
        let focused = self.focus == Focus::Search;
        let border = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let mut spans = vec![Span::raw("🔍 ")];
        if self.ctx.query.is_empty() && !focused {
            spans.push(Span::styled(
                "Search study materials… (press /)",
                Style::default().fg(Color::DarkGray),
            ));
        } else {
            spans.push(Span::raw(self.ctx.query.clone()));
            if focused {
                spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
            }
        }
        if self.ctx.debouncer.is_pending() {
            spans.push(Span::styled("  …", Style::default().fg(Color::DarkGray)));
        }
        let bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title("Search"),
        );
        frame.render_widget(bar, area);
    }

    fn draw_categories(&self, frame: &mut ratatui::Frame, area: Rect) {
        let focused = self.focus == Focus::Categories && !self.ctx.is_searching();
        let block = Block::default().borders(Borders::ALL).title("Subjects");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let cards = category_grid(&self.ctx.catalog);
        if cards.is_empty() {
            frame.render_widget(Paragraph::new("No subjects."), inner);
            return;
        }

        for (index, card) in cards.iter().enumerate() {
            let Some(rect) = grid_cell(inner, index, GRID_COLUMNS, CARD_HEIGHT) else {
                break;
            };
            let color = card
                .color
                .map(|(r, g, b)| Color::Rgb(r, g, b))
                .unwrap_or(Color::Gray);
            let selected = index == self.ctx.selected_category;
            let mut block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(Span::styled(
                    format!(" {} ", card.glyph),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ));
            if selected {
                block = block.border_type(if focused {
                    BorderType::Thick
                } else {
                    BorderType::Double
                });
            }
            let count = if card.count == 0 {
                EMPTY_CATEGORY_PLACEHOLDER.to_string()
            } else if card.count == 1 {
                "1 document".to_string()
            } else {
                format!("{} documents", card.count)
            };
            let width = rect.width.saturating_sub(2) as usize;
            let mut name_style = Style::default().add_modifier(Modifier::BOLD);
            if selected && focused {
                name_style = name_style.fg(color);
            }
            let body = Paragraph::new(vec![
                Line::from(Span::styled(truncate_to_width(&card.name, width), name_style)),
                Line::from(Span::styled(
                    truncate_to_width(&count, width),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
            .block(block);
            frame.render_widget(body, rect);
        }
    }

    fn draw_documents(&mut self, frame: &mut ratatui::Frame, area: Rect) {
        let focused = self.focus == Focus::Documents;
        let title = self.document_pane_title();
        let border = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title);

        if let Some(message) = self.empty_listing_message() {
            let paragraph = Paragraph::new(Text::from(message))
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }

        let docs: Vec<Document> = self
            .ctx
            .visible_documents()
            .into_iter()
            .cloned()
            .collect();
        let show_category = self.ctx.is_searching() && self.ctx.subject.is_none();
        let width = area.width.saturating_sub(6) as usize;

        let items: Vec<ListItem> = docs
            .iter()
            .map(|doc| {
                let source = self.ctx.source_for(doc);
                let meta = self.meta.get(doc.id, &source);
                let mut title_spans = Vec::new();
                if show_category {
                    let color = self
                        .ctx
                        .catalog
                        .category(&doc.category)
                        .and_then(|c| c.rgb())
                        .map(|(r, g, b)| Color::Rgb(r, g, b))
                        .unwrap_or(Color::Gray);
                    title_spans.push(Span::styled(
                        format!("[{}] ", doc.category),
                        Style::default().fg(color),
                    ));
                }
                title_spans.push(Span::styled(
                    truncate_to_width(&doc.title, width),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                let mut lines = vec![Line::from(title_spans)];
                if let Some(description) = &doc.description {
                    lines.push(Line::from(Span::raw(truncate_to_width(description, width))));
                }
                lines.push(Line::from(Span::styled(
                    truncate_to_width(&meta_label(meta, &source), width),
                    Style::default().fg(Color::DarkGray),
                )));
                ListItem::new(Text::from(lines))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always);
        let mut state = ListState::default();
        state.select(Some(self.ctx.selected_document.min(docs.len().saturating_sub(1))));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn document_pane_title(&self) -> String {
        if let Some(subject) = &self.ctx.subject {
            return subject.subject().to_string();
        }
        match self.ctx.search() {
            SearchOutcome::Results(_) => {
                let total = self.ctx.search().total();
                format!("Results for \"{}\" ({total})", self.ctx.applied_query.trim())
            }
            SearchOutcome::NotSearching => self
                .ctx
                .current_category()
                .unwrap_or("Documents")
                .to_string(),
        }
    }

    fn empty_listing_message(&self) -> Option<Vec<Line<'static>>> {
        if !self.ctx.visible_documents().is_empty() {
            return None;
        }
        let query = self.ctx.applied_query.trim();
        if !query.is_empty() {
            return Some(vec![
                Line::raw(format!("No documents match \"{query}\".")),
                Line::raw(""),
                Line::styled(
                    "Press Esc to clear the search.",
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
        }
        if self.ctx.catalog.is_empty() {
            return Some(vec![Line::raw("The catalog is empty.")]);
        }
        Some(vec![Line::raw(EMPTY_CATEGORY_PLACEHOLDER)])
    }

    fn draw_flash(&self, frame: &mut ratatui::Frame, area: Rect) {
        let Some(flash) = &self.flash else {
            return;
        };
        if area.height < 2 {
            return;
        }
        let width = (UnicodeWidthStr::width(flash.message.as_str()) as u16 + 4).min(area.width);
        let rect = Rect::new(
            area.x + area.width.saturating_sub(width) / 2,
            area.y + area.height.saturating_sub(2),
            width,
            1,
        );
        let style = if flash.error {
            Style::default().fg(Color::White).bg(Color::Red)
        } else {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        };
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(format!(" {} ", flash.message))
                .style(style)
                .alignment(Alignment::Center),
            rect,
        );
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

fn meta_label(meta: MetaStatus, source: &SourceLocator) -> String {
    match (meta, source) {
        (MetaStatus::Loading, _) => "reading file info…".to_string(),
        (MetaStatus::Ready(Some(meta)), _) => {
            let pages = if meta.page_count == 1 {
                "1 page".to_string()
            } else {
                format!("{} pages", meta.page_count)
            };
            format!("{pages} · {}", meta.size_label())
        }
        (MetaStatus::Ready(None), SourceLocator::Remote(url)) => format!("online · {url}"),
        (MetaStatus::Ready(None), SourceLocator::Local(path)) => {
            format!("{} (not found)", path.display())
        }
    }
}

/// Cell `index` of a grid laid out row-major inside `area`, if it fits.
fn grid_cell(area: Rect, index: usize, columns: usize, height: u16) -> Option<Rect> {
    let columns = columns.max(1);
    let cell_width = area.width / columns as u16;
    let row = (index / columns) as u16;
    let col = (index % columns) as u16;
    let y = area.y.checked_add(row.checked_mul(height)?)?;
    if cell_width == 0 || y.saturating_add(height) > area.y.saturating_add(area.height) {
        return None;
    }
    Some(Rect::new(area.x + col * cell_width, y, cell_width, height))
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut width = 0usize;
    for ch in text.chars() {
        let mut buf = [0u8; 4];
        let w = UnicodeWidthStr::width(&*ch.encode_utf8(&mut buf));
        if width + w + 1 > max_width {
            break;
        }
        out.push(ch);
        width += w;
    }
    out.push('…');
    out
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange
    )
    .context("enter alt screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    terminal::disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        DisableMouseCapture,
        LeaveAlternateScreen
    )
    .context("leave alt screen")?;
    Ok(())
}

fn panic_to_string(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: (unknown payload)".to_string()
    }
}
