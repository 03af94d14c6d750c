//! Terminal input to viewer intents.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use studyshelf_application::ViewerCommand;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ViewerAction {
    Command(ViewerCommand),
    ThumbnailFocus(i32),
    OpenFocusedThumbnail,
    Scroll(i32),
    Download,
}

pub(crate) fn viewer_action(key: KeyEvent) -> Option<ViewerAction> {
    let action = match key.code {
        KeyCode::Left => ViewerAction::Command(ViewerCommand::Previous),
        KeyCode::Right => ViewerAction::Command(ViewerCommand::Next),
        KeyCode::Char('+') | KeyCode::Char('=') => ViewerAction::Command(ViewerCommand::ZoomIn),
        KeyCode::Char('-') | KeyCode::Char('_') => ViewerAction::Command(ViewerCommand::ZoomOut),
        KeyCode::Char('0') => ViewerAction::Command(ViewerCommand::ResetZoom),
        KeyCode::Esc => ViewerAction::Command(ViewerCommand::Close),
        KeyCode::Char('r') => ViewerAction::Command(ViewerCommand::Retry),
        KeyCode::Char('x') => ViewerAction::Command(ViewerCommand::DismissNotice),
        KeyCode::Char('[') => ViewerAction::ThumbnailFocus(-1),
        KeyCode::Char(']') => ViewerAction::ThumbnailFocus(1),
        KeyCode::Enter => ViewerAction::OpenFocusedThumbnail,
        KeyCode::Up => ViewerAction::Scroll(-1),
        KeyCode::Down => ViewerAction::Scroll(1),
        KeyCode::PageUp => ViewerAction::Scroll(-8),
        KeyCode::PageDown => ViewerAction::Scroll(8),
        KeyCode::Char('d') => ViewerAction::Download,
        _ => return None,
    };
    Some(action)
}

/// Ctrl+wheel zooms; a plain wheel scrolls the page.
pub(crate) fn viewer_mouse_wheel(mouse: &MouseEvent) -> Option<ViewerAction> {
    let zoom = mouse.modifiers.contains(KeyModifiers::CONTROL);
    match (mouse.kind, zoom) {
        (MouseEventKind::ScrollUp, true) => Some(ViewerAction::Command(ViewerCommand::ZoomIn)),
        (MouseEventKind::ScrollDown, true) => Some(ViewerAction::Command(ViewerCommand::ZoomOut)),
        (MouseEventKind::ScrollUp, false) => Some(ViewerAction::Scroll(-1)),
        (MouseEventKind::ScrollDown, false) => Some(ViewerAction::Scroll(1)),
        _ => None,
    }
}

pub(crate) fn focus_command(event: &Event) -> Option<ViewerCommand> {
    match event {
        Event::FocusLost => Some(ViewerCommand::Suspend),
        Event::FocusGained => Some(ViewerCommand::Resume),
        _ => None,
    }
}

/// Horizontal drag gesture. Fires at most once per press.
#[derive(Debug, Clone)]
pub(crate) struct Swipe {
    threshold: u16,
    origin: Option<u16>,
    fired: bool,
}

impl Swipe {
    pub(crate) fn new(threshold: u16) -> Self {
        Self {
            threshold: threshold.max(1),
            origin: None,
            fired: false,
        }
    }

    pub(crate) fn press(&mut self, column: u16) {
        self.origin = Some(column);
        self.fired = false;
    }

    /// Dragging right goes back a page, dragging left goes forward.
    pub(crate) fn drag(&mut self, column: u16) -> Option<ViewerCommand> {
        let origin = self.origin?;
        if self.fired {
            return None;
        }
        let delta = i32::from(column) - i32::from(origin);
        if delta.unsigned_abs() < u32::from(self.threshold) {
            return None;
        }
        self.fired = true;
        Some(if delta > 0 {
            ViewerCommand::Previous
        } else {
            ViewerCommand::Next
        })
    }

    pub(crate) fn release(&mut self) {
        self.origin = None;
        self.fired = false;
    }

    pub(crate) fn is_dragging(&self) -> bool {
        self.origin.is_some()
    }
}
