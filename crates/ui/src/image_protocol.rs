//! Terminal graphics detection for page and thumbnail images.

use std::time::Duration;

use ratatui_image::picker::{Capability, Picker, ProtocolType, cap_parser::QueryStdioOptions};

/// Environment facts that decide how the terminal is queried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TerminalHints {
    pub term: Option<String>,
    pub kitty_window: bool,
    pub iterm: bool,
    pub tmux: bool,
}

impl TerminalHints {
    pub(crate) fn from_env() -> Self {
        let non_empty = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.trim().is_empty())
        };
        let contains_iterm = |key: &str| non_empty(key).is_some_and(|v| v.contains("iTerm"));
        Self {
            term: non_empty("TERM"),
            kitty_window: non_empty("KITTY_WINDOW_ID").is_some(),
            iterm: non_empty("ITERM_SESSION_ID").is_some()
                || contains_iterm("TERM_PROGRAM")
                || contains_iterm("LC_TERMINAL"),
            tmux: std::env::var_os("TMUX").is_some(),
        }
    }

    fn term_is_xterm_kitty(&self) -> bool {
        self.term
            .as_deref()
            .is_some_and(|term| term.trim().starts_with("xterm-kitty"))
    }

    /// Kitty's `TERM` survives SSH even when `KITTY_WINDOW_ID` does not.
    pub(crate) fn should_query_stdio(&self) -> bool {
        self.kitty_window || self.term_is_xterm_kitty() || self.iterm || self.tmux
    }

    pub(crate) fn query_timeout(&self) -> Duration {
        if self.kitty_window || self.term_is_xterm_kitty() || self.iterm {
            Duration::from_millis(1500)
        } else if self.tmux {
            Duration::from_millis(300)
        } else {
            Duration::ZERO
        }
    }

    pub(crate) fn kitty_supported(&self, picker: &Picker) -> bool {
        if self.iterm {
            return false;
        }
        self.kitty_window
            || picker
                .capabilities()
                .iter()
                .any(|cap| matches!(cap, Capability::Kitty))
    }
}

/// Builds the picker once at startup, querying the terminal only when the
/// environment suggests a graphics protocol is available.
pub(crate) fn build_picker(hints: &TerminalHints) -> Picker {
    if hints.tmux {
        ensure_tmux_allow_passthrough();
    }
    let mut picker = if hints.should_query_stdio() {
        let options = QueryStdioOptions {
            timeout: hints.query_timeout(),
            text_sizing_protocol: false,
        };
        Picker::from_query_stdio_with_options(options).unwrap_or_else(|err| {
            log::debug!("terminal graphics query failed: {err}");
            Picker::halfblocks()
        })
    } else {
        Picker::halfblocks()
    };
    picker.set_background_color(image::Rgba([255u8, 255u8, 255u8, 255u8]));
    if hints.kitty_supported(&picker) {
        picker.set_protocol_type(ProtocolType::Kitty);
    }
    log::info!("image protocol: {}", protocol_label(&picker));
    picker
}

fn ensure_tmux_allow_passthrough() {
    // Needed for kitty graphics inside tmux; older tmux rejects it harmlessly.
    let _ = std::process::Command::new("tmux")
        .args(["set-option", "-g", "allow-passthrough", "on"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
}

pub(crate) fn protocol_label(picker: &Picker) -> &'static str {
    match picker.protocol_type() {
        ProtocolType::Halfblocks => "halfblocks",
        ProtocolType::Sixel => "sixel",
        ProtocolType::Kitty => "kitty",
        ProtocolType::Iterm2 => "iterm2",
    }
}
