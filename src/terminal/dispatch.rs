//! Control-function dispatcher
//!
//! Implements the parser's [`Perform`] trait and applies completed control
//! functions to the grid and session state. Dispatch is keyed on
//! (final byte, intermediates), so each sequence family lives in exactly
//! one match arm. Unknown or unsupported sequences are no-ops, logged at
//! trace, which keeps unrecognized escape traffic harmless.

use log::trace;

use crate::config::Config;

use super::grid::{CellAttrs, Color, CursorStyle, Grid, MouseMode};
use super::parser::{Params, Perform};
use super::{DynamicColors, Palette};
use crate::utils::parse_osc_color;

/// Perform implementation
///
/// Borrows the mutable session pieces for the duration of one
/// `process_bytes` call and directly applies parsed results.
pub struct Performer<'a> {
    pub grid: &'a mut Grid,
    config: &'a Config,
    palette: &'a mut Palette,
    dynamic_colors: &'a mut DynamicColors,
    title: &'a mut Option<String>,
    title_changed: &'a mut bool,
    clipboard: &'a mut String,
    /// Response bytes for the child process (DA, DSR, OSC queries)
    reply: &'a mut Vec<u8>,
    bell: &'a mut bool,
    /// Snapshot generation marker, bumped once per completed function
    generation: &'a mut u64,
}

impl<'a> Performer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grid: &'a mut Grid,
        config: &'a Config,
        palette: &'a mut Palette,
        dynamic_colors: &'a mut DynamicColors,
        title: &'a mut Option<String>,
        title_changed: &'a mut bool,
        clipboard: &'a mut String,
        reply: &'a mut Vec<u8>,
        bell: &'a mut bool,
        generation: &'a mut u64,
    ) -> Self {
        Self {
            grid,
            config,
            palette,
            dynamic_colors,
            title,
            title_changed,
            clipboard,
            reply,
            bell,
            generation,
        }
    }

    /// A control function (or printable) has been fully applied
    #[inline]
    fn complete(&mut self) {
        *self.generation = self.generation.wrapping_add(1);
    }
}

impl<'a> Perform for Performer<'a> {
    /// Handle printable code point
    fn print(&mut self, c: char) {
        self.grid.put_char(c);
        self.complete();
    }

    /// Handle C0 control character
    fn execute(&mut self, byte: u8) {
        match byte {
            0x08 => self.grid.backspace(),  // BS
            0x09 => self.grid.put_tab(1),   // HT
            0x0A | 0x0B | 0x0C => {
                // LF, VT, FF
                self.grid.linefeed();
            }
            0x0D => self.grid.carriage_return(), // CR
            0x07 => *self.bell = true,           // BEL
            _ => {
                trace!("Unhandled control character: 0x{:02x}", byte);
                return;
            }
        }
        self.complete();
    }

    /// Handle CSI sequence
    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], action: char) {
        // Flatten parameters (sub-parameter groups preserved)
        let flat_params: Vec<Vec<u16>> = params.iter().map(|p| p.to_vec()).collect();

        // First parameter (with default value)
        let param0 = flat_params
            .first()
            .and_then(|p| p.first().copied())
            .unwrap_or(0);

        match (action, intermediates) {
            // Cursor movement
            ('A', []) => {
                // CUU - Cursor Up
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.move_cursor_up(n);
            }
            ('B', []) => {
                // CUD - Cursor Down
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.move_cursor_down(n);
            }
            ('C', []) => {
                // CUF - Cursor Forward
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.move_cursor_forward(n);
            }
            ('D', []) => {
                // CUB - Cursor Backward
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.move_cursor_backward(n);
            }
            ('E', []) => {
                // CNL - Cursor Next Line
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.move_cursor_down(n);
                self.grid.carriage_return();
            }
            ('F', []) => {
                // CPL - Cursor Previous Line
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.move_cursor_up(n);
                self.grid.carriage_return();
            }
            ('H' | 'f', []) => {
                // CUP / HVP - Cursor Position
                let row = if param0 == 0 { 1 } else { param0 as usize };
                let col = flat_params
                    .get(1)
                    .and_then(|p| p.first().copied())
                    .map(|v| if v == 0 { 1 } else { v as usize })
                    .unwrap_or(1);
                self.grid.move_cursor_to(row, col);
            }
            ('G', []) => {
                // CHA - Cursor Horizontal Absolute
                let col = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.move_cursor_to_col(col);
            }
            ('d', []) => {
                // VPA - Vertical Position Absolute
                let row = if param0 == 0 { 1 } else { param0 as usize };
                let col = self.grid.cursor_col;
                self.grid.move_cursor_to(row, col + 1);
            }
            ('I', []) => {
                // CHT - Cursor Forward Tabulation
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.put_tab(n);
            }
            ('Z', []) => {
                // CBT - Cursor Backward Tabulation
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.back_tab(n);
            }
            ('J', []) => {
                // ED - Erase in Display
                self.grid.erase_in_display(param0);
            }
            ('K', []) => {
                // EL - Erase in Line
                self.grid.erase_in_line(param0);
            }
            ('L', []) => {
                // IL - Insert Line
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.insert_lines(n);
            }
            ('M', []) => {
                // DL - Delete Line
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.delete_lines(n);
            }
            ('P', []) => {
                // DCH - Delete Character
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.delete_chars(n);
            }
            ('@', []) => {
                // ICH - Insert Character
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.insert_chars(n);
            }
            ('X', []) => {
                // ECH - Erase Character
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.erase_chars(n);
            }
            ('S', []) => {
                // SU - Scroll Up
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.scroll_up(n);
            }
            ('T', []) => {
                // SD - Scroll Down
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.scroll_down(n);
            }
            ('b', []) => {
                // REP - Repeat preceding character
                let n = if param0 == 0 { 1 } else { param0 as usize };
                self.grid.repeat_char(n);
            }
            ('g', []) => {
                // TBC - Tab Clear
                match param0 {
                    0 => self.grid.clear_tab_stop(),
                    3 => self.grid.clear_all_tab_stops(),
                    _ => trace!("Unhandled TBC mode: {}", param0),
                }
            }
            ('s', []) => {
                // SCOSC - Save Cursor Position
                self.grid.save_cursor();
            }
            ('u', []) => {
                // SCORC - Restore Cursor Position
                self.grid.restore_cursor();
            }
            ('n', []) => {
                // DSR - Device Status Report
                match param0 {
                    5 => {
                        // Status report: report normal operation
                        self.reply.extend_from_slice(b"\x1b[0n");
                    }
                    6 => {
                        // Cursor position report: ESC [ row ; col R
                        let row = self.grid.cursor_row + 1;
                        let col = self.grid.cursor_col + 1;
                        self.reply
                            .extend_from_slice(format!("\x1b[{};{}R", row, col).as_bytes());
                    }
                    _ => {}
                }
            }
            ('c', []) => {
                // DA1 - Primary Device Attributes
                // Reply with the configured identification string
                if param0 == 0 {
                    self.reply
                        .extend_from_slice(self.config.terminal.identity.as_bytes());
                }
            }
            ('m', []) => {
                // SGR - Select Graphic Rendition
                self.handle_sgr(&flat_params);
            }
            ('r', []) => {
                // DECSTBM - Set Top and Bottom Margins
                let top = param0 as usize;
                let bottom = flat_params
                    .get(1)
                    .and_then(|p| p.first().copied())
                    .unwrap_or(0) as usize;
                self.grid.set_scroll_region(top, bottom);
            }
            ('h', [b'?']) => {
                // DECSET (Set Private Mode)
                for param in flat_params.iter().filter_map(|p| p.first()) {
                    self.handle_decset(*param, true);
                }
            }
            ('l', [b'?']) => {
                // DECRST (Reset Private Mode)
                for param in flat_params.iter().filter_map(|p| p.first()) {
                    self.handle_decset(*param, false);
                }
            }
            ('q', [b' ']) => {
                // DECSCUSR - Set Cursor Style
                match param0 {
                    0 | 1 => {
                        // 0: default, 1: blinking block
                        self.grid.cursor.style = CursorStyle::Block;
                        self.grid.cursor.blink = true;
                    }
                    2 => {
                        self.grid.cursor.style = CursorStyle::Block;
                        self.grid.cursor.blink = false;
                    }
                    3 => {
                        self.grid.cursor.style = CursorStyle::Underline;
                        self.grid.cursor.blink = true;
                    }
                    4 => {
                        self.grid.cursor.style = CursorStyle::Underline;
                        self.grid.cursor.blink = false;
                    }
                    5 => {
                        self.grid.cursor.style = CursorStyle::Bar;
                        self.grid.cursor.blink = true;
                    }
                    6 => {
                        self.grid.cursor.style = CursorStyle::Bar;
                        self.grid.cursor.blink = false;
                    }
                    _ => {}
                }
            }
            _ => {
                trace!(
                    "Unhandled CSI: action='{}', intermediates={:?}, params={:?}",
                    action,
                    intermediates,
                    flat_params
                );
                return;
            }
        }
        self.complete();
    }

    /// Handle escape sequence
    fn esc_dispatch(&mut self, intermediates: &[u8], byte: u8) {
        match (byte, intermediates) {
            (b'7', []) => {
                // DECSC - Save Cursor
                self.grid.save_cursor();
            }
            (b'8', []) => {
                // DECRC - Restore Cursor
                self.grid.restore_cursor();
            }
            (b'D', []) => {
                // IND - Index (move cursor down 1 line, with scroll)
                self.grid.linefeed();
            }
            (b'E', []) => {
                // NEL - Next Line
                self.grid.carriage_return();
                self.grid.linefeed();
            }
            (b'H', []) => {
                // HTS - Horizontal Tab Set
                self.grid.set_tab_stop();
            }
            (b'M', []) => {
                // RI - Reverse Index (move cursor up 1 line)
                self.grid.reverse_index();
            }
            (b'Z', []) => {
                // DECID - Identify Terminal
                self.reply
                    .extend_from_slice(self.config.terminal.identity.as_bytes());
            }
            (b'c', []) => {
                // RIS - Full Reset
                self.grid.reset();
                self.palette.reset_all();
                *self.dynamic_colors = DynamicColors::default();
            }
            (b'=', []) => {
                // DECKPAM - Application Keypad
                self.grid.modes.application_keypad = true;
            }
            (b'>', []) => {
                // DECKPNM - Normal Keypad
                self.grid.modes.application_keypad = false;
            }
            _ => {
                trace!(
                    "Unhandled ESC: byte=0x{:02x}, intermediates={:?}",
                    byte,
                    intermediates
                );
                return;
            }
        }
        self.complete();
    }

    /// DCS sequence start
    fn hook(&mut self, params: &Params, intermediates: &[u8], action: char) {
        trace!(
            "Unhandled DCS: action='{}', intermediates={:?}, params={:?}",
            action,
            intermediates,
            params.iter().map(|p| p.to_vec()).collect::<Vec<_>>()
        );
    }

    /// Data within DCS sequence
    fn put(&mut self, _byte: u8) {}

    /// DCS sequence end
    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        if params.is_empty() {
            return;
        }

        let cmd = std::str::from_utf8(params[0]).unwrap_or("");
        trace!("OSC dispatch: cmd={}, params.len()={}", cmd, params.len());
        match cmd {
            "0" | "1" | "2" => self.handle_osc_title(params),
            "4" => self.handle_osc_4(params),
            "104" => self.handle_osc_104(params),
            "10" => self.handle_osc_dynamic_color(params, DynamicSlot::Foreground),
            "11" => self.handle_osc_dynamic_color(params, DynamicSlot::Background),
            "12" => self.handle_osc_dynamic_color(params, DynamicSlot::Cursor),
            "52" => self.handle_osc_52(params),
            _ => {
                trace!("Unhandled OSC: cmd={}", cmd);
                return;
            }
        }
        self.complete();
    }
}

/// Dynamic color slot addressed by OSC 10/11/12
#[derive(Debug, Clone, Copy)]
enum DynamicSlot {
    Foreground,
    Background,
    Cursor,
}

impl<'a> Performer<'a> {
    /// DECSET/DECRST handling
    fn handle_decset(&mut self, mode: u16, enable: bool) {
        match mode {
            1 => {
                // DECCKM - Application Cursor Keys
                self.grid.modes.application_cursor_keys = enable;
            }
            6 => {
                // DECOM - Origin Mode
                self.grid.set_origin_mode(enable);
            }
            7 => {
                // DECAWM - Auto-wrap Mode
                self.grid.modes.auto_wrap = enable;
            }
            12 => {
                // Cursor blink
                self.grid.cursor.blink = enable;
            }
            25 => {
                // DECTCEM - Text Cursor Enable Mode
                self.grid.modes.cursor_visible = enable;
            }
            47 | 1047 => {
                // Alternate Screen Buffer (plain variant)
                if !self.config.terminal.allow_alt_screen {
                    return;
                }
                if enable {
                    self.grid.enter_alternate_screen();
                } else {
                    self.grid.leave_alternate_screen();
                }
            }
            1048 => {
                // Cursor save/restore half of 1049
                if enable {
                    self.grid.save_cursor();
                } else {
                    self.grid.restore_cursor();
                }
            }
            1049 => {
                // Alternate Screen Buffer with cursor save/restore
                if !self.config.terminal.allow_alt_screen {
                    return;
                }
                if enable {
                    self.grid.save_cursor();
                    self.grid.enter_alternate_screen();
                } else {
                    self.grid.leave_alternate_screen();
                    self.grid.restore_cursor();
                }
            }
            1000 => {
                // X10 Mouse Tracking
                self.grid.modes.mouse_mode = if enable { MouseMode::X10 } else { MouseMode::None };
            }
            1002 => {
                // Button Event Mouse Tracking
                self.grid.modes.mouse_mode = if enable {
                    MouseMode::ButtonEvent
                } else {
                    MouseMode::None
                };
            }
            1003 => {
                // Any Event Mouse Tracking
                self.grid.modes.mouse_mode = if enable {
                    MouseMode::AnyEvent
                } else {
                    MouseMode::None
                };
            }
            1006 => {
                // SGR Extended Mouse Mode
                self.grid.modes.mouse_sgr = enable;
            }
            2004 => {
                // Bracketed Paste Mode
                self.grid.modes.bracketed_paste = enable;
            }
            _ => {
                trace!("Unhandled DEC private mode: {} = {}", mode, enable);
            }
        }
    }

    /// SGR (Select Graphic Rendition) handling
    fn handle_sgr(&mut self, params: &[Vec<u16>]) {
        // No parameters -> reset
        if params.is_empty() {
            self.grid.reset_attrs();
            return;
        }

        let mut iter = params.iter().peekable();

        while let Some(param) = iter.next() {
            // Colon-separated sub-parameters
            if param.len() > 1 {
                self.handle_sgr_subparams(param);
                continue;
            }

            let code = param[0];
            match code {
                0 => self.grid.reset_attrs(),
                1 => self.grid.set_attr(CellAttrs::BOLD),
                2 => self.grid.set_attr(CellAttrs::FAINT),
                3 => self.grid.set_attr(CellAttrs::ITALIC),
                4 => self.grid.set_attr(CellAttrs::UNDERLINE),
                5 | 6 => self.grid.set_attr(CellAttrs::BLINK),
                7 => self.grid.set_attr(CellAttrs::REVERSE),
                8 => self.grid.set_attr(CellAttrs::INVISIBLE),
                9 => self.grid.set_attr(CellAttrs::STRUCK),
                21 => self.grid.clear_attr(CellAttrs::BOLD),
                22 => {
                    self.grid.clear_attr(CellAttrs::BOLD);
                    self.grid.clear_attr(CellAttrs::FAINT);
                }
                23 => self.grid.clear_attr(CellAttrs::ITALIC),
                24 => self.grid.clear_attr(CellAttrs::UNDERLINE),
                25 => self.grid.clear_attr(CellAttrs::BLINK),
                27 => self.grid.clear_attr(CellAttrs::REVERSE),
                28 => self.grid.clear_attr(CellAttrs::INVISIBLE),
                29 => self.grid.clear_attr(CellAttrs::STRUCK),
                // Foreground color (standard 8 colors)
                30..=37 => self.grid.set_fg(Color::Indexed((code - 30) as u8)),
                38 => {
                    // Extended foreground: 38;5;n (256 color) or 38;2;r;g;b
                    if let Some(color) = Self::parse_extended_color(&mut iter) {
                        self.grid.set_fg(color);
                    }
                }
                39 => self.grid.set_fg(Color::Default),
                // Background color (standard 8 colors)
                40..=47 => self.grid.set_bg(Color::Indexed((code - 40) as u8)),
                48 => {
                    // Extended background: 48;5;n (256 color) or 48;2;r;g;b
                    if let Some(color) = Self::parse_extended_color(&mut iter) {
                        self.grid.set_bg(color);
                    }
                }
                49 => self.grid.set_bg(Color::Default),
                // Foreground color (bright 8 colors)
                90..=97 => self.grid.set_fg(Color::Indexed((code - 90 + 8) as u8)),
                // Background color (bright 8 colors)
                100..=107 => self.grid.set_bg(Color::Indexed((code - 100 + 8) as u8)),
                _ => {
                    trace!("Unhandled SGR: {}", code);
                }
            }
        }
    }

    /// Parse extended color (semicolon-separated)
    /// Format: 38;5;n or 38;2;r;g;b
    fn parse_extended_color(
        iter: &mut std::iter::Peekable<std::slice::Iter<'_, Vec<u16>>>,
    ) -> Option<Color> {
        let mode = iter.next()?.first().copied()?;
        match mode {
            5 => {
                // 256 colors: 38;5;n
                let idx = iter.next()?.first().copied()?;
                Some(Color::Indexed(idx as u8))
            }
            2 => {
                // True Color: 38;2;r;g;b
                let r = iter.next()?.first().copied()? as u8;
                let g = iter.next()?.first().copied()? as u8;
                let b = iter.next()?.first().copied()? as u8;
                Some(Color::Rgb(r, g, b))
            }
            _ => None,
        }
    }

    /// Handle sub-parameters (colon-separated)
    /// Examples: 38:2:r:g:b (SGR True Color, colon format)
    ///           4:3 (underline style; styles collapse to plain underline)
    fn handle_sgr_subparams(&mut self, subparams: &[u16]) {
        if subparams.is_empty() {
            return;
        }

        match subparams[0] {
            4 => {
                // Underline style: 4:0 clears, any other style is underline
                let style = subparams.get(1).copied().unwrap_or(1);
                if style == 0 {
                    self.grid.clear_attr(CellAttrs::UNDERLINE);
                } else {
                    self.grid.set_attr(CellAttrs::UNDERLINE);
                }
            }
            38 => {
                if let Some(color) = Self::parse_colon_color(subparams) {
                    self.grid.set_fg(color);
                }
            }
            48 => {
                if let Some(color) = Self::parse_colon_color(subparams) {
                    self.grid.set_bg(color);
                }
            }
            _ => {
                trace!("Unhandled SGR sub-parameters: {:?}", subparams);
            }
        }
    }

    /// Parse colon-separated color
    /// Format: 38:5:n or 38:2:r:g:b (also supports 38:2:colorspace:r:g:b)
    fn parse_colon_color(subparams: &[u16]) -> Option<Color> {
        if subparams.len() < 3 {
            return None;
        }

        match subparams[1] {
            5 => {
                // 256 colors: 38:5:n
                Some(Color::Indexed(subparams.get(2).copied()? as u8))
            }
            2 => {
                // True Color
                if subparams.len() >= 6 {
                    // 38:2:colorspace:r:g:b (ignore colorspace)
                    Some(Color::Rgb(
                        subparams[3] as u8,
                        subparams[4] as u8,
                        subparams[5] as u8,
                    ))
                } else if subparams.len() >= 5 {
                    // 38:2:r:g:b
                    Some(Color::Rgb(
                        subparams[2] as u8,
                        subparams[3] as u8,
                        subparams[4] as u8,
                    ))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// OSC 0/1/2 (title) handler
    /// Format: ESC ] 0 ; title ST
    ///
    /// The title may itself contain semicolons, so everything after the
    /// command number is rejoined.
    fn handle_osc_title(&mut self, params: &[&[u8]]) {
        if params.len() < 2 {
            return;
        }
        let raw = params[1..].join(&b';');
        let title = String::from_utf8_lossy(&raw).to_string();
        trace!("OSC title: {}", title);
        *self.title = Some(title);
        *self.title_changed = true;
    }

    /// OSC 4 (set/query indexed palette color) handler
    /// Format: ESC ] 4 ; index ; spec [; index ; spec ...] ST
    fn handle_osc_4(&mut self, params: &[&[u8]]) {
        let mut i = 1;
        while i + 1 < params.len() {
            let idx = match std::str::from_utf8(params[i]).ok().and_then(|s| s.parse::<u16>().ok())
            {
                Some(idx) if idx < 256 => idx as u8,
                _ => {
                    trace!("OSC 4: bad index {:?}", params[i]);
                    i += 2;
                    continue;
                }
            };
            let spec = params[i + 1];
            if spec == b"?" {
                // Query: respond with the current color
                let (r, g, b) = self.palette.color(idx);
                self.reply.extend_from_slice(
                    format!(
                        "\x1b]4;{};rgb:{:02x}{:02x}/{:02x}{:02x}/{:02x}{:02x}\x1b\\",
                        idx, r, r, g, g, b, b
                    )
                    .as_bytes(),
                );
            } else if let Some(rgb) = parse_osc_color(spec) {
                self.palette.set(idx, rgb);
                self.grid.mark_all_dirty();
            } else {
                trace!("OSC 4: bad color spec {:?}", String::from_utf8_lossy(spec));
            }
            i += 2;
        }
    }

    /// OSC 104 (reset indexed palette color) handler
    /// Without parameters the whole palette resets.
    fn handle_osc_104(&mut self, params: &[&[u8]]) {
        if params.len() < 2 || params[1].is_empty() {
            self.palette.reset_all();
            self.grid.mark_all_dirty();
            return;
        }
        for param in &params[1..] {
            if let Some(idx) = std::str::from_utf8(param)
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
                .filter(|&idx| idx < 256)
            {
                self.palette.reset(idx as u8);
            }
        }
        self.grid.mark_all_dirty();
    }

    /// OSC 10/11/12 (dynamic fg/bg/cursor color) handler
    /// Format: ESC ] 10 ; spec ST, where spec is a color or "?"
    fn handle_osc_dynamic_color(&mut self, params: &[&[u8]], slot: DynamicSlot) {
        let spec = if params.len() > 1 { params[1] } else { return };

        if spec == b"?" {
            let (cmd, (r, g, b)) = match slot {
                DynamicSlot::Foreground => ("10", self.effective_fg()),
                DynamicSlot::Background => ("11", self.effective_bg()),
                DynamicSlot::Cursor => ("12", self.effective_cursor_color()),
            };
            self.reply.extend_from_slice(
                format!(
                    "\x1b]{};rgb:{:02x}{:02x}/{:02x}{:02x}/{:02x}{:02x}\x1b\\",
                    cmd, r, r, g, g, b, b
                )
                .as_bytes(),
            );
            return;
        }

        if let Some(rgb) = parse_osc_color(spec) {
            match slot {
                DynamicSlot::Foreground => self.dynamic_colors.fg = Some(rgb),
                DynamicSlot::Background => self.dynamic_colors.bg = Some(rgb),
                DynamicSlot::Cursor => self.dynamic_colors.cursor = Some(rgb),
            }
            self.grid.mark_all_dirty();
        }
    }

    fn effective_fg(&self) -> (u8, u8, u8) {
        self.dynamic_colors.fg.unwrap_or_else(|| {
            self.palette
                .color((self.config.colors.default_foreground.min(255)) as u8)
        })
    }

    fn effective_bg(&self) -> (u8, u8, u8) {
        self.dynamic_colors.bg.unwrap_or_else(|| {
            self.palette
                .color((self.config.colors.default_background.min(255)) as u8)
        })
    }

    fn effective_cursor_color(&self) -> (u8, u8, u8) {
        self.dynamic_colors
            .cursor
            .unwrap_or_else(|| self.effective_fg())
    }

    /// OSC 52 (clipboard operation) handler
    /// Format: ESC ] 52 ; <selection> ; <base64-data> ST
    ///
    /// Gated by `allow_window_ops`: when disabled the sequence is accepted
    /// and dropped so the child never sees an error.
    fn handle_osc_52(&mut self, params: &[&[u8]]) {
        if params.len() < 3 {
            trace!("OSC 52: params not enough, returning");
            return;
        }

        if !self.config.terminal.allow_window_ops {
            trace!("OSC 52: window ops disabled, ignoring");
            return;
        }

        let data = params[2];
        if data == b"?" {
            // Query: respond with current clipboard contents in base64
            let encoded = base64_encode(self.clipboard.as_bytes());
            self.reply
                .extend_from_slice(format!("\x1b]52;c;{}\x1b\\", encoded).as_bytes());
        } else {
            // Set: decode base64 and store in the clipboard
            if let Some(decoded) = base64_decode(data) {
                if let Ok(text) = String::from_utf8(decoded) {
                    trace!("OSC 52: clipboard set ({} chars)", text.len());
                    *self.clipboard = text;
                }
            }
        }
    }
}

// ========== Base64 encode/decode (for OSC 52) ==========

const BASE64_TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

pub(crate) fn base64_encode(input: &[u8]) -> String {
    let mut output = String::with_capacity((input.len() + 2) / 3 * 4);
    for chunk in input.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = if chunk.len() > 1 { chunk[1] as u32 } else { 0 };
        let b2 = if chunk.len() > 2 { chunk[2] as u32 } else { 0 };
        let triple = (b0 << 16) | (b1 << 8) | b2;

        output.push(BASE64_TABLE[((triple >> 18) & 0x3F) as usize] as char);
        output.push(BASE64_TABLE[((triple >> 12) & 0x3F) as usize] as char);
        if chunk.len() > 1 {
            output.push(BASE64_TABLE[((triple >> 6) & 0x3F) as usize] as char);
        } else {
            output.push('=');
        }
        if chunk.len() > 2 {
            output.push(BASE64_TABLE[(triple & 0x3F) as usize] as char);
        } else {
            output.push('=');
        }
    }
    output
}

pub(crate) fn base64_decode(input: &[u8]) -> Option<Vec<u8>> {
    let mut output = Vec::with_capacity(input.len() * 3 / 4);
    let mut buf: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in input {
        let val = match byte {
            b'A'..=b'Z' => byte - b'A',
            b'a'..=b'z' => byte - b'a' + 26,
            b'0'..=b'9' => byte - b'0' + 52,
            b'+' => 62,
            b'/' => 63,
            b'=' | b'\n' | b'\r' | b' ' => continue,
            _ => return None,
        };
        buf = (buf << 6) | val as u32;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            output.push((buf >> bits) as u8);
            buf &= (1 << bits) - 1;
        }
    }
    Some(output)
}
