//! Terminal emulation core
//!
//! Integrates the UTF-8 decoder, VT parser, dispatcher, character grid,
//! selection, and redraw scheduler into one session context. [`Term`] is
//! the single explicit owner of all mutable session state; everything
//! flows through `&mut Term`, which serializes byte dispatch, pointer
//! events, and resizes against each other by construction.

pub mod damage;
pub mod decoder;
pub mod dispatch;
pub mod grid;
pub mod parser;
pub mod selection;

use std::time::Instant;

use log::{info, trace};

use crate::config::{Config, PaletteConfig};

use damage::RedrawScheduler;
use decoder::Utf8Decoder;
use dispatch::Performer;
use grid::{CursorStyle, Grid, MouseMode};
use parser::Parser;
use selection::{ClickKind, ClickTracker, Selection, SelectionMode};

/// Runtime copy of the 256-color palette
///
/// Slots 0-15 come from the configured scheme; 16-231 are the 6x6x6 color
/// cube and 232-255 the grayscale ramp. OSC 4 mutates individual slots,
/// OSC 104 restores them.
pub struct Palette {
    colors: [(u8, u8, u8); 256],
    base: [(u8, u8, u8); 16],
}

impl Palette {
    /// Build the palette from 16 configured base colors
    pub fn new(base: [(u8, u8, u8); 16]) -> Self {
        let mut palette = Self {
            colors: [(0, 0, 0); 256],
            base,
        };
        palette.reset_all();
        palette
    }

    /// Default color for a slot (configured base, cube, or grayscale)
    fn default_color(&self, idx: u8) -> (u8, u8, u8) {
        match idx {
            0..=15 => self.base[idx as usize],
            16..=231 => {
                // 6x6x6 color cube
                let n = idx - 16;
                let cube = |v: u8| if v == 0 { 0 } else { 55 + 40 * v };
                let r = n / 36;
                let g = (n / 6) % 6;
                let b = n % 6;
                (cube(r), cube(g), cube(b))
            }
            232..=255 => {
                // Grayscale ramp
                let v = 8 + 10 * (idx - 232);
                (v, v, v)
            }
        }
    }

    /// Get the current color of a slot
    pub fn color(&self, idx: u8) -> (u8, u8, u8) {
        self.colors[idx as usize]
    }

    /// Override a slot (OSC 4)
    pub fn set(&mut self, idx: u8, rgb: (u8, u8, u8)) {
        self.colors[idx as usize] = rgb;
    }

    /// Restore a slot to its default (OSC 104 with index)
    pub fn reset(&mut self, idx: u8) {
        self.colors[idx as usize] = self.default_color(idx);
    }

    /// Restore every slot (OSC 104, RIS)
    pub fn reset_all(&mut self) {
        for idx in 0..=255u8 {
            self.colors[idx as usize] = self.default_color(idx);
        }
    }

    /// Swap the 16 base colors (normal/light scheme switch) and rebuild
    pub fn set_base(&mut self, base: [(u8, u8, u8); 16]) {
        self.base = base;
        self.reset_all();
    }
}

/// Dynamic colors (OSC 10/11/12)
#[derive(Debug, Clone, Default)]
pub struct DynamicColors {
    /// OSC 10 foreground color (RGB, None = use default)
    pub fg: Option<(u8, u8, u8)>,
    /// OSC 11 background color (RGB, None = use default)
    pub bg: Option<(u8, u8, u8)>,
    /// OSC 12 cursor color (RGB, None = use default)
    pub cursor: Option<(u8, u8, u8)>,
}

/// Read-only view of the session for the renderer
///
/// Taken between `process_bytes` calls, so every multi-cell operation it
/// reflects has been applied in full. `generation` changes exactly when
/// grid-visible state changed.
pub struct TermSnapshot<'a> {
    pub grid: &'a Grid,
    pub selection: Option<&'a Selection>,
    pub title: Option<&'a str>,
    pub palette: &'a Palette,
    pub dynamic_colors: &'a DynamicColors,
    /// Snapshot marker, bumped once per completed control function
    pub generation: u64,
}

/// Terminal emulator session
pub struct Term {
    /// Character grid (primary or alternate, whichever is active)
    pub grid: Grid,
    /// UTF-8 decoder
    decoder: Utf8Decoder,
    /// VT parser
    parser: Parser,
    /// Session configuration (immutable)
    config: Config,
    /// Runtime palette (OSC 4/104)
    palette: Palette,
    /// Dynamic colors (OSC 10/11/12)
    dynamic_colors: DynamicColors,
    /// Text selection range
    pub selection: Option<Selection>,
    /// Click-timing state
    clicks: ClickTracker,
    /// Whether a press is being dragged into a selection
    selecting: bool,
    /// Redraw scheduler
    pub scheduler: RedrawScheduler,
    /// Window title (OSC 0/1/2)
    title: Option<String>,
    /// Title changed since last take_title_change()
    title_changed: bool,
    /// Internal clipboard (OSC 52)
    pub clipboard: String,
    /// Bell received since last take_bell()
    bell: bool,
    /// Pending response bytes for the child process
    reply: Vec<u8>,
    /// Snapshot generation marker
    generation: u64,
}

impl Term {
    /// Initialize a session sized to the initial window geometry
    ///
    /// Degenerate geometries are clamped to one row and one column.
    pub fn new(cols: usize, rows: usize, config: Config) -> Self {
        let mut grid = Grid::new(cols, rows, config.terminal.tab_spaces);
        grid.cursor.style = CursorStyle::from_name(&config.appearance.cursor_shape);
        let palette = Palette::new(config.colors.normal.to_rgb());
        let clicks = ClickTracker::new(
            config.selection.double_click_timeout(),
            config.selection.triple_click_timeout(),
        );
        let scheduler = RedrawScheduler::new(&config.timing);

        info!("Terminal session: {}x{}", grid.cols(), grid.rows());

        Self {
            grid,
            decoder: Utf8Decoder::new(),
            parser: Parser::new(),
            config,
            palette,
            dynamic_colors: DynamicColors::default(),
            selection: None,
            clicks,
            selecting: false,
            scheduler,
            title: None,
            title_changed: false,
            clipboard: String::new(),
            bell: false,
            reply: Vec::with_capacity(64),
            generation: 0,
        }
    }

    /// Session configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// TERM value to export to the child process
    pub fn term_name(&self) -> &str {
        &self.config.terminal.term_name
    }

    /// Process a chunk of child output
    ///
    /// Decode -> parse -> dispatch, synchronously, one code point at a
    /// time. Chunks may split multi-byte characters and escape sequences
    /// at any byte boundary; state carries over to the next call.
    pub fn process_bytes(&mut self, bytes: &[u8]) {
        let was_alternate = self.grid.is_alternate_screen();

        let mut performer = Performer::new(
            &mut self.grid,
            &self.config,
            &mut self.palette,
            &mut self.dynamic_colors,
            &mut self.title,
            &mut self.title_changed,
            &mut self.clipboard,
            &mut self.reply,
            &mut self.bell,
            &mut self.generation,
        );

        let parser = &mut self.parser;
        let decoder = &mut self.decoder;
        for &byte in bytes {
            decoder.advance(byte, &mut |c| parser.advance(&mut performer, c));
        }
        drop(performer);

        // Switching the active grid invalidates selection coordinates
        if self.grid.is_alternate_screen() != was_alternate {
            self.clear_selection();
        }

        if self.grid.has_dirty_rows() {
            self.scheduler.request_action();
        }
    }

    /// Take pending response bytes (DA/DSR/OSC query replies)
    ///
    /// The embedder writes these back to the child process.
    pub fn take_reply(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.reply)
    }

    /// Take the outbound title-change notification, if one is pending
    pub fn take_title_change(&mut self) -> Option<String> {
        if self.title_changed {
            self.title_changed = false;
            self.title.clone()
        } else {
            None
        }
    }

    /// Take the bell flag
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }

    /// Recoverable parse errors seen so far (diagnostic)
    pub fn parse_errors(&self) -> u64 {
        self.parser.parse_errors()
    }

    /// Read-only snapshot for the renderer
    pub fn snapshot(&self) -> TermSnapshot<'_> {
        TermSnapshot {
            grid: &self.grid,
            selection: self.selection.as_ref(),
            title: self.title.as_deref(),
            palette: &self.palette,
            dynamic_colors: &self.dynamic_colors,
            generation: self.generation,
        }
    }

    /// Switch between the normal and light color schemes
    pub fn use_light_palette(&mut self, light: bool) {
        let scheme: &PaletteConfig = if light {
            &self.config.colors.light
        } else {
            &self.config.colors.normal
        };
        self.palette.set_base(scheme.to_rgb());
        self.grid.mark_all_dirty();
    }

    /// Resize the session (window geometry change)
    ///
    /// Grid content is preserved top-left-anchored; the selection is
    /// cleared because its coordinates may no longer be meaningful.
    pub fn resize(&mut self, new_cols: usize, new_rows: usize) {
        info!(
            "Terminal resize: {}x{} -> {}x{}",
            self.grid.cols(),
            self.grid.rows(),
            new_cols,
            new_rows
        );

        self.grid.resize(new_cols, new_rows);
        self.clear_selection();
        self.generation = self.generation.wrapping_add(1);
    }

    // ========== Text selection & clipboard ==========

    /// Check if an application has taken over mouse reporting
    pub fn mouse_mode_enabled(&self) -> bool {
        self.grid.modes.mouse_mode != MouseMode::None
    }

    /// Pointer press at grid coordinates
    ///
    /// Click timing promotes the selection mode: a second press within
    /// the double-click timeout selects the word under the pointer, a
    /// third within the triple-click timeout selects the line. `block`
    /// requests a rectangular selection (modifier held).
    pub fn mouse_press(&mut self, now: Instant, row: usize, col: usize, block: bool) {
        let row = row.min(self.grid.rows() - 1);
        let col = col.min(self.grid.cols() - 1);

        match self.clicks.press(now) {
            ClickKind::Double => {
                self.select_word(row, col);
                self.selecting = false;
            }
            ClickKind::Triple => {
                self.select_line(row);
                self.selecting = false;
            }
            ClickKind::Single => {
                self.selection = Some(Selection {
                    mode: if block {
                        SelectionMode::Block
                    } else {
                        SelectionMode::Character
                    },
                    anchor_row: row,
                    anchor_col: col,
                    end_row: row,
                    end_col: col,
                });
                self.selecting = true;
            }
        }
        self.scheduler.request_action();
    }

    /// Pointer motion with the button held
    pub fn mouse_motion(&mut self, row: usize, col: usize) {
        if !self.selecting {
            return;
        }
        let row = row.min(self.grid.rows() - 1);
        let col = col.min(self.grid.cols() - 1);
        if let Some(sel) = self.selection.as_mut() {
            sel.end_row = row;
            // Dragging past a cell includes it; block corners are inclusive
            sel.end_col = if sel.mode == SelectionMode::Block {
                col
            } else {
                (col + 1).min(self.grid.cols())
            };
            self.scheduler.request_action();
        }
    }

    /// Pointer release: finalize the drag and copy the covered text
    pub fn mouse_release(&mut self) {
        self.selecting = false;
        self.copy_selection();
    }

    /// Clear the selection
    pub fn clear_selection(&mut self) {
        if self.selection.take().is_some() {
            self.scheduler.request_action();
        }
        self.selecting = false;
    }

    /// Get text in the selection range
    pub fn selection_text(&self) -> Option<String> {
        let sel = self.selection.as_ref()?;
        let text = sel.text(&self.grid);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Copy the selection into the internal clipboard
    pub fn copy_selection(&mut self) {
        if let Some(text) = self.selection_text() {
            info!("Clipboard: {} characters copied", text.len());
            self.clipboard = text;
        }
    }

    /// Double click: word selection using the configured delimiter set
    fn select_word(&mut self, row: usize, col: usize) {
        let delims = &self.config.selection;
        let (start, end) = selection::word_span(&self.grid, row, col, &|c| delims.is_delimiter(c));
        self.selection = Some(Selection {
            mode: SelectionMode::Word,
            anchor_row: row,
            anchor_col: start,
            end_row: row,
            end_col: end,
        });
        self.copy_selection();
    }

    /// Triple click: line selection
    fn select_line(&mut self, row: usize) {
        self.selection = Some(Selection {
            mode: SelectionMode::Line,
            anchor_row: row,
            anchor_col: 0,
            end_row: row,
            end_col: self.grid.cols(),
        });
        self.copy_selection();
    }

    // ========== Redraw driving ==========

    /// Poll the scheduler; on a content decision the grid's dirty flags
    /// are cleared, so the caller must render the snapshot it takes next.
    pub fn poll_redraw(&mut self, now: Instant) -> damage::RedrawDecision {
        let decision = self.scheduler.poll(now, self.grid.has_dirty_rows());
        if decision.content {
            trace!("Content redraw (generation {})", self.generation);
            self.grid.clear_dirty();
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term() -> Term {
        Term::new(20, 5, Config::default())
    }

    #[test]
    fn degenerate_geometry_is_clamped() {
        let t = Term::new(0, 0, Config::default());
        assert_eq!(t.grid.cols(), 1);
        assert_eq!(t.grid.rows(), 1);
    }

    #[test]
    fn palette_cube_and_grayscale() {
        let p = Palette::new(PaletteConfig::default().to_rgb());
        assert_eq!(p.color(16), (0, 0, 0));
        assert_eq!(p.color(231), (255, 255, 255));
        assert_eq!(p.color(232), (8, 8, 8));
        assert_eq!(p.color(255), (238, 238, 238));
    }

    #[test]
    fn palette_set_and_reset() {
        let mut p = Palette::new(PaletteConfig::default().to_rgb());
        let original = p.color(1);
        p.set(1, (1, 2, 3));
        assert_eq!(p.color(1), (1, 2, 3));
        p.reset(1);
        assert_eq!(p.color(1), original);
    }

    #[test]
    fn generation_advances_with_output() {
        let mut t = term();
        let g0 = t.snapshot().generation;
        t.process_bytes(b"hello");
        assert!(t.snapshot().generation > g0);

        // Idle processing does not publish new snapshots
        let g1 = t.snapshot().generation;
        t.process_bytes(b"");
        assert_eq!(t.snapshot().generation, g1);
    }

    #[test]
    fn reply_drains_once() {
        let mut t = term();
        t.process_bytes(b"\x1b[c");
        assert_eq!(t.take_reply(), b"\x1b[?6c".to_vec());
        assert!(t.take_reply().is_empty());
    }

    #[test]
    fn title_notification_is_edge_triggered() {
        let mut t = term();
        assert_eq!(t.take_title_change(), None);
        t.process_bytes(b"\x1b]2;hello\x07");
        assert_eq!(t.take_title_change(), Some("hello".to_string()));
        assert_eq!(t.take_title_change(), None);
        assert_eq!(t.snapshot().title, Some("hello"));
    }

    #[test]
    fn selection_cleared_on_alt_screen_switch() {
        let mut t = term();
        t.process_bytes(b"hello");
        t.mouse_press(Instant::now(), 0, 0, false);
        t.mouse_motion(0, 4);
        t.mouse_release();
        assert!(t.selection.is_some());

        t.process_bytes(b"\x1b[?1049h");
        assert!(t.selection.is_none());
    }

    #[test]
    fn selection_cleared_on_resize() {
        let mut t = term();
        t.process_bytes(b"hello");
        t.mouse_press(Instant::now(), 0, 0, false);
        t.mouse_motion(0, 4);
        assert!(t.selection.is_some());
        t.resize(30, 10);
        assert!(t.selection.is_none());
    }
}
