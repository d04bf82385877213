//! Character grid
//!
//! 2D cell array that manages terminal screen state.
//! Provides cursor position, character attributes, erase and scroll
//! operations, tab stops, the alternate screen, and per-row damage flags.

use bitflags::bitflags;
use log::trace;
use unicode_width::UnicodeWidthChar;

/// Cursor style (DECSCUSR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    /// Block cursor (default)
    #[default]
    Block,
    /// Underline cursor
    Underline,
    /// Bar (vertical line) cursor
    Bar,
}

impl CursorStyle {
    /// Parse a config string ("block", "underline", "bar")
    pub fn from_name(name: &str) -> Self {
        match name {
            "underline" => CursorStyle::Underline,
            "bar" => CursorStyle::Bar,
            _ => CursorStyle::Block,
        }
    }
}

/// Text color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Default color (resolved by the renderer from the configured
    /// default foreground/background indices)
    Default,
    /// 256-color palette index
    Indexed(u8),
    /// True Color (24bit RGB)
    Rgb(u8, u8, u8),
}

bitflags! {
    /// Cell character attributes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CellAttrs: u16 {
        const BOLD      = 0b0_0000_0001;
        const FAINT     = 0b0_0000_0010;
        const ITALIC    = 0b0_0000_0100;
        const UNDERLINE = 0b0_0000_1000;
        const BLINK     = 0b0_0001_0000;
        const REVERSE   = 0b0_0010_0000;
        const INVISIBLE = 0b0_0100_0000;
        const STRUCK    = 0b0_1000_0000;
        /// Set on the last cell of a row that autowrapped, so selection
        /// extraction can join the two rows without a newline
        const WRAP      = 0b1_0000_0000;
    }
}

/// Data for one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Code point shown in the cell (space for blanks)
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub attrs: CellAttrs,
    /// Character width: 1=half-width, 2=full-width(head), 0=full-width(continuation)
    pub width: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Default,
            bg: Color::Default,
            attrs: CellAttrs::empty(),
            width: 1,
        }
    }
}

impl Cell {
    /// Check whether this is the head of a double-width pair
    #[inline]
    pub fn is_wide(&self) -> bool {
        self.width == 2
    }

    /// Check whether this is the continuation half of a double-width pair
    #[inline]
    pub fn is_wide_continuation(&self) -> bool {
        self.width == 0
    }
}

/// Pen state (current drawing attributes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pen {
    pub fg: Color,
    pub bg: Color,
    pub attrs: CellAttrs,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            fg: Color::Default,
            bg: Color::Default,
            attrs: CellAttrs::empty(),
        }
    }
}

/// Mouse tracking mode (DECSET 1000/1002/1003)
///
/// Tracked so the embedder knows when an application owns the pointer;
/// event encoding to the child is the embedder's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseMode {
    /// Mouse tracking disabled
    #[default]
    None,
    /// X10 mode (?1000) - button press only
    X10,
    /// Button event mode (?1002) - press/release/drag
    ButtonEvent,
    /// Any event mode (?1003) - includes movement
    AnyEvent,
}

/// Terminal mode flags (DECSET/DECRST)
#[derive(Debug, Clone, Default)]
pub struct TerminalModes {
    /// Cursor visibility flag (DECTCEM, ?25)
    pub cursor_visible: bool,
    /// Auto-wrap mode (DECAWM, ?7)
    pub auto_wrap: bool,
    /// Origin mode (DECOM, ?6) - absolute addressing relative to the
    /// scroll region
    pub origin: bool,
    /// Application cursor keys mode (DECCKM, ?1)
    pub application_cursor_keys: bool,
    /// Application keypad mode (DECKPAM)
    pub application_keypad: bool,
    /// Bracketed paste mode (?2004)
    pub bracketed_paste: bool,
    /// Mouse mode (?1000=X10, ?1002=button, ?1003=all events)
    pub mouse_mode: MouseMode,
    /// SGR mouse mode (?1006) - extended coordinate format
    pub mouse_sgr: bool,
}

impl TerminalModes {
    pub fn new() -> Self {
        Self {
            cursor_visible: true,
            auto_wrap: true,
            ..Default::default()
        }
    }
}

/// Cursor appearance state
#[derive(Debug, Clone)]
pub struct CursorAppearance {
    /// Cursor style (DECSCUSR)
    pub style: CursorStyle,
    /// Cursor blink flag
    pub blink: bool,
}

impl Default for CursorAppearance {
    fn default() -> Self {
        Self {
            style: CursorStyle::Block,
            blink: true,
        }
    }
}

/// Saved cursor snapshot (DECSC/DECRC)
///
/// A plain value pushed onto a stack owned by the grid, so save/restore
/// pairs can never alias live cursor state.
#[derive(Debug, Clone, Copy)]
struct SavedCursor {
    row: usize,
    col: usize,
    pen: Pen,
    origin: bool,
    pending_wrap: bool,
}

/// Saved screen for the alternate-screen swap
struct SavedScreen {
    cells: Vec<Cell>,
    cursor_row: usize,
    cursor_col: usize,
    pen: Pen,
    pending_wrap: bool,
    saved_cursors: Vec<SavedCursor>,
}

/// Character grid
pub struct Grid {
    // ===== Core display state =====
    /// Cell array (row-major)
    cells: Vec<Cell>,
    /// Number of columns
    cols: usize,
    /// Number of rows
    rows: usize,
    /// Cursor row (0-indexed)
    pub cursor_row: usize,
    /// Cursor column (0-indexed)
    pub cursor_col: usize,
    /// Current pen state
    pen: Pen,
    /// Deferred autowrap: the next printable at the last column wraps
    pending_wrap: bool,
    /// Saved cursor snapshots (DECSC pushes, DECRC pops)
    saved_cursors: Vec<SavedCursor>,
    /// Last printed character (for REP)
    last_char: char,
    /// Top of scroll region (0-indexed)
    scroll_top: usize,
    /// Bottom of scroll region (0-indexed, inclusive)
    scroll_bottom: usize,
    /// Tab stop flags, one per column
    tabs: Vec<bool>,
    /// Tab stop interval used to (re)initialize `tabs`
    tab_interval: usize,
    /// Alternate screen buffer (?1049 family)
    alternate: Option<SavedScreen>,

    // ===== Damage tracking =====
    /// Per-row dirty flags
    dirty: Vec<bool>,
    /// Whole-screen dirty shortcut (resize, alt switch, full erase)
    all_dirty: bool,

    // ===== Grouped state =====
    /// Terminal mode flags
    pub modes: TerminalModes,
    /// Cursor appearance
    pub cursor: CursorAppearance,
}

impl Grid {
    /// Create grid with specified size
    ///
    /// Degenerate sizes are clamped to one row and one column.
    pub fn new(cols: usize, rows: usize, tab_interval: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let mut grid = Self {
            cells: vec![Cell::default(); cols * rows],
            cols,
            rows,
            cursor_row: 0,
            cursor_col: 0,
            pen: Pen::default(),
            pending_wrap: false,
            saved_cursors: Vec::new(),
            last_char: ' ',
            scroll_top: 0,
            scroll_bottom: rows - 1,
            tabs: vec![false; cols],
            tab_interval: tab_interval.max(1),
            alternate: None,
            dirty: vec![true; rows],
            all_dirty: true,
            modes: TerminalModes::new(),
            cursor: CursorAppearance::default(),
        };
        grid.init_tabs();
        grid
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Get reference to cell
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.cells[row * self.cols + col]
    }

    /// Get one full row of cells
    pub fn line(&self, row: usize) -> &[Cell] {
        let start = row * self.cols;
        &self.cells[start..start + self.cols]
    }

    /// Get mutable reference to cell
    fn cell_mut(&mut self, row: usize, col: usize) -> &mut Cell {
        &mut self.cells[row * self.cols + col]
    }

    /// Blank cell carrying the current background color
    fn blank_cell(&self) -> Cell {
        Cell {
            ch: ' ',
            fg: self.pen.fg,
            bg: self.pen.bg,
            attrs: CellAttrs::empty(),
            width: 1,
        }
    }

    // ========== Dirty tracking ==========

    /// Mark one row as needing redraw
    #[inline]
    pub fn mark_dirty(&mut self, row: usize) {
        if row < self.rows {
            self.dirty[row] = true;
        }
    }

    /// Mark all rows as needing redraw
    #[inline]
    pub fn mark_all_dirty(&mut self) {
        self.all_dirty = true;
        self.dirty.fill(true);
    }

    /// Clear all dirty flags (call after rendering)
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.all_dirty = false;
        self.dirty.fill(false);
    }

    /// Check if a specific row needs redraw
    #[inline]
    pub fn is_row_dirty(&self, row: usize) -> bool {
        self.all_dirty || self.dirty.get(row).copied().unwrap_or(false)
    }

    /// Check if the whole screen needs redraw
    #[inline]
    pub fn is_all_dirty(&self) -> bool {
        self.all_dirty
    }

    /// Check if any row needs redraw
    #[inline]
    pub fn has_dirty_rows(&self) -> bool {
        self.all_dirty || self.dirty.iter().any(|&d| d)
    }

    fn mark_rows_dirty(&mut self, top: usize, bottom: usize) {
        for row in top..=bottom.min(self.rows - 1) {
            self.dirty[row] = true;
        }
    }

    // ========== Wide character helpers ==========

    /// Find head cell of wide character (skip continuation cells with width=0)
    fn find_wide_char_head(&self, row: usize, mut col: usize) -> usize {
        while col > 0 && self.cell(row, col).width == 0 {
            col -= 1;
        }
        col
    }

    /// Clear paired cell when overwriting half of a wide character
    ///
    /// - Overwriting width=2 cell (head) -> clear right neighbor continuation cell
    /// - Overwriting width=0 cell (continuation) -> clear left neighbor head cell
    fn clear_wide_char_at(&mut self, row: usize, col: usize) {
        let w = self.cell(row, col).width;
        let blank = self.blank_cell();
        if w == 2 {
            if col + 1 < self.cols {
                *self.cell_mut(row, col + 1) = blank;
            }
        } else if w == 0 {
            if col > 0 {
                *self.cell_mut(row, col - 1) = blank;
            }
        }
    }

    // ========== Character writing ==========

    /// Write character at cursor position and advance cursor
    pub fn put_char(&mut self, ch: char) {
        // Determine character width
        let char_width = match ch.width() {
            None => return,    // Control character -> skip
            Some(0) => return, // Combining characters are not stored in the single-codepoint cell model
            Some(w) => w,
        };

        // Deferred wrap from a previous write at the last column
        if self.pending_wrap {
            self.pending_wrap = false;
            if self.modes.auto_wrap {
                let last = self.cols - 1;
                let row = self.cursor_row;
                self.cell_mut(row, last).attrs.insert(CellAttrs::WRAP);
                self.cursor_col = 0;
                self.linefeed();
            }
            // auto_wrap off: stay clamped at the last column and overwrite
        }

        // Wide character doesn't fit at right edge -> blank the rest of the
        // row and continue on the next line (or clamp when wrap is off)
        if char_width == 2 && self.cursor_col + 1 >= self.cols {
            if self.cols < 2 {
                return; // Cannot represent a wide glyph in one column
            }
            let row = self.cursor_row;
            let col = self.cursor_col;
            self.clear_wide_char_at(row, col);
            let blank = self.blank_cell();
            *self.cell_mut(row, col) = blank;
            self.mark_dirty(row);
            if self.modes.auto_wrap {
                self.cell_mut(row, col).attrs.insert(CellAttrs::WRAP);
                self.cursor_col = 0;
                self.linefeed();
            } else {
                self.cursor_col = self.cols - 2;
            }
        }

        let pen = self.pen;
        let row = self.cursor_row;
        let col = self.cursor_col;

        // Clear paired cells when overwriting existing wide characters
        self.clear_wide_char_at(row, col);

        *self.cell_mut(row, col) = Cell {
            ch,
            fg: pen.fg,
            bg: pen.bg,
            attrs: pen.attrs,
            width: char_width as u8,
        };

        // Continuation cell for wide characters
        if char_width == 2 {
            let next_col = col + 1;
            self.clear_wide_char_at(row, next_col);
            *self.cell_mut(row, next_col) = Cell {
                ch: ' ',
                fg: pen.fg,
                bg: pen.bg,
                attrs: pen.attrs,
                width: 0,
            };
        }

        self.mark_dirty(row);

        if col + char_width < self.cols {
            self.cursor_col = col + char_width;
        } else {
            self.cursor_col = self.cols - 1;
            self.pending_wrap = true;
        }
        self.last_char = ch;
    }

    /// Repeat last printed character (CSI b / REP)
    pub fn repeat_char(&mut self, n: usize) {
        let ch = self.last_char;
        for _ in 0..n {
            self.put_char(ch);
        }
    }

    // ========== Cursor movement ==========

    /// Clamp a target row into the scroll region when origin mode is set
    fn clamp_row(&self, row: usize) -> usize {
        if self.modes.origin {
            row.max(self.scroll_top).min(self.scroll_bottom)
        } else {
            row.min(self.rows - 1)
        }
    }

    /// Move cursor to absolute position (1-indexed -> 0-indexed)
    ///
    /// With origin mode set the row is relative to the top of the scroll
    /// region and the result is clamped into the region.
    pub fn move_cursor_to(&mut self, row: usize, col: usize) {
        let mut target_row = row.saturating_sub(1);
        if self.modes.origin {
            target_row += self.scroll_top;
        }
        self.cursor_row = self.clamp_row(target_row);
        self.cursor_col = col.saturating_sub(1).min(self.cols - 1);
        self.pending_wrap = false;
    }

    /// Move cursor to an absolute column (CSI G / CHA, 1-indexed)
    pub fn move_cursor_to_col(&mut self, col: usize) {
        self.cursor_col = col.saturating_sub(1).min(self.cols - 1);
        self.pending_wrap = false;
    }

    /// Move cursor up (CSI A)
    pub fn move_cursor_up(&mut self, n: usize) {
        self.cursor_row = self.clamp_row(self.cursor_row.saturating_sub(n));
        self.pending_wrap = false;
    }

    /// Move cursor down (CSI B)
    pub fn move_cursor_down(&mut self, n: usize) {
        self.cursor_row = self.clamp_row(self.cursor_row + n);
        self.pending_wrap = false;
    }

    /// Move cursor right (CSI C)
    pub fn move_cursor_forward(&mut self, n: usize) {
        self.cursor_col = (self.cursor_col + n).min(self.cols - 1);
        self.pending_wrap = false;
    }

    /// Move cursor left (CSI D)
    pub fn move_cursor_backward(&mut self, n: usize) {
        self.cursor_col = self.cursor_col.saturating_sub(n);
        self.pending_wrap = false;
    }

    // ========== Control characters ==========

    /// Line feed (LF)
    pub fn linefeed(&mut self) {
        if self.cursor_row == self.scroll_bottom {
            // Scroll if at bottom of scroll region
            self.scroll_up(1);
        } else if self.cursor_row < self.rows - 1 {
            self.cursor_row += 1;
        }
    }

    /// Reverse index (RI / ESC M)
    pub fn reverse_index(&mut self) {
        if self.cursor_row == self.scroll_top {
            // Scroll down if at top of scroll region
            self.scroll_down(1);
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
        }
    }

    /// Carriage return (CR)
    pub fn carriage_return(&mut self) {
        self.cursor_col = 0;
        self.pending_wrap = false;
    }

    /// Backspace (BS)
    pub fn backspace(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
            // If moved to a continuation cell (width=0), go back to head cell
            self.cursor_col = self.find_wide_char_head(self.cursor_row, self.cursor_col);
        }
        self.pending_wrap = false;
    }

    // ========== Tab stops ==========

    /// Initialize tab stops at every `tab_interval` columns
    fn init_tabs(&mut self) {
        self.tabs.fill(false);
        let mut col = self.tab_interval;
        while col < self.cols {
            self.tabs[col] = true;
            col += self.tab_interval;
        }
    }

    /// Tab forward n stops (HT / CSI I)
    pub fn put_tab(&mut self, n: usize) {
        let mut col = self.cursor_col;
        for _ in 0..n {
            col += 1;
            while col < self.cols && !self.tabs[col] {
                col += 1;
            }
            if col >= self.cols {
                col = self.cols - 1;
                break;
            }
        }
        self.cursor_col = col.min(self.cols - 1);
        self.pending_wrap = false;
    }

    /// Tab backward n stops (CSI Z / CBT)
    pub fn back_tab(&mut self, n: usize) {
        let mut col = self.cursor_col;
        for _ in 0..n {
            if col == 0 {
                break;
            }
            col -= 1;
            while col > 0 && !self.tabs[col] {
                col -= 1;
            }
        }
        self.cursor_col = col;
        self.pending_wrap = false;
    }

    /// Set a tab stop at the cursor column (ESC H / HTS)
    pub fn set_tab_stop(&mut self) {
        self.tabs[self.cursor_col] = true;
    }

    /// Clear the tab stop at the cursor column (CSI 0 g)
    pub fn clear_tab_stop(&mut self) {
        self.tabs[self.cursor_col] = false;
    }

    /// Clear all tab stops (CSI 3 g)
    pub fn clear_all_tab_stops(&mut self) {
        self.tabs.fill(false);
    }

    /// Columns that currently hold tab stops, in increasing order
    pub fn tab_stops(&self) -> Vec<usize> {
        self.tabs
            .iter()
            .enumerate()
            .filter_map(|(col, &set)| set.then_some(col))
            .collect()
    }

    // ========== Erase ==========

    /// Erase display (CSI J)
    /// mode: 0=from cursor, 1=to cursor, 2=entire screen
    ///
    /// The cursor position is left untouched in every mode.
    pub fn erase_in_display(&mut self, mode: u16) {
        match mode {
            0 => {
                self.erase_in_line(0);
                for row in (self.cursor_row + 1)..self.rows {
                    self.clear_row(row);
                }
                self.mark_rows_dirty(self.cursor_row, self.rows - 1);
            }
            1 => {
                for row in 0..self.cursor_row {
                    self.clear_row(row);
                }
                self.erase_in_line(1);
                self.mark_rows_dirty(0, self.cursor_row);
            }
            2 | 3 => {
                let blank = self.blank_cell();
                self.cells.fill(blank);
                self.mark_all_dirty();
            }
            _ => {}
        }
        self.pending_wrap = false;
    }

    /// Erase line (CSI K)
    /// mode: 0=from cursor, 1=to cursor, 2=entire line
    pub fn erase_in_line(&mut self, mode: u16) {
        let row = self.cursor_row;
        let blank = self.blank_cell();
        match mode {
            0 => {
                // Also clear the head cell if the start position is a
                // continuation cell (width=0)
                if self.cell(row, self.cursor_col).width == 0 && self.cursor_col > 0 {
                    *self.cell_mut(row, self.cursor_col - 1) = blank;
                }
                for col in self.cursor_col..self.cols {
                    *self.cell_mut(row, col) = blank;
                }
            }
            1 => {
                let end = self.cursor_col.min(self.cols - 1);
                // Also clear the continuation cell if the end position is a
                // head cell (width=2)
                if self.cell(row, end).width == 2 && end + 1 < self.cols {
                    *self.cell_mut(row, end + 1) = blank;
                }
                for col in 0..=end {
                    *self.cell_mut(row, col) = blank;
                }
            }
            2 => {
                self.clear_row(row);
            }
            _ => {}
        }
        self.mark_dirty(row);
        self.pending_wrap = false;
    }

    /// Clear row (optimized with fill)
    fn clear_row(&mut self, row: usize) {
        let blank = self.blank_cell();
        let start = row * self.cols;
        let end = start + self.cols;
        self.cells[start..end].fill(blank);
        self.mark_dirty(row);
    }

    // ========== Scroll ==========

    /// Scroll up (n lines) within the scroll region
    pub fn scroll_up(&mut self, n: usize) {
        let top = self.scroll_top;
        let bottom = self.scroll_bottom;
        let region_height = bottom - top + 1;
        let n = n.min(region_height);
        if n == 0 {
            return;
        }

        // Shift rows up within scroll region
        for row in top..(bottom + 1 - n) {
            let src_start = (row + n) * self.cols;
            let dst_start = row * self.cols;
            let (left, right) = self.cells.split_at_mut(src_start);
            left[dst_start..dst_start + self.cols].clone_from_slice(&right[..self.cols]);
        }

        // Fill exposed bottom rows with blanks carrying the current bg
        for row in (bottom + 1 - n)..=bottom {
            self.clear_row(row);
        }

        self.mark_rows_dirty(top, bottom);
    }

    /// Scroll down (n lines) within the scroll region (CSI T / SD)
    pub fn scroll_down(&mut self, n: usize) {
        let top = self.scroll_top;
        let bottom = self.scroll_bottom;
        let region_height = bottom - top + 1;
        let n = n.min(region_height);
        if n == 0 {
            return;
        }

        // Shift rows down within scroll region (copy bottom to top,
        // iterate in reverse to avoid overwriting source data)
        for row in ((top + n)..=bottom).rev() {
            let src_start = (row - n) * self.cols;
            let dst_start = row * self.cols;
            let (left, right) = self.cells.split_at_mut(dst_start);
            right[..self.cols].clone_from_slice(&left[src_start..src_start + self.cols]);
        }

        // Fill exposed top rows
        for row in top..(top + n) {
            self.clear_row(row);
        }

        self.mark_rows_dirty(top, bottom);
    }

    /// Insert lines at the cursor row (CSI L), within the scroll region
    pub fn insert_lines(&mut self, n: usize) {
        let bottom = self.scroll_bottom;
        if self.cursor_row < self.scroll_top || self.cursor_row > bottom {
            return;
        }
        let n = n.min(bottom - self.cursor_row + 1);

        for row in ((self.cursor_row + n)..=bottom).rev() {
            let src_start = (row - n) * self.cols;
            let dst_start = row * self.cols;
            let (left, right) = self.cells.split_at_mut(dst_start);
            right[..self.cols].clone_from_slice(&left[src_start..src_start + self.cols]);
        }

        for row in self.cursor_row..(self.cursor_row + n) {
            self.clear_row(row);
        }

        self.mark_rows_dirty(self.cursor_row, bottom);
    }

    /// Delete lines at the cursor row (CSI M), within the scroll region
    pub fn delete_lines(&mut self, n: usize) {
        let bottom = self.scroll_bottom;
        if self.cursor_row < self.scroll_top || self.cursor_row > bottom {
            return;
        }
        let n = n.min(bottom - self.cursor_row + 1);
        let start = self.cursor_row;

        for row in start..(bottom + 1 - n) {
            let src_start = (row + n) * self.cols;
            let dst_start = row * self.cols;
            let (left, right) = self.cells.split_at_mut(src_start);
            left[dst_start..dst_start + self.cols].clone_from_slice(&right[..self.cols]);
        }

        for row in (bottom + 1 - n)..=bottom {
            self.clear_row(row);
        }

        self.mark_rows_dirty(start, bottom);
    }

    /// Insert characters (CSI @ / ICH)
    /// Insert n blanks at cursor position and shift the rest right
    pub fn insert_chars(&mut self, n: usize) {
        let row = self.cursor_row;
        let col = self.cursor_col;
        let n = n.min(self.cols - col);

        let row_start = row * self.cols;
        for i in (col..(self.cols - n)).rev() {
            self.cells[row_start + i + n] = self.cells[row_start + i].clone();
        }

        let blank = self.blank_cell();
        for c in col..(col + n) {
            *self.cell_mut(row, c) = blank;
        }
        self.mark_dirty(row);
    }

    /// Delete characters (CSI P / DCH)
    /// Delete n characters at cursor position and shift the rest left
    pub fn delete_chars(&mut self, n: usize) {
        let row = self.cursor_row;
        let col = self.cursor_col;
        let n = n.min(self.cols - col);

        let row_start = row * self.cols;
        for i in 0..(self.cols - col - n) {
            self.cells[row_start + col + i] = self.cells[row_start + col + n + i].clone();
        }

        let blank = self.blank_cell();
        for c in (self.cols - n)..self.cols {
            *self.cell_mut(row, c) = blank;
        }
        self.mark_dirty(row);
    }

    /// Erase characters (CSI X / ECH)
    /// Overwrite n characters at cursor position with blanks (no shift)
    pub fn erase_chars(&mut self, n: usize) {
        let row = self.cursor_row;
        let col = self.cursor_col;
        let n = n.min(self.cols - col);

        let blank = self.blank_cell();
        for c in col..(col + n) {
            *self.cell_mut(row, c) = blank;
        }
        self.mark_dirty(row);
    }

    // ========== SGR (attribute setting) ==========

    /// SGR reset
    pub fn reset_attrs(&mut self) {
        self.pen = Pen::default();
    }

    /// Set foreground color
    pub fn set_fg(&mut self, color: Color) {
        self.pen.fg = color;
    }

    /// Set background color
    pub fn set_bg(&mut self, color: Color) {
        self.pen.bg = color;
    }

    /// Set attribute
    pub fn set_attr(&mut self, attr: CellAttrs) {
        self.pen.attrs.insert(attr);
    }

    /// Clear attribute
    pub fn clear_attr(&mut self, attr: CellAttrs) {
        self.pen.attrs.remove(attr);
    }

    /// Current pen (for snapshot/debug inspection)
    pub fn pen(&self) -> Pen {
        self.pen
    }

    // ========== Scroll region ==========

    /// Set scroll region (CSI r / DECSTBM)
    /// top, bottom are 1-indexed. 0 is treated as the default value.
    /// Moves the cursor to the region origin (home without origin mode).
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let top = if top == 0 { 1 } else { top };
        let bottom = if bottom == 0 { self.rows } else { bottom };

        // Convert to 0-indexed
        let top = (top - 1).min(self.rows - 1);
        let bottom = (bottom - 1).min(self.rows - 1);

        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        }
        self.move_cursor_to(1, 1);
    }

    /// Get scroll region (0-indexed, bottom inclusive)
    pub fn scroll_region(&self) -> (usize, usize) {
        (self.scroll_top, self.scroll_bottom)
    }

    // ========== Cursor save/restore ==========

    /// Save cursor state (ESC 7 / DECSC, CSI s)
    pub fn save_cursor(&mut self) {
        self.saved_cursors.push(SavedCursor {
            row: self.cursor_row,
            col: self.cursor_col,
            pen: self.pen,
            origin: self.modes.origin,
            pending_wrap: self.pending_wrap,
        });
    }

    /// Restore cursor state (ESC 8 / DECRC, CSI u)
    ///
    /// With nothing saved, restores the home/default state of a freshly
    /// reset screen.
    pub fn restore_cursor(&mut self) {
        match self.saved_cursors.pop() {
            Some(saved) => {
                self.cursor_row = saved.row.min(self.rows - 1);
                self.cursor_col = saved.col.min(self.cols - 1);
                self.pen = saved.pen;
                self.modes.origin = saved.origin;
                self.pending_wrap = saved.pending_wrap;
            }
            None => {
                self.cursor_row = 0;
                self.cursor_col = 0;
                self.pen = Pen::default();
                self.modes.origin = false;
                self.pending_wrap = false;
            }
        }
    }

    /// Set origin mode (DECOM); both setting and resetting home the cursor
    pub fn set_origin_mode(&mut self, enable: bool) {
        self.modes.origin = enable;
        self.move_cursor_to(1, 1);
    }

    // ========== Alternate screen ==========

    /// Switch to the alternate screen buffer
    ///
    /// Saves the live screen (cells, cursor, pen, saved-cursor stack) and
    /// replaces it with a cleared grid. No-op when already on the
    /// alternate screen.
    pub fn enter_alternate_screen(&mut self) {
        if self.alternate.is_some() {
            return;
        }
        let blank = self.blank_cell();
        let cells = std::mem::replace(&mut self.cells, vec![blank; self.cols * self.rows]);
        self.alternate = Some(SavedScreen {
            cells,
            cursor_row: self.cursor_row,
            cursor_col: self.cursor_col,
            pen: self.pen,
            pending_wrap: self.pending_wrap,
            saved_cursors: std::mem::take(&mut self.saved_cursors),
        });
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.pending_wrap = false;
        self.mark_all_dirty();
    }

    /// Return to the primary screen buffer
    ///
    /// The primary screen comes back exactly as it was saved: cells,
    /// attributes, cursor, pen, and saved-cursor stack.
    pub fn leave_alternate_screen(&mut self) {
        if let Some(saved) = self.alternate.take() {
            self.cells = saved.cells;
            self.cursor_row = saved.cursor_row.min(self.rows - 1);
            self.cursor_col = saved.cursor_col.min(self.cols - 1);
            self.pen = saved.pen;
            self.pending_wrap = saved.pending_wrap;
            self.saved_cursors = saved.saved_cursors;
            self.mark_all_dirty();
        }
    }

    /// Check if in alternate screen
    pub fn is_alternate_screen(&self) -> bool {
        self.alternate.is_some()
    }

    // ========== Reset / resize ==========

    /// Full reset (ESC c / RIS): fresh grid state at the current size
    pub fn reset(&mut self) {
        let cols = self.cols;
        let rows = self.rows;
        let tab_interval = self.tab_interval;
        *self = Grid::new(cols, rows, tab_interval);
    }

    /// Resize grid
    ///
    /// Preserves existing content top-left-anchored; newly exposed cells
    /// are blank with the current background. Cursor, scroll region, and
    /// tab stops are clamped into the new bounds. Degenerate sizes are
    /// clamped to 1x1.
    pub fn resize(&mut self, new_cols: usize, new_rows: usize) {
        let new_cols = new_cols.max(1);
        let new_rows = new_rows.max(1);
        if new_cols == self.cols && new_rows == self.rows {
            return;
        }

        let old_cols = self.cols;
        let blank = self.blank_cell();

        self.cells = Self::resize_cells(&self.cells, old_cols, self.rows, new_cols, new_rows, blank);

        // The saved screen follows the live one so leaving the alternate
        // screen after a resize lands on a grid of the right size
        if let Some(alt) = self.alternate.as_mut() {
            alt.cells = Self::resize_cells(&alt.cells, old_cols, self.rows, new_cols, new_rows, blank);
            alt.cursor_row = alt.cursor_row.min(new_rows - 1);
            alt.cursor_col = alt.cursor_col.min(new_cols - 1);
        }

        self.cols = new_cols;
        self.rows = new_rows;

        // Keep cursor position within new size
        self.cursor_row = self.cursor_row.min(new_rows - 1);
        self.cursor_col = self.cursor_col.min(new_cols - 1);
        self.pending_wrap = false;

        // Scroll region resets to the full screen
        self.scroll_top = 0;
        self.scroll_bottom = new_rows - 1;

        // Tab stops: keep existing ones in range, continue the interval
        // into newly exposed columns
        let mut tabs = vec![false; new_cols];
        for col in 0..old_cols.min(new_cols) {
            tabs[col] = self.tabs[col];
        }
        if new_cols > old_cols {
            let base = old_cols - (old_cols % self.tab_interval);
            let mut col = base;
            while col < new_cols {
                if col >= old_cols {
                    tabs[col] = true;
                }
                col += self.tab_interval;
            }
        }
        self.tabs = tabs;

        self.dirty = vec![true; new_rows];
        self.all_dirty = true;

        trace!("Grid resize: -> {}x{}", new_cols, new_rows);
    }

    fn resize_cells(
        cells: &[Cell],
        old_cols: usize,
        old_rows: usize,
        new_cols: usize,
        new_rows: usize,
        blank: Cell,
    ) -> Vec<Cell> {
        let mut new_cells = vec![blank; new_cols * new_rows];
        let copy_rows = old_rows.min(new_rows);
        let copy_cols = old_cols.min(new_cols);
        for row in 0..copy_rows {
            let src_start = row * old_cols;
            let dst_start = row * new_cols;
            new_cells[dst_start..dst_start + copy_cols]
                .clone_from_slice(&cells[src_start..src_start + copy_cols]);
        }
        new_cells
    }
}
