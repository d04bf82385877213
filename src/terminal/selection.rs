//! Text selection
//!
//! Pure data layer over the grid: a selection only reports which cells it
//! covers and what text they hold, it never mutates cell contents. Click
//! timing (single → double → triple promotion) lives here too, driven by
//! the configured timeouts.

use std::time::{Duration, Instant};

use super::grid::{CellAttrs, Grid};

/// Selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Exact character span
    Character,
    /// Endpoints snapped outward to word boundaries
    Word,
    /// Full grid rows
    Line,
    /// Anchor and extent are opposite corners of a rectangle
    Block,
}

/// Text selection range (grid coordinates)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub mode: SelectionMode,
    /// Selection start point (anchor)
    pub anchor_row: usize,
    pub anchor_col: usize,
    /// Selection end point (current position, exclusive column)
    pub end_row: usize,
    pub end_col: usize,
}

impl Selection {
    /// Return normalized range (guarantees start <= end)
    pub fn normalized(&self) -> (usize, usize, usize, usize) {
        if (self.anchor_row, self.anchor_col) <= (self.end_row, self.end_col) {
            (self.anchor_row, self.anchor_col, self.end_row, self.end_col)
        } else {
            (self.end_row, self.end_col, self.anchor_row, self.anchor_col)
        }
    }

    /// Get the covered column range for a specific row
    ///
    /// Returns (start_col, end_col) where end_col is exclusive, or None
    /// when the row is not part of the selection. More efficient than
    /// calling contains() per column.
    #[inline]
    pub fn cols_for_row(&self, row: usize, max_cols: usize) -> Option<(usize, usize)> {
        if self.mode == SelectionMode::Block {
            let top = self.anchor_row.min(self.end_row);
            let bottom = self.anchor_row.max(self.end_row);
            if row < top || row > bottom {
                return None;
            }
            let left = self.anchor_col.min(self.end_col);
            let right = self.anchor_col.max(self.end_col);
            let end = (right + 1).min(max_cols);
            if left >= end {
                return None;
            }
            return Some((left, end));
        }

        let (sr, sc, er, ec) = self.normalized();
        if row < sr || row > er {
            return None;
        }
        let start = if row == sr { sc } else { 0 };
        let end = if row == er { ec } else { max_cols };
        if start >= end {
            return None;
        }
        Some((start, end))
    }

    /// Check if the specified cell is within the selection range
    pub fn contains(&self, row: usize, col: usize) -> bool {
        match self.cols_for_row(row, usize::MAX) {
            Some((start, end)) => col >= start && col < end,
            None => false,
        }
    }

    /// Check whether both endpoints still fall inside the given bounds
    pub fn in_bounds(&self, rows: usize, cols: usize) -> bool {
        self.anchor_row < rows
            && self.end_row < rows
            && self.anchor_col < cols
            && self.end_col <= cols
    }

    /// Extract the covered text from the grid
    ///
    /// Continuation cells are skipped, trailing whitespace per row is
    /// trimmed, and rows that autowrapped into the next are joined
    /// without a newline.
    pub fn text(&self, grid: &Grid) -> String {
        let cols = grid.cols();
        let (sr, _, er, _) = self.normalized();
        let mut result = String::new();

        for row in sr..=er.min(grid.rows() - 1) {
            let Some((col_start, col_end)) = self.cols_for_row(row, cols) else {
                continue;
            };
            let line_start = result.len();
            for col in col_start..col_end.min(cols) {
                let cell = grid.cell(row, col);
                if cell.width == 0 {
                    continue; // Wide character continuation cell
                }
                result.push(cell.ch);
            }
            // Trim trailing whitespace on the row
            let trimmed = result[line_start..].trim_end().len();
            result.truncate(line_start + trimmed);

            if row < er {
                let wrapped = self.mode != SelectionMode::Block
                    && grid.cell(row, cols - 1).attrs.contains(CellAttrs::WRAP);
                if !wrapped {
                    result.push('\n');
                }
            }
        }
        result
    }
}

/// Click promotion result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    Single,
    Double,
    Triple,
}

/// Click-timing state machine
///
/// Keeps the timestamps of the last two presses; a press within the
/// double-click timeout of the previous one promotes to Double, and a
/// press within the triple-click timeout of the one before that promotes
/// to Triple. Anything slower starts over at Single.
#[derive(Debug)]
pub struct ClickTracker {
    double_timeout: Duration,
    triple_timeout: Duration,
    /// Most recent press
    click1: Option<Instant>,
    /// Press before that
    click2: Option<Instant>,
}

impl ClickTracker {
    pub fn new(double_timeout: Duration, triple_timeout: Duration) -> Self {
        Self {
            double_timeout,
            triple_timeout,
            click1: None,
            click2: None,
        }
    }

    /// Register a press and classify it
    pub fn press(&mut self, now: Instant) -> ClickKind {
        let kind = if self
            .click2
            .is_some_and(|t| now.duration_since(t) <= self.triple_timeout)
        {
            ClickKind::Triple
        } else if self
            .click1
            .is_some_and(|t| now.duration_since(t) <= self.double_timeout)
        {
            ClickKind::Double
        } else {
            ClickKind::Single
        };
        self.click2 = self.click1;
        self.click1 = Some(now);
        kind
    }
}

/// Snap a position outward to the nearest word boundaries
///
/// A boundary is any transition into or out of the delimiter set: the
/// clicked cell's class (delimiter or not) determines the run, and both
/// endpoints expand while neighboring cells share that class. Wide-glyph
/// continuation cells take the class of their head cell.
///
/// Returns (start_col, end_col) with end_col exclusive.
pub fn word_span(
    grid: &Grid,
    row: usize,
    col: usize,
    is_delim: &dyn Fn(char) -> bool,
) -> (usize, usize) {
    let cols = grid.cols();
    let col = col.min(cols - 1);

    let class_of = |mut c: usize| -> bool {
        // Continuation cells inherit the head cell's class
        while c > 0 && grid.cell(row, c).width == 0 {
            c -= 1;
        }
        is_delim(grid.cell(row, c).ch)
    };

    let target = class_of(col);

    let mut start = col;
    while start > 0 && class_of(start - 1) == target {
        start -= 1;
    }

    let mut end = col;
    while end + 1 < cols && class_of(end + 1) == target {
        end += 1;
    }

    (start, end + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(mode: SelectionMode, a: (usize, usize), e: (usize, usize)) -> Selection {
        Selection {
            mode,
            anchor_row: a.0,
            anchor_col: a.1,
            end_row: e.0,
            end_col: e.1,
        }
    }

    #[test]
    fn normalized_orders_endpoints() {
        let s = sel(SelectionMode::Character, (3, 10), (1, 5));
        assert_eq!(s.normalized(), (1, 5, 3, 10));
        let s = sel(SelectionMode::Character, (2, 3), (2, 3));
        assert_eq!(s.normalized(), (2, 3, 2, 3));
    }

    #[test]
    fn contains_single_row() {
        let s = sel(SelectionMode::Character, (5, 3), (5, 7));
        assert!(!s.contains(5, 2));
        assert!(s.contains(5, 3));
        assert!(s.contains(5, 6));
        assert!(!s.contains(5, 7)); // end_col is exclusive
        assert!(!s.contains(4, 5));
        assert!(!s.contains(6, 5));
    }

    #[test]
    fn contains_multi_row() {
        let s = sel(SelectionMode::Character, (1, 5), (3, 10));
        assert!(!s.contains(1, 4));
        assert!(s.contains(1, 5));
        assert!(s.contains(1, 80)); // start row covers everything after sc
        assert!(s.contains(2, 0)); // middle rows fully selected
        assert!(s.contains(3, 9));
        assert!(!s.contains(3, 10));
        assert!(!s.contains(0, 5));
        assert!(!s.contains(4, 0));
    }

    #[test]
    fn contains_reversed_matches_forward() {
        let s = sel(SelectionMode::Character, (3, 10), (1, 5));
        assert!(s.contains(1, 5));
        assert!(s.contains(2, 0));
        assert!(s.contains(3, 9));
        assert!(!s.contains(3, 10));
    }

    #[test]
    fn block_mode_covers_rectangle() {
        let s = sel(SelectionMode::Block, (1, 6), (3, 2));
        // Every covered row spans columns 2..=6
        for row in 1..=3 {
            assert_eq!(s.cols_for_row(row, 80), Some((2, 7)));
        }
        assert_eq!(s.cols_for_row(0, 80), None);
        assert_eq!(s.cols_for_row(4, 80), None);
        assert!(s.contains(2, 2));
        assert!(s.contains(2, 6));
        assert!(!s.contains(2, 7));
        assert!(!s.contains(2, 1));
    }

    #[test]
    fn click_tracker_promotes_and_resets() {
        let mut tracker =
            ClickTracker::new(Duration::from_millis(300), Duration::from_millis(600));
        let t0 = Instant::now();

        assert_eq!(tracker.press(t0), ClickKind::Single);
        assert_eq!(
            tracker.press(t0 + Duration::from_millis(100)),
            ClickKind::Double
        );
        assert_eq!(
            tracker.press(t0 + Duration::from_millis(400)),
            ClickKind::Triple
        );

        // Too slow: back to single
        assert_eq!(
            tracker.press(t0 + Duration::from_millis(2000)),
            ClickKind::Single
        );
        // Slow second press also stays single
        assert_eq!(
            tracker.press(t0 + Duration::from_millis(2400)),
            ClickKind::Single
        );
    }

    #[test]
    fn word_span_snaps_to_delimiters() {
        let mut g = Grid::new(20, 2, 8);
        for ch in "hello world".chars() {
            g.put_char(ch);
        }
        let is_delim = |c: char| c == ' ';

        // Anywhere inside "hello" selects exactly "hello"
        for col in 0..5 {
            assert_eq!(word_span(&g, 0, col, &is_delim), (0, 5), "col {}", col);
        }
        // Inside "world"
        assert_eq!(word_span(&g, 0, 8, &is_delim), (6, 11));
        // Clicking the delimiter run selects the run itself
        assert_eq!(word_span(&g, 0, 5, &is_delim), (5, 6));
    }

    #[test]
    fn word_span_treats_wide_pairs_as_one() {
        let mut g = Grid::new(20, 2, 8);
        g.put_char('あ');
        g.put_char('い');
        g.put_char(' ');
        g.put_char('x');
        let is_delim = |c: char| c == ' ';
        // Clicking the continuation cell of 'あ' still selects the CJK run
        assert_eq!(word_span(&g, 0, 1, &is_delim), (0, 4));
    }

    #[test]
    fn text_extraction_trims_and_joins_wrapped_rows() {
        let mut g = Grid::new(5, 3, 8);
        // "abcde" wraps into "fg" on the next row
        for ch in "abcdefg".chars() {
            g.put_char(ch);
        }
        let s = sel(SelectionMode::Character, (0, 0), (1, 5));
        assert_eq!(s.text(&g), "abcdefg");
    }

    #[test]
    fn text_extraction_adds_newlines_for_hard_breaks() {
        let mut g = Grid::new(10, 3, 8);
        for ch in "ab".chars() {
            g.put_char(ch);
        }
        g.carriage_return();
        g.linefeed();
        for ch in "cd".chars() {
            g.put_char(ch);
        }
        let s = sel(SelectionMode::Character, (0, 0), (1, 10));
        assert_eq!(s.text(&g), "ab\ncd");
    }
}
