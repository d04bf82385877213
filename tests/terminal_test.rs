//! End-to-end tests for the terminal core
//!
//! Drives a full session (decode -> parse -> dispatch -> grid) through
//! the public `Term` API, the way an embedder would.

use std::time::{Duration, Instant};

use vtcore::terminal::grid::CellAttrs;
use vtcore::{Color, Config, SelectionMode, Term};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn term(cols: usize, rows: usize) -> Term {
    init_logging();
    Term::new(cols, rows, Config::default())
}

/// Visible text of one grid row, trailing blanks trimmed
fn row_text(term: &Term, row: usize) -> String {
    term.grid
        .line(row)
        .iter()
        .filter(|c| c.width != 0)
        .map(|c| c.ch)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Visible text of the whole screen
fn screen_text(term: &Term) -> Vec<String> {
    (0..term.grid.rows()).map(|r| row_text(term, r)).collect()
}

// ========== Decode/parse robustness ==========

#[test]
fn adversarial_bytes_never_wedge_the_session() {
    let mut t = term(20, 5);
    let adversarial: &[&[u8]] = &[
        b"\x1b[999999999999999999m",
        b"\x1b[;;;;;;;;;;;;;;;;;;;;;;;;;;;;;;;;;;;;;;;H",
        b"\x1b]0;unterminated title",
        b"\x18\x1a\x18",
        &[0xff, 0xfe, 0x80, 0xc0, 0xc1, 0xf5],
        &[0xe4, 0xb8],          // truncated 3-byte character
        b"\x1bP+q\x1b[31m",     // DCS aborted by a fresh escape
        b"\x1b[38;2;1;2",       // CSI cut off mid-parameters
        &[0x1b],                // bare escape
    ];
    for chunk in adversarial {
        t.process_bytes(chunk);
    }
    // The session still prints normally afterwards
    t.process_bytes(b"\x1b[H\x1b[2Jok");
    assert_eq!(row_text(&t, 0), "ok");
}

#[test]
fn invalid_utf8_becomes_replacement_characters() {
    let mut t = term(20, 5);
    t.process_bytes(&[b'a', 0xff, b'b']);
    assert_eq!(row_text(&t, 0), "a\u{FFFD}b");
}

#[test]
fn output_is_identical_regardless_of_chunk_boundaries() {
    let input: &[u8] =
        "x\x1b[2;2H\x1b[31;1mred\x1b[0m \u{3042}\u{1F389}\x1b]2;title\x07\x1b[?25l tail"
            .as_bytes();

    let mut whole = term(20, 5);
    whole.process_bytes(input);

    for chunk_size in 1..input.len() {
        let mut split = term(20, 5);
        for piece in input.chunks(chunk_size) {
            split.process_bytes(piece);
        }
        assert_eq!(
            screen_text(&split),
            screen_text(&whole),
            "chunk size {}",
            chunk_size
        );
        assert_eq!(split.grid.cursor_row, whole.grid.cursor_row);
        assert_eq!(split.grid.cursor_col, whole.grid.cursor_col);
    }
}

// ========== Grid semantics through escape sequences ==========

#[test]
fn print_roundtrip_keeps_glyph_color_attrs() {
    let mut t = term(20, 5);
    t.process_bytes(b"\x1b[1;4;38;5;42;48;2;1;2;3mZ");
    let cell = t.grid.cell(0, 0);
    assert_eq!(cell.ch, 'Z');
    assert_eq!(cell.fg, Color::Indexed(42));
    assert_eq!(cell.bg, Color::Rgb(1, 2, 3));
    assert!(cell.attrs.contains(CellAttrs::BOLD));
    assert!(cell.attrs.contains(CellAttrs::UNDERLINE));
}

#[test]
fn erase_display_clears_everything_and_leaves_cursor() {
    let mut t = term(10, 4);
    t.process_bytes(b"one\r\ntwo\r\nthree");
    t.process_bytes(b"\x1b[2;3H\x1b[48;5;12m\x1b[2J");

    assert_eq!(t.grid.cursor_row, 1);
    assert_eq!(t.grid.cursor_col, 2);
    for row in 0..t.grid.rows() {
        assert_eq!(row_text(&t, row), "");
        for col in 0..t.grid.cols() {
            assert_eq!(t.grid.cell(row, col).bg, Color::Indexed(12));
        }
    }
}

#[test]
fn cursor_movement_and_cpr_report() {
    let mut t = term(20, 5);
    t.process_bytes(b"\x1b[3;7H\x1b[6n");
    assert_eq!(t.take_reply(), b"\x1b[3;7R".to_vec());

    t.process_bytes(b"\x1b[2A\x1b[3D");
    t.process_bytes(b"\x1b[6n");
    assert_eq!(t.take_reply(), b"\x1b[1;4R".to_vec());
}

#[test]
fn device_attributes_return_configured_identity() {
    let mut t = term(20, 5);
    t.process_bytes(b"\x1b[c");
    assert_eq!(t.take_reply(), b"\x1b[?6c".to_vec());
    // DECID replies with the same configured string
    t.process_bytes(b"\x1bZ");
    assert_eq!(t.take_reply(), b"\x1b[?6c".to_vec());
    // Non-zero DA parameters are ignored
    t.process_bytes(b"\x1b[1c");
    assert!(t.take_reply().is_empty());
}

#[test]
fn unknown_sequences_are_silent_noops() {
    let mut t = term(20, 5);
    let before = screen_text(&t);
    t.process_bytes(b"\x1b[95~\x1b[>4;2m\x1b]777;notify\x07\x1b%G");
    assert_eq!(screen_text(&t), before);
    // and the session still works
    t.process_bytes(b"ok");
    assert_eq!(row_text(&t, 0), "ok");
}

#[test]
fn alt_screen_roundtrip_restores_primary_byte_identical() {
    let mut t = term(12, 4);
    t.process_bytes(b"\x1b[31mred\x1b[0m plain\x1b[2;5H");
    let cells_before: Vec<_> = (0..t.grid.rows())
        .map(|r| t.grid.line(r).to_vec())
        .collect();
    let cursor_before = (t.grid.cursor_row, t.grid.cursor_col);

    // Full-screen application: enter alt, scribble, clear, exit
    t.process_bytes(b"\x1b[?1049h");
    assert!(t.grid.is_alternate_screen());
    assert_eq!(row_text(&t, 0), "", "alternate screen starts cleared");
    t.process_bytes(b"\x1b[1;1H\x1b[44mALTALTALT\x1b[2Jjunk\x1b[5;1Hmore");
    t.process_bytes(b"\x1b[?1049l");

    assert!(!t.grid.is_alternate_screen());
    let cells_after: Vec<_> = (0..t.grid.rows())
        .map(|r| t.grid.line(r).to_vec())
        .collect();
    assert_eq!(cells_after, cells_before);
    assert_eq!((t.grid.cursor_row, t.grid.cursor_col), cursor_before);
}

#[test]
fn alt_screen_respects_allow_flag() {
    init_logging();
    let mut config = Config::default();
    config.terminal.allow_alt_screen = false;
    let mut t = Term::new(12, 4, config);
    t.process_bytes(b"keep\x1b[?1049h\x1b[2J");
    assert!(!t.grid.is_alternate_screen());
    // The erase applied to the primary screen since there is no alternate
    assert_eq!(row_text(&t, 0), "");
}

#[test]
fn origin_mode_addresses_relative_to_scroll_region() {
    let mut t = term(10, 6);
    // Region rows 2..=4 (1-indexed), then enable origin mode
    t.process_bytes(b"\x1b[2;4r\x1b[?6h");
    // Homing lands on the region top
    assert_eq!(t.grid.cursor_row, 1);

    t.process_bytes(b"\x1b[1;1Htop");
    assert_eq!(row_text(&t, 1), "top");

    // Addressing past the region clamps to its bottom row
    t.process_bytes(b"\x1b[99;1Hbot");
    assert_eq!(row_text(&t, 3), "bot");

    // Reset: addressing is absolute again and homes the cursor
    t.process_bytes(b"\x1b[?6l");
    assert_eq!((t.grid.cursor_row, t.grid.cursor_col), (0, 0));
    t.process_bytes(b"\x1b[6;1Hlast");
    assert_eq!(row_text(&t, 5), "last");
}

#[test]
fn scroll_region_contains_scrolling() {
    let mut t = term(10, 5);
    t.process_bytes(b"\x1b[1;1Hhead");
    t.process_bytes(b"\x1b[2;4r");
    // Fill the region and push one line out of it
    t.process_bytes(b"\x1b[2;1Haaa\r\nbbb\r\nccc\r\n");
    assert_eq!(row_text(&t, 0), "head", "outside the region untouched");
    assert_eq!(row_text(&t, 1), "bbb");
    assert_eq!(row_text(&t, 2), "ccc");
}

#[test]
fn tab_stops_via_sequences() {
    let mut t = term(30, 3);
    // Default stops every 8 columns
    t.process_bytes(b"\tx");
    assert_eq!(t.grid.cell(0, 8).ch, 'x');

    // Clear all stops, set a custom one at column 5 (1-indexed 6)
    t.process_bytes(b"\r\x1b[3g\x1b[1;6H\x1bH\x1b[1;1H\ty");
    assert_eq!(t.grid.cell(0, 5).ch, 'y');
}

#[test]
fn save_restore_cursor_sequences() {
    let mut t = term(20, 5);
    t.process_bytes(b"\x1b[2;10H\x1b7\x1b[H\x1b8");
    assert_eq!((t.grid.cursor_row, t.grid.cursor_col), (1, 9));
}

#[test]
fn full_reset_clears_screen_modes_and_colors() {
    let mut t = term(20, 5);
    t.process_bytes(b"\x1b[31mtext\x1b[?25l\x1b]4;1;#123456\x07");
    t.process_bytes(b"\x1bc");
    assert_eq!(row_text(&t, 0), "");
    assert!(t.grid.modes.cursor_visible);
    let snapshot = t.snapshot();
    assert_eq!(snapshot.palette.color(1), (0xff, 0x00, 0x00));
}

// ========== Resize ==========

#[test]
fn resize_preserves_overlapping_region() {
    let mut t = term(10, 4);
    t.process_bytes(b"abcdef\r\nsecond");
    t.resize(6, 3);
    assert_eq!(row_text(&t, 0), "abcdef");
    assert_eq!(row_text(&t, 1), "second");

    t.resize(4, 2);
    assert_eq!(row_text(&t, 0), "abcd");
    assert_eq!(row_text(&t, 1), "seco");

    // Regrown area is blank
    t.resize(8, 3);
    assert_eq!(row_text(&t, 0), "abcd");
    assert_eq!(row_text(&t, 2), "");
}

#[test]
fn resize_clamps_cursor_and_degenerate_sizes() {
    let mut t = term(10, 4);
    t.process_bytes(b"\x1b[4;10H");
    t.resize(0, 0);
    assert_eq!(t.grid.cols(), 1);
    assert_eq!(t.grid.rows(), 1);
    assert_eq!((t.grid.cursor_row, t.grid.cursor_col), (0, 0));
    // Still operable
    t.process_bytes(b"z");
    assert_eq!(t.grid.cell(0, 0).ch, 'z');
}

// ========== Selection ==========

#[test]
fn word_selection_snaps_to_delimiters() {
    let mut t = term(20, 3);
    t.process_bytes(b"hello world");

    let t0 = Instant::now();
    // Double click inside "hello"
    t.mouse_press(t0, 0, 2, false);
    t.mouse_press(t0 + Duration::from_millis(120), 0, 2, false);

    let sel = t.selection.clone().expect("word selection");
    assert_eq!(sel.mode, SelectionMode::Word);
    assert_eq!(t.selection_text().as_deref(), Some("hello"));
}

#[test]
fn click_promotion_follows_configured_timeouts() {
    let mut t = term(20, 3);
    t.process_bytes(b"hello world");
    let t0 = Instant::now();

    t.mouse_press(t0, 0, 8, false);
    assert_eq!(t.selection.as_ref().unwrap().mode, SelectionMode::Character);

    // Second press inside the 300ms double-click window: word
    t.mouse_press(t0 + Duration::from_millis(200), 0, 8, false);
    assert_eq!(t.selection.as_ref().unwrap().mode, SelectionMode::Word);
    assert_eq!(t.selection_text().as_deref(), Some("world"));

    // Third press inside the 600ms triple-click window: line
    t.mouse_press(t0 + Duration::from_millis(450), 0, 8, false);
    assert_eq!(t.selection.as_ref().unwrap().mode, SelectionMode::Line);
    assert_eq!(t.selection_text().as_deref(), Some("hello world"));
}

#[test]
fn slow_second_click_stays_character_mode() {
    let mut t = term(20, 3);
    t.process_bytes(b"hello world");
    let t0 = Instant::now();

    t.mouse_press(t0, 0, 2, false);
    t.mouse_press(t0 + Duration::from_millis(800), 0, 2, false);
    assert_eq!(t.selection.as_ref().unwrap().mode, SelectionMode::Character);
}

#[test]
fn drag_selection_copies_on_release() {
    let mut t = term(20, 3);
    t.process_bytes(b"grab this text");
    let t0 = Instant::now();

    t.mouse_press(t0, 0, 5, false);
    t.mouse_motion(0, 8);
    t.mouse_release();
    assert_eq!(t.clipboard, "this");
}

#[test]
fn block_selection_covers_rectangle() {
    let mut t = term(10, 4);
    t.process_bytes(b"abcdef\r\nghijkl\r\nmnopqr");
    let t0 = Instant::now();

    t.mouse_press(t0, 0, 1, true);
    t.mouse_motion(2, 3);
    t.mouse_release();
    assert_eq!(t.clipboard, "bcd\nhij\nnop");
}

#[test]
fn selection_never_mutates_cells() {
    let mut t = term(20, 3);
    t.process_bytes(b"immutable");
    let before = screen_text(&t);
    let t0 = Instant::now();
    t.mouse_press(t0, 0, 0, false);
    t.mouse_motion(0, 8);
    t.mouse_release();
    assert_eq!(screen_text(&t), before);
}

// ========== Redraw scheduling ==========

#[test]
fn output_bursts_coalesce_into_one_frame() {
    init_logging();
    let mut config = Config::default();
    config.timing.max_fps = 10; // 100ms frame interval
    let mut t = Term::new(20, 5, config);
    let t0 = Instant::now();

    t.process_bytes(b"first");
    assert!(t.poll_redraw(t0).content);

    // A burst of output within the frame interval: no extra frame
    for i in 0..5 {
        t.process_bytes(format!("burst{}", i).as_bytes());
        assert!(!t.poll_redraw(t0 + Duration::from_millis(5 * (i + 1))).content);
    }

    // After the interval the coalesced damage produces exactly one frame
    assert!(t.poll_redraw(t0 + Duration::from_millis(100)).content);
    assert!(!t.poll_redraw(t0 + Duration::from_millis(201)).content);
}

#[test]
fn blink_follows_configured_timeout() {
    init_logging();
    let mut config = Config::default();
    config.timing.blink_timeout_ms = 200;
    let mut t = Term::new(20, 5, config);
    let t0 = Instant::now();

    t.poll_redraw(t0);
    assert!(t.scheduler.blink_visible());
    t.poll_redraw(t0 + Duration::from_millis(200));
    assert!(!t.scheduler.blink_visible());
    t.poll_redraw(t0 + Duration::from_millis(400));
    assert!(t.scheduler.blink_visible());
}

#[test]
fn blink_disabled_with_zero_timeout() {
    init_logging();
    let mut config = Config::default();
    config.timing.blink_timeout_ms = 0;
    let mut t = Term::new(20, 5, config);
    let t0 = Instant::now();

    for i in 0..50 {
        t.poll_redraw(t0 + Duration::from_millis(i * 100));
        assert!(t.scheduler.blink_visible());
    }
}

// ========== OSC ==========

#[test]
fn osc_52_is_gated_by_allow_window_ops() {
    let mut t = term(20, 3);
    // Disabled by default: accepted, no effect
    t.process_bytes(b"\x1b]52;c;aGVsbG8=\x07");
    assert_eq!(t.clipboard, "");

    init_logging();
    let mut config = Config::default();
    config.terminal.allow_window_ops = true;
    let mut t = Term::new(20, 3, config);
    t.process_bytes(b"\x1b]52;c;aGVsbG8=\x07");
    assert_eq!(t.clipboard, "hello");
    // Query replies with the clipboard, base64 encoded
    t.process_bytes(b"\x1b]52;c;?\x07");
    assert_eq!(t.take_reply(), b"\x1b]52;c;aGVsbG8=\x1b\\".to_vec());
}

#[test]
fn osc_4_sets_and_reports_palette_colors() {
    let mut t = term(20, 3);
    t.process_bytes(b"\x1b]4;1;#102030\x07");
    assert_eq!(t.snapshot().palette.color(1), (0x10, 0x20, 0x30));

    t.process_bytes(b"\x1b]4;1;?\x07");
    assert_eq!(
        t.take_reply(),
        b"\x1b]4;1;rgb:1010/2020/3030\x1b\\".to_vec()
    );

    // OSC 104 restores the configured value
    t.process_bytes(b"\x1b]104;1\x07");
    assert_eq!(t.snapshot().palette.color(1), (0xff, 0x00, 0x00));
}

#[test]
fn osc_title_with_semicolons_is_kept_whole() {
    let mut t = term(20, 3);
    t.process_bytes(b"\x1b]0;a;b;c\x07");
    assert_eq!(t.take_title_change(), Some("a;b;c".to_string()));
}

#[test]
fn oversized_osc_is_discarded_and_counted() {
    let mut t = term(20, 3);
    let mut seq = b"\x1b]0;".to_vec();
    seq.extend(std::iter::repeat(b'x').take(8192));
    seq.extend_from_slice(b"\x07");
    t.process_bytes(&seq);
    assert_eq!(t.take_title_change(), None);
    assert!(t.parse_errors() > 0);
    // Parser is back in ground and keeps working
    t.process_bytes(b"\x1b[2J\x1b[Hok");
    assert_eq!(row_text(&t, 0), "ok");
}

// ========== Wide characters ==========

#[test]
fn wide_characters_pair_head_and_continuation() {
    let mut t = term(10, 3);
    t.process_bytes("あb".as_bytes());
    assert_eq!(t.grid.cell(0, 0).ch, 'あ');
    assert_eq!(t.grid.cell(0, 0).width, 2);
    assert_eq!(t.grid.cell(0, 1).width, 0);
    assert_eq!(t.grid.cell(0, 2).ch, 'b');
}

#[test]
fn wrapped_rows_join_in_selection_text() {
    let mut t = term(5, 3);
    t.process_bytes(b"abcdefg");
    let t0 = Instant::now();
    t.mouse_press(t0, 0, 0, false);
    t.mouse_motion(1, 1);
    t.mouse_release();
    assert_eq!(t.clipboard, "abcdefg");
}
