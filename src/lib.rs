//! vtcore - VT escape-sequence interpreter and screen-state engine
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Embedder                     │
//! ├──────────────────────────────────────────────┤
//! │  child bytes → Term (decode → parse →        │
//! │                      dispatch → grid)        │
//! │  pointer events → Selection                  │
//! │  geometry changes → Resize                   │
//! │                     ↓                        │
//! │  RedrawScheduler → grid snapshot → renderer  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The crate owns everything between the child process byte stream and the
//! renderer: the UTF-8 decoder, the escape-sequence state machine, the
//! control-function dispatcher, the cell grid with its alternate screen,
//! text selection, and the damage-driven redraw scheduler. The PTY, font
//! shaping, and actual drawing live in the embedder.
//!
//! All mutation flows through `&mut Term`, so a single-threaded event loop
//! (or one mutex around the session) is the whole concurrency story.

pub mod config;
pub mod terminal;
pub mod utils;

pub use config::{Config, ConfigError};
pub use terminal::damage::{RedrawDecision, RedrawScheduler};
pub use terminal::grid::{Cell, CellAttrs, Color, CursorStyle, Grid};
pub use terminal::selection::{Selection, SelectionMode};
pub use terminal::{Term, TermSnapshot};
