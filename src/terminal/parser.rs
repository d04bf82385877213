//! VT escape sequence parser
//!
//! A deterministic state machine over decoded code points. Completed
//! control functions are delivered through the [`Perform`] trait, which
//! keeps the dispatcher a plain lookup on (introducer, intermediates,
//! final byte) instead of branching scattered through the parser.
//!
//! Recovery rules:
//! - CAN/SUB abort any in-progress sequence and return to `Ground`.
//! - A code point with no valid transition in the current state aborts
//!   the sequence and is reprocessed from `Ground`, so control characters
//!   buried in a malformed sequence still take effect.
//! - OSC/DCS accumulation is bounded by [`MAX_STRING_LEN`]; overflowing
//!   discards the sequence. Aborts and overflows are counted in a
//!   recoverable-parse-error diagnostic, never fatal.

use log::trace;

/// Maximum accumulated OSC/DCS string length in bytes.
/// In-flight string sequences never hold more memory than this.
pub const MAX_STRING_LEN: usize = 4096;

/// Maximum number of CSI parameter groups
const MAX_PARAMS: usize = 32;

/// Maximum sub-parameters (colon-separated) per group
const MAX_SUBPARAMS: usize = 8;

/// Maximum collected intermediate bytes
const MAX_INTERMEDIATES: usize = 2;

/// CSI/DCS parameter list
///
/// Each group is a run of colon-separated sub-parameters, so `38:2:r:g:b`
/// arrives as one group and `38;2;r;g;b` as five.
#[derive(Debug, Clone, Default)]
pub struct Params {
    groups: Vec<Vec<u16>>,
}

impl Params {
    /// Iterate over parameter groups as sub-parameter slices
    pub fn iter(&self) -> impl Iterator<Item = &[u16]> {
        self.groups.iter().map(|g| g.as_slice())
    }

    /// Number of parameter groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// First value of group `idx`, if present
    pub fn get(&self, idx: usize) -> Option<u16> {
        self.groups.get(idx).and_then(|g| g.first().copied())
    }

    fn clear(&mut self) {
        self.groups.clear();
    }

    fn push_group(&mut self, group: Vec<u16>) {
        if self.groups.len() < MAX_PARAMS {
            self.groups.push(group);
        }
    }

    #[cfg(test)]
    fn from_groups(groups: Vec<Vec<u16>>) -> Self {
        Self { groups }
    }
}

/// Receiver for completed control functions
///
/// Mirrors the split the dispatcher is written against: printables,
/// C0 controls, CSI/ESC/OSC dispatch, and DCS hook/put/unhook.
pub trait Perform {
    /// Printable code point
    fn print(&mut self, _c: char) {}

    /// C0 control
    fn execute(&mut self, _byte: u8) {}

    /// Completed CSI sequence
    fn csi_dispatch(&mut self, _params: &Params, _intermediates: &[u8], _action: char) {}

    /// Completed ESC sequence
    fn esc_dispatch(&mut self, _intermediates: &[u8], _byte: u8) {}

    /// Completed OSC string, split on `;`
    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    /// DCS sequence start
    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _action: char) {}

    /// Byte within a DCS passthrough
    fn put(&mut self, _byte: u8) {}

    /// DCS sequence end
    fn unhook(&mut self) {}
}

/// Parser states
///
/// `OscEscape`/`DcsEscape` are the one-step lookahead after an ESC inside
/// a string, deciding between the ST terminator and an abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    OscString,
    OscEscape,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsPassthrough,
    DcsEscape,
    /// SOS/PM/APC strings are consumed and discarded
    SosPmApcString,
    SosPmApcEscape,
}

/// VT parser state machine
pub struct Parser {
    state: State,
    params: Params,
    /// Value of the parameter currently being accumulated
    param_value: u16,
    /// Whether any digit arrived for the current parameter
    param_started: bool,
    /// Sub-parameters collected for the group being built
    cur_group: Vec<u16>,
    intermediates: Vec<u8>,
    /// OSC string accumulator
    osc_buf: Vec<u8>,
    /// Bytes streamed through the current DCS passthrough
    dcs_len: usize,
    /// Whether a DCS hook is active (unhook must be delivered on abort)
    dcs_hooked: bool,
    /// Recoverable parse errors (aborted sequences, string overflow)
    parse_errors: u64,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a parser in ground state
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            params: Params::default(),
            param_value: 0,
            param_started: false,
            cur_group: Vec::new(),
            intermediates: Vec::with_capacity(MAX_INTERMEDIATES),
            osc_buf: Vec::new(),
            dcs_len: 0,
            dcs_hooked: false,
            parse_errors: 0,
        }
    }

    /// Recoverable parse errors seen so far
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }

    /// Check whether the parser is back in ground state
    pub fn is_ground(&self) -> bool {
        self.state == State::Ground
    }

    /// Advance the parser by one decoded code point
    pub fn advance<P: Perform>(&mut self, performer: &mut P, c: char) {
        // CAN and SUB abort whatever is in progress
        if (c == '\u{18}' || c == '\u{1a}') && self.state != State::Ground {
            self.abort(performer);
            return;
        }

        match self.state {
            State::Ground => self.advance_ground(performer, c),
            State::Escape => self.advance_escape(performer, c),
            State::EscapeIntermediate => self.advance_escape_intermediate(performer, c),
            State::CsiEntry => self.advance_csi_entry(performer, c),
            State::CsiParam => self.advance_csi_param(performer, c),
            State::CsiIntermediate => self.advance_csi_intermediate(performer, c),
            State::OscString => self.advance_osc_string(performer, c),
            State::OscEscape => self.advance_osc_escape(performer, c),
            State::DcsEntry | State::DcsParam => self.advance_dcs_param(performer, c),
            State::DcsIntermediate => self.advance_dcs_intermediate(performer, c),
            State::DcsPassthrough => self.advance_dcs_passthrough(performer, c),
            State::DcsEscape => self.advance_dcs_escape(performer, c),
            State::SosPmApcString => self.advance_sos_pm_apc(c),
            State::SosPmApcEscape => self.advance_sos_pm_apc_escape(performer, c),
        }
    }

    /// Abort the in-progress sequence and return to ground
    fn abort<P: Perform>(&mut self, performer: &mut P) {
        trace!("Parser abort in {:?}", self.state);
        if self.dcs_hooked {
            performer.unhook();
        }
        self.reset_sequence();
        self.parse_errors += 1;
        self.state = State::Ground;
    }

    /// Abort, then reprocess the offending code point from ground
    fn abort_and_reprocess<P: Perform>(&mut self, performer: &mut P, c: char) {
        self.abort(performer);
        self.advance_ground(performer, c);
    }

    fn reset_sequence(&mut self) {
        self.params.clear();
        self.param_value = 0;
        self.param_started = false;
        self.cur_group.clear();
        self.intermediates.clear();
        self.osc_buf.clear();
        self.dcs_len = 0;
        self.dcs_hooked = false;
    }

    // ========== Ground ==========

    fn advance_ground<P: Perform>(&mut self, performer: &mut P, c: char) {
        match c {
            '\u{1b}' => {
                self.reset_sequence();
                self.state = State::Escape;
            }
            // C1 introducers arriving as decoded code points
            '\u{9b}' => {
                self.reset_sequence();
                self.state = State::CsiEntry;
            }
            '\u{9d}' => {
                self.reset_sequence();
                self.state = State::OscString;
            }
            '\u{90}' => {
                self.reset_sequence();
                self.state = State::DcsEntry;
            }
            '\u{9c}' => {} // Bare ST
            c if (c as u32) < 0x20 => performer.execute(c as u8),
            '\u{7f}' => {} // DEL is ignored
            c if (0x80..0xa0).contains(&(c as u32)) => {
                trace!("Unhandled C1 control: U+{:04X}", c as u32);
            }
            c => performer.print(c),
        }
    }

    // ========== Escape ==========

    fn advance_escape<P: Perform>(&mut self, performer: &mut P, c: char) {
        match c {
            '\u{1b}' => {
                // Restart the escape sequence
                self.reset_sequence();
            }
            '[' => self.state = State::CsiEntry,
            ']' => self.state = State::OscString,
            'P' => self.state = State::DcsEntry,
            'X' | '^' | '_' => self.state = State::SosPmApcString,
            '\\' => self.state = State::Ground, // Bare ST
            c if (0x20..0x30).contains(&(c as u32)) => {
                self.collect_intermediate(c as u8);
                self.state = State::EscapeIntermediate;
            }
            c if (0x30..0x7f).contains(&(c as u32)) => {
                self.state = State::Ground;
                performer.esc_dispatch(&self.intermediates, c as u8);
            }
            c => self.abort_and_reprocess(performer, c),
        }
    }

    fn advance_escape_intermediate<P: Perform>(&mut self, performer: &mut P, c: char) {
        match c {
            '\u{1b}' => {
                self.reset_sequence();
                self.state = State::Escape;
            }
            c if (0x20..0x30).contains(&(c as u32)) => self.collect_intermediate(c as u8),
            c if (0x30..0x7f).contains(&(c as u32)) => {
                self.state = State::Ground;
                let intermediates = std::mem::take(&mut self.intermediates);
                performer.esc_dispatch(&intermediates, c as u8);
            }
            c => self.abort_and_reprocess(performer, c),
        }
    }

    // ========== CSI ==========

    fn advance_csi_entry<P: Perform>(&mut self, performer: &mut P, c: char) {
        match c {
            // Private markers are only valid before any parameter
            '?' | '>' | '<' | '=' => {
                self.collect_intermediate(c as u8);
                self.state = State::CsiParam;
            }
            _ => self.advance_csi_param(performer, c),
        }
    }

    fn advance_csi_param<P: Perform>(&mut self, performer: &mut P, c: char) {
        match c {
            '0'..='9' => {
                self.param_value = self
                    .param_value
                    .saturating_mul(10)
                    .saturating_add((c as u8 - b'0') as u16);
                self.param_started = true;
                self.state = State::CsiParam;
            }
            ';' => {
                self.end_group();
                self.state = State::CsiParam;
            }
            ':' => {
                self.end_subparam();
                self.state = State::CsiParam;
            }
            c if (0x20..0x30).contains(&(c as u32)) => {
                self.collect_intermediate(c as u8);
                self.state = State::CsiIntermediate;
            }
            c if (0x40..0x7f).contains(&(c as u32)) => self.dispatch_csi(performer, c),
            c => self.abort_and_reprocess(performer, c),
        }
    }

    fn advance_csi_intermediate<P: Perform>(&mut self, performer: &mut P, c: char) {
        match c {
            c if (0x20..0x30).contains(&(c as u32)) => self.collect_intermediate(c as u8),
            c if (0x40..0x7f).contains(&(c as u32)) => self.dispatch_csi(performer, c),
            c => self.abort_and_reprocess(performer, c),
        }
    }

    fn dispatch_csi<P: Perform>(&mut self, performer: &mut P, action: char) {
        self.end_param();
        self.state = State::Ground;
        let params = std::mem::take(&mut self.params);
        let intermediates = std::mem::take(&mut self.intermediates);
        performer.csi_dispatch(&params, &intermediates, action);
    }

    // ========== OSC ==========

    fn advance_osc_string<P: Perform>(&mut self, performer: &mut P, c: char) {
        match c {
            '\u{7}' => self.dispatch_osc(performer, true),
            '\u{9c}' => self.dispatch_osc(performer, false),
            '\u{1b}' => self.state = State::OscEscape,
            c if (c as u32) < 0x20 => self.abort_and_reprocess(performer, c),
            c => {
                if self.osc_buf.len() + c.len_utf8() > MAX_STRING_LEN {
                    trace!("OSC string overflow, discarding");
                    self.abort(performer);
                    return;
                }
                let mut buf = [0u8; 4];
                self.osc_buf
                    .extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    fn advance_osc_escape<P: Perform>(&mut self, performer: &mut P, c: char) {
        if c == '\\' {
            self.dispatch_osc(performer, false);
        } else {
            // ESC not followed by ST: the string is malformed. Discard it
            // and start a fresh escape sequence with this code point.
            trace!("OSC aborted by ESC");
            self.reset_sequence();
            self.parse_errors += 1;
            self.state = State::Escape;
            self.advance_escape(performer, c);
        }
    }

    fn dispatch_osc<P: Perform>(&mut self, performer: &mut P, bell_terminated: bool) {
        self.state = State::Ground;
        let buf = std::mem::take(&mut self.osc_buf);
        let params: Vec<&[u8]> = buf.split(|&b| b == b';').collect();
        performer.osc_dispatch(&params, bell_terminated);
    }

    // ========== DCS ==========

    fn advance_dcs_param<P: Perform>(&mut self, performer: &mut P, c: char) {
        match c {
            '?' | '>' | '<' | '=' if self.state == State::DcsEntry => {
                self.collect_intermediate(c as u8);
                self.state = State::DcsParam;
            }
            '0'..='9' => {
                self.param_value = self
                    .param_value
                    .saturating_mul(10)
                    .saturating_add((c as u8 - b'0') as u16);
                self.param_started = true;
                self.state = State::DcsParam;
            }
            ';' => {
                self.end_group();
                self.state = State::DcsParam;
            }
            ':' => {
                self.end_subparam();
                self.state = State::DcsParam;
            }
            c if (0x20..0x30).contains(&(c as u32)) => {
                self.collect_intermediate(c as u8);
                self.state = State::DcsIntermediate;
            }
            c if (0x40..0x7f).contains(&(c as u32)) => self.hook_dcs(performer, c),
            c => self.abort_and_reprocess(performer, c),
        }
    }

    fn advance_dcs_intermediate<P: Perform>(&mut self, performer: &mut P, c: char) {
        match c {
            c if (0x20..0x30).contains(&(c as u32)) => self.collect_intermediate(c as u8),
            c if (0x40..0x7f).contains(&(c as u32)) => self.hook_dcs(performer, c),
            c => self.abort_and_reprocess(performer, c),
        }
    }

    fn hook_dcs<P: Perform>(&mut self, performer: &mut P, action: char) {
        self.end_param();
        self.state = State::DcsPassthrough;
        self.dcs_hooked = true;
        self.dcs_len = 0;
        let params = std::mem::take(&mut self.params);
        let intermediates = std::mem::take(&mut self.intermediates);
        performer.hook(&params, &intermediates, action);
    }

    fn advance_dcs_passthrough<P: Perform>(&mut self, performer: &mut P, c: char) {
        match c {
            '\u{1b}' => self.state = State::DcsEscape,
            '\u{9c}' => self.unhook_dcs(performer),
            c => {
                if self.dcs_len + c.len_utf8() > MAX_STRING_LEN {
                    trace!("DCS string overflow, discarding");
                    self.abort(performer);
                    return;
                }
                let mut buf = [0u8; 4];
                for &b in c.encode_utf8(&mut buf).as_bytes() {
                    performer.put(b);
                }
                self.dcs_len += c.len_utf8();
            }
        }
    }

    fn advance_dcs_escape<P: Perform>(&mut self, performer: &mut P, c: char) {
        if c == '\\' {
            self.unhook_dcs(performer);
        } else {
            trace!("DCS aborted by ESC");
            performer.unhook();
            self.reset_sequence();
            self.parse_errors += 1;
            self.state = State::Escape;
            self.advance_escape(performer, c);
        }
    }

    fn unhook_dcs<P: Perform>(&mut self, performer: &mut P) {
        self.state = State::Ground;
        self.dcs_hooked = false;
        self.dcs_len = 0;
        performer.unhook();
    }

    // ========== SOS/PM/APC ==========

    fn advance_sos_pm_apc(&mut self, c: char) {
        match c {
            '\u{1b}' => self.state = State::SosPmApcEscape,
            '\u{9c}' => self.state = State::Ground,
            _ => {} // Discarded
        }
    }

    fn advance_sos_pm_apc_escape<P: Perform>(&mut self, performer: &mut P, c: char) {
        if c == '\\' {
            self.state = State::Ground;
        } else {
            self.reset_sequence();
            self.state = State::Escape;
            self.advance_escape(performer, c);
        }
    }

    // ========== Helpers ==========

    fn collect_intermediate(&mut self, byte: u8) {
        if self.intermediates.len() < MAX_INTERMEDIATES {
            self.intermediates.push(byte);
        }
    }

    /// Close the current sub-parameter value (`:` separator)
    fn end_subparam(&mut self) {
        if self.cur_group.len() < MAX_SUBPARAMS {
            self.cur_group.push(self.param_value);
        }
        self.param_value = 0;
        self.param_started = false;
    }

    /// Close the current parameter group (`;` separator)
    ///
    /// An empty parameter still produces a group holding the default 0,
    /// so `CSI ;5H` keeps its first parameter distinct from its second.
    fn end_group(&mut self) {
        self.end_subparam();
        let group = std::mem::take(&mut self.cur_group);
        self.params.push_group(group);
    }

    /// Close parameter collection at the final byte
    ///
    /// A sequence with no digits and no separators dispatches with an
    /// empty parameter list.
    fn end_param(&mut self) {
        if self.param_started || !self.cur_group.is_empty() || !self.params.is_empty() {
            self.end_group();
        }
        self.param_value = 0;
        self.param_started = false;
    }
}
