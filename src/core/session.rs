//! Session driver: owns all per-connection state and coordinates the data
//! path between the socket and the transcript.
//!
//! Inbound: socket bytes → Telnet filter (strip/reply) → newline
//! normalizer → RX accumulator → lossy UTF-8 decode → text buffer, with the
//! recent-text window, autologin, and the input lock updated along the way.
//! Outbound: submitted line → optional case fold → local echo → Telnet
//! escaping → socket, plus the configured line terminator.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::line::{normalize_newlines, RxAccumulator};
use super::net::{Connection, NetError};
use super::telnet::{escape_outbound, TelnetFilter};
use crate::autologin::{Autologin, InputLock, PromptState, RecentText};
use crate::buffer::TextBuffer;

/// Maximum codepoints in the in-progress command line.
const INPUT_LIMIT: usize = 4096;

/// SUB control byte, sent in place of Ctrl-Z when pass-through is enabled.
const SUB: u8 = 0x1A;

/// Behavior switches resolved from config file and command line.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Terminate outbound lines with CR only instead of CRLF.
    pub cr_only: bool,
    /// Upper-case submitted lines before transmission.
    pub uppercase: bool,
    /// Echo submitted lines into the transcript.
    pub local_echo: bool,
    /// Transmit one "?" line after the first unlock.
    pub auto_help: bool,
    /// Append the line terminator after a SUB byte.
    pub ctrl_z_eol: bool,
    pub unlock_delay: Duration,
    pub quiet_period: Duration,
}

/// One connected session. Exclusively owns every piece of mutable state
/// for the lifetime of the connection.
pub struct Session {
    conn: Connection,
    telnet: TelnetFilter,
    rx: RxAccumulator,
    /// Transcript store and wrapped view.
    pub buffer: TextBuffer,
    recent: RecentText,
    autologin: Autologin,
    lock: InputLock,
    last_rx: Instant,
    auto_help_sent: bool,
    opts: SessionOptions,
    /// In-progress command line.
    input: String,
    input_len: usize,
}

impl Session {
    pub fn new(
        conn: Connection,
        opts: SessionOptions,
        autologin: Autologin,
        cols: u16,
        rows: u16,
    ) -> Self {
        let lock = InputLock::new(autologin.is_enabled(), opts.unlock_delay, opts.quiet_period);
        let (width, height) = viewport(cols, rows);
        Self {
            conn,
            telnet: TelnetFilter::new(),
            rx: RxAccumulator::new(),
            buffer: TextBuffer::new(width, height),
            recent: RecentText::new(),
            autologin,
            lock,
            last_rx: Instant::now(),
            auto_help_sent: false,
            opts,
            input: String::new(),
            input_len: 0,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Service one socket read. Returns whether the transcript changed.
    pub fn process_inbound(&mut self) -> Result<bool, NetError> {
        let mut chunk = [0u8; 4096];
        let n = match self.conn.try_read(&mut chunk)? {
            Some(n) => n,
            None => return Ok(false),
        };

        let (data, replies) = self.telnet.filter_inbound(&chunk[..n]);
        if !replies.is_empty() {
            self.conn.write_all(&replies)?;
        }

        let normalized = normalize_newlines(&data);
        if normalized.is_empty() {
            return Ok(false);
        }
        self.last_rx = Instant::now();

        let mut changed = false;
        for line in self.rx.feed(&normalized) {
            let text = String::from_utf8_lossy(&line);
            let follow = self.buffer.is_following();
            self.buffer.append_line(&text, follow);
            changed = true;
        }

        self.recent.push(&String::from_utf8_lossy(&normalized));

        // Prompt-triggered autologin reacts to the fresh text
        let mut credential = None;
        let mut done = false;
        if let Autologin::Prompt(al) = &mut self.autologin {
            credential = al.check(self.recent.as_str()).map(str::to_string);
            done = al.state() == PromptState::Done;
        }
        if let Some(line) = credential {
            self.send_line(&line)?;
            if done {
                self.lock.mark_login_complete(Instant::now());
            }
        }

        Ok(changed)
    }

    /// Advance the time-driven machinery: blind autologin, the unlock
    /// rules, and the one-shot auto-help send. Called on every loop wake.
    pub fn tick(&mut self) -> Result<(), NetError> {
        let now = Instant::now();

        let mut credential = None;
        if let Autologin::Blind(al) = &mut self.autologin {
            credential = al.poll(now).map(str::to_string);
            if let Some(at) = al.pass_sent_at() {
                self.lock.mark_login_complete(at);
            }
        }
        if let Some(line) = credential {
            self.send_line(&line)?;
        }

        self.lock.tick(now, self.last_rx, self.recent.as_str());

        if self.opts.auto_help && !self.auto_help_sent && !self.lock.is_locked() {
            self.auto_help_sent = true;
            debug!("sending auto-help command");
            self.send_line("?")?;
        }

        Ok(())
    }

    /// Submit the command line. While locked the line is discarded (the
    /// buffer clears either way); otherwise it is optionally upper-cased,
    /// locally echoed, and transmitted.
    pub fn submit(&mut self) -> Result<(), NetError> {
        let line = std::mem::take(&mut self.input);
        self.input_len = 0;
        if self.lock.is_locked() {
            debug!("input locked, dropping submitted line");
            return Ok(());
        }

        let line = if self.opts.uppercase {
            line.to_uppercase()
        } else {
            line
        };
        if self.opts.local_echo {
            self.echo_line(&line);
        }
        self.send_line(&line)
    }

    /// Transmit a SUB control byte (Ctrl-Z pass-through).
    pub fn send_substitute(&mut self) -> Result<(), NetError> {
        if self.opts.local_echo {
            self.echo_line("^Z");
        }
        self.conn.write_all(&escape_outbound(&[SUB]))?;
        if self.opts.ctrl_z_eol {
            self.send_eol()?;
        }
        Ok(())
    }

    /// Append one printable codepoint to the command line, up to the cap.
    pub fn input_char(&mut self, ch: char) {
        if self.input_len < INPUT_LIMIT {
            self.input.push(ch);
            self.input_len += 1;
        }
    }

    /// Delete the last codepoint of the command line.
    pub fn input_backspace(&mut self) {
        if self.input.pop().is_some() {
            self.input_len -= 1;
        }
    }

    /// Apply new terminal dimensions and rewrap the transcript.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        info!("resize: {}x{}", cols, rows);
        let keep_bottom = self.buffer.is_following();
        let (width, height) = viewport(cols, rows);
        self.buffer.set_viewport(width, height);
        self.buffer.reflow(keep_bottom);
    }

    fn echo_line(&mut self, line: &str) {
        let follow = self.buffer.is_following();
        self.buffer.append_line(&format!("> {}", line), follow);
    }

    fn send_line(&mut self, line: &str) -> Result<(), NetError> {
        self.conn.write_all(&escape_outbound(line.as_bytes()))?;
        self.send_eol()
    }

    fn send_eol(&mut self) -> Result<(), NetError> {
        if self.opts.cr_only {
            self.conn.write_all(b"\r")
        } else {
            self.conn.write_all(b"\r\n")
        }
    }
}

/// Transcript geometry: wrap at cols−1, leave one status and one input row.
fn viewport(cols: u16, rows: u16) -> (usize, usize) {
    let width = (cols as usize).saturating_sub(1).max(1);
    let height = (rows as usize).saturating_sub(2).max(1);
    (width, height)
}
