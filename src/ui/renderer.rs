//! Terminal renderer using crossterm
//!
//! Paints the transcript, the status row, and the input line.
//!
//! Layout for a `cols` x `rows` terminal:
//!
//! ```text
//! row 0..rows-2   transcript (green)
//! row rows-2      status bar (cyan)
//! row rows-1      input line (white), prompt "> "
//! ```

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{
        Attribute, Color, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
    },
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};

use crate::buffer::display_width;
use crate::core::session::Session;

/// Terminal renderer
pub struct Renderer {
    /// Remote node label shown in the status bar
    host: String,
    /// Whether the terminal has been initialized
    initialized: bool,
}

impl Renderer {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            initialized: false,
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        stdout.flush()?;
        self.initialized = true;
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();

        // Reset all attributes first
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show);
        let _ = execute!(stdout, EnableLineWrap);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Disable raw mode - this is the most important part
        terminal::disable_raw_mode()?;

        // Print a newline to ensure we're on a fresh line
        println!();

        Ok(())
    }

    /// Render the session state
    pub fn render(&mut self, session: &Session) -> io::Result<()> {
        let (cols, rows) = terminal::size()?;
        if rows < 3 || cols < 4 {
            return Ok(());
        }

        // Use a buffered writer for better performance
        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());

        execute!(stdout, Hide)?;

        self.render_transcript(&mut stdout, session, rows)?;
        self.render_status(&mut stdout, session, cols, rows)?;
        let cursor_col = render_input(&mut stdout, session, cols, rows)?;

        execute!(
            stdout,
            ResetColor,
            SetAttribute(Attribute::Reset),
            MoveTo(cursor_col, rows - 1),
            Show
        )?;

        stdout.flush()?;
        Ok(())
    }

    /// Transcript region: one wrapped visual line per terminal row.
    fn render_transcript<W: Write>(
        &self,
        stdout: &mut W,
        session: &Session,
        rows: u16,
    ) -> io::Result<()> {
        execute!(
            stdout,
            SetAttribute(Attribute::Reset),
            SetForegroundColor(Color::Green)
        )?;

        let visible: Vec<&str> = session.buffer.visible_lines().collect();
        for row_idx in 0..rows - 2 {
            execute!(stdout, MoveTo(0, row_idx))?;
            write!(stdout, "\x1b[K")?; // Clear to end of line
            if let Some(line) = visible.get(row_idx as usize) {
                write!(stdout, "{}", line)?;
            }
        }
        Ok(())
    }

    /// Status bar: host, lock/scroll state, key help.
    fn render_status<W: Write>(
        &self,
        stdout: &mut W,
        session: &Session,
        cols: u16,
        rows: u16,
    ) -> io::Result<()> {
        let state = if session.is_locked() {
            " [LOCKED]"
        } else if session.buffer.is_following() {
            ""
        } else {
            " [SCROLL]"
        };
        let mut status = format!(" {}{} | PgUp/PgDn scroll | F10 quit", self.host, state);

        // Truncate on a character boundary, then pad to the full row
        while display_width(&status) > cols as usize {
            status.pop();
        }
        let pad = cols as usize - display_width(&status);

        execute!(
            stdout,
            MoveTo(0, rows - 2),
            SetAttribute(Attribute::Reset),
            SetBackgroundColor(Color::Cyan),
            SetForegroundColor(Color::Black)
        )?;
        write!(stdout, "{}{}", status, " ".repeat(pad))?;
        Ok(())
    }
}

/// Input line. Returns the column for the hardware cursor.
fn render_input<W: Write>(
    stdout: &mut W,
    session: &Session,
    cols: u16,
    rows: u16,
) -> io::Result<u16> {
    execute!(
        stdout,
        MoveTo(0, rows - 1),
        SetAttribute(Attribute::Reset),
        SetForegroundColor(Color::White)
    )?;
    write!(stdout, "\x1b[K")?;

    // Prompt is 2 cells; keep one free cell for the cursor
    let avail = cols as usize - 3;
    let (tail, tail_width) = tail_fit(session.input(), avail);
    write!(stdout, "> {}", tail)?;

    Ok(2 + tail_width as u16)
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// The longest suffix of `input` whose display width fits in `avail` cells,
/// with its width. Long input scrolls left so the insertion point stays
/// visible.
fn tail_fit(input: &str, avail: usize) -> (&str, usize) {
    let mut width = 0;
    let mut start = input.len();
    for (idx, ch) in input.char_indices().rev() {
        let w = crate::buffer::char_width(ch);
        if width + w > avail {
            break;
        }
        width += w;
        start = idx;
    }
    (&input[start..], width)
}
