use std::io::{self, Stdout, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};

use crate::ascii_frame::GlyphGrid;
use crate::error_codes::PlayerError;
use crate::frame::Viewport;
use crate::palette::ColorId;

pub const PAUSED_LABEL: &str = "(Paused)";

/// One user request, decoded from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Quit,
    TogglePause,
    SeekBack,
    SeekForward,
}

pub fn map_key(key: KeyEvent) -> Option<InputAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => Some(InputAction::Quit),
        // Raw mode swallows SIGINT, so honour Ctrl-C by hand.
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(InputAction::Quit)
        }
        KeyCode::Char(' ') => Some(InputAction::TogglePause),
        KeyCode::Left => Some(InputAction::SeekBack),
        KeyCode::Right => Some(InputAction::SeekForward),
        _ => None,
    }
}

/// The three fixed panes plus keyboard input, as the playback loop sees them.
pub trait Screen {
    fn viewport(&self) -> Viewport;
    fn draw_title(&mut self, title: &str, paused: bool) -> Result<()>;
    fn draw_video(&mut self, grid: &GlyphGrid) -> Result<()>;
    fn draw_progress(&mut self, text: &str) -> Result<()>;
    /// Returns immediately; `None` when no key is waiting.
    fn poll_input(&mut self) -> Result<Option<InputAction>>;
}

/// Raw-mode alternate screen on stdout. Restores the terminal when dropped,
/// including on error paths.
pub struct TerminalScreen {
    out: Stdout,
    width: u16,
    height: u16,
    viewport: Viewport,
}

impl TerminalScreen {
    pub fn enter() -> Result<Self> {
        let (width, height) = terminal::size().context("failed to query terminal size")?;
        let viewport = Viewport::from_terminal(width, height);
        if viewport.is_empty() {
            return Err(PlayerError::InvalidDimensions {
                width: u32::from(width),
                height: u32::from(height),
            })
            .context("terminal is too small for the title bar, video pane and progress bar");
        }

        terminal::enable_raw_mode().context("failed to enable raw mode")?;
        let mut out = io::stdout();
        if let Err(error) = execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All)) {
            let _ = terminal::disable_raw_mode();
            return Err(error).context("failed to enter alternate screen");
        }
        log::debug!(
            "terminal {}x{}, video pane {}x{}",
            width,
            height,
            viewport.cols,
            viewport.rows
        );

        Ok(Self {
            out,
            width,
            height,
            viewport,
        })
    }
}

impl Screen for TerminalScreen {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn draw_title(&mut self, title: &str, paused: bool) -> Result<()> {
        let mut buffer = Vec::new();
        paint_title(&mut buffer, self.width, title, paused)?;
        self.out.write_all(&buffer)?;
        self.out.flush()?;
        Ok(())
    }

    fn draw_video(&mut self, grid: &GlyphGrid) -> Result<()> {
        // Queue the whole pane first so a failure never leaves half a frame.
        let mut buffer = Vec::with_capacity(grid.cells().len() * 4);
        paint_grid(&mut buffer, grid, self.viewport)?;
        self.out.write_all(&buffer)?;
        self.out.flush()?;
        Ok(())
    }

    fn draw_progress(&mut self, text: &str) -> Result<()> {
        let row = self.height.saturating_sub(1);
        let visible = text
            .chars()
            .take(usize::from(self.width.saturating_sub(1)))
            .collect::<String>();
        queue!(
            self.out,
            MoveTo(0, row),
            ResetColor,
            SetAttribute(Attribute::Reset),
            Print(visible),
            Clear(ClearType::UntilNewLine)
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn poll_input(&mut self) -> Result<Option<InputAction>> {
        if !event::poll(Duration::ZERO).context("failed to poll terminal input")? {
            return Ok(None);
        }
        match event::read().context("failed to read terminal input")? {
            Event::Key(key) => Ok(map_key(key)),
            _ => Ok(None),
        }
    }
}

impl Drop for TerminalScreen {
    fn drop(&mut self) {
        let _ = execute!(
            self.out,
            ResetColor,
            SetAttribute(Attribute::Reset),
            Show,
            LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}

/// Boxed title bar, three rows tall: title on row 1 after the left border,
/// pause indicator right-aligned at `width - 9`.
pub fn paint_title(out: &mut impl Write, width: u16, title: &str, paused: bool) -> Result<()> {
    let inner = usize::from(width.saturating_sub(2));
    let indicator_col = width.saturating_sub(PAUSED_LABEL.len() as u16 + 1);
    let title_room = usize::from(indicator_col.saturating_sub(2));
    let title = title.chars().take(title_room).collect::<String>();
    let horizontal = "─".repeat(inner);

    queue!(
        out,
        ResetColor,
        SetAttribute(Attribute::Reset),
        MoveTo(0, 0),
        Print(format!("┌{horizontal}┐")),
        MoveTo(0, 1),
        Print(format!("│{:inner$}│", "")),
        MoveTo(0, 2),
        Print(format!("└{horizontal}┘")),
        MoveTo(1, 1),
        Print(title)
    )?;
    if usize::from(width) > PAUSED_LABEL.len() + 2 {
        let label = if paused {
            PAUSED_LABEL.to_owned()
        } else {
            " ".repeat(PAUSED_LABEL.len())
        };
        queue!(out, MoveTo(indicator_col, 1), Print(label))?;
    }
    Ok(())
}

/// Paints the grid into the video pane, top-left aligned, and blanks whatever
/// part of the pane the grid does not cover.
pub fn paint_grid(out: &mut impl Write, grid: &GlyphGrid, viewport: Viewport) -> Result<()> {
    let pane_cols = usize::from(viewport.cols);
    let pane_rows = usize::from(viewport.rows);
    if grid.width() > pane_cols || grid.height() > pane_rows {
        return Err(PlayerError::RenderOverflow {
            what: "glyph grid",
            width: grid.width(),
            height: grid.height(),
            max_width: pane_cols,
            max_height: pane_rows,
        }
        .into());
    }

    let padding = " ".repeat(pane_cols - grid.width());
    let mut current: Option<(ColorId, bool)> = None;
    let mut line = String::with_capacity(pane_cols);

    for (row, cells) in grid.rows().enumerate() {
        queue!(out, MoveTo(0, viewport.top() + row as u16))?;
        for cell in cells {
            if current != Some((cell.color, cell.bold)) {
                if !line.is_empty() {
                    queue!(out, Print(&line))?;
                    line.clear();
                }
                let attribute = if cell.bold {
                    Attribute::Bold
                } else {
                    Attribute::NormalIntensity
                };
                queue!(
                    out,
                    SetForegroundColor(cell.color.terminal_color()),
                    SetAttribute(attribute)
                )?;
                current = Some((cell.color, cell.bold));
            }
            line.push(cell.ch);
        }
        line.push_str(&padding);
        queue!(out, Print(&line))?;
        line.clear();
    }

    let blank_row = " ".repeat(pane_cols);
    for row in grid.height()..pane_rows {
        queue!(
            out,
            MoveTo(0, viewport.top() + row as u16),
            Print(&blank_row)
        )?;
    }
    queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;
    Ok(())
}
