//! Layout and drawing: score panel, playfield, level panel, pause overlay, game over.

use crate::engine::RenderDelta;
use crate::grid::Cell;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Width of the score and level panels in terminal columns.
pub const PANEL_WIDTH: u16 = 12;
/// Blank column between a panel and the playfield border.
const GUTTER: u16 = 1;
/// Border plus one value line.
const PANEL_HEIGHT: u16 = 3;
/// Each grid cell is two terminal columns wide so blocks look square.
const CELL_WIDTH: u16 = 2;

const BLOCK_GLYPH: &str = "██";
const DESTROYER_GLYPH: &str = "▓▓";
const EMPTY_GLYPH: &str = "  ";

/// Duration of the game-over fade (TachyonFX) in ms.
pub const GAME_OVER_FADE_MS: u32 = 1000;

const KEY_HINTS: [&str; 5] = ["←→ move", "↑ rotate", "↓ drop", "p pause", "q quit"];

/// Whether a `width` x `height` field plus both panels fits a terminal of
/// `cols` x `rows`: double-width cells and two 12-column panels with 2-column
/// gutters across, the field and its border down.
pub fn playfield_fits(width: u16, height: u16, cols: u16, rows: u16) -> bool {
    let needed_cols = u32::from(width) * 2 + (2 + u32::from(PANEL_WIDTH)) * 2;
    let needed_rows = u32::from(height) + 2;
    needed_cols <= u32::from(cols) && needed_rows <= u32::from(rows)
}

/// Where each part of the board lands inside the terminal area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Areas {
    score: Rect,
    field: Rect,
    level: Rect,
    hints: Rect,
}

/// Renderer-side copy of the visible field and side panels.
///
/// The engine never draws: it reports changed cells through [`RenderDelta`]
/// and the view keeps the latest state so a whole frame can be repainted.
#[derive(Debug, Clone)]
pub struct BoardView {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    level: u32,
    score: u32,
    paused: bool,
    game_over: bool,
}

impl BoardView {
    /// `height` is the visible height; hidden spawn rows are never drawn.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width * height],
            level: 1,
            score: 0,
            paused: false,
            game_over: false,
        }
    }

    pub fn invalidate_cell(&mut self, row: usize, col: usize, cell: Cell) {
        if row < self.height && col < self.width {
            self.cells[row * self.width + col] = cell;
        }
    }

    pub fn draw_level(&mut self, level: u32) {
        self.level = level;
    }

    pub fn draw_score(&mut self, score: u32) {
        self.score = score;
    }

    /// Folds one engine delta into the view, in order.
    pub fn apply(&mut self, delta: &RenderDelta) {
        for update in &delta.cells {
            self.invalidate_cell(update.row, update.col, update.cell);
        }
        if let Some(level) = delta.level {
            self.draw_level(level);
        }
        if let Some(score) = delta.score {
            self.draw_score(score);
        }
        if let Some(paused) = delta.paused {
            self.paused = paused;
        }
        self.game_over |= delta.game_over;
    }

    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.cells
            .get(row * self.width + col)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_over(&self) -> bool {
        self.game_over
    }

    fn areas(&self, area: Rect) -> Areas {
        let field_w = self.width as u16 * CELL_WIDTH + 2;
        let field_h = self.height as u16 + 2;
        let total_w = field_w + (PANEL_WIDTH + GUTTER) * 2;

        let horiz = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Fill(1),
                Constraint::Length(total_w),
                Constraint::Fill(1),
            ])
            .split(area);
        let vert = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Fill(1),
                Constraint::Length(field_h),
                Constraint::Fill(1),
            ])
            .split(horiz[1]);
        let row = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(PANEL_WIDTH),
                Constraint::Length(GUTTER),
                Constraint::Length(field_w),
                Constraint::Length(GUTTER),
                Constraint::Length(PANEL_WIDTH),
            ])
            .split(vert[1]);

        let panel = |r: Rect| Rect {
            height: r.height.min(PANEL_HEIGHT),
            ..r
        };
        let level = panel(row[4]);
        Areas {
            score: panel(row[0]),
            field: row[2],
            level,
            hints: Rect {
                y: level.y + level.height + 1,
                height: row[4].height.saturating_sub(level.height + 1),
                ..level
            },
        }
    }

    /// Draws panels, field and (when paused) the pause overlay.
    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let areas = self.areas(area);
        draw_panel(buf, theme, areas.score, "Score", self.score);
        draw_panel(buf, theme, areas.level, "Level", self.level);
        draw_hints(buf, theme, areas.hints);
        self.draw_field(buf, theme, areas.field);
        if self.paused {
            draw_pause_overlay(buf, theme, areas.field);
        }
    }

    fn draw_field(&self, buf: &mut Buffer, theme: &Theme, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg));
        let inner = block.inner(area);
        block.render(area, buf);

        for row in 0..self.height {
            let y = inner.y + row as u16;
            if y >= inner.bottom() {
                break;
            }
            for col in 0..self.width {
                let x = inner.x + col as u16 * CELL_WIDTH;
                if x + CELL_WIDTH > inner.right() {
                    break;
                }
                let (glyph, fg) = match self.cell(row, col) {
                    Cell::Empty => (EMPTY_GLYPH, theme.bg),
                    Cell::Colored(c) => (BLOCK_GLYPH, theme.block_color(c)),
                    Cell::Destroyer => (DESTROYER_GLYPH, theme.destroyer),
                };
                buf.set_string(x, y, glyph, Style::default().fg(fg).bg(theme.bg));
            }
        }
    }

    /// Final panel over the field, drawn after the fade so it stays readable.
    pub fn render_game_over(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let field = self.areas(area).field;
        let popup_w = (PANEL_WIDTH + 4).min(field.width);
        let popup_h = 6u16.min(field.height);
        let popup = Rect {
            x: field.x + field.width.saturating_sub(popup_w) / 2,
            y: field.y + field.height.saturating_sub(popup_h) / 2,
            width: popup_w,
            height: popup_h,
        };
        let lines = vec![
            Line::from(Span::styled(
                " Game Over ",
                Style::default().fg(Color::White).bg(Color::Red),
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("Score {}", self.score),
                Style::default().fg(theme.main_fg),
            )),
            Line::from(Span::styled(
                format!("Level {}", self.level),
                Style::default().fg(theme.main_fg),
            )),
        ];
        Clear.render(popup, buf);
        Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, buf);
    }
}

fn draw_panel(buf: &mut Buffer, theme: &Theme, area: Rect, title: &str, value: u32) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    Paragraph::new(Line::from(Span::styled(
        value.to_string(),
        Style::default().fg(theme.main_fg),
    )))
    .alignment(Alignment::Right)
    .block(block)
    .render(area, buf);
}

fn draw_hints(buf: &mut Buffer, theme: &Theme, area: Rect) {
    let lines: Vec<Line> = KEY_HINTS
        .iter()
        .map(|h| Line::from(Span::styled(*h, Style::default().fg(theme.inactive_fg))))
        .collect();
    Paragraph::new(lines).render(area, buf);
}

fn draw_pause_overlay(buf: &mut Buffer, theme: &Theme, field: Rect) {
    let popup_w = PANEL_WIDTH.min(field.width);
    let popup_h = 5u16.min(field.height);
    let popup = Rect {
        x: field.x + field.width.saturating_sub(popup_w) / 2,
        y: field.y + field.height.saturating_sub(popup_h) / 2,
        width: popup_w,
        height: popup_h,
    };
    let lines = vec![
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled("any key", Style::default().fg(theme.main_fg))),
    ];
    Clear.render(popup, buf);
    Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    )
    .render(popup, buf);
}

/// Fades the playfield to the background once the game is over.
pub struct GameOverFade {
    effect: Effect,
    last_process: Option<Instant>,
}

impl GameOverFade {
    pub fn new(theme: &Theme) -> Self {
        Self {
            effect: fx::fade_to(theme.bg, theme.bg, (GAME_OVER_FADE_MS, Interpolation::Linear)),
            last_process: None,
        }
    }

    pub fn done(&self) -> bool {
        self.effect.done()
    }

    fn process(&mut self, frame: &mut Frame, area: Rect, now: Instant) {
        let delta = self
            .last_process
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(std::time::Duration::ZERO);
        let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
        self.last_process = Some(now);
        frame.render_effect(&mut self.effect, area, TfxDuration::from_millis(delta_ms));
    }
}

/// Draws a full frame. The fade, when given, runs over the playfield only.
pub fn draw(
    frame: &mut Frame,
    view: &BoardView,
    theme: &Theme,
    fade: Option<&mut GameOverFade>,
    now: Instant,
) {
    let area = frame.area();
    view.render(area, frame.buffer_mut(), theme);
    if let Some(fade) = fade {
        fade.process(frame, view.areas(area).field, now);
    }
    if view.is_over() {
        view.render_game_over(area, frame.buffer_mut(), theme);
    }
}
