//! Layout and drawing: board, falling gems, cursor, sidebar, pause overlay, pop flash.

use crate::cell::CellType;
use crate::game::{Feedback, GameState};
use crate::grid::Grid;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal columns per grid cell (three for the gem, one gap).
pub const CELL_COLS: u16 = 4;
/// Terminal rows per grid cell (one full row, one half-block row).
pub const CELL_ROWS: u16 = 2;

const SIDEBAR_WIDTH: u16 = 24;

/// Duration of the pop flash (TachyonFX fade from white back to the board).
const POP_FLASH_MS: u32 = 250;

/// Where the board and sidebar sit for a given terminal area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLayout {
    /// Board including its border.
    pub outer: Rect,
    /// Cell area inside the border.
    pub board: Rect,
    pub sidebar: Rect,
}

/// Board size in terminal cells including the border.
fn board_outer_size(grid_width: usize, grid_height: usize) -> (u16, u16) {
    (
        (grid_width as u16).saturating_mul(CELL_COLS) + 2,
        (grid_height as u16).saturating_mul(CELL_ROWS) + 2,
    )
}

/// Largest grid (columns, rows) that fits beside the sidebar in a terminal of this size.
pub fn max_grid_for_terminal(term_cols: u16, term_rows: u16) -> (u16, u16) {
    let cols = term_cols.saturating_sub(2 + SIDEBAR_WIDTH) / CELL_COLS;
    let rows = term_rows.saturating_sub(2) / CELL_ROWS;
    (cols.max(1), rows.max(1))
}

/// Centre board + sidebar in `area`. Drawing and click translation both use this.
pub fn layout(area: Rect, grid: &Grid) -> BoardLayout {
    let (pw, ph) = board_outer_size(grid.width(), grid.height());
    let total_w = pw + SIDEBAR_WIDTH;

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
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);

    let outer = inner[0];
    BoardLayout {
        outer,
        board: Block::default().borders(Borders::ALL).inner(outer),
        sidebar: inner[1],
    }
}

/// Terminal cell → grid coordinates, or `None` when outside the board.
pub fn screen_to_grid(board: Rect, column: u16, row: u16) -> Option<(i32, i32)> {
    if !board.contains(Position::new(column, row)) {
        return None;
    }
    Some((
        i32::from((column - board.x) / CELL_COLS),
        i32::from((row - board.y) / CELL_ROWS),
    ))
}

/// Screen rect of grid cell (x, y) at rest, clipped to the board.
fn cell_rect(board: Rect, x: i32, y: i32) -> Rect {
    let rect = Rect {
        x: board.x.saturating_add((x as u16).saturating_mul(CELL_COLS)),
        y: board.y.saturating_add((y as u16).saturating_mul(CELL_ROWS)),
        width: CELL_COLS,
        height: CELL_ROWS,
    };
    rect.intersection(board)
}

/// Fade effect that flashes the popped cells' screen positions.
pub fn pop_flash_effect(board: Rect, removed: &[(i32, i32)]) -> Effect {
    let positions: HashSet<(u16, u16)> = removed
        .iter()
        .flat_map(|&(x, y)| {
            let r = cell_rect(board, x, y);
            (r.x..r.right()).flat_map(move |bx| (r.y..r.bottom()).map(move |by| (bx, by)))
        })
        .collect();
    let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
        positions.contains(&(pos.x, pos.y))
    }));
    fx::fade_from(Color::White, Color::White, (POP_FLASH_MS, Interpolation::Linear))
        .with_filter(filter)
        .with_area(board)
}

/// Run the pop flash for this frame, if one is active.
fn apply_pop_effect(
    frame: &mut Frame,
    board: Rect,
    pop_effect: &mut Option<Effect>,
    pop_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let Some(effect) = pop_effect else {
        return;
    };
    let delta = pop_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *pop_process_time = Some(now);
    frame.render_effect(effect, board, TfxDuration::from_millis(delta_ms));
}

/// Draw the game, with optional pause overlay and pop flash.
pub fn draw(
    frame: &mut Frame,
    state: &GameState,
    paused: bool,
    pop_effect: &mut Option<Effect>,
    pop_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    let BoardLayout {
        outer,
        board,
        sidebar,
    } = layout(area, &state.grid);

    draw_board(frame, state, outer, board);
    draw_sidebar(frame, state, sidebar);
    apply_pop_effect(frame, board, pop_effect, pop_process_time, now);
    if paused {
        draw_pause_overlay(frame, state, area);
    }
}

fn draw_board(frame: &mut Frame, state: &GameState, outer: Rect, board: Rect) {
    let theme = &state.theme;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" Gemtui ", theme.title));
    block.render(outer, frame.buffer_mut());

    let buf = frame.buffer_mut();
    buf.set_style(board, Style::default().bg(theme.bg));

    for ((x, y), cell) in state.grid.iter() {
        let Some(index) = cell.kind.gem_index() else {
            continue;
        };
        let color = theme.gem_color(index);
        let lift = (cell.fall_offset * f32::from(CELL_ROWS)).round() as i32;
        let top = i32::from(board.y) + (y as i32) * i32::from(CELL_ROWS) - lift;
        let left = board.x + (x as u16) * CELL_COLS;
        let is_cursor = state.cursor == (x as i32, y as i32);
        draw_gem(buf, board, left, top, cell.kind, color, theme.bg, is_cursor);
    }
}

/// One gem: a full row with the glyph, then a half-block row for the lower edge.
fn draw_gem(
    buf: &mut Buffer,
    board: Rect,
    left: u16,
    top: i32,
    kind: CellType,
    color: Color,
    bg: Color,
    is_cursor: bool,
) {
    let face = Style::default().fg(Color::Black).bg(color);
    for row in 0..i32::from(CELL_ROWS) {
        let sy = top + row;
        if sy < i32::from(board.y) || sy >= i32::from(board.bottom()) {
            continue;
        }
        let sy = sy as u16;
        for col in 0..CELL_COLS - 1 {
            let sx = left + col;
            if sx >= board.right() {
                break;
            }
            let cell = &mut buf[(sx, sy)];
            if row == 0 {
                let symbol = match col {
                    1 => kind.glyph(),
                    0 if is_cursor => "▶",
                    2 if is_cursor => "◀",
                    _ => " ",
                };
                cell.set_symbol(symbol).set_style(face);
            } else {
                cell.set_symbol("▀").set_style(Style::default().fg(color).bg(bg));
            }
        }
    }
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, area: Rect) {
    let theme = &state.theme;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let hint_style = Style::default().fg(theme.inactive_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Stats
            Constraint::Length(3), // Status
            Constraint::Length(7), // Gems legend
            Constraint::Min(0),    // Keys
        ])
        .split(area);

    let stats = &state.stats;
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let stats_lines = vec![
        stat("Pops: ", stats.pops.to_string()),
        stat("Gems: ", stats.gems_cleared.to_string()),
        stat("Largest: ", stats.largest.to_string()),
        stat("Misses: ", stats.misses.to_string()),
    ];
    Paragraph::new(Text::from(stats_lines))
        .block(Block::default().borders(Borders::ALL).border_style(border_style))
        .render(chunks[0], frame.buffer_mut());

    let status = match state.cue.map(|c| c.feedback) {
        Some(Feedback::Popped { size }) => Span::styled(
            format!("Pop! +{size}"),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Some(Feedback::CannotPop) => Span::styled(
            "Can't pop",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        None if !state.grid.is_stable() => Span::styled("Falling…", hint_style),
        None if state.has_move => Span::styled("Your move", fg_style),
        None => Span::styled(
            "No moves: R",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
    };
    Paragraph::new(Line::from(status))
        .block(Block::default().borders(Borders::ALL).border_style(border_style))
        .render(chunks[1], frame.buffer_mut());

    let legend: Vec<Line> = CellType::GEMS
        .iter()
        .filter_map(|kind| {
            let color = theme.gem_color(kind.gem_index()?);
            Some(Line::from(vec![
                Span::styled(
                    format!(" {} ", kind.glyph()),
                    Style::default().fg(Color::Black).bg(color),
                ),
                Span::styled(format!(" {kind:?}"), fg_style),
            ]))
        })
        .collect();
    Paragraph::new(Text::from(legend))
        .block(Block::default().borders(Borders::ALL).border_style(border_style))
        .render(chunks[2], frame.buffer_mut());

    let keys = vec![
        Line::from(Span::styled("Click / Space  pop", hint_style)),
        Line::from(Span::styled("Arrows / hjkl  move", hint_style)),
        Line::from(Span::styled("P pause  R new", hint_style)),
        Line::from(Span::styled("Q quit", hint_style)),
    ];
    Paragraph::new(Text::from(keys)).render(chunks[3], frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, state: &GameState, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(Span::styled(
            " P: Resume    Q: Quit ",
            Style::default().fg(state.theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(state.theme.div_line).bg(state.theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameConfig;
    use crate::theme::Theme;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn state(width: u16, height: u16) -> GameState {
        let config = GameConfig {
            width,
            height,
            seed: 3,
            no_animation: false,
        };
        GameState::new(Theme::default(), &config).unwrap()
    }

    #[test]
    fn screen_to_grid_divides_by_cell_size() {
        let board = Rect::new(10, 5, 8 * CELL_COLS, 8 * CELL_ROWS);
        assert_eq!(screen_to_grid(board, 10, 5), Some((0, 0)));
        assert_eq!(screen_to_grid(board, 13, 6), Some((0, 0)));
        assert_eq!(screen_to_grid(board, 14, 7), Some((1, 1)));
        assert_eq!(screen_to_grid(board, 10 + 8 * CELL_COLS - 1, 5 + 8 * CELL_ROWS - 1), Some((7, 7)));
        assert_eq!(screen_to_grid(board, 9, 5), None);
        assert_eq!(screen_to_grid(board, 10 + 8 * CELL_COLS, 5), None);
    }

    #[test]
    fn layout_fits_board_and_sidebar() {
        let state = state(8, 8);
        let area = Rect::new(0, 0, 120, 40);
        let l = layout(area, &state.grid);
        assert_eq!(l.board.width, 8 * CELL_COLS);
        assert_eq!(l.board.height, 8 * CELL_ROWS);
        assert_eq!(l.sidebar.x, l.outer.right());
        assert!(area.contains(Position::new(l.sidebar.right() - 1, l.outer.bottom() - 1)));
    }

    #[test]
    fn max_grid_leaves_room_for_sidebar() {
        let (w, h) = max_grid_for_terminal(80, 24);
        assert_eq!(w, (80 - 2 - SIDEBAR_WIDTH) / CELL_COLS);
        assert_eq!(h, (24 - 2) / CELL_ROWS);
        assert_eq!(max_grid_for_terminal(0, 0), (1, 1));
    }

    #[test]
    fn draw_paints_every_gem_glyph() {
        let state = state(4, 4);
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut effect = None;
        let mut time = None;
        terminal
            .draw(|f| draw(f, &state, false, &mut effect, &mut time, Instant::now()))
            .unwrap();
        let l = layout(Rect::new(0, 0, 80, 24), &state.grid);
        let buf = terminal.backend().buffer();
        for ((x, y), cell) in state.grid.iter() {
            let sx = l.board.x + x as u16 * CELL_COLS + 1;
            let sy = l.board.y + y as u16 * CELL_ROWS;
            assert_eq!(buf[(sx, sy)].symbol(), cell.kind.glyph());
        }
    }

    #[test]
    fn falling_gem_is_drawn_higher_and_clipped() {
        let mut state = state(1, 3);
        state.grid.cell_at_mut(0, 0).unwrap().drop_from(1);
        state.grid.cell_at_mut(0, 2).unwrap().drop_from(1);
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        let (mut effect, mut time) = (None, None);
        terminal
            .draw(|f| draw(f, &state, false, &mut effect, &mut time, Instant::now()))
            .unwrap();
        let l = layout(Rect::new(0, 0, 60, 20), &state.grid);
        let buf = terminal.backend().buffer();
        let glyph_col = l.board.x + 1;
        // Bottom gem lifted one cell sits where the middle gem rests.
        let bottom = state.grid.cell_at(0, 2).unwrap().kind;
        assert_eq!(buf[(glyph_col, l.board.y + CELL_ROWS)].symbol(), bottom.glyph());
        // Its rest row is empty board.
        assert_eq!(buf[(glyph_col, l.board.y + 2 * CELL_ROWS)].symbol(), " ");
    }

    #[test]
    fn pop_flash_finishes() {
        let board = Rect::new(1, 1, 4 * CELL_COLS, 4 * CELL_ROWS);
        let mut effect = Some(pop_flash_effect(board, &[(0, 0), (1, 0), (2, 0)]));
        let mut terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        let mut time = None;
        let start = Instant::now();
        for step in 0..3u64 {
            let now = start + std::time::Duration::from_millis(step * 200);
            terminal
                .draw(|f| apply_pop_effect(f, board, &mut effect, &mut time, now))
                .unwrap();
        }
        assert!(effect.as_ref().is_some_and(|e| e.done()));
    }
}
