//! App: terminal init, main loop, fixed-step animation and input handling.

use crate::fall::StepClock;
use crate::game::{Feedback, GameState};
use crate::input::{Action, key_to_action, mouse_to_action};
use crate::theme::Theme;
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::io::Write;
use std::time::{Duration, Instant};
use tachyonfx::Effect;
use tracing::{debug, info};

pub struct App {
    args: Args,
    config: GameConfig,
    state: GameState,
    paused: bool,
    clock: StepClock,
    last_frame: Instant,
    /// TachyonFX flash over the last popped cells (created when a pop lands).
    pop_effect: Option<Effect>,
    /// Last time we processed the pop effect (for delta).
    pop_effect_process_time: Option<Instant>,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let state = GameState::new(theme, &config)?;
        let clock = StepClock::new(args.tick_step());
        Ok(Self {
            args,
            config,
            state,
            paused: false,
            clock,
            last_frame: Instant::now(),
            pop_effect: None,
            pop_effect_process_time: None,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode, size},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        // Shrink the board to fit the terminal; --width/--height are kept when they fit.
        let (term_cols, term_rows) = size()?;
        let (fit_w, fit_h) = crate::ui::max_grid_for_terminal(term_cols, term_rows);
        let (w, h) = (self.config.width, self.config.height);
        if w > fit_w || h > fit_h {
            info!(w, h, fit_w, fit_h, "board clamped to terminal");
            self.config.width = w.min(fit_w);
            self.config.height = h.min(fit_h);
            self.state = GameState::new(self.state.theme.clone(), &self.config)?;
        }

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = self.args.frame_duration();
        self.last_frame = Instant::now();
        loop {
            let now = Instant::now();
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    &self.state,
                    self.paused,
                    &mut self.pop_effect,
                    &mut self.pop_effect_process_time,
                    now,
                )
            })?;
            if self.pop_effect.as_ref().is_some_and(|e| e.done()) {
                self.pop_effect = None;
                self.pop_effect_process_time = None;
            }

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let action = match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => key_to_action(key),
                        Event::Mouse(mouse) => mouse_to_action(mouse),
                        _ => Action::None,
                    };
                    if action == Action::Quit {
                        return Ok(());
                    }
                    self.apply_action(action, terminal.get_frame().area())?;
                }
            }

            let elapsed = self.last_frame.elapsed();
            self.last_frame = Instant::now();
            if self.paused {
                continue;
            }
            let dt = self.clock.step().as_secs_f32();
            for _ in 0..self.clock.advance(elapsed) {
                self.state.tick(dt);
            }
            self.state
                .tick_cue(elapsed.as_millis().min(u32::MAX as u128) as u32);
        }
    }

    fn apply_action(&mut self, action: Action, area: ratatui::layout::Rect) -> Result<()> {
        if self.paused {
            if action == Action::Pause {
                self.paused = false;
                self.clock.reset();
            }
            return Ok(());
        }
        match action {
            Action::Left => self.state.move_cursor(-1, 0),
            Action::Right => self.state.move_cursor(1, 0),
            Action::Up => self.state.move_cursor(0, -1),
            Action::Down => self.state.move_cursor(0, 1),
            Action::Pop => {
                let feedback = self.state.pop_at_cursor();
                self.after_pop(feedback, area)?;
            }
            Action::Click { column, row } => {
                let board = crate::ui::layout(area, &self.state.grid).board;
                let feedback = match crate::ui::screen_to_grid(board, column, row) {
                    Some((x, y)) => self.state.click(x, y),
                    None => self.state.miss(),
                };
                self.after_pop(feedback, area)?;
            }
            Action::Pause => self.paused = true,
            Action::Restart => {
                self.state.restart()?;
                self.pop_effect = None;
                self.pop_effect_process_time = None;
                self.clock.reset();
            }
            Action::Quit | Action::None => {}
        }
        Ok(())
    }

    /// Start the flash for a landed pop, or sound the cannot-pop cue.
    fn after_pop(&mut self, feedback: Feedback, area: ratatui::layout::Rect) -> Result<()> {
        match feedback {
            Feedback::Popped { .. } => {
                if let Some(removal) = self.state.take_removal() {
                    if !self.args.no_animation {
                        let board = crate::ui::layout(area, &self.state.grid).board;
                        self.pop_effect = Some(crate::ui::pop_flash_effect(board, &removal.removed));
                        self.pop_effect_process_time = None;
                    }
                }
            }
            Feedback::CannotPop => {
                if self.args.bell {
                    debug!("bell");
                    let mut stdout = std::io::stdout();
                    stdout.write_all(b"\x07")?;
                    stdout.flush()?;
                }
            }
        }
        Ok(())
    }
}
