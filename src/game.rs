//! Game state: grid, gem source, cursor, pop feedback and stats.

use crate::GameConfig;
use crate::cell::RandomCellGenerator;
use crate::cluster::{self, PopError, Removal};
use crate::fall::FallAnimator;
use crate::grid::{Grid, GridError};
use crate::theme::Theme;
use tracing::{debug, info, trace};

/// How long a feedback cue stays in the sidebar.
const CUE_LIFETIME_MS: u32 = 1200;

/// Outcome of a pop attempt, as heard by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Popped { size: usize },
    CannotPop,
}

#[derive(Debug, Clone, Copy)]
pub struct Cue {
    pub feedback: Feedback,
    pub age_ms: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub pops: u32,
    pub gems_cleared: u32,
    pub largest: usize,
    pub misses: u32,
}

#[derive(Debug)]
pub struct GameState {
    pub theme: Theme,
    pub grid: Grid,
    generator: RandomCellGenerator,
    animator: FallAnimator,
    /// Keyboard cursor in grid coordinates.
    pub cursor: (i32, i32),
    pub stats: Stats,
    pub cue: Option<Cue>,
    /// Whether any cluster can be popped once the board settles.
    pub has_move: bool,
    /// Last successful pop, until the shell collects it for the flash effect.
    removal: Option<Removal>,
}

impl GameState {
    pub fn new(theme: Theme, config: &GameConfig) -> Result<Self, GridError> {
        let mut generator = RandomCellGenerator::new(config.seed);
        let grid = Grid::new(config.width, config.height, &mut generator)?;
        info!(
            seed = config.seed,
            width = config.width,
            height = config.height,
            "new game"
        );
        let animator = if config.no_animation {
            FallAnimator::instant()
        } else {
            FallAnimator::default()
        };
        let has_move = cluster::has_removable_cluster(&grid);
        Ok(Self {
            theme,
            cursor: (0, grid.height() as i32 - 1),
            grid,
            generator,
            animator,
            stats: Stats::default(),
            cue: None,
            has_move,
            removal: None,
        })
    }

    /// Fresh board of the same size; the gem sequence continues from the current one.
    pub fn restart(&mut self) -> Result<(), GridError> {
        let (w, h) = (self.grid.width() as u16, self.grid.height() as u16);
        self.grid = Grid::new(w, h, &mut self.generator)?;
        info!(
            pops = self.stats.pops,
            gems_cleared = self.stats.gems_cleared,
            misses = self.stats.misses,
            "restart, gem stream continues"
        );
        self.stats = Stats::default();
        self.cue = None;
        self.removal = None;
        self.has_move = cluster::has_removable_cluster(&self.grid);
        Ok(())
    }

    /// Try to pop the cluster at grid coordinates (x, y).
    pub fn click(&mut self, x: i32, y: i32) -> Feedback {
        let feedback = match self.try_pop(x, y) {
            Ok(removal) => {
                let size = removal.size();
                debug!(x, y, size, kind = ?removal.kind, "popped");
                self.stats.pops += 1;
                self.stats.gems_cleared += size as u32;
                self.stats.largest = self.stats.largest.max(size);
                self.removal = Some(removal);
                Feedback::Popped { size }
            }
            Err(err) => {
                debug!(x, y, %err, "cannot pop");
                self.stats.misses += 1;
                Feedback::CannotPop
            }
        };
        self.cue = Some(Cue {
            feedback,
            age_ms: 0,
        });
        feedback
    }

    fn try_pop(&mut self, x: i32, y: i32) -> Result<Removal, PopError> {
        if self.grid.contains(x, y) {
            self.cursor = (x, y);
        }
        cluster::remove_cluster(&mut self.grid, x, y, &mut self.generator)
    }

    /// A click that landed outside the board.
    pub fn miss(&mut self) -> Feedback {
        debug!("click outside the board");
        self.stats.misses += 1;
        self.cue = Some(Cue {
            feedback: Feedback::CannotPop,
            age_ms: 0,
        });
        Feedback::CannotPop
    }

    pub fn pop_at_cursor(&mut self) -> Feedback {
        let (x, y) = self.cursor;
        self.click(x, y)
    }

    /// Move the cursor, clamped to the board.
    pub fn move_cursor(&mut self, dx: i32, dy: i32) {
        let max_x = self.grid.width() as i32 - 1;
        let max_y = self.grid.height() as i32 - 1;
        self.cursor = (
            (self.cursor.0 + dx).clamp(0, max_x),
            (self.cursor.1 + dy).clamp(0, max_y),
        );
    }

    /// One fixed animation step of `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        let was_stable = self.grid.is_stable();
        let stable = self.animator.tick(&mut self.grid, dt);
        if stable && !was_stable {
            self.has_move = cluster::has_removable_cluster(&self.grid);
            trace!(has_move = self.has_move, "grid settled");
        }
    }

    pub fn take_removal(&mut self) -> Option<Removal> {
        self.removal.take()
    }

    pub fn tick_cue(&mut self, delta_ms: u32) {
        if let Some(cue) = &mut self.cue {
            cue.age_ms = cue.age_ms.saturating_add(delta_ms);
            if cue.age_ms >= CUE_LIFETIME_MS {
                self.cue = None;
            }
        }
    }
}
