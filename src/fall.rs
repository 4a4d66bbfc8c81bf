//! Fall animation: per-cell velocity integration and the fixed-step clock that drives it.

use crate::cell::Cell;
use crate::grid::Grid;
use std::time::Duration;

/// Downward acceleration in cell heights per second squared.
pub const ACCEL: f32 = 40.0;

/// Logical step used when the caller does not pick one.
pub const DEFAULT_STEP: Duration = Duration::from_millis(40);

/// Most steps run for a single frame; a longer stall drops the excess time.
const MAX_STEPS_PER_ADVANCE: u32 = 8;

/// Advances every falling cell toward rest.
#[derive(Debug, Clone, Copy)]
pub struct FallAnimator {
    accel: f32,
}

impl Default for FallAnimator {
    fn default() -> Self {
        Self { accel: ACCEL }
    }
}

impl FallAnimator {
    /// Animator that lands everything on the next tick.
    pub fn instant() -> Self {
        Self {
            accel: f32::INFINITY,
        }
    }

    /// One tick of `dt` seconds. Returns the refreshed stable flag.
    pub fn tick(&self, grid: &mut Grid, dt: f32) -> bool {
        if dt > 0.0 {
            for cell in grid.cells_mut() {
                self.tick_cell(cell, dt);
            }
        }
        grid.refresh_stable()
    }

    fn tick_cell(&self, cell: &mut Cell, dt: f32) {
        if !cell.is_falling() {
            return;
        }
        cell.fall_velocity += dt * self.accel;
        cell.fall_offset -= cell.fall_velocity * dt;
        if cell.fall_offset <= 0.0 || !cell.fall_offset.is_finite() {
            cell.fall_offset = 0.0;
            cell.fall_velocity = 0.0;
        }
    }
}

/// Turns measured frame time into whole fixed-length steps.
#[derive(Debug, Clone)]
pub struct StepClock {
    step: Duration,
    pending: Duration,
}

impl StepClock {
    pub fn new(step: Duration) -> Self {
        Self {
            step: step.max(Duration::from_millis(1)),
            pending: Duration::ZERO,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Add `elapsed` and return how many steps are due.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.pending += elapsed;
        let mut steps = 0;
        while self.pending >= self.step && steps < MAX_STEPS_PER_ADVANCE {
            self.pending -= self.step;
            steps += 1;
        }
        if steps == MAX_STEPS_PER_ADVANCE {
            self.pending = self.pending.min(self.step);
        }
        steps
    }

    pub fn reset(&mut self) {
        self.pending = Duration::ZERO;
    }
}
