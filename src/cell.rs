//! Cell model: gem kinds, per-cell fall state, random gem source.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Gem kinds plus `Void` (no gem present).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellType {
    #[default]
    Void,
    Diamond,
    Emerald,
    Ruby,
    Grape,
    Banana,
}

impl CellType {
    /// Every non-void kind, in palette order.
    pub const GEMS: [Self; 5] = [
        Self::Diamond,
        Self::Emerald,
        Self::Ruby,
        Self::Grape,
        Self::Banana,
    ];

    #[inline]
    pub fn is_void(self) -> bool {
        self == Self::Void
    }

    /// Colour index 0..5 for `theme.gem_color()`. `None` for void.
    pub fn gem_index(self) -> Option<u8> {
        match self {
            Self::Void => None,
            Self::Diamond => Some(0),
            Self::Emerald => Some(1),
            Self::Ruby => Some(2),
            Self::Grape => Some(3),
            Self::Banana => Some(4),
        }
    }

    /// Glyph drawn in the middle of a gem so kinds stay distinguishable without colour.
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Void => " ",
            Self::Diamond => "◆",
            Self::Emerald => "■",
            Self::Ruby => "●",
            Self::Grape => "♣",
            Self::Banana => "☽",
        }
    }
}

/// One grid slot.
///
/// `fall_offset` is the remaining distance (in cell heights) above the rest
/// position; zero means settled. `fall_velocity` is the animator's speed
/// accumulator and is reset to zero whenever a new fall starts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cell {
    pub kind: CellType,
    pub fall_offset: f32,
    pub fall_velocity: f32,
}

impl Cell {
    pub fn new(kind: CellType) -> Self {
        Self {
            kind,
            fall_offset: 0.0,
            fall_velocity: 0.0,
        }
    }

    #[inline]
    pub fn is_falling(&self) -> bool {
        self.fall_offset > 0.0
    }

    /// Start a fresh fall from `rows` above the rest position.
    pub fn drop_from(&mut self, rows: usize) {
        self.fall_offset = rows as f32;
        self.fall_velocity = 0.0;
    }
}

/// Supplies gem kinds for grid construction and refills.
pub trait CellSource {
    /// Next gem kind. Never `CellType::Void`.
    fn next_type(&mut self) -> CellType;
}

/// Uniform gem picker over [`CellType::GEMS`], reproducible for a given seed.
#[derive(Debug, Clone)]
pub struct RandomCellGenerator {
    rng: ChaCha8Rng,
}

impl RandomCellGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl CellSource for RandomCellGenerator {
    fn next_type(&mut self) -> CellType {
        CellType::GEMS[self.rng.gen_range(0..CellType::GEMS.len())]
    }
}
