//! Gemtui: click-to-pop gem matching puzzle in the terminal.

mod app;
mod cell;
mod cluster;
mod fall;
mod game;
mod grid;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

/// Largest board side accepted on the command line; the shell shrinks it further to fit the terminal.
pub const MAX_GRID_SIDE: u16 = 64;

/// Options derived from CLI that affect the board itself (size, seed, animation).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: u16,
    pub height: u16,
    pub seed: u64,
    pub no_animation: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = args.log_file.as_deref() {
        init_logging(path)?;
    }
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|err| {
        tracing::warn!(%err, "theme not loaded, using defaults");
        theme::Theme::default_for_palette(args.palette)
    });
    let config = GameConfig {
        width: args.width,
        height: args.height,
        seed: args.seed.unwrap_or_else(clock_seed),
        no_animation: args.no_animation,
    };
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// The terminal belongs to the game, so logs only ever go to a file.
fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gemtui=info")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Gem matching puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "gemtui",
    version,
    about = "Click-to-pop gem matching puzzle in the terminal. Pop groups of three or more touching gems of one kind.",
    long_about = "Gemtui is a terminal puzzle played on a grid of gems.\n\n\
        Click a gem (or move the cursor and press Space) to pop it together with every gem of the \
        same kind it touches up, down, left or right. Groups smaller than three do not pop. \
        Gems above the hole fall down and new gems drop in from the top.\n\n\
        CONTROLS:\n  Mouse       Click to pop\n  Arrows/hjkl Move cursor   Space/Enter Pop\n  \
        P           Pause         R           New board   Q / Esc  Quit"
)]
pub struct Args {
    /// Grid width in cells.
    #[arg(
        long,
        default_value = "8",
        value_name = "COLS",
        value_parser = clap::value_parser!(u16).range(1..=i64::from(MAX_GRID_SIDE))
    )]
    pub width: u16,

    /// Grid height in cells.
    #[arg(
        long,
        default_value = "8",
        value_name = "ROWS",
        value_parser = clap::value_parser!(u16).range(1..=i64::from(MAX_GRID_SIDE))
    )]
    pub height: u16,

    /// Random seed; the same seed deals the same gems. Defaults to the clock.
    #[arg(short, long, value_name = "N")]
    pub seed: Option<u64>,

    /// Fixed animation step in milliseconds.
    #[arg(long, default_value = "40", value_name = "MS")]
    pub tick_ms: u64,

    /// Target render frames per second.
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Land falling gems immediately and skip the pop flash.
    #[arg(long)]
    pub no_animation: bool,

    /// Ring the terminal bell when a click cannot pop anything.
    #[arg(long)]
    pub bell: bool,

    /// Write logs to this file (filter with RUST_LOG, default gemtui=info).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Animation step; `--tick-ms 0` falls back to the default.
    pub fn tick_step(&self) -> Duration {
        match self.tick_ms {
            0 => fall::DEFAULT_STEP,
            ms => Duration::from_millis(ms),
        }
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.clamp(1.0, 240.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
