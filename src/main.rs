//! Columnstui: Columns-style falling-block matching puzzle in the terminal.

mod app;
mod engine;
mod grid;
mod input;
mod matcher;
mod piece;
mod scoring;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIN_WIDTH: u16 = 8;
pub const MAX_WIDTH: u16 = 50;
pub const MIN_HEIGHT: u16 = 10;
pub const MAX_HEIGHT: u16 = 30;

/// Pause after printing size warnings so they can be read before the TUI starts.
const WARNING_PAUSE: Duration = Duration::from_secs(1);

/// Game options after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Playfield width in cells.
    pub width: u16,
    /// Visible playfield height in cells.
    pub height: u16,
    pub seed: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let (config, warnings) = args.game_config();
    if !warnings.is_empty() {
        for warning in &warnings {
            eprintln!("{warning}");
            log::warn!("{warning}");
        }
        std::thread::sleep(WARNING_PAUSE);
    }

    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        log::warn!("theme not loaded ({e}), using defaults");
        let mut theme = theme::Theme::default();
        theme.apply_palette(args.palette);
        theme
    });

    let progress = App::new(config, theme).run()?;
    println!("Score: {}  Level: {}", progress.score, progress.level);
    Ok(())
}

/// Logs go to a file: stdout and stderr belong to the terminal UI.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::temp_dir().join("columnstui.log"));
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_module_path(false)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    log::info!("starting columnstui {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Columns-style matching puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "columnstui",
    version,
    about = "Columns-style falling-block puzzle in the terminal. Line up three or more of a colour to clear them.",
    long_about = "Columnstui is a terminal take on the Columns family of puzzle games.\n\n\
        A column of three coloured blocks falls into the well. Line up three or more blocks \
        of one colour horizontally, vertically or diagonally to destroy them; blocks above \
        fall down and may set off chain reactions worth extra points.\n\n\
        CONTROLS:\n  Left/Right or h/l  Move    Up or k  Rotate   Down or j  Drop\n  p  Pause (any key resumes)   q / Esc  Quit"
)]
pub struct Args {
    /// Playfield width in columns (clamped to 8..=50).
    #[arg(
        long,
        default_value = "10",
        value_name = "COLS",
        allow_hyphen_values = true,
        value_parser = parse_dimension
    )]
    pub width: i64,

    /// Playfield height in rows (clamped to 10..=30).
    #[arg(
        long,
        default_value = "15",
        value_name = "ROWS",
        allow_hyphen_values = true,
        value_parser = parse_dimension
    )]
    pub height: i64,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Seed for the piece generator, for reproducible games.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Log file (default: columnstui.log in the temp directory). Filter with RUST_LOG.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Clamps the field size into range, returning a warning per adjusted value.
    pub fn game_config(&self) -> (GameConfig, Vec<String>) {
        let mut warnings = Vec::new();
        let width = clamp_dimension("width", self.width, MIN_WIDTH, MAX_WIDTH, &mut warnings);
        let height = clamp_dimension("height", self.height, MIN_HEIGHT, MAX_HEIGHT, &mut warnings);
        let config = GameConfig {
            width,
            height,
            seed: self.seed,
        };
        (config, warnings)
    }
}

/// Reads a size the lenient way: leading sign and digits count, anything
/// after them is ignored, and text without digits reads as 0. Never fails,
/// so bad sizes end up clamped instead of rejected.
fn parse_dimension(arg: &str) -> Result<i64, std::convert::Infallible> {
    let arg = arg.trim_start();
    let (negative, digits) = match arg.as_bytes().first() {
        Some(b'-') => (true, &arg[1..]),
        Some(b'+') => (false, &arg[1..]),
        _ => (false, arg),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });
    Ok(if negative { -magnitude } else { magnitude })
}

fn clamp_dimension(name: &str, value: i64, min: u16, max: u16, warnings: &mut Vec<String>) -> u16 {
    let clamped = value.clamp(i64::from(min), i64::from(max)) as u16;
    if i64::from(clamped) != value {
        warnings.push(format!(
            "Warning: {name} {value} out of range {min}..={max}, using {clamped}"
        ));
    }
    clamped
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
