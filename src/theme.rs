//! Colours for blocks and chrome, from One Dark or a btop theme file.

use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// One Dark block colours and UI colours, optionally overridden by a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Block colours (index 0..=4): green, yellow, red, blue, magenta.
    pub blocks: [Color; 5],
    /// Destroyer blocks.
    pub destroyer: Color,
    /// Playfield background.
    pub bg: Color,
    /// Border.
    pub div_line: Color,
    /// Text (score, level).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text (key hints).
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

const GREEN: Color = Color::Rgb(0x98, 0xC3, 0x79);
const YELLOW: Color = Color::Rgb(0xE5, 0xC0, 0x7B);
const RED: Color = Color::Rgb(0xE0, 0x6C, 0x75);
const BLUE: Color = Color::Rgb(0x61, 0xAF, 0xEF);
const MAGENTA: Color = Color::Rgb(0xC6, 0x78, 0xDD);
const CYAN: Color = Color::Rgb(0x56, 0xB6, 0xC2);
const METER_BG: Color = Color::Rgb(0x31, 0x35, 0x3F);
const DIV_LINE: Color = Color::Rgb(0x3F, 0x44, 0x4F);
const MAIN_FG: Color = Color::Rgb(0xAB, 0xB2, 0xBF);
const INACTIVE_FG: Color = Color::Rgb(0x5C, 0x63, 0x70);

impl Theme {
    /// One Dark defaults (hex values from onedark.theme).
    pub fn onedark_default() -> Self {
        Self {
            blocks: [GREEN, YELLOW, RED, BLUE, MAGENTA],
            destroyer: CYAN,
            bg: METER_BG,
            div_line: DIV_LINE,
            main_fg: MAIN_FG,
            title: YELLOW,
            inactive_fg: INACTIVE_FG,
        }
    }

    /// Reads a btop theme (`theme[key]="value"`, single quotes allowed), then applies `palette`.
    /// A missing path or file gives One Dark.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => Self::from_map(&parse_btop_theme(&std::fs::read_to_string(p)?)),
            Some(p) => {
                log::warn!("theme file {} not found, using One Dark", p.display());
                Self::onedark_default()
            }
            None => Self::onedark_default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Override block colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.blocks = [
                    Color::Rgb(0x00, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0x00, 0x00),
                    Color::Rgb(0x00, 0x88, 0xFF),
                    Color::Rgb(0xFF, 0x00, 0xFF),
                ];
                self.destroyer = Color::Rgb(0xFF, 0xFF, 0xFF);
            }
            crate::Palette::Colorblind => {
                // Paul Tol's bright scheme: no red/green pairs
                self.blocks = [
                    Color::Rgb(0x00, 0x77, 0xBB),
                    Color::Rgb(0xEE, 0x77, 0x33),
                    Color::Rgb(0x00, 0x99, 0x88),
                    Color::Rgb(0xCC, 0x33, 0x11),
                    Color::Rgb(0xEE, 0x33, 0x77),
                ];
                self.destroyer = Color::Rgb(0xBB, 0xBB, 0x00);
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        Self {
            blocks: [
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(GREEN),
                get("title").or_else(|| get("cpu_mid")).unwrap_or(YELLOW),
                get("cpu_end").or_else(|| get("temp_end")).unwrap_or(RED),
                get("cpu_box").unwrap_or(BLUE),
                get("net_box").unwrap_or(MAGENTA),
            ],
            destroyer: get("hi_fg").or_else(|| get("proc_misc")).unwrap_or(CYAN),
            bg: get("meter_bg").unwrap_or(METER_BG),
            div_line: get("div_line").unwrap_or(DIV_LINE),
            main_fg: get("main_fg").unwrap_or(MAIN_FG),
            title: get("title").unwrap_or(YELLOW),
            inactive_fg: get("inactive_fg").unwrap_or(INACTIVE_FG),
        }
    }

    /// Colour for block index (0..5).
    #[inline]
    pub fn block_color(&self, index: u8) -> Color {
        self.blocks[usize::from(index) % self.blocks.len()]
    }
}

/// Collects `theme[key]="value"` entries; comments and other lines are skipped.
fn parse_btop_theme(source: &str) -> HashMap<String, String> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.strip_prefix("theme[")?.split_once(']')?;
            let value = value.trim_start().strip_prefix('=')?.trim();
            let value = value.trim_matches(|c| c == '"' || c == '\'');
            (!value.is_empty()).then(|| (key.trim().to_owned(), value.to_owned()))
        })
        .collect()
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
    let (r, g, b) = match s.len() {
        6 => (channel(&s[0..2])?, channel(&s[2..4])?, channel(&s[4..6])?),
        3 => (
            channel(&s[0..1])? * 17,
            channel(&s[1..2])? * 17,
            channel(&s[2..3])? * 17,
        ),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_long_and_short() {
        assert_eq!(parse_hex("#98C379").unwrap(), GREEN);
        assert_eq!(parse_hex("fff").unwrap(), Color::Rgb(255, 255, 255));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(matches!(parse_hex("#12"), Err(ThemeError::InvalidHex(_))));
        assert!(matches!(parse_hex("#GGGGGG"), Err(ThemeError::InvalidHex(_))));
    }

    #[test]
    fn test_parse_btop_line() {
        let map = parse_btop_theme("  theme[meter_bg] = \"#31353F\"\ntheme[empty]=\"\"\nnot a theme line");
        assert_eq!(map.get("meter_bg").map(String::as_str), Some("#31353F"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_theme_file_overrides_blocks() {
        let map = parse_btop_theme(
            "# comment\ntheme[mem_box]=\"#010203\"\ntheme[hi_fg]='#FFF'\ntheme[cpu_box]=\"nope\"\n",
        );
        let theme = Theme::from_map(&map);
        assert_eq!(theme.blocks[0], Color::Rgb(1, 2, 3));
        assert_eq!(theme.destroyer, Color::Rgb(255, 255, 255));
        assert_eq!(theme.blocks[3], BLUE);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let theme = Theme::load(
            Some(Path::new("/nonexistent/columnstui.theme")),
            crate::Palette::Normal,
        )
        .unwrap();
        assert_eq!(theme.blocks, Theme::onedark_default().blocks);
    }

    #[test]
    fn test_palette_changes_blocks() {
        let mut theme = Theme::default();
        theme.apply_palette(crate::Palette::Colorblind);
        assert_ne!(theme.blocks, Theme::onedark_default().blocks);
    }
}
