use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};

pub const SWATCHES: [&str; 6] = [
    "#00ffff", "#ff00ff", "#00ff88", "#ffcc00", "#ff5555", "#6a5acd",
];

/// An sRGB colour with alpha, written as `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ThemeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ThemeColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for ThemeColor {
    fn default() -> Self {
        Self::rgb(0x00, 0xff, 0xff)
    }
}

impl FromStr for ThemeColor {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let Some(digits) = trimmed.strip_prefix('#') else {
            bail!("invalid colour '{input}', expected #RRGGBB or #RRGGBBAA");
        };
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            bail!("invalid colour '{input}', expected hex digits");
        }
        let channel = |index: usize| u8::from_str_radix(&digits[index..index + 2], 16);
        match digits.len() {
            6 => Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Self {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                a: channel(6)?,
            }),
            _ => bail!("invalid colour '{input}', expected #RRGGBB or #RRGGBBAA"),
        }
    }
}

impl fmt::Display for ThemeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Committed colour plus the in-progress choice while the picker is open.
#[derive(Debug, Clone, Default)]
pub struct ThemeState {
    committed: ThemeColor,
    preview: Option<ThemeColor>,
}

impl ThemeState {
    pub fn new(committed: ThemeColor) -> Self {
        Self {
            committed,
            preview: None,
        }
    }

    pub fn active(&self) -> ThemeColor {
        self.preview.unwrap_or(self.committed)
    }

    pub fn committed(&self) -> ThemeColor {
        self.committed
    }

    pub fn is_previewing(&self) -> bool {
        self.preview.is_some()
    }

    pub fn preview(&mut self, color: ThemeColor) {
        self.preview = Some(color);
    }

    /// Returns true when the committed colour changed.
    pub fn save(&mut self) -> bool {
        match self.preview.take() {
            Some(color) if color != self.committed => {
                self.committed = color;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.preview = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_alpha_forms() {
        let cyan: ThemeColor = "#00FFFF".parse().expect("rgb");
        assert_eq!(cyan, ThemeColor::rgb(0, 255, 255));
        assert_eq!(cyan.to_hex(), "#00ffff");

        let translucent: ThemeColor = "#6a5acd80".parse().expect("rgba");
        assert_eq!(translucent.a, 0x80);
        assert_eq!(translucent.to_hex(), "#6a5acd80");
    }

    #[test]
    fn rejects_malformed_colours() {
        for bad in ["cyan", "#12345", "#zzzzzz", "00ffff", "#ff00ff0"] {
            assert!(bad.parse::<ThemeColor>().is_err(), "{bad}");
        }
    }

    #[test]
    fn swatches_are_valid() {
        for swatch in SWATCHES {
            assert_eq!(swatch.parse::<ThemeColor>().expect(swatch).to_hex(), swatch);
        }
        assert_eq!(ThemeColor::default().to_hex(), SWATCHES[0]);
    }

    #[test]
    fn preview_reverts_on_cancel_and_commits_on_save() {
        let mut theme = ThemeState::new(ThemeColor::default());
        let magenta = ThemeColor::rgb(255, 0, 255);

        theme.preview(magenta);
        assert_eq!(theme.active(), magenta);
        assert_eq!(theme.committed(), ThemeColor::default());
        theme.cancel();
        assert_eq!(theme.active(), ThemeColor::default());

        theme.preview(magenta);
        assert!(theme.save());
        assert_eq!(theme.committed(), magenta);
        assert!(!theme.is_previewing());
        assert!(!theme.save());
    }
}
