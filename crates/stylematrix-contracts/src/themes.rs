use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// A single-ink colour pairing applied across a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTheme {
    pub name: String,
    pub ink_hex: String,
    pub paper_hex: String,
}

impl ColorTheme {
    pub fn new(name: &str, ink_hex: &str, paper_hex: &str) -> Self {
        Self {
            name: name.to_string(),
            ink_hex: ink_hex.to_string(),
            paper_hex: paper_hex.to_string(),
        }
    }

    pub fn ink_rgb(&self) -> Option<[u8; 3]> {
        parse_hex_rgb(&self.ink_hex)
    }

    pub fn paper_rgb(&self) -> Option<[u8; 3]> {
        parse_hex_rgb(&self.paper_hex)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemePalette {
    themes: Vec<ColorTheme>,
}

impl ThemePalette {
    pub fn new(themes: Vec<ColorTheme>) -> Self {
        Self { themes }
    }

    pub fn reference() -> Self {
        Self::new(vec![
            ColorTheme::new("Cobalt Blue", "#0047AB", "#FDF5E6"),
            ColorTheme::new("Emerald Green", "#046307", "#F0F9F0"),
            ColorTheme::new("Deep Crimson", "#9E1B1B", "#FFF5F5"),
            ColorTheme::new("Charcoal Black", "#1A1A1A", "#F5F5F5"),
            ColorTheme::new("Amber Gold", "#B45309", "#FFFBEB"),
        ])
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&ColorTheme, SessionError> {
        self.themes.get(index).ok_or(SessionError::ThemeNotFound {
            index,
            available: self.themes.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColorTheme> {
        self.themes.iter()
    }
}

fn parse_hex_rgb(raw: &str) -> Option<[u8; 3]> {
    let digits = raw.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |idx: usize| u8::from_str_radix(&digits[idx..idx + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::{ColorTheme, ThemePalette};
    use crate::errors::SessionError;

    #[test]
    fn reference_palette_starts_with_cobalt() -> anyhow::Result<()> {
        let palette = ThemePalette::reference();
        assert_eq!(palette.len(), 5);
        let cobalt = palette.get(0)?;
        assert_eq!(cobalt.name, "Cobalt Blue");
        assert_eq!(cobalt.ink_rgb(), Some([0x00, 0x47, 0xAB]));
        assert_eq!(cobalt.paper_rgb(), Some([0xFD, 0xF5, 0xE6]));
        Ok(())
    }

    #[test]
    fn out_of_range_theme_is_reported() {
        assert_eq!(
            ThemePalette::reference().get(5).err(),
            Some(SessionError::ThemeNotFound {
                index: 5,
                available: 5
            })
        );
    }

    #[test]
    fn malformed_hex_does_not_parse() {
        assert_eq!(ColorTheme::new("x", "#12345", "#FFF").ink_rgb(), None);
        assert_eq!(ColorTheme::new("x", "zz0000", "").ink_rgb(), None);
    }
}
