//! Colors and stroke styles shared by the figure recording and the rasterizer

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// An RGBA color. Alpha is in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parse `#RRGGBB`, `rgb(r, g, b)`, `rgba(r, g, b, a)`, `white` or `black`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "white" => return Ok(Color::WHITE),
            "black" => return Ok(Color::BLACK),
            _ => {}
        }

        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(format!("Invalid hex color: '{}'", s));
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map_err(|_| format!("Invalid hex color: '{}'", s))
            };
            return Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?));
        }

        let (body, expects_alpha) = if let Some(rest) = s.strip_prefix("rgba(") {
            (rest, true)
        } else if let Some(rest) = s.strip_prefix("rgb(") {
            (rest, false)
        } else {
            return Err(format!("Unsupported color: '{}'", s));
        };

        let body = body
            .strip_suffix(')')
            .ok_or_else(|| format!("Unterminated color: '{}'", s))?;
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        let expected = if expects_alpha { 4 } else { 3 };
        if parts.len() != expected {
            return Err(format!("Expected {} components in '{}'", expected, s));
        }

        let channel = |p: &str| p.parse::<u8>().map_err(|_| format!("Invalid channel '{}' in '{}'", p, s));
        let alpha = if expects_alpha {
            let a = parts[3]
                .parse::<f64>()
                .map_err(|_| format!("Invalid alpha '{}' in '{}'", parts[3], s))?;
            if !(0.0..=1.0).contains(&a) {
                return Err(format!("Alpha out of range in '{}'", s));
            }
            a
        } else {
            1.0
        };

        Ok(Color::rgba(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, alpha))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dash {
    Solid,
    Dash,
    Dot,
}

/// Stroke style for an indicator line
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineStyle {
    pub color: Color,
    pub dash: Dash,
    pub width: f64,
    /// Draw as a step line: horizontal first, then vertical
    #[serde(default)]
    pub step: bool,
}

impl LineStyle {
    pub fn solid(color: Color, width: f64) -> Self {
        Self { color, dash: Dash::Solid, width, step: false }
    }

    pub fn stepped(color: Color, dash: Dash, width: f64) -> Self {
        Self { color, dash, width, step: true }
    }
}

/// Stroke style for horizontal and vertical reference rules
#[derive(Debug, Clone, PartialEq)]
pub struct RuleStyle {
    pub color: Color,
    pub dash: Dash,
    pub width: f64,
}

/// Box-and-text style of a placed annotation
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationStyle {
    pub font_family: String,
    pub font_size: f64,
    pub font_color: Color,
    pub background: Color,
    pub border: Color,
    pub border_width: f64,
    pub bold: bool,
}

/// One colored fragment of a title line
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub color: Color,
    pub bold: bool,
}

impl TextRun {
    pub fn plain(text: impl Into<String>, color: Color) -> Self {
        Self { text: text.into(), color, bold: false }
    }

    pub fn bold(text: impl Into<String>, color: Color) -> Self {
        Self { text: text.into(), color, bold: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        let c: Color = "#00A040".parse().unwrap();
        assert_eq!(c, Color::rgb(0x00, 0xA0, 0x40));
    }

    #[test]
    fn test_parse_rgba_color() {
        let c: Color = "rgba(230, 230, 230, 0.8)".parse().unwrap();
        assert_eq!(c, Color::rgba(230, 230, 230, 0.8));
    }

    #[test]
    fn test_parse_named_colors() {
        assert_eq!("white".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("Black".parse::<Color>().unwrap(), Color::BLACK);
    }

    #[test]
    fn test_reject_malformed_colors() {
        assert!("#12345".parse::<Color>().is_err());
        assert!("rgba(1, 2, 3)".parse::<Color>().is_err());
        assert!("rgba(1, 2, 3, 1.5)".parse::<Color>().is_err());
        assert!("teal".parse::<Color>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let c = Color::rgba(255, 255, 255, 0.85);
        assert_eq!(c.to_string().parse::<Color>().unwrap(), c);
        assert_eq!(Color::rgb(0xE5, 0x39, 0x35).to_string(), "#E53935");
    }

    #[test]
    fn test_deserialize_line_style() {
        let style: LineStyle =
            serde_json::from_str(r##"{"color": "#00B1EC", "dash": "solid", "width": 2.0}"##).unwrap();
        assert_eq!(style, LineStyle::solid(Color::rgb(0x00, 0xB1, 0xEC), 2.0));
    }
}
