// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Title styles.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::str::FromStr;

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0x00, 0x00, 0x00, 0xff);
    pub const WHITE: Color = Color::rgba(0xff, 0xff, 0xff, 0xff);

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Big-endian ARGB as GStreamer's color properties expect it.
    #[must_use]
    pub fn argb(self) -> u32 {
        (u32::from(self.a)) << 24
            | (u32::from(self.r)) << 16
            | (u32::from(self.g)) << 8
            | (u32::from(self.b))
    }
}

impl Default for Color {
    fn default() -> Color {
        Color::WHITE
    }
}

/// Parses `#rrggbb` or `#rrggbbaa`, the `#` is optional.
impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            bail!("'{s}' is not a color like '#rrggbb' or '#rrggbbaa'");
        }

        let channel = |index: usize| {
            u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16)
                .with_context(|| format!("invalid color channel in '{s}'"))
        };
        let alpha = if hex.len() == 8 { channel(3)? } else { 0xff };

        Ok(Color::rgba(channel(0)?, channel(1)?, channel(2)?, alpha))
    }
}

impl TryFrom<String> for Color {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r, self.g, self.b, self.a
        )
    }
}

/// Text font.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Font {
    /// Family and style, e.g. `Sans Bold`.
    pub name: String,
    pub size: u32,
}

impl Default for Font {
    fn default() -> Font {
        Font {
            name: "Sans".to_owned(),
            size: 24,
        }
    }
}

/// Parses a font description whose last word is the size, e.g. `Sans Bold 24`.
impl FromStr for Font {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, size) = s
            .trim()
            .rsplit_once(char::is_whitespace)
            .ok_or_else(|| anyhow!("font '{s}' has no size"))?;
        let size = size
            .parse()
            .with_context(|| format!("font '{s}' has an invalid size"))?;

        Ok(Font {
            name: name.trim_end().to_owned(),
            size,
        })
    }
}

impl TryFrom<String> for Font {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl std::fmt::Display for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.size)
    }
}

/// Relative position of the text within the frame.
///
/// `0.0` is left/top, `1.0` is right/bottom.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Alignment {
    pub x: f64,
    pub y: f64,
}

/// The nine alignments offered to the user, row by row starting at the top left.
pub const ALIGNMENT_PRESETS: [Alignment; 9] = [
    Alignment::new_unchecked(0.0, 0.0),
    Alignment::new_unchecked(0.5, 0.0),
    Alignment::new_unchecked(1.0, 0.0),
    Alignment::new_unchecked(0.0, 0.5),
    Alignment::new_unchecked(0.5, 0.5),
    Alignment::new_unchecked(1.0, 0.5),
    Alignment::new_unchecked(0.0, 1.0),
    Alignment::new_unchecked(0.5, 1.0),
    Alignment::new_unchecked(1.0, 1.0),
];

impl Alignment {
    /// Create an alignment, values are clamped into `0.0..=1.0`.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }

    const fn new_unchecked(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Alignment preset with the given index into [`ALIGNMENT_PRESETS`].
    #[must_use]
    pub fn preset(index: usize) -> Option<Self> {
        ALIGNMENT_PRESETS.get(index).copied()
    }

    /// Index of the preset this alignment equals, if any.
    #[must_use]
    pub fn preset_index(&self) -> Option<usize> {
        ALIGNMENT_PRESETS.iter().position(|preset| preset == self)
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self::new_unchecked(0.5, 0.5)
    }
}

impl std::fmt::Display for Alignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{x}/{y}", x = self.x, y = self.y)
    }
}

/// Alignment of the lines within a multi-line title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Justification {
    #[default]
    Left,
    Center,
    Right,
}

impl From<Justification> for &'static str {
    fn from(justification: Justification) -> &'static str {
        justification.as_str()
    }
}

impl std::fmt::Display for Justification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Justification {
    fn as_str(self) -> &'static str {
        match self {
            Justification::Left => "left",
            Justification::Center => "center",
            Justification::Right => "right",
        }
    }
}

/// Everything needed to render a title.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TitleStyle {
    /// Text to show, may contain Pango markup.
    pub text: String,
    pub font: Font,
    pub alignment: Alignment,
    pub fg_color: Color,
    pub bg_color: Color,
    pub justification: Justification,
}

impl Default for TitleStyle {
    fn default() -> Self {
        Self {
            text: "title".to_owned(),
            font: Font::default(),
            alignment: Alignment::default(),
            fg_color: Color::WHITE,
            bg_color: Color::BLACK,
            justification: Justification::default(),
        }
    }
}

impl std::fmt::Display for TitleStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{text}', {font}, {alignment}, {fg} on {bg}, {justification}",
            text = self.text,
            font = self.font,
            alignment = self.alignment,
            fg = self.fg_color,
            bg = self.bg_color,
            justification = self.justification
        )
    }
}
