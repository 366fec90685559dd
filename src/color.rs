//! RGB color triples stored under `color_settings`
//!
//! On disk a color is a three element integer array (`[12, 200, 255]`).
//! In the editor it is shown as the swatch text `RGB(12, 200, 255)`.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::constants::validation::MAX_CHANNEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("expected 3 channels, found {0}")]
    ChannelCount(usize),
    #[error("channel '{0}' is not an integer")]
    NotInteger(String),
    #[error("channel {0} is outside 0-255")]
    OutOfRange(i64),
}

impl Rgb {
    #[cfg(test)]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Parse the editor swatch text.
    ///
    /// The `RGB(` envelope and closing paren are optional; the inner text must
    /// be exactly three comma separated integers in 0..=255.
    pub fn parse_swatch(text: &str) -> Result<Self, ColorParseError> {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix("RGB(")
            .or_else(|| trimmed.strip_prefix("rgb("))
            .unwrap_or(trimmed);
        let inner = inner.strip_suffix(')').unwrap_or(inner);

        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(ColorParseError::ChannelCount(parts.len()));
        }

        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            let value: i64 = part
                .parse()
                .map_err(|_| ColorParseError::NotInteger(part.to_string()))?;
            *slot = channel(value)?;
        }
        Ok(Self::from(channels))
    }

    /// Interpret a JSON `[r, g, b]` array
    pub fn from_json(value: &Value) -> Result<Self, ColorParseError> {
        let Some(items) = value.as_array() else {
            return Err(ColorParseError::ChannelCount(0));
        };
        if items.len() != 3 {
            return Err(ColorParseError::ChannelCount(items.len()));
        }

        let mut channels = [0u8; 3];
        for (slot, item) in channels.iter_mut().zip(items) {
            let value = item
                .as_i64()
                .ok_or_else(|| ColorParseError::NotInteger(item.to_string()))?;
            *slot = channel(value)?;
        }
        Ok(Self::from(channels))
    }

    pub fn to_json(self) -> Value {
        Value::from(vec![self.r, self.g, self.b])
    }
}

fn channel(value: i64) -> Result<u8, ColorParseError> {
    if (0..=MAX_CHANNEL).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ColorParseError::OutOfRange(value))
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_swatch(s)
    }
}

/// Formats as the editor swatch text, `RGB(r, g, b)`
impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RGB({}, {}, {})", self.r, self.g, self.b)
    }
}
